use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
    pub admin_emails: Vec<String>,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_ttl_hours", &self.access_ttl_hours)
            .field("refresh_ttl_hours", &self.refresh_ttl_hours)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub tls: TlsMode,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("from", &self.from)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Tls,
    StartTls,
    None,
}

impl std::str::FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tls" => Ok(TlsMode::Tls),
            "starttls" => Ok(TlsMode::StartTls),
            "none" => Ok(TlsMode::None),
            other => Err(format!(
                "Invalid STAFFDESK_SMTP_TLS value: {other}. Use 'tls', 'starttls', or 'none'"
            )),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let jwt = JwtConfig {
            secret: env_required("JWT_SECRET")?,
            access_ttl_hours: env_parse("STAFFDESK_ACCESS_TOKEN_HOURS", "1")?,
            refresh_ttl_hours: env_parse("STAFFDESK_REFRESH_TOKEN_HOURS", "168")?,
        };

        let host: IpAddr = env_parse("STAFFDESK_HOST", "0.0.0.0")?;
        let port: u16 = env_parse("STAFFDESK_PORT", "3000")?;

        let request_timeout =
            Duration::from_secs(env_parse("STAFFDESK_REQUEST_TIMEOUT_SECS", "10")?);

        let admin_emails = parse_list(&env_or("STAFFDESK_ADMIN_EMAILS", ""));

        let log_level = env_or("STAFFDESK_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("STAFFDESK_SMTP_HOST").ok(),
            std::env::var("STAFFDESK_SMTP_PORT").ok(),
            std::env::var("STAFFDESK_SMTP_USER").ok(),
            std::env::var("STAFFDESK_SMTP_PASS").ok(),
            std::env::var("STAFFDESK_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid STAFFDESK_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
                tls: env_or("STAFFDESK_SMTP_TLS", "starttls").parse()?,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt,
            host,
            port,
            request_timeout,
            admin_emails,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}

/// Comma-separated, trimmed, lower-cased, empties dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_normalizes_entries() {
        assert_eq!(
            parse_list(" Boss@Example.com, ,hr@example.com "),
            vec!["boss@example.com".to_string(), "hr@example.com".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn tls_mode_parses_case_insensitively() {
        assert_eq!("TLS".parse::<TlsMode>().unwrap(), TlsMode::Tls);
        assert_eq!("starttls".parse::<TlsMode>().unwrap(), TlsMode::StartTls);
        assert_eq!("none".parse::<TlsMode>().unwrap(), TlsMode::None);
        assert!("ssl".parse::<TlsMode>().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let jwt = JwtConfig {
            secret: "super-secret".to_string(),
            access_ttl_hours: 1,
            refresh_ttl_hours: 168,
        };
        assert!(!format!("{jwt:?}").contains("super-secret"));

        let smtp = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "mailer".to_string(),
            pass: "hunter2".to_string(),
            from: "no-reply@example.com".to_string(),
            tls: TlsMode::StartTls,
        };
        assert!(!format!("{smtp:?}").contains("hunter2"));
    }
}
