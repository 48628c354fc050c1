pub mod templates;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpConfig, TlsMode};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to build email: {0}")]
    Message(String),
    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// Account used for one send. Passed on every call so each environment or
/// deployment can send from its own mailbox.
#[derive(Clone)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub tls: TlsMode,
}

impl From<&SmtpConfig> for SmtpCredentials {
    fn from(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.user.clone(),
            password: config.pass.clone(),
            from: config.from.clone(),
            tls: config.tls,
        }
    }
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a plaintext message to a single recipient.
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError>;
}

/// lettre-backed SMTP sender. The transport is built per call from the
/// supplied credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }
}

pub fn build_smtp_transport(
    credentials: &SmtpCredentials,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let creds = Credentials::new(credentials.username.clone(), credentials.password.clone());

    let transport = match credentials.tls {
        TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&credentials.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(credentials.port)
            .credentials(creds)
            .build(),
        TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&credentials.host)
            .port(credentials.port)
            .credentials(creds)
            .build(),
        TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&credentials.host)
            .map_err(|e| MailError::Transport(format!("SMTP starttls error: {e}")))?
            .port(credentials.port)
            .credentials(creds)
            .build(),
    };

    Ok(transport)
}

pub fn build_message(
    credentials: &SmtpCredentials,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, MailError> {
    Message::builder()
        .from(
            credentials
                .from
                .parse()
                .map_err(|e| MailError::Message(format!("Invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| MailError::Message(format!("Invalid to address: {e}")))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailError::Message(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let message = build_message(credentials, to, subject, body)?;
        let transport = build_smtp_transport(credentials)?;

        transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::debug!(to, host = %credentials.host, "Email sent");
        Ok(())
    }
}
