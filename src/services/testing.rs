//! Fakes shared by the service unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::auth::otp::OtpGenerator;
use crate::clock::Clock;
use crate::config::TlsMode;
use crate::email::{MailError, Mailer, SmtpCredentials};
use crate::store::MemoryStore;

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct FixedOtp(pub &'static str);

impl OtpGenerator for FixedOtp {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub username: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: Mutex<bool>,
    /// Stalls every send for a minute, like an SMTP server that never answers.
    pub hang: Mutex<bool>,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        *mailer.fail.lock().unwrap() = true;
        mailer
    }

    pub fn hanging() -> Self {
        let mailer = Self::default();
        *mailer.hang.lock().unwrap() = true;
        mailer
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let hang = *self.hang.lock().unwrap();
        if hang {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if *self.fail.lock().unwrap() {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            username: credentials.username.clone(),
        });
        Ok(())
    }
}

pub fn credentials() -> SmtpCredentials {
    SmtpCredentials {
        host: "smtp.example.com".to_string(),
        port: 587,
        username: "mailer@example.com".to_string(),
        password: "app-password".to_string(),
        from: "mailer@example.com".to_string(),
        tls: TlsMode::StartTls,
    }
}

pub const DEADLINE: Duration = Duration::from_secs(5);

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}
