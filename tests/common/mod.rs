#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use staffdesk::config::{Config, JwtConfig, SmtpConfig, TlsMode};
use staffdesk::email::{MailError, Mailer, SmtpCredentials};
use staffdesk::state::AppState;
use staffdesk::store::MemoryStore;

pub const ADMIN_EMAIL: &str = "boss@test.com";
pub const PASSWORD: &str = "secret1";

/// Keeps every message instead of talking to an SMTP server.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl CapturingMailer {
    /// The code from the most recent OTP mail to `email`.
    pub fn last_otp(&self, email: &str) -> Option<String> {
        let code_re = Regex::new(r"\b(\d{6})\b").unwrap();
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .and_then(|(_, body)| code_re.captures(body).map(|c| c[1].to_string()))
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(
        &self,
        _credentials: &SmtpCredentials,
        to: &str,
        _subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        if *self.fail.lock().unwrap() {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

/// A running server backed by the in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub mailer: Arc<CapturingMailer>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> (Value, StatusCode) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("POST request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("GET request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put(&self, path: &str, body: Value, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("PUT request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str, token: &str) -> StatusCode {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("DELETE request failed")
            .status()
    }

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> (Value, StatusCode) {
        self.post(
            "/api/v1/auth/signup",
            json!({ "username": username, "email": email, "password": password }),
            None,
        )
        .await
    }

    pub async fn verify(&self, email: &str, otp: &str) -> (Value, StatusCode) {
        self.post("/api/v1/auth/verify-otp", json!({ "email": email, "otp": otp }), None)
            .await
    }

    pub async fn login(&self, identifier: &str, password: &str) -> (Value, StatusCode) {
        self.post(
            "/api/v1/auth/login",
            json!({ "identifier": identifier, "password": password }),
            None,
        )
        .await
    }

    /// Full signup round trip; returns the new user id.
    pub async fn register(&self, username: &str, email: &str) -> String {
        let (body, status) = self.signup(username, email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "signup failed: {body}");
        let otp = self.mailer.last_otp(email).expect("OTP mail captured");
        let (body, status) = self.verify(email, &otp).await;
        assert_eq!(status, StatusCode::CREATED, "verify failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Register and log in; returns (user id, access token).
    pub async fn register_and_login(&self, username: &str, email: &str) -> (String, String) {
        let id = self.register(username, email).await;
        let (body, status) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        (id, body["access_token"].as_str().unwrap().to_string())
    }

    pub async fn admin(&self) -> (String, String) {
        self.register_and_login("boss", ADMIN_EMAIL).await
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt: JwtConfig {
            secret: "test-jwt-secret-that-is-long-enough".to_string(),
            access_ttl_hours: 1,
            refresh_ttl_hours: 24,
        },
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        request_timeout: Duration::from_secs(5),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        log_level: "warn".to_string(),
        smtp: Some(SmtpConfig {
            host: "smtp.test".to_string(),
            port: 587,
            user: "mailer@test.com".to_string(),
            pass: "app-password".to_string(),
            from: "mailer@test.com".to_string(),
            tls: TlsMode::StartTls,
        }),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let mailer = Arc::new(CapturingMailer::default());
    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        mailer.clone(),
    ));
    let app = staffdesk::build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        client: Client::new(),
        mailer,
    }
}
