use chrono::{DateTime, Utc};

/// A signup waiting for its emailed code. Keyed by email.
///
/// Never serialized: it carries both the code and the password hash.
#[derive(Clone, sqlx::FromRow)]
pub struct PendingSignup {
    pub email: String,
    pub code: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingSignup {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl std::fmt::Debug for PendingSignup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSignup")
            .field("email", &self.email)
            .field("code", &"<redacted>")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
