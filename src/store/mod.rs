//! Persistence capabilities the flows depend on.
//!
//! Each trait is the full set of operations a backend must support. `PgStore`
//! is the production backend; `MemoryStore` keeps everything in process.
//! Uniqueness rules (one pending signup per email, one open attendance
//! record per user, unique usernames and emails) are enforced by the
//! backend, not by the callers.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AttendanceRecord, NewUser, PendingSignup, RefreshToken, User, UserChanges};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule on the named field rejected the write.
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("username") => "username",
                    Some(c) if c.contains("email") || c.starts_with("pending_signups") => "email",
                    Some(c) if c.starts_with("attendance") => "open_record",
                    Some(c) if c.contains("token") => "token",
                    _ => "unknown",
                };
                StoreError::Duplicate(field)
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate("username")` or `Duplicate("email")`.
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    /// Returns `None` when no user has this id.
    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
    /// Returns whether a user was removed. Dependent tokens and attendance go too.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<PendingSignup>>;
    /// Never overwrites: fails with `Duplicate("email")` if one exists.
    async fn insert(&self, pending: PendingSignup) -> StoreResult<()>;
    /// Removes the record only if it still carries `code`, so a caller never
    /// deletes a newer signup parked under the same email. Returns whether a
    /// record was removed.
    async fn delete(&self, email: &str, code: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, token: RefreshToken) -> StoreResult<()>;
    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>>;
    async fn revoke(&self, token_hash: &str) -> StoreResult<()>;
    async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Fails with `Duplicate("open_record")` if the user already has an open record.
    async fn insert(&self, record: AttendanceRecord) -> StoreResult<()>;
    /// Latest record for the user whose clock-out is unset.
    async fn find_open(&self, user_id: Uuid) -> StoreResult<Option<AttendanceRecord>>;
    /// Sets clock-out only if the record is still open. Returns the closed record.
    async fn close(
        &self,
        record_id: Uuid,
        clock_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>>;
    async fn list_all(&self) -> StoreResult<Vec<AttendanceRecord>>;
    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<AttendanceRecord>>;
}
