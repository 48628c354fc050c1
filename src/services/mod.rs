//! Flow orchestrators. Each public operation runs under the configured
//! deadline and reports failures as `ServiceError`.

pub mod attendance;
pub mod login;
pub mod signup;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use uuid::Uuid;

use crate::auth::jwt::JwtError;
use crate::email::MailError;
use crate::models::Role;
use crate::store::StoreError;

pub use attendance::AttendanceService;
pub use login::{IssuedTokens, LoginService};
pub use signup::{SignupForm, SignupService, VerifiedSignup};
pub use users::{UserPatch, UserService};

/// The authenticated user an operation acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ServiceResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Admins may act on anyone; everyone else only on themselves.
    pub fn require_self_or_admin(&self, user_id: Uuid) -> ServiceResult<()> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "You can only access your own account".to_string(),
            ))
        }
    }
}

/// Coarse classification the HTTP layer maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Timeout,
    Transport,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("OTP already sent; check your inbox or wait for it to expire")]
    OtpAlreadySent,
    #[error("No pending signup for this email. Please sign up again")]
    OtpNotFound,
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("OTP has expired")]
    OtpExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Refresh token not recognized")]
    TokenNotFound,
    #[error("Refresh token has been revoked")]
    TokenRevoked,
    #[error("Invalid or expired token")]
    TokenInvalid,
    #[error("Already clocked in")]
    AlreadyClockedIn,
    #[error("No open clock-in to close")]
    NoOpenClockIn,
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Operation timed out")]
    Timeout,
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("Token signing failed: {0}")]
    Signing(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::OtpNotFound | ServiceError::UserNotFound => ErrorKind::NotFound,
            ServiceError::OtpAlreadySent
            | ServiceError::AlreadyClockedIn
            | ServiceError::NoOpenClockIn
            | ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::InvalidOtp
            | ServiceError::OtpExpired
            | ServiceError::InvalidCredentials
            | ServiceError::TokenNotFound
            | ServiceError::TokenRevoked
            | ServiceError::TokenInvalid => ErrorKind::Unauthorized,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Timeout => ErrorKind::Timeout,
            ServiceError::Mail(_) => ErrorKind::Transport,
            ServiceError::Store(StoreError::Duplicate(_)) => ErrorKind::Conflict,
            ServiceError::Store(StoreError::Backend(_)) => ErrorKind::Transport,
            ServiceError::Signing(_) | ServiceError::Hashing(_) => ErrorKind::Internal,
        }
    }
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Signing(msg) => ServiceError::Signing(msg),
            JwtError::Invalid(_) | JwtError::WrongKind(_) => ServiceError::TokenInvalid,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Run `fut` to completion or fail with `Timeout` once `deadline` elapses.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?deadline, "Operation deadline exceeded");
            Err(ServiceError::Timeout)
        }
    }
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("valid username regex"));

pub const MIN_PASSWORD_LEN: usize = 6;

/// Trimmed and lower-cased; rejects anything that does not look like an address.
pub fn normalize_email(raw: &str) -> ServiceResult<String> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(ServiceError::Validation("Invalid email".to_string()));
    }
    Ok(email)
}

pub fn validate_username(raw: &str) -> ServiceResult<String> {
    let username = raw.trim();
    if !USERNAME_RE.is_match(username) {
        return Err(ServiceError::Validation(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".to_string(),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> ServiceResult<String> {
    crate::auth::password::hash(password).map_err(ServiceError::Hashing)
}
