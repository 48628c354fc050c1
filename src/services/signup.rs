//! Signup: `NoPending -> PendingOTP -> Verified | Expired`.
//!
//! `send_otp` parks the form (password already hashed) under the email with a
//! five minute code. `verify_otp` consumes the record and hands back a
//! `VerifiedSignup` ticket, the only thing `register_user` accepts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use super::{
    hash_password, normalize_email, validate_password, validate_username, with_deadline,
    ServiceError, ServiceResult,
};
use crate::auth::otp::{self, OtpGenerator};
use crate::clock::Clock;
use crate::email::{templates, Mailer, SmtpCredentials};
use crate::models::{NewUser, PendingSignup, Role};
use crate::store::{OtpStore, StoreError, UserStore};

pub const OTP_TTL_MINUTES: i64 = 5;

#[derive(Clone, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Proof that a pending signup was verified and consumed.
///
/// Only `SignupService::verify_otp` can build one, and `register_user` takes it
/// by value, so a user cannot be materialized without a fresh verification.
#[derive(Debug)]
pub struct VerifiedSignup {
    pending: PendingSignup,
}

impl VerifiedSignup {
    pub fn email(&self) -> &str {
        &self.pending.email
    }

    pub fn username(&self) -> &str {
        &self.pending.username
    }

    pub fn password_hash(&self) -> &str {
        &self.pending.password_hash
    }
}

pub struct SignupService {
    otps: Arc<dyn OtpStore>,
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    generator: Arc<dyn OtpGenerator>,
    clock: Arc<dyn Clock>,
    admin_emails: Vec<String>,
    timeout: Duration,
}

impl SignupService {
    pub fn new(
        otps: Arc<dyn OtpStore>,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        generator: Arc<dyn OtpGenerator>,
        clock: Arc<dyn Clock>,
        admin_emails: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            otps,
            users,
            mailer,
            generator,
            clock,
            admin_emails,
            timeout,
        }
    }

    /// Park the signup under its email and mail a fresh code.
    ///
    /// A live pending signup for the same email is `OtpAlreadySent`; an expired
    /// one is replaced. If the mail fails or does not finish before the
    /// deadline, the pending record is removed again so the caller can retry
    /// straight away.
    pub async fn send_otp(
        &self,
        form: &SignupForm,
        credentials: &SmtpCredentials,
    ) -> ServiceResult<()> {
        let deadline = Instant::now() + self.timeout;
        let pending = with_deadline(self.timeout, self.park_signup(form)).await?;

        let body = templates::render_otp(&pending.code, OTP_TTL_MINUTES);
        let sent = match timeout_at(
            deadline,
            self.mailer
                .send(credentials, &pending.email, templates::OTP_SUBJECT, &body),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(email = %pending.email, error = %e, "Failed to mail OTP; rolling back pending signup");
                Err(ServiceError::Mail(e))
            }
            Err(_) => {
                tracing::error!(email = %pending.email, "OTP mail timed out; rolling back pending signup");
                Err(ServiceError::Timeout)
            }
        };

        if let Err(e) = sent {
            self.roll_back(&pending).await;
            return Err(e);
        }

        tracing::info!(email = %pending.email, "OTP issued");
        Ok(())
    }

    /// Validate the form and store it as a pending signup with a fresh code.
    async fn park_signup(&self, form: &SignupForm) -> ServiceResult<PendingSignup> {
        let email = normalize_email(&form.email)?;
        let username = validate_username(&form.username)?;
        validate_password(&form.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict("Username already taken".to_string()));
        }

        let now = self.clock.now();
        if let Some(existing) = self.otps.find_by_email(&email).await? {
            if !existing.is_expired_at(now) {
                tracing::warn!(%email, "OTP requested while one is still pending");
                return Err(ServiceError::OtpAlreadySent);
            }
            // A concurrent sender may already have replaced it; the insert below settles that.
            self.otps.delete(&email, &existing.code).await?;
            tracing::debug!(%email, "Dropped expired pending signup");
        }

        let pending = PendingSignup {
            email,
            code: self.generator.generate(),
            username,
            password_hash: hash_password(&form.password)?,
            created_at: now,
            expires_at: now + ChronoDuration::minutes(OTP_TTL_MINUTES),
        };

        self.otps.insert(pending.clone()).await.map_err(|e| match e {
            StoreError::Duplicate(_) => ServiceError::OtpAlreadySent,
            other => ServiceError::Store(other),
        })?;
        Ok(pending)
    }

    /// Remove the record `send_otp` just parked. Runs under its own deadline so
    /// it still happens after the mail step used up the request's.
    async fn roll_back(&self, pending: &PendingSignup) {
        let removed = with_deadline(self.timeout, async {
            Ok(self.otps.delete(&pending.email, &pending.code).await?)
        })
        .await;
        if let Err(e) = removed {
            tracing::error!(email = %pending.email, error = %e, "Failed to roll back pending signup");
        }
    }

    /// Check a submitted code and consume the pending signup.
    ///
    /// A wrong code leaves the record in place so the user can retry until it
    /// expires.
    pub async fn verify_otp(&self, email: &str, submitted: &str) -> ServiceResult<VerifiedSignup> {
        with_deadline(self.timeout, self.verify_otp_inner(email, submitted)).await
    }

    async fn verify_otp_inner(&self, email: &str, submitted: &str) -> ServiceResult<VerifiedSignup> {
        let email = normalize_email(email)?;
        let submitted = submitted.trim();
        if !otp::is_well_formed(submitted) {
            return Err(ServiceError::Validation(format!(
                "OTP must be {} digits",
                otp::OTP_LENGTH
            )));
        }

        let stored = self
            .otps
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::OtpNotFound)?;

        let matches: bool = stored.code.as_bytes().ct_eq(submitted.as_bytes()).into();
        if !matches {
            tracing::warn!(%email, "OTP mismatch");
            return Err(ServiceError::InvalidOtp);
        }

        if stored.is_expired_at(self.clock.now()) {
            tracing::warn!(%email, "OTP expired");
            return Err(ServiceError::OtpExpired);
        }

        // Losing this delete to a concurrent verify means the code was already used.
        if !self.otps.delete(&email, &stored.code).await? {
            return Err(ServiceError::OtpNotFound);
        }

        tracing::info!(%email, "OTP verified");
        Ok(VerifiedSignup { pending: stored })
    }

    /// Materialize the verified signup as a user and return the new id.
    pub async fn register_user(&self, ticket: VerifiedSignup) -> ServiceResult<Uuid> {
        with_deadline(self.timeout, self.register_user_inner(ticket)).await
    }

    async fn register_user_inner(&self, ticket: VerifiedSignup) -> ServiceResult<Uuid> {
        let PendingSignup {
            email,
            username,
            password_hash,
            ..
        } = ticket.pending;

        let role = if self.admin_emails.iter().any(|e| *e == email) {
            Role::Admin
        } else {
            Role::Employee
        };

        let user = self
            .users
            .create(NewUser {
                id: Uuid::now_v7(),
                username,
                email,
                password_hash,
                role,
            })
            .await
            .map_err(duplicate_to_conflict)?;

        tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "User registered");
        Ok(user.id)
    }
}

pub(crate) fn duplicate_to_conflict(err: StoreError) -> ServiceError {
    match err {
        StoreError::Duplicate("username") => {
            ServiceError::Conflict("Username already taken".to_string())
        }
        StoreError::Duplicate("email") => {
            ServiceError::Conflict("Email already registered".to_string())
        }
        other => ServiceError::Store(other),
    }
}
