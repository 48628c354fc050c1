use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{normalize_email, with_deadline, ServiceError, ServiceResult};
use crate::auth::jwt::{self, TokenKind};
use crate::auth::password;
use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::models::{RefreshToken, User};
use crate::store::{TokenStore, UserStore};

/// Verified against when the identifier is unknown, so both failure paths cost one Argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| password::hash("staffdesk-timing-equalizer").ok());

#[derive(Debug, Clone, Serialize)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

pub struct LoginService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    jwt: JwtConfig,
    timeout: Duration,
}

impl LoginService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        jwt: JwtConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            clock,
            jwt,
            timeout,
        }
    }

    /// Look the user up by email (when the identifier contains `@`) or username
    /// and check the password. Unknown user and wrong password are the same error.
    pub async fn authenticate(&self, identifier: &str, plaintext: &str) -> ServiceResult<User> {
        with_deadline(self.timeout, self.authenticate_inner(identifier, plaintext)).await
    }

    async fn authenticate_inner(&self, identifier: &str, plaintext: &str) -> ServiceResult<User> {
        let identifier = identifier.trim();
        let found = if identifier.contains('@') {
            match normalize_email(identifier) {
                Ok(email) => self.users.find_by_email(&email).await?,
                Err(_) => None,
            }
        } else {
            self.users.find_by_username(identifier).await?
        };

        let Some(user) = found else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = password::verify(dummy, plaintext);
            }
            tracing::warn!(identifier, "Login failed");
            return Err(ServiceError::InvalidCredentials);
        };

        let valid = password::verify(&user.password_hash, plaintext).map_err(ServiceError::Hashing)?;
        if !valid {
            tracing::warn!(identifier, "Login failed");
            return Err(ServiceError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User authenticated");
        Ok(user)
    }

    /// Mint an access/refresh pair and persist the refresh token's digest.
    pub async fn issue_tokens(&self, user: &User) -> ServiceResult<IssuedTokens> {
        with_deadline(self.timeout, self.issue_tokens_inner(user)).await
    }

    async fn issue_tokens_inner(&self, user: &User) -> ServiceResult<IssuedTokens> {
        let access_token = jwt::issue_access(user, &self.jwt.secret, self.jwt.access_ttl_hours)?;
        let refresh_token = jwt::issue_refresh(user, &self.jwt.secret, self.jwt.refresh_ttl_hours)?;

        let now = self.clock.now();
        self.tokens
            .save(RefreshToken {
                id: Uuid::now_v7(),
                user_id: user.id,
                token_hash: hash_token(&refresh_token),
                revoked: false,
                expires_at: now + ChronoDuration::hours(self.jwt.refresh_ttl_hours),
                created_at: now,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Tokens issued");
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.jwt.access_ttl_hours * 3600,
        })
    }

    /// Exchange a refresh token for a new access token built from the user's
    /// current record.
    pub async fn refresh(&self, raw: &str) -> ServiceResult<String> {
        with_deadline(self.timeout, self.refresh_inner(raw)).await
    }

    async fn refresh_inner(&self, raw: &str) -> ServiceResult<String> {
        let claims = jwt::decode_kind(raw, &self.jwt.secret, TokenKind::Refresh)?;

        let stored = self
            .tokens
            .find_by_hash(&hash_token(raw))
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        if stored.revoked {
            tracing::warn!(user_id = %stored.user_id, "Revoked refresh token presented");
            return Err(ServiceError::TokenRevoked);
        }
        if stored.expires_at < self.clock.now() || stored.user_id != claims.sub {
            return Err(ServiceError::TokenInvalid);
        }

        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        let access = jwt::issue_access(&user, &self.jwt.secret, self.jwt.access_ttl_hours)?;
        tracing::debug!(user_id = %user.id, "Access token refreshed");
        Ok(access)
    }

    /// Revoke a refresh token. Unknown tokens are ignored.
    pub async fn logout(&self, raw: &str) -> ServiceResult<()> {
        with_deadline(self.timeout, async {
            self.tokens.revoke(&hash_token(raw)).await?;
            Ok(())
        })
        .await
    }
}

/// Refresh tokens are stored as the hex SHA-256 of the raw token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
