use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT encode failed: {0}")]
    Signing(String),
    #[error("JWT decode failed: {0}")]
    Invalid(String),
    #[error("expected a {0:?} token")]
    WrongKind(TokenKind),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub kind: TokenKind,
    /// Unique per token, so two tokens minted in the same second still differ.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, kind: TokenKind, expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            kind,
            jti: Uuid::now_v7(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Signing(e.to_string()))
}

/// Checks signature and expiry.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| JwtError::Invalid(e.to_string()))
}

pub fn decode_kind(token: &str, secret: &str, kind: TokenKind) -> Result<Claims, JwtError> {
    let claims = decode_token(token, secret)?;
    if claims.kind != kind {
        return Err(JwtError::WrongKind(kind));
    }
    Ok(claims)
}

pub fn issue_access(user: &User, secret: &str, expiry_hours: i64) -> Result<String, JwtError> {
    encode_token(&Claims::new(user, TokenKind::Access, expiry_hours), secret)
}

pub fn issue_refresh(user: &User, secret: &str, expiry_hours: i64) -> Result<String, JwtError> {
    encode_token(&Claims::new(user, TokenKind::Refresh, expiry_hours), secret)
}
