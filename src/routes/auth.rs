use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::services::{IssuedTokens, ServiceError, SignupForm};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn access_cookie(token: &str, hours: i64) -> Cookie<'static> {
    Cookie::build(("access_token", token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(hours))
        .build()
}

fn refresh_cookie(token: &str, hours: i64) -> Cookie<'static> {
    Cookie::build(("refresh_token", token.to_string()))
        .path("/api/v1/auth")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::hours(hours))
        .build()
}

fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    let access = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let refresh = Cookie::build(("refresh_token", ""))
        .path("/api/v1/auth")
        .max_age(time::Duration::ZERO)
        .build();
    jar.add(access).add(refresh)
}

/// Step one of signup: park the form and mail a code.
pub async fn signup(
    State(state): State<SharedState>,
    Json(form): Json<SignupForm>,
) -> Result<Json<MessageResponse>, AppError> {
    let credentials = state
        .smtp_credentials()
        .ok_or_else(|| AppError::Internal("Email delivery is not configured".to_string()))?;

    state.signup.send_otp(&form, &credentials).await?;

    Ok(Json(MessageResponse {
        message: "OTP sent to your email. It is valid for 5 minutes".to_string(),
    }))
}

/// Step two of signup: consume the code and create the account.
pub async fn verify_otp(
    State(state): State<SharedState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ticket = state.signup.verify_otp(&req.email, &req.otp).await?;
    let id = state.signup.register_user(ticket).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<IssuedTokens>), AppError> {
    if let Err(retry_after) = state.login_limiter.check(&req.identifier) {
        tracing::warn!(identifier = %req.identifier, retry_after, "Login rate limited");
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let user = match state.login.authenticate(&req.identifier, &req.password).await {
        Ok(user) => user,
        Err(e @ ServiceError::InvalidCredentials) => {
            state.login_limiter.record_failure(&req.identifier);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    state.login_limiter.clear(&req.identifier);

    let tokens = state.login.issue_tokens(&user).await?;

    let jwt = &state.config.jwt;
    let jar = jar
        .add(access_cookie(&tokens.access_token, jwt.access_ttl_hours))
        .add(refresh_cookie(&tokens.refresh_token, jwt.refresh_ttl_hours));
    Ok((jar, Json(tokens)))
}

/// Takes the refresh token from the cookie, or from the JSON body when no cookie is sent.
pub async fn refresh(
    State(state): State<SharedState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<AccessTokenResponse>), AppError> {
    let raw = jar
        .get("refresh_token")
        .map(|c| c.value().to_string())
        .or_else(|| body.map(|Json(b)| b.refresh_token))
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let access_token = state.login.refresh(&raw).await?;

    let jar = jar.add(access_cookie(&access_token, state.config.jwt.access_ttl_hours));
    Ok((jar, Json(AccessTokenResponse { access_token })))
}

pub async fn logout(
    State(state): State<SharedState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let raw = jar
        .get("refresh_token")
        .map(|c| c.value().to_string())
        .or_else(|| body.map(|Json(b)| b.refresh_token));

    if let Some(raw) = raw {
        state.login.logout(&raw).await?;
    }

    Ok((clear_auth_cookies(jar), Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    })))
}
