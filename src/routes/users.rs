use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{AttendanceRecord, Role, User};
use crate::services::{SignupForm, UserPatch};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list_users(&auth.caller()).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateUser>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let form = SignupForm {
        username: req.username,
        email: req.email,
        password: req.password,
    };
    let id = state.users.create_user(&auth.caller(), &form, req.role).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn me(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_user(&auth.caller(), auth.user_id).await?))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_user(&auth.caller(), id).await?))
}

pub async fn get_by_email(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_user_by_email(&auth.caller(), &email).await?))
}

pub async fn get_by_username(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        state
            .users
            .get_user_by_username(&auth.caller(), &username)
            .await?,
    ))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.update_user(&auth.caller(), id, patch).await?))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.users.delete_user(&auth.caller(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn attendance(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    Ok(Json(state.attendance.list_for_user(&auth.caller(), id).await?))
}
