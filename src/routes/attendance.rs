use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::AttendanceRecord;
use crate::state::SharedState;

pub async fn clock_in(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    let record = state.attendance.clock_in(auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn clock_out(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<AttendanceRecord>, AppError> {
    Ok(Json(state.attendance.clock_out(auth.user_id).await?))
}

pub async fn list_all(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    Ok(Json(state.attendance.list_all(&auth.caller()).await?))
}
