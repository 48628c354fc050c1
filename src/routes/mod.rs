pub mod attendance;
pub mod auth;
pub mod users;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/v1/auth/signup", post(auth::signup))
        .route("/api/v1/auth/verify-otp", post(auth::verify_otp))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/api/v1/auth/logout", post(auth::logout))
        // Users
        .route("/api/v1/users", get(users::list).post(users::create))
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/by-email/{email}", get(users::get_by_email))
        .route(
            "/api/v1/users/by-username/{username}",
            get(users::get_by_username),
        )
        .route(
            "/api/v1/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/api/v1/users/{id}/attendance", get(users::attendance))
        // Attendance
        .route("/api/v1/attendance", get(attendance::list_all))
        .route("/api/v1/attendance/clock-in", post(attendance::clock_in))
        .route("/api/v1/attendance/clock-out", post(attendance::clock_out))
}
