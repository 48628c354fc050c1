pub mod attendance;
pub mod pending_signups;
pub mod refresh_tokens;
pub mod users;
