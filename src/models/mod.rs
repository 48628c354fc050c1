pub mod attendance;
pub mod pending_signup;
pub mod refresh_token;
pub mod user;

pub use attendance::AttendanceRecord;
pub use pending_signup::PendingSignup;
pub use refresh_token::RefreshToken;
pub use user::{NewUser, Role, User, UserChanges};
