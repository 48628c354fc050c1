use std::sync::Arc;

use crate::auth::otp::{OtpGenerator, RandomOtp};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::email::{Mailer, SmtpCredentials};
use crate::rate_limit::LoginRateLimiter;
use crate::services::{AttendanceService, LoginService, SignupService, UserService};
use crate::store::{AttendanceStore, OtpStore, TokenStore, UserStore};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub signup: SignupService,
    pub login: LoginService,
    pub users: UserService,
    pub attendance: AttendanceService,
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    /// Wire every service over one backend that implements all store traits.
    pub fn new<S, M>(config: Config, store: Arc<S>, mailer: Arc<M>) -> Self
    where
        S: UserStore + OtpStore + TokenStore + AttendanceStore + 'static,
        M: Mailer + 'static,
    {
        Self::with_parts(config, store, mailer, Arc::new(SystemClock), Arc::new(RandomOtp))
    }

    pub fn with_parts<S, M>(
        config: Config,
        store: Arc<S>,
        mailer: Arc<M>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn OtpGenerator>,
    ) -> Self
    where
        S: UserStore + OtpStore + TokenStore + AttendanceStore + 'static,
        M: Mailer + 'static,
    {
        let timeout = config.request_timeout;
        Self {
            signup: SignupService::new(
                store.clone(),
                store.clone(),
                mailer,
                generator,
                clock.clone(),
                config.admin_emails.clone(),
                timeout,
            ),
            login: LoginService::new(
                store.clone(),
                store.clone(),
                clock.clone(),
                config.jwt.clone(),
                timeout,
            ),
            users: UserService::new(store.clone(), store.clone(), timeout),
            attendance: AttendanceService::new(store.clone(), store, clock, timeout),
            login_limiter: LoginRateLimiter::default(),
            config,
        }
    }

    /// Outbound mail account handed to `send_otp` on each call.
    pub fn smtp_credentials(&self) -> Option<SmtpCredentials> {
        self.config.smtp.as_ref().map(SmtpCredentials::from)
    }
}
