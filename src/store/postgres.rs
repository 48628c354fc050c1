use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AttendanceStore, OtpStore, StoreResult, TokenStore, UserStore};
use crate::db;
use crate::models::{AttendanceRecord, NewUser, PendingSignup, RefreshToken, User, UserChanges};

/// Postgres backend. Uniqueness is enforced by the schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        Ok(db::users::create(&self.pool, &user).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(db::users::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(db::users::find_by_email(&self.pool, email).await?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(db::users::find_by_username(&self.pool, username).await?)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(db::users::list_all(&self.pool).await?)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        Ok(db::users::update(&self.pool, id, &changes).await?)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(db::users::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<PendingSignup>> {
        Ok(db::pending_signups::find_by_email(&self.pool, email).await?)
    }

    async fn insert(&self, pending: PendingSignup) -> StoreResult<()> {
        Ok(db::pending_signups::insert(&self.pool, &pending).await?)
    }

    async fn delete(&self, email: &str, code: &str) -> StoreResult<bool> {
        Ok(db::pending_signups::delete(&self.pool, email, code).await?)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn save(&self, token: RefreshToken) -> StoreResult<()> {
        Ok(db::refresh_tokens::create(&self.pool, &token).await?)
    }

    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(db::refresh_tokens::find_by_hash(&self.pool, token_hash).await?)
    }

    async fn revoke(&self, token_hash: &str) -> StoreResult<()> {
        Ok(db::refresh_tokens::revoke_by_hash(&self.pool, token_hash).await?)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<()> {
        Ok(db::refresh_tokens::revoke_all_for_user(&self.pool, user_id).await?)
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn insert(&self, record: AttendanceRecord) -> StoreResult<()> {
        Ok(db::attendance::insert(&self.pool, &record).await?)
    }

    async fn find_open(&self, user_id: Uuid) -> StoreResult<Option<AttendanceRecord>> {
        Ok(db::attendance::find_open(&self.pool, user_id).await?)
    }

    async fn close(
        &self,
        record_id: Uuid,
        clock_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        Ok(db::attendance::close(&self.pool, record_id, clock_out).await?)
    }

    async fn list_all(&self) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(db::attendance::list_all(&self.pool).await?)
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(db::attendance::list_by_user(&self.pool, user_id).await?)
    }
}
