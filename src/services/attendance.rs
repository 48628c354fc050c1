use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::{with_deadline, Caller, ServiceError, ServiceResult};
use crate::clock::Clock;
use crate::models::AttendanceRecord;
use crate::store::{AttendanceStore, StoreError, UserStore};

pub struct AttendanceService {
    records: Arc<dyn AttendanceStore>,
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AttendanceService {
    pub fn new(
        records: Arc<dyn AttendanceStore>,
        users: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            records,
            users,
            clock,
            timeout,
        }
    }

    /// Open a record stamped now. At most one open record per user; the store
    /// enforces that, so a concurrent loser also sees `AlreadyClockedIn`.
    /// A token that outlives its account gets `UserNotFound`.
    pub async fn clock_in(&self, user_id: Uuid) -> ServiceResult<AttendanceRecord> {
        with_deadline(self.timeout, async {
            if self.users.find_by_id(user_id).await?.is_none() {
                tracing::warn!(%user_id, "Clock-in for a deleted user");
                return Err(ServiceError::UserNotFound);
            }
            if self.records.find_open(user_id).await?.is_some() {
                tracing::warn!(%user_id, "Clock-in while already clocked in");
                return Err(ServiceError::AlreadyClockedIn);
            }

            let record = AttendanceRecord {
                id: Uuid::now_v7(),
                user_id,
                clock_in: self.clock.now(),
                clock_out: None,
            };
            self.records.insert(record.clone()).await.map_err(|e| match e {
                StoreError::Duplicate(_) => ServiceError::AlreadyClockedIn,
                other => ServiceError::Store(other),
            })?;

            tracing::info!(%user_id, record_id = %record.id, "Clocked in");
            Ok(record)
        })
        .await
    }

    /// Close the latest open record with a clock-out of now.
    pub async fn clock_out(&self, user_id: Uuid) -> ServiceResult<AttendanceRecord> {
        with_deadline(self.timeout, async {
            let open = self
                .records
                .find_open(user_id)
                .await?
                .ok_or_else(|| {
                    tracing::warn!(%user_id, "Clock-out without an open record");
                    ServiceError::NoOpenClockIn
                })?;

            let closed = self
                .records
                .close(open.id, self.clock.now())
                .await?
                .ok_or(ServiceError::NoOpenClockIn)?;

            tracing::info!(%user_id, record_id = %closed.id, duration_secs = closed.duration_secs(), "Clocked out");
            Ok(closed)
        })
        .await
    }

    /// Every record, newest first.
    pub async fn list_all(&self, caller: &Caller) -> ServiceResult<Vec<AttendanceRecord>> {
        caller.require_admin()?;
        with_deadline(self.timeout, async { Ok(self.records.list_all().await?) }).await
    }

    pub async fn list_for_user(
        &self,
        caller: &Caller,
        user_id: Uuid,
    ) -> ServiceResult<Vec<AttendanceRecord>> {
        caller.require_self_or_admin(user_id)?;
        with_deadline(self.timeout, async {
            if self.users.find_by_id(user_id).await?.is_none() {
                return Err(ServiceError::UserNotFound);
            }
            Ok(self.records.list_by_user(user_id).await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::models::{NewUser, Role};
    use crate::services::testing::{store, ManualClock, DEADLINE};
    use crate::store::MemoryStore;

    async fn setup() -> (AttendanceService, Arc<MemoryStore>, Arc<ManualClock>, Caller) {
        let store = store();
        let clock = Arc::new(ManualClock::new());
        let users: Arc<dyn UserStore> = store.clone();
        let user = users
            .create(NewUser {
                id: Uuid::now_v7(),
                username: "ada".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Employee,
            })
            .await
            .unwrap();
        let service = AttendanceService::new(store.clone(), store.clone(), clock.clone(), DEADLINE);
        let caller = Caller {
            user_id: user.id,
            role: Role::Employee,
        };
        (service, store, clock, caller)
    }

    #[tokio::test]
    async fn clock_in_then_out_records_duration() {
        let (service, _, clock, me) = setup().await;
        let opened = service.clock_in(me.user_id).await.unwrap();
        assert!(opened.is_open());

        clock.advance(ChronoDuration::hours(8));
        let closed = service.clock_out(me.user_id).await.unwrap();
        assert_eq!(closed.id, opened.id);
        assert_eq!(closed.duration_secs(), Some(8 * 3600));
    }

    #[tokio::test]
    async fn second_clock_in_is_rejected() {
        let (service, _, _, me) = setup().await;
        service.clock_in(me.user_id).await.unwrap();
        assert!(matches!(
            service.clock_in(me.user_id).await,
            Err(ServiceError::AlreadyClockedIn)
        ));
    }

    #[tokio::test]
    async fn clock_out_without_open_record() {
        let (service, _, _, me) = setup().await;
        assert!(matches!(
            service.clock_out(me.user_id).await,
            Err(ServiceError::NoOpenClockIn)
        ));

        service.clock_in(me.user_id).await.unwrap();
        service.clock_out(me.user_id).await.unwrap();
        assert!(matches!(
            service.clock_out(me.user_id).await,
            Err(ServiceError::NoOpenClockIn)
        ));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_role_checked() {
        let (service, _, clock, me) = setup().await;
        for _ in 0..2 {
            service.clock_in(me.user_id).await.unwrap();
            clock.advance(ChronoDuration::hours(1));
            service.clock_out(me.user_id).await.unwrap();
            clock.advance(ChronoDuration::hours(1));
        }

        let mine = service.list_for_user(&me, me.user_id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].clock_in > mine[1].clock_in);

        assert!(matches!(
            service.list_all(&me).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.list_for_user(&me, Uuid::now_v7()).await,
            Err(ServiceError::Forbidden(_))
        ));

        let admin = Caller {
            user_id: Uuid::now_v7(),
            role: Role::Admin,
        };
        assert_eq!(service.list_all(&admin).await.unwrap().len(), 2);
        assert!(matches!(
            service.list_for_user(&admin, Uuid::now_v7()).await,
            Err(ServiceError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn deleted_user_cannot_clock_in() {
        let (service, store, _, me) = setup().await;
        let users: Arc<dyn UserStore> = store.clone();
        assert!(users.delete(me.user_id).await.unwrap());

        assert!(matches!(
            service.clock_in(me.user_id).await,
            Err(ServiceError::UserNotFound)
        ));
        let records: Arc<dyn AttendanceStore> = store.clone();
        assert!(records.list_by_user(me.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_clock_ins_leave_one_open_record() {
        let (service, store, _, me) = setup().await;
        let service = Arc::new(service);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.clock_in(me.user_id).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(ServiceError::AlreadyClockedIn) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);

        let records: Arc<dyn AttendanceStore> = store.clone();
        assert_eq!(records.list_by_user(me.user_id).await.unwrap().len(), 1);
    }
}
