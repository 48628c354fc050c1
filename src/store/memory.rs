use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{AttendanceStore, OtpStore, StoreError, StoreResult, TokenStore, UserStore};
use crate::models::{AttendanceRecord, NewUser, PendingSignup, RefreshToken, User, UserChanges};

/// In-process backend with the same uniqueness guarantees as `PgStore`.
///
/// Users and attendance records sit behind a mutex so that multi-key checks
/// (username and email, one open record per user) happen under one lock.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    pending: DashMap<String, PendingSignup>,
    tokens: DashMap<String, RefreshToken>,
    attendance: Mutex<Vec<AttendanceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> MutexGuard<'_, HashMap<Uuid, User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn attendance(&self) -> MutexGuard<'_, Vec<AttendanceRecord>> {
        self.attendance.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn check_unique(
    users: &HashMap<Uuid, User>,
    skip: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> StoreResult<()> {
    for user in users.values().filter(|u| Some(u.id) != skip) {
        if username.is_some_and(|name| user.username == name) {
            return Err(StoreError::Duplicate("username"));
        }
        if email.is_some_and(|mail| user.email == mail) {
            return Err(StoreError::Duplicate("email"));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users();
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate("id"));
        }
        check_unique(&users, None, Some(&user.username), Some(&user.email))?;

        let now = Utc::now();
        let created = User {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.users().values().find(|u| u.username == username).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let mut all: Vec<User> = self.users().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut users = self.users();
        if !users.contains_key(&id) {
            return Ok(None);
        }
        check_unique(
            &users,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        )?;

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.users().remove(&id).is_some();
        if removed {
            self.tokens.retain(|_, t| t.user_id != id);
            self.attendance().retain(|r| r.user_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<PendingSignup>> {
        Ok(self.pending.get(email).map(|p| p.value().clone()))
    }

    async fn insert(&self, pending: PendingSignup) -> StoreResult<()> {
        match self.pending.entry(pending.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate("email")),
            Entry::Vacant(slot) => {
                slot.insert(pending);
                Ok(())
            }
        }
    }

    async fn delete(&self, email: &str, code: &str) -> StoreResult<bool> {
        Ok(self
            .pending
            .remove_if(email, |_, pending| pending.code == code)
            .is_some())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn save(&self, token: RefreshToken) -> StoreResult<()> {
        match self.tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate("token")),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.tokens.get(token_hash).map(|t| t.value().clone()))
    }

    async fn revoke(&self, token_hash: &str) -> StoreResult<()> {
        if let Some(mut token) = self.tokens.get_mut(token_hash) {
            token.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<()> {
        self.tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id)
            .for_each(|mut t| t.revoked = true);
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert(&self, record: AttendanceRecord) -> StoreResult<()> {
        let mut records = self.attendance();
        if record.is_open()
            && records
                .iter()
                .any(|r| r.user_id == record.user_id && r.is_open())
        {
            return Err(StoreError::Duplicate("open_record"));
        }
        records.push(record);
        Ok(())
    }

    async fn find_open(&self, user_id: Uuid) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self
            .attendance()
            .iter()
            .filter(|r| r.user_id == user_id && r.is_open())
            .max_by_key(|r| r.clock_in)
            .cloned())
    }

    async fn close(
        &self,
        record_id: Uuid,
        clock_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let mut records = self.attendance();
        let closed = records
            .iter_mut()
            .find(|r| r.id == record_id && r.is_open())
            .map(|r| {
                r.clock_out = Some(clock_out);
                r.clone()
            });
        Ok(closed)
    }

    async fn list_all(&self) -> StoreResult<Vec<AttendanceRecord>> {
        let mut all = self.attendance().clone();
        all.sort_by(|a, b| b.clock_in.cmp(&a.clock_in));
        Ok(all)
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<AttendanceRecord>> {
        let mut mine: Vec<AttendanceRecord> = self
            .attendance()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.clock_in.cmp(&a.clock_in));
        Ok(mine)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::models::Role;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            id: Uuid::now_v7(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Employee,
        }
    }

    fn pending(email: &str) -> PendingSignup {
        let now = Utc::now();
        PendingSignup {
            email: email.to_string(),
            code: "123456".to_string(),
            username: "ada".to_string(),
            password_hash: "hash".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn users_reject_duplicate_username_and_email() {
        let store: Arc<dyn UserStore> = Arc::new(MemoryStore::new());
        store.create(new_user("ada", "ada@example.com")).await.unwrap();

        let err = store
            .create(new_user("ada", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("username")));

        let err = store
            .create(new_user("grace", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
    }

    #[tokio::test]
    async fn update_checks_uniqueness_against_other_users_only() {
        let store: Arc<dyn UserStore> = Arc::new(MemoryStore::new());
        let ada = store.create(new_user("ada", "ada@example.com")).await.unwrap();
        store.create(new_user("grace", "grace@example.com")).await.unwrap();

        let same = UserChanges {
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        assert!(store.update(ada.id, same).await.unwrap().is_some());

        let taken = UserChanges {
            username: Some("grace".to_string()),
            ..Default::default()
        };
        let err = store.update(ada.id, taken).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("username")));

        assert!(store
            .update(Uuid::now_v7(), UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn pending_signup_insert_never_overwrites() {
        let store: Arc<dyn OtpStore> = Arc::new(MemoryStore::new());
        store.insert(pending("a@x.com")).await.unwrap();

        let err = store.insert(pending("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));

        assert!(store.delete("a@x.com", "123456").await.unwrap());
        assert!(!store.delete("a@x.com", "123456").await.unwrap());
        store.insert(pending("a@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn pending_signup_delete_leaves_a_newer_code_alone() {
        let store: Arc<dyn OtpStore> = Arc::new(MemoryStore::new());
        let mut fresh = pending("a@x.com");
        fresh.code = "654321".to_string();
        store.insert(fresh).await.unwrap();

        // A caller still holding the replaced record's code.
        assert!(!store.delete("a@x.com", "123456").await.unwrap());
        let kept = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(kept.code, "654321");
    }

    #[tokio::test]
    async fn only_one_open_attendance_record_per_user() {
        let store: Arc<dyn AttendanceStore> = Arc::new(MemoryStore::new());
        let user_id = Uuid::now_v7();
        let first = AttendanceRecord {
            id: Uuid::now_v7(),
            user_id,
            clock_in: Utc::now(),
            clock_out: None,
        };
        store.insert(first.clone()).await.unwrap();

        let second = AttendanceRecord {
            id: Uuid::now_v7(),
            ..first.clone()
        };
        let err = store.insert(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("open_record")));

        let closed = store.close(first.id, Utc::now()).await.unwrap();
        assert!(closed.is_some_and(|r| !r.is_open()));
        // Closing again is a no-op.
        assert!(store.close(first.id, Utc::now()).await.unwrap().is_none());
        assert!(store.find_open(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_user_removes_dependent_rows() {
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn UserStore> = store.clone();
        let tokens: Arc<dyn TokenStore> = store.clone();
        let attendance: Arc<dyn AttendanceStore> = store.clone();

        let ada = users.create(new_user("ada", "ada@example.com")).await.unwrap();
        tokens
            .save(RefreshToken {
                id: Uuid::now_v7(),
                user_id: ada.id,
                token_hash: "abc".to_string(),
                revoked: false,
                expires_at: Utc::now() + Duration::hours(1),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        attendance
            .insert(AttendanceRecord {
                id: Uuid::now_v7(),
                user_id: ada.id,
                clock_in: Utc::now(),
                clock_out: None,
            })
            .await
            .unwrap();

        assert!(users.delete(ada.id).await.unwrap());
        assert!(tokens.find_by_hash("abc").await.unwrap().is_none());
        assert!(attendance.list_by_user(ada.id).await.unwrap().is_empty());
    }
}
