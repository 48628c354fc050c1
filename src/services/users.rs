use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use super::signup::duplicate_to_conflict;
use super::{
    hash_password, normalize_email, validate_password, validate_username, with_deadline, Caller,
    ServiceError, ServiceResult, SignupForm,
};
use crate::models::{NewUser, Role, User, UserChanges};
use crate::store::{TokenStore, UserStore};

/// Requested changes to a user. Absent fields are left alone.
#[derive(Clone, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl std::fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPatch")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("role", &self.role)
            .finish()
    }
}

pub struct UserService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    timeout: Duration,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>, timeout: Duration) -> Self {
        Self {
            users,
            tokens,
            timeout,
        }
    }

    pub async fn get_user(&self, caller: &Caller, id: Uuid) -> ServiceResult<User> {
        caller.require_self_or_admin(id)?;
        with_deadline(self.timeout, async {
            self.users
                .find_by_id(id)
                .await?
                .ok_or(ServiceError::UserNotFound)
        })
        .await
    }

    pub async fn get_user_by_email(&self, caller: &Caller, email: &str) -> ServiceResult<User> {
        caller.require_admin()?;
        let email = normalize_email(email)?;
        with_deadline(self.timeout, async {
            self.users
                .find_by_email(&email)
                .await?
                .ok_or(ServiceError::UserNotFound)
        })
        .await
    }

    pub async fn get_user_by_username(&self, caller: &Caller, username: &str) -> ServiceResult<User> {
        caller.require_admin()?;
        with_deadline(self.timeout, async {
            self.users
                .find_by_username(username.trim())
                .await?
                .ok_or(ServiceError::UserNotFound)
        })
        .await
    }

    pub async fn list_users(&self, caller: &Caller) -> ServiceResult<Vec<User>> {
        caller.require_admin()?;
        with_deadline(self.timeout, async { Ok(self.users.list().await?) }).await
    }

    /// Admin-side account creation: no OTP round trip, the password is hashed here.
    pub async fn create_user(
        &self,
        caller: &Caller,
        form: &SignupForm,
        role: Role,
    ) -> ServiceResult<Uuid> {
        caller.require_admin()?;
        let email = normalize_email(&form.email)?;
        let username = validate_username(&form.username)?;
        validate_password(&form.password)?;

        with_deadline(self.timeout, async {
            let user = self
                .users
                .create(NewUser {
                    id: Uuid::now_v7(),
                    username,
                    email,
                    password_hash: hash_password(&form.password)?,
                    role,
                })
                .await
                .map_err(duplicate_to_conflict)?;
            tracing::info!(user_id = %user.id, created_by = %caller.user_id, role = %role, "User created");
            Ok(user.id)
        })
        .await
    }

    /// Employees may edit their own profile but never a role. A password
    /// change revokes every refresh token the user holds.
    pub async fn update_user(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: UserPatch,
    ) -> ServiceResult<User> {
        caller.require_self_or_admin(id)?;
        if patch.role.is_some() && !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only admins can change roles".to_string(),
            ));
        }

        let changes = UserChanges {
            username: patch.username.as_deref().map(validate_username).transpose()?,
            email: patch.email.as_deref().map(normalize_email).transpose()?,
            password_hash: match patch.password.as_deref() {
                Some(pw) => {
                    validate_password(pw)?;
                    Some(hash_password(pw)?)
                }
                None => None,
            },
            role: patch.role,
        };
        if changes.is_empty() {
            return Err(ServiceError::Validation("Nothing to update".to_string()));
        }
        let password_changed = changes.password_hash.is_some();

        with_deadline(self.timeout, async {
            let user = self
                .users
                .update(id, changes)
                .await
                .map_err(duplicate_to_conflict)?
                .ok_or(ServiceError::UserNotFound)?;

            if password_changed {
                self.tokens.revoke_all_for_user(id).await?;
                tracing::info!(user_id = %id, "Password changed; refresh tokens revoked");
            }
            tracing::info!(user_id = %id, updated_by = %caller.user_id, "User updated");
            Ok(user)
        })
        .await
    }

    pub async fn delete_user(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        caller.require_admin()?;
        if caller.user_id == id {
            return Err(ServiceError::Forbidden(
                "Admins cannot delete their own account".to_string(),
            ));
        }

        with_deadline(self.timeout, async {
            if !self.users.delete(id).await? {
                return Err(ServiceError::UserNotFound);
            }
            tracing::info!(user_id = %id, deleted_by = %caller.user_id, "User deleted");
            Ok(())
        })
        .await
    }
}
