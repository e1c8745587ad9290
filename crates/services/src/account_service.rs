use std::sync::Arc;

use serde::Serialize;

use market_core::{
    model::{
        NewUser, User, UserId,
        user::{DEFAULT_ROLE, normalize_email},
    },
    time::Clock,
};
use storage::repository::{StorageError, UserRepository};

use crate::error::AccountServiceError;
use crate::password::{hash_password, verify_password};

/// The signed-in user together with their role names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountProfile {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}

/// Registration, sign-in and profile lookups.
#[derive(Clone)]
pub struct AccountService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl AccountService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Create an account with the default role.
    ///
    /// # Errors
    ///
    /// Returns `AccountServiceError::Invalid` for bad input and `EmailTaken`
    /// if the address is already registered.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        avatar: Option<String>,
    ) -> Result<User, AccountServiceError> {
        let new_user = NewUser::new(name, email, password, avatar)?;
        if self.users.email_exists(new_user.email()).await? {
            return Err(AccountServiceError::EmailTaken);
        }

        let hash = hash_password(new_user.password())?;
        let user = new_user.into_user(UserId::generate(), self.clock.now());
        match self.users.insert_user(&user, &hash, DEFAULT_ROLE).await {
            Ok(()) => {}
            // lost a race with a concurrent registration
            Err(StorageError::Conflict) => return Err(AccountServiceError::EmailTaken),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Verify credentials and stamp the login time.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for unknown emails, `InvalidCredentials` for a
    /// wrong password (or an account without one) and `Banned` for banned
    /// accounts.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AccountServiceError> {
        let email = normalize_email(email).map_err(|_| AccountServiceError::UserNotFound)?;
        let credentials = self
            .users
            .credentials_by_email(&email)
            .await?
            .ok_or(AccountServiceError::UserNotFound)?;

        let verified = credentials
            .password_hash
            .as_deref()
            .is_some_and(|stored| verify_password(password, stored));
        if !verified {
            tracing::warn!(user_id = %credentials.user.id, "sign-in rejected");
            return Err(AccountServiceError::InvalidCredentials);
        }

        let mut user = credentials.user;
        if user.is_banned() {
            return Err(AccountServiceError::Banned);
        }

        let now = self.clock.now();
        self.users.touch_last_login(user.id, now).await?;
        user.last_login_at = Some(now);
        Ok(user)
    }

    /// Whether an account exists for `email`. Malformed addresses are simply
    /// not registered.
    ///
    /// # Errors
    ///
    /// Returns `AccountServiceError::Storage` on storage faults.
    pub async fn check(&self, email: &str) -> Result<bool, AccountServiceError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(false);
        };
        Ok(self.users.email_exists(&email).await?)
    }

    /// # Errors
    ///
    /// Returns `AccountServiceError::UserNotFound` if the account is gone.
    pub async fn profile(&self, user_id: UserId) -> Result<AccountProfile, AccountServiceError> {
        let user = match self.users.get_user(user_id).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => return Err(AccountServiceError::UserNotFound),
            Err(err) => return Err(err.into()),
        };
        let roles = self.users.roles(user_id).await?;
        Ok(AccountProfile { user, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::model::UserStatus;
    use market_core::time::fixed_now;

    #[test]
    fn profile_serializes_flat_without_credentials() {
        let profile = AccountProfile {
            user: User {
                id: UserId::generate(),
                name: "Rina".into(),
                username: None,
                email: "rina@example.com".into(),
                avatar: None,
                bio: None,
                phone: None,
                location: None,
                status: UserStatus::Active,
                created_at: fixed_now(),
                updated_at: fixed_now(),
                last_login_at: None,
            },
            roles: vec!["student".into()],
        };

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["email"], "rina@example.com");
        assert_eq!(json["roles"][0], "student");
        assert!(json.get("lastLoginAt").is_some());
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
