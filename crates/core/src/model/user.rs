use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Role assigned to every newly registered user.
pub const DEFAULT_ROLE: &str = "student";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    #[error("invalid user status: {0}")]
    InvalidStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Banned,
}

impl UserStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Banned => "banned",
        }
    }

    /// # Errors
    ///
    /// Returns `UserError::InvalidStatus` for unknown values.
    pub fn parse(value: &str) -> Result<Self, UserError> {
        match value {
            "active" => Ok(Self::Active),
            "banned" => Ok(Self::Banned),
            other => Err(UserError::InvalidStatus(other.to_owned())),
        }
    }
}

/// A user account, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: Option<String>,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }

    #[must_use]
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
            created_at: self.created_at,
        }
    }
}

/// What other users may see of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: UserId,
    pub name: String,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user together with the stored password hash, for sign-in only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Validated registration input. The password is still plain text here;
/// hashing happens in the account service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    name: String,
    email: String,
    password: String,
    avatar: Option<String>,
}

impl NewUser {
    /// # Errors
    ///
    /// Returns `UserError` if the name is blank, the email is not plausible or
    /// the password is shorter than `MIN_PASSWORD_LEN`.
    pub fn new(
        name: &str,
        email: &str,
        password: &str,
        avatar: Option<String>,
    ) -> Result<Self, UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::WeakPassword);
        }
        Ok(Self {
            name: name.to_owned(),
            email,
            password: password.to_owned(),
            avatar: avatar.filter(|a| !a.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    /// Builds the stored account for this registration.
    #[must_use]
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> User {
        User {
            id,
            name: self.name,
            username: None,
            email: self.email,
            avatar: self.avatar,
            bio: None,
            phone: None,
            location: None,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

/// Trims and lowercases an email, rejecting anything without a local part and
/// a dotted domain.
///
/// # Errors
///
/// Returns `UserError::InvalidEmail` if the address is not plausible.
pub fn normalize_email(raw: &str) -> Result<String, UserError> {
    let email = raw.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(UserError::InvalidEmail);
    };
    let domain_ok = domain
        .split('.')
        .all(|part| !part.is_empty())
        && domain.contains('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(UserError::InvalidEmail);
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn registration_normalizes_input() {
        let new = NewUser::new("  Ada ", " Ada@Example.COM ", "correct horse", None).unwrap();
        assert_eq!(new.name(), "Ada");
        assert_eq!(new.email(), "ada@example.com");

        let user = new.into_user(UserId::generate(), fixed_now());
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.last_login_at, None);
    }

    #[test]
    fn registration_rejects_bad_input() {
        assert_eq!(
            NewUser::new(" ", "a@b.co", "password1", None),
            Err(UserError::EmptyName)
        );
        assert_eq!(
            NewUser::new("A", "nope", "password1", None),
            Err(UserError::InvalidEmail)
        );
        assert_eq!(
            NewUser::new("A", "a@b.co", "short", None),
            Err(UserError::WeakPassword)
        );
    }

    #[test]
    fn email_needs_dotted_domain() {
        assert!(normalize_email("a@localhost").is_err());
        assert!(normalize_email("a@b.").is_err());
        assert!(normalize_email("@b.co").is_err());
        assert_eq!(normalize_email("x@y.io").unwrap(), "x@y.io");
    }

    #[test]
    fn blank_avatar_is_dropped() {
        let new = NewUser::new("A", "a@b.co", "password1", Some("  ".into())).unwrap();
        assert_eq!(new.avatar(), None);
    }

    #[test]
    fn public_profile_omits_email() {
        let user = NewUser::new("A", "a@b.co", "password1", None)
            .unwrap()
            .into_user(UserId::generate(), fixed_now());
        let json = serde_json::to_value(user.public_profile()).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["name"], "A");
    }
}
