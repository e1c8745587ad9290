use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::course::UserRef;
use crate::model::ids::{CourseId, EnrollmentId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("invalid enrollment status: {0}")]
    InvalidStatus(String),

    #[error("invalid enrollment source: {0}")]
    InvalidSource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Refunded,
    Revoked,
}

impl EnrollmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Refunded => "refunded",
            Self::Revoked => "revoked",
        }
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidStatus` for unknown values.
    pub fn parse(value: &str) -> Result<Self, EnrollmentError> {
        match value {
            "active" => Ok(Self::Active),
            "refunded" => Ok(Self::Refunded),
            "revoked" => Ok(Self::Revoked),
            other => Err(EnrollmentError::InvalidStatus(other.to_owned())),
        }
    }
}

/// How the user obtained the enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentSource {
    Purchase,
    #[default]
    Free,
    Coupon,
    Gift,
    AdminGrant,
}

impl EnrollmentSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Free => "free",
            Self::Coupon => "coupon",
            Self::Gift => "gift",
            Self::AdminGrant => "admin_grant",
        }
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidSource` for unknown values.
    pub fn parse(value: &str) -> Result<Self, EnrollmentError> {
        match value {
            "purchase" => Ok(Self::Purchase),
            "free" => Ok(Self::Free),
            "coupon" => Ok(Self::Coupon),
            "gift" => Ok(Self::Gift),
            "admin_grant" => Ok(Self::AdminGrant),
            other => Err(EnrollmentError::InvalidSource(other.to_owned())),
        }
    }
}

/// A user's access grant to a course. Unique per `(user_id, course_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub source: EnrollmentSource,
    pub enrolled_at: DateTime<Utc>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub status: EnrollmentStatus,
}

impl Enrollment {
    #[must_use]
    pub fn new(
        id: EnrollmentId,
        user_id: UserId,
        course_id: CourseId,
        source: EnrollmentSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            course_id,
            source,
            enrolled_at: now,
            access_expires_at: None,
            status: EnrollmentStatus::Active,
        }
    }

    /// Active and not past its expiry.
    #[must_use]
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.status == EnrollmentStatus::Active
            && self.access_expires_at.is_none_or(|expires| expires > now)
    }
}

/// Result of an enroll call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentOutcome {
    pub enrollment: Enrollment,
    pub has_access: bool,
}

/// Row of a learner's "my courses" listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub enrollment_id: EnrollmentId,
    pub enrolled_at: DateTime<Utc>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub status: EnrollmentStatus,
    pub course_id: CourseId,
    pub title: String,
    pub slug: String,
    pub thumbnail_url: Option<String>,
    pub instructor: Option<UserRef>,
    pub progress_percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn enrollment() -> Enrollment {
        Enrollment::new(
            EnrollmentId::generate(),
            UserId::generate(),
            CourseId::generate(),
            EnrollmentSource::Free,
            fixed_now(),
        )
    }

    #[test]
    fn active_without_expiry_has_access() {
        assert!(enrollment().has_access(fixed_now()));
    }

    #[test]
    fn expired_enrollment_has_no_access() {
        let mut e = enrollment();
        e.access_expires_at = Some(fixed_now() - Duration::seconds(1));
        assert!(!e.has_access(fixed_now()));
        e.access_expires_at = Some(fixed_now() + Duration::days(1));
        assert!(e.has_access(fixed_now()));
    }

    #[test]
    fn revoked_enrollment_has_no_access() {
        let mut e = enrollment();
        e.status = EnrollmentStatus::Revoked;
        assert!(!e.has_access(fixed_now()));
    }

    #[test]
    fn source_parses_snake_case() {
        assert_eq!(
            EnrollmentSource::parse("admin_grant").unwrap(),
            EnrollmentSource::AdminGrant
        );
        assert!(EnrollmentSource::parse("stolen").is_err());
    }
}
