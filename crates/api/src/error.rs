use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use services::{
    AccountServiceError, CatalogServiceError, EnrollmentServiceError, ProgressServiceError,
    ReviewServiceError,
};
use storage::StorageError;

use crate::envelope::{ApiErrorBody, ApiResponse};

/// Request failure, rendered as a failure envelope with the matching status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Carries the underlying cause for the log; clients only see a generic
    /// message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(cause) = &self {
            tracing::error!(error = %cause, "request failed");
        }
        let body = ApiResponse::fail(
            status.as_u16(),
            vec![ApiErrorBody {
                code: status.as_u16(),
                message: self.client_message(),
            }],
        );
        (status, Json(body)).into_response()
    }
}

/// "course" -> "Course not found"
fn not_found(what: &str) -> ApiError {
    let mut chars = what.chars();
    let label = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => "Resource".to_owned(),
    };
    ApiError::NotFound(format!("{label} not found"))
}

//
// ─── CONVERSIONS ───────────────────────────────────────────────────────────────
//

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound("Not found".into()),
            StorageError::Conflict => Self::Conflict("Already exists".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::Storage(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ReviewServiceError> for ApiError {
    fn from(err: ReviewServiceError) -> Self {
        match err {
            ReviewServiceError::Storage(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<CatalogServiceError> for ApiError {
    fn from(err: CatalogServiceError) -> Self {
        match err {
            CatalogServiceError::NotFound(what) => not_found(what),
            CatalogServiceError::Identifier(e) => Self::BadRequest(e.to_string()),
            CatalogServiceError::Storage(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<EnrollmentServiceError> for ApiError {
    fn from(err: EnrollmentServiceError) -> Self {
        match err {
            EnrollmentServiceError::CourseNotFound => not_found("course"),
            EnrollmentServiceError::PaymentRequired => {
                Self::PaymentRequired("Course requires purchase".into())
            }
            EnrollmentServiceError::NoAccess => {
                Self::Forbidden("You do not have access to this course".into())
            }
            EnrollmentServiceError::Identifier(e) => Self::BadRequest(e.to_string()),
            EnrollmentServiceError::Storage(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(err: AccountServiceError) -> Self {
        match err {
            AccountServiceError::Invalid(e) => Self::BadRequest(e.to_string()),
            AccountServiceError::EmailTaken => Self::Conflict("Email already registered".into()),
            AccountServiceError::UserNotFound => Self::BadRequest("User not found".into()),
            AccountServiceError::InvalidCredentials => {
                Self::Unauthorized("Invalid credentials".into())
            }
            AccountServiceError::Banned => Self::Forbidden("Account is banned".into()),
            AccountServiceError::Identifier(e) => Self::BadRequest(e.to_string()),
            AccountServiceError::Storage(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
