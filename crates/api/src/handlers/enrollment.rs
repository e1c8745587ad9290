use axum::extract::{Path, Query, State, rejection::QueryRejection};
use serde::Serialize;

use market_core::model::{EnrolledCourse, EnrollmentOutcome, MAX_PAGE_SIZE, Page};

use crate::auth::AuthUser;
use crate::context::ApiState;
use crate::envelope::ok;
use crate::handlers::{ApiResult, PageQuery};

#[derive(Debug, Serialize)]
pub struct EnrolledResponse {
    pub enrolled: bool,
}

/// `GET /enrollment/my-courses`
pub async fn my_courses(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<EnrolledCourse>> {
    let Query(query) = query?;
    let courses = state
        .services
        .enrollments()
        .my_courses(user_id, query.request(MAX_PAGE_SIZE))
        .await?;
    Ok(ok(courses))
}

/// `GET /enrollment/{courseIdentifier}/check`
pub async fn check(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Path(identifier): Path<String>,
) -> ApiResult<EnrolledResponse> {
    let enrolled = state
        .services
        .enrollments()
        .is_enrolled(user_id, &identifier)
        .await?;
    Ok(ok(EnrolledResponse { enrolled }))
}

/// `POST /enrollment/{courseIdentifier}`
pub async fn enroll(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Path(identifier): Path<String>,
) -> ApiResult<EnrollmentOutcome> {
    let outcome = state
        .services
        .enrollments()
        .self_enroll(user_id, &identifier)
        .await?;
    Ok(ok(outcome))
}
