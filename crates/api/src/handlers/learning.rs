use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use market_core::model::{
    CourseProgress, Curriculum, LectureDetail, LectureId, ProgressSummary, ProgressUpdate,
};

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::context::ApiState;
use crate::envelope::ok;
use crate::error::ApiError;
use crate::handlers::ApiResult;

fn lecture_id(raw: &str) -> Result<LectureId, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::NotFound("Lecture not found".into()))
}

/// `GET /courses/{courseIdentifier}/curriculum`
pub async fn curriculum(
    State(state): State<ApiState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(identifier): Path<String>,
) -> ApiResult<Curriculum> {
    let curriculum = state
        .services
        .catalog()
        .curriculum(&identifier, viewer)
        .await?;
    Ok(ok(curriculum))
}

/// `GET /courses/{courseIdentifier}/progress`
pub async fn course_progress(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Path(identifier): Path<String>,
) -> ApiResult<CourseProgress> {
    let course = state.services.catalog().resolve_course(&identifier).await?;
    let progress = state
        .services
        .progress()
        .course_progress(user_id, course.id)
        .await?;
    Ok(ok(progress))
}

/// `GET /lectures/{lectureId}`
pub async fn lecture_detail(
    State(state): State<ApiState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(raw_id): Path<String>,
) -> ApiResult<LectureDetail> {
    let lecture_id = lecture_id(&raw_id)?;
    let detail = state
        .services
        .catalog()
        .lecture_detail(lecture_id, viewer)
        .await?;
    Ok(ok(detail))
}

/// `POST /lectures/{lectureId}/progress`
pub async fn record_progress(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Path(raw_id): Path<String>,
    body: Result<Json<ProgressUpdate>, JsonRejection>,
) -> ApiResult<ProgressSummary> {
    let Json(update) = body?;
    let lecture_id = lecture_id(&raw_id)?;
    let course_id = state.services.catalog().lecture_course(lecture_id).await?;
    state
        .services
        .enrollments()
        .require_access(user_id, course_id)
        .await?;

    let summary = state
        .services
        .progress()
        .record_progress(user_id, course_id, lecture_id, update)
        .await?;
    Ok(ok(summary))
}
