use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};

use market_core::model::{
    Category, CourseDetail, CourseFilter, CourseId, CourseSort, CourseStatus, CourseSummary,
    CourseTag, DEFAULT_PAGE_SIZE, InstructorCourse, InstructorDetail, InstructorSummary, Page,
    RatingSummary, ReviewId, ReviewListing, ReviewSubmission,
};

use crate::auth::AuthUser;
use crate::context::ApiState;
use crate::envelope::ok;
use crate::error::ApiError;
use crate::handlers::{ApiResult, PageQuery, optional_id};

const REVIEW_PAGE_SIZE: u32 = 10;

//
// ─── COURSES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub q: Option<String>,
    pub category_id: Option<String>,
    pub instructor_id: Option<String>,
    pub level_id: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<CourseSort>,
}

impl CourseListQuery {
    fn filter(&self) -> Result<CourseFilter, ApiError> {
        Ok(CourseFilter {
            q: self.q.clone(),
            category_id: optional_id(self.category_id.as_deref(), "categoryId")?,
            instructor_id: optional_id(self.instructor_id.as_deref(), "instructorId")?,
            level_id: self.level_id.clone().filter(|l| !l.trim().is_empty()),
            // the public listing never shows drafts
            status: Some(CourseStatus::Published),
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort.unwrap_or_default(),
        })
    }
}

/// `GET /course/list`
pub async fn list_courses(
    State(state): State<ApiState>,
    query: Result<Query<CourseListQuery>, QueryRejection>,
) -> ApiResult<Page<CourseSummary>> {
    let Query(query) = query?;
    let filter = query.filter()?;
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .request(DEFAULT_PAGE_SIZE);
    let courses = state.services.catalog().list_courses(&filter, page).await?;
    Ok(ok(courses))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsQuery {
    pub course_id: String,
}

/// `GET /course/tags?courseId=a,b`
pub async fn course_tags(
    State(state): State<ApiState>,
    query: Result<Query<TagsQuery>, QueryRejection>,
) -> ApiResult<Vec<CourseTag>> {
    let Query(query) = query?;
    let ids = query
        .course_id
        .split(',')
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<CourseId>()
                .map_err(|_| ApiError::BadRequest(format!("invalid courseId: {raw}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let tags = state.services.catalog().course_tags(&ids).await?;
    Ok(ok(tags))
}

/// `GET /course/{courseIdentifier}`
pub async fn course_detail(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<CourseDetail> {
    let detail = state.services.catalog().course_detail(&identifier).await?;
    Ok(ok(detail))
}

//
// ─── REVIEWS ───────────────────────────────────────────────────────────────────
//

/// `GET /course/{courseIdentifier}/reviews`
pub async fn course_reviews(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<ReviewListing>> {
    let Query(query) = query?;
    let course = state.services.catalog().resolve_course(&identifier).await?;
    let reviews = state
        .services
        .reviews()
        .course_reviews(course.id, query.request(REVIEW_PAGE_SIZE))
        .await?;
    Ok(ok(reviews))
}

#[derive(Debug, Serialize)]
pub struct RatedResponse {
    pub rated: bool,
    #[serde(flatten)]
    pub summary: RatingSummary,
}

/// `POST /course/{courseIdentifier}/reviews`
pub async fn rate_course(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Path(identifier): Path<String>,
    body: Result<Json<ReviewSubmission>, JsonRejection>,
) -> ApiResult<RatedResponse> {
    let Json(submission) = body?;
    let course = state.services.catalog().resolve_course(&identifier).await?;
    state
        .services
        .enrollments()
        .require_access(user_id, course.id)
        .await?;

    let summary = state
        .services
        .reviews()
        .rate_course(ReviewId::generate(), user_id, course.id, submission)
        .await?;
    Ok(ok(RatedResponse {
        rated: true,
        summary,
    }))
}

//
// ─── CATEGORIES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    pub parent_id: Option<String>,
}

/// `GET /category`
pub async fn categories(
    State(state): State<ApiState>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ApiResult<Vec<Category>> {
    let Query(query) = query?;
    let parent = optional_id(query.parent_id.as_deref(), "parentId")?;
    let categories = state.services.catalog().categories(parent).await?;
    Ok(ok(categories))
}

/// `GET /category/{categoryIdentifier}`
pub async fn category(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<Category> {
    let category = state.services.catalog().category(&identifier).await?;
    Ok(ok(category))
}

/// `GET /category/{categoryIdentifier}/courses`
pub async fn category_courses(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<CourseSummary>> {
    let Query(query) = query?;
    let courses = state
        .services
        .catalog()
        .courses_by_category(&identifier, query.request(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(ok(courses))
}

//
// ─── INSTRUCTORS ───────────────────────────────────────────────────────────────
//

/// `GET /instructor`
pub async fn instructors(
    State(state): State<ApiState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<InstructorSummary>> {
    let Query(query) = query?;
    let instructors = state
        .services
        .catalog()
        .instructors(query.request(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(ok(instructors))
}

/// `GET /instructor/{instructorIdentifier}`
pub async fn instructor_detail(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<InstructorDetail> {
    match state.services.catalog().instructor_detail(&identifier).await {
        Ok(detail) => Ok(ok(detail)),
        Err(services::CatalogServiceError::NotFound(_)) => {
            Err(ApiError::NotFound("Instructor not found".into()))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /instructor/{instructorIdentifier}/courses`
pub async fn instructor_courses(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<Vec<InstructorCourse>> {
    let courses = match state.services.catalog().instructor_courses(&identifier).await {
        Ok(courses) => courses,
        Err(services::CatalogServiceError::NotFound(_)) => Vec::new(),
        Err(err) => return Err(err.into()),
    };
    if courses.is_empty() {
        return Err(ApiError::NotFound(
            "No courses found for this instructor".into(),
        ));
    }
    Ok(ok(courses))
}
