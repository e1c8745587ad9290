use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::context::ApiState;
use crate::handlers::{account, catalog, enrollment, learning, root};

/// The full HTTP surface with tracing and CORS applied.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root::index))
        .route("/health", get(root::health))
        // accounts
        .route("/sign", post(account::sign))
        .route("/user/check", post(account::check))
        .route("/user/register", post(account::register))
        .route("/user/profile", get(account::profile))
        .route("/profile/{user_identifier}", get(account::public_profile))
        // catalog
        .route("/course/list", get(catalog::list_courses))
        .route("/course/tags", get(catalog::course_tags))
        .route("/course/{course_identifier}", get(catalog::course_detail))
        .route(
            "/course/{course_identifier}/reviews",
            get(catalog::course_reviews).post(catalog::rate_course),
        )
        .route("/category", get(catalog::categories))
        .route("/category/{category_identifier}", get(catalog::category))
        .route(
            "/category/{category_identifier}/courses",
            get(catalog::category_courses),
        )
        .route("/instructor", get(catalog::instructors))
        .route(
            "/instructor/{instructor_identifier}",
            get(catalog::instructor_detail),
        )
        .route(
            "/instructor/{instructor_identifier}/courses",
            get(catalog::instructor_courses),
        )
        // enrollment
        .route("/enrollment/my-courses", get(enrollment::my_courses))
        .route("/enrollment/{course_identifier}", post(enrollment::enroll))
        .route(
            "/enrollment/{course_identifier}/check",
            get(enrollment::check),
        )
        // learning
        .route(
            "/courses/{course_identifier}/curriculum",
            get(learning::curriculum),
        )
        .route(
            "/courses/{course_identifier}/progress",
            get(learning::course_progress),
        )
        .route("/lectures/{lecture_id}", get(learning::lecture_detail))
        .route(
            "/lectures/{lecture_id}/progress",
            post(learning::record_progress),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
