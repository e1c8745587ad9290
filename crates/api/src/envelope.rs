use axum::Json;
use serde::Serialize;

pub const OK_MESSAGE: &str = "OK";
pub const FAIL_MESSAGE: &str = "An error occured";

/// One entry of the `errors` list in a failure envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorBody {
    pub code: u16,
    pub message: String,
}

/// Every response body, successful or not, has this shape.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub status: u16,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ApiErrorBody>>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            status: 200,
            message: OK_MESSAGE,
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<()> {
    #[must_use]
    pub fn fail(status: u16, errors: Vec<ApiErrorBody>) -> Self {
        Self {
            ok: false,
            status,
            message: FAIL_MESSAGE,
            data: None,
            errors: Some(errors),
        }
    }
}

/// Wrap `data` in a success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}
