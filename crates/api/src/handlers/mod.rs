use std::str::FromStr;

use axum::Json;
use serde::Deserialize;

use market_core::model::PageRequest;

use crate::envelope::ApiResponse;
use crate::error::ApiError;

pub mod account;
pub mod catalog;
pub mod enrollment;
pub mod learning;
pub mod root;

pub(crate) type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// `?page=&pageSize=` as sent by listing endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    #[must_use]
    pub fn request(self, default_size: u32) -> PageRequest {
        PageRequest::new(self.page, self.page_size, default_size)
    }
}

/// Parses an optional id parameter; blank values count as absent.
pub(crate) fn optional_id<T: FromStr>(
    raw: Option<&str>,
    field: &'static str,
) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("invalid {field}: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::model::CategoryId;

    #[test]
    fn blank_ids_are_absent() {
        assert_eq!(optional_id::<CategoryId>(None, "categoryId").unwrap(), None);
        assert_eq!(optional_id::<CategoryId>(Some("  "), "categoryId").unwrap(), None);
        assert!(optional_id::<CategoryId>(Some("nope"), "categoryId").is_err());

        let id = CategoryId::generate();
        let parsed = optional_id::<CategoryId>(Some(&id.to_string()), "categoryId").unwrap();
        assert_eq!(parsed, Some(id));
    }

    #[test]
    fn page_query_clamps() {
        let page = PageQuery {
            page: Some(0),
            page_size: Some(500),
        }
        .request(12);
        assert_eq!((page.page(), page.page_size()), (1, 50));
        assert_eq!(PageQuery::default().request(10).page_size(), 10);
    }
}
