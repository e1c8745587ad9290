#![forbid(unsafe_code)]

pub mod account_service;
pub mod app_services;
pub mod catalog_service;
pub mod enrollment_service;
pub mod error;
pub mod password;
pub mod progress_service;
pub mod review_service;

pub use market_core::Clock;

pub use account_service::{AccountProfile, AccountService};
pub use app_services::AppServices;
pub use catalog_service::CatalogService;
pub use enrollment_service::EnrollmentService;
pub use error::{
    AccountServiceError, AppServicesError, CatalogServiceError, EnrollmentServiceError,
    ProgressServiceError, ReviewServiceError,
};
pub use progress_service::ProgressService;
pub use review_service::ReviewService;
