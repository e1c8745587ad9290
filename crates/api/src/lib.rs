#![forbid(unsafe_code)]

pub mod auth;
pub mod context;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::{AuthUser, Claims, MaybeAuthUser, TokenService};
pub use context::ApiState;
pub use error::ApiError;
pub use routes::router;
