use std::sync::Arc;

use services::AppServices;

use crate::auth::TokenService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub services: AppServices,
    pub tokens: Arc<TokenService>,
}

impl ApiState {
    #[must_use]
    pub fn new(services: AppServices, tokens: TokenService) -> Self {
        Self {
            services,
            tokens: Arc::new(tokens),
        }
    }
}
