//! 网关应用状态

use std::sync::Arc;

use common::config::AppConfig;
use common::middleware::BearerToken;

use crate::registry::Registry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<Registry>,
    pub token: BearerToken,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Arc<Registry>) -> Self {
        Self {
            token: BearerToken::new(config.api_token.clone()),
            config,
            registry,
        }
    }
}
