//! Shared application state for all routes.

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::middleware::{build_limiter, ClientLimiter, StaticTokens, TokenResolver};
use crate::store::BookStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn BookStore>,
    tokens: Arc<dyn TokenResolver>,
    /// `None` when rate limiting is disabled.
    limiter: Option<Arc<ClientLimiter>>,
    environment: Arc<str>,
}

impl AppState {
    /// State with no known tokens, no rate limiting and the `development` environment.
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            store,
            tokens: Arc::new(StaticTokens::default()),
            limiter: None,
            environment: Arc::from("development"),
        }
    }

    /// Wire tokens, limiter and environment from loaded configuration.
    pub fn from_config(store: Arc<dyn BookStore>, config: &AppConfig) -> Result<Self, ConfigError> {
        let tokens = StaticTokens::parse(&config.api_tokens)?;
        if tokens.is_empty() {
            tracing::warn!("API_TOKENS is empty, every protected route will answer 401");
        }
        Ok(Self::new(store)
            .with_tokens(Arc::new(tokens))
            .with_limiter(build_limiter(&config.limiter))
            .with_environment(config.env.as_str()))
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenResolver>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_limiter(mut self, limiter: Option<Arc<ClientLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = Arc::from(environment);
        self
    }

    pub fn store(&self) -> &dyn BookStore {
        self.store.as_ref()
    }

    pub fn tokens(&self) -> &dyn TokenResolver {
        self.tokens.as_ref()
    }

    pub fn limiter(&self) -> Option<&Arc<ClientLimiter>> {
        self.limiter.as_ref()
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}
