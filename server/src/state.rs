use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::catalog::EventCatalog;
use crate::checkout::AllocationEngine;
use crate::clock::Clock;
use crate::config::Config;
use crate::store::Store;

/// Shared by every handler; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub checkout: Arc<AllocationEngine>,
    pub catalog: Arc<EventCatalog>,
    pub tokens: Arc<TokenSigner>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let checkout = AllocationEngine::new(store.clone(), clock.clone())
            .with_code_attempts(config.code_attempts);
        let catalog = EventCatalog::new(store.clone(), clock.clone());
        let tokens = TokenSigner::new(config.token_secret.as_bytes(), config.token_ttl);

        Self {
            store,
            clock,
            checkout: Arc::new(checkout),
            catalog: Arc::new(catalog),
            tokens: Arc::new(tokens),
        }
    }
}
