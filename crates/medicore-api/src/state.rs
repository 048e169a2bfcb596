//! Application state shared across handlers

use medicore_auth::{AuthService, IdentityProvider};
use medicore_db::AccountStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Authentication service (owns the account store)
    pub auth: AuthService,
    /// Federated identity provider, when configured
    pub identity: Option<Arc<dyn IdentityProvider>>,
}

impl AppState {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            identity: None,
        }
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        self.auth.store()
    }
}
