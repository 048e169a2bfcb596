//! MediCore Authentication Layer
//!
//! Authentication and authorization for the MediCore clinic platform:
//!
//! - **Credential & Token Codec**: Argon2id password/refresh-token hashing,
//!   HS256 access and refresh tokens signed with distinct secrets
//! - **Refresh Sessions**: per-device session entries with single-use rotation
//! - **Auth Gateway**: register, login, refresh, logout, federated sign-in
//! - **Request Authenticator**: bearer-token tower layer and extractors
//! - **Authorization Evaluator**: role and capability gates over a static
//!   permission table
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Authentication Flow                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  login/refresh ─► AuthService ─► access token (body)        │
//! │                        │        refresh token (cookie)      │
//! │                        ▼                                    │
//! │                 SessionService ─► AccountStore              │
//! │                                                             │
//! │  Request ─► AuthLayer ─► GateLayer ─► Handler               │
//! │                 │            │                              │
//! │          Authenticator    policy::check_*                   │
//! │                 ▼                                           │
//! │             Principal                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod federation;
pub mod gateway;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod session;
pub mod types;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, ErrorResponse};
pub use events::{AccountEvent, BroadcastPublisher, EventPublisher, NoopPublisher};
pub use federation::{GoogleProvider, IdentityProvider};
pub use jwt::JwtService;
pub use middleware::{AuthLayer, Authenticator, GateLayer, MaybeAuth, RequireAuth};
pub use password::PasswordService;
pub use session::SessionService;
pub use types::*;

use medicore_db::AccountStore;
use std::sync::Arc;

/// Main authentication service combining all auth components
#[derive(Clone)]
pub struct AuthService {
    pub jwt: Arc<JwtService>,
    pub password: Arc<PasswordService>,
    pub sessions: SessionService,
    store: Arc<dyn AccountStore>,
    events: Arc<dyn EventPublisher>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new auth service; fails on unusable token or hashing config
    pub fn new(
        store: Arc<dyn AccountStore>,
        events: Arc<dyn EventPublisher>,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        let jwt = Arc::new(JwtService::new(config.jwt.clone())?);
        let password = Arc::new(PasswordService::new(config.password.clone())?);
        let sessions = SessionService::new(store.clone(), jwt.clone(), password.clone());

        Ok(Self {
            jwt,
            password,
            sessions,
            store,
            events,
            config,
        })
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Hand an event to the configured publisher
    pub fn publish(&self, event: AccountEvent) {
        self.events.publish(event);
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.jwt.clone(), self.store.clone())
    }

    /// Layer that rejects requests without a valid bearer token
    pub fn required_layer(&self) -> AuthLayer {
        AuthLayer::required(Arc::new(self.authenticator()))
    }

    /// Layer that attaches a principal when possible and never rejects
    pub fn optional_layer(&self) -> AuthLayer {
        AuthLayer::optional(Arc::new(self.authenticator()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use medicore_db::MemoryStore;

    pub fn test_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.jwt.access_secret = "test-access-secret-0123456789abcdef".to_string();
        config.jwt.refresh_secret = "test-refresh-secret-0123456789abcdef".to_string();
        config.password = config::PasswordConfig::fast();
        config
    }

    pub fn service() -> (AuthService, BroadcastPublisher) {
        let events = BroadcastPublisher::new(64);
        let service = AuthService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(events.clone()),
            test_config(),
        )
        .unwrap();
        (service, events)
    }
}
