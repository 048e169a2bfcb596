//! Request authentication and authorization gates for Axum
//!
//! - [`Authenticator`] resolves a bearer access token into a [`Principal`],
//!   re-reading the account so deletion and deactivation take effect at once
//! - [`AuthLayer`] runs the authenticator in front of a router, either
//!   rejecting unauthenticated requests or just annotating them
//! - [`GateLayer`] checks the attached principal against a role list or a
//!   capability
//! - [`RequireAuth`] / [`MaybeAuth`] hand the principal to handlers

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use medicore_db::AccountStore;
use medicore_types::{Capability, Role};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult, ErrorResponse};
use crate::jwt::JwtService;
use crate::policy;
use crate::types::Principal;

// =============================================================================
// Authenticator
// =============================================================================

/// Resolves access tokens into principals
pub struct Authenticator {
    jwt: Arc<JwtService>,
    store: Arc<dyn AccountStore>,
}

impl Authenticator {
    pub fn new(jwt: Arc<JwtService>, store: Arc<dyn AccountStore>) -> Self {
        Self { jwt, store }
    }

    /// Authenticate from the `Authorization: Bearer <token>` header
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Principal> {
        let token = bearer_token(headers)?;
        self.authenticate_token(token).await
    }

    /// Authenticate a raw access token.
    ///
    /// Role and profile come from the stored account, not from the claims.
    pub async fn authenticate_token(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.jwt.verify_access_token(token)?;
        let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if account.is_deleted() {
            return Err(AuthError::AccountDeleted);
        }
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(Principal::from(&account))
    }
}

/// Extract the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Unauthenticated)?;
    let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or(AuthError::InvalidToken)?;

    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(token)
}

// =============================================================================
// Authentication layer
// =============================================================================

/// Authentication middleware layer
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
    required: bool,
}

impl AuthLayer {
    /// Reject requests that do not authenticate
    pub fn required(authenticator: Arc<Authenticator>) -> Self {
        Self {
            authenticator,
            required: true,
        }
    }

    /// Forward every request; attach a principal only when one resolves
    pub fn optional(authenticator: Arc<Authenticator>) -> Self {
        Self {
            authenticator,
            required: false,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            authenticator: self.authenticator.clone(),
            required: self.required,
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
    required: bool,
}

impl<S> Service<Request> for AuthMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let required = self.required;
        // Take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let outcome = authenticator.authenticate(req.headers()).await;
            match outcome {
                Ok(principal) => {
                    let (mut parts, body) = req.into_parts();
                    parts.extensions.insert(principal);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(e) if required => Ok(auth_error_response(e)),
                Err(e) => {
                    if e.is_server_error() {
                        tracing::warn!(error = %e, "Optional authentication failed");
                    }
                    inner.call(req).await
                }
            }
        })
    }
}

/// JSON error response for authentication and authorization failures
pub fn auth_error_response(error: AuthError) -> Response {
    if error.is_server_error() {
        tracing::error!(error = %error, "Authentication error");
    }

    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(&error))).into_response()
}

// =============================================================================
// Authorization gates
// =============================================================================

#[derive(Debug, Clone)]
enum Gate {
    Roles(Arc<[Role]>),
    Capability(Capability),
}

impl Gate {
    fn check(&self, principal: &Principal) -> AuthResult<()> {
        match self {
            Self::Roles(roles) => policy::check_roles(principal, roles),
            Self::Capability(capability) => policy::check_capability(principal, *capability),
        }
    }
}

/// Authorization layer; must sit inside an [`AuthLayer`]
#[derive(Debug, Clone)]
pub struct GateLayer {
    gate: Gate,
}

impl GateLayer {
    /// Allow the listed roles (SuperAdmin always passes)
    pub fn roles(roles: &[Role]) -> Self {
        Self {
            gate: Gate::Roles(Arc::from(roles)),
        }
    }

    /// Allow roles holding `capability`
    pub fn capability(capability: Capability) -> Self {
        Self {
            gate: Gate::Capability(capability),
        }
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateMiddleware {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Authorization gate service
#[derive(Clone)]
pub struct GateMiddleware<S> {
    inner: S,
    gate: Gate,
}

impl<S> Service<Request> for GateMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let verdict = match req.extensions().get::<Principal>() {
            Some(principal) => self.gate.check(principal),
            None => Err(AuthError::Unauthenticated),
        };

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match verdict {
                Ok(()) => inner.call(req).await,
                Err(e) => Ok(auth_error_response(e)),
            }
        })
    }
}

// =============================================================================
// Axum Extractors
// =============================================================================

/// Extractor for the authenticated principal; 401 when absent
pub struct RequireAuth(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| auth_error_response(AuthError::Unauthenticated))
    }
}

/// Extractor for an optional principal
pub struct MaybeAuth(pub Option<Principal>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(parts.extensions.get::<Principal>().cloned()))
    }
}
