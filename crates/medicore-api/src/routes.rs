//! API Routes
//!
//! Route table for everything under `/api`. Authentication is a route layer
//! on the protected groups; role and capability gates are route layers on the
//! sub-routers that need them, so an unmatched path still falls through to
//! the 404 fallback instead of a 401.

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use medicore_auth::GateLayer;
use medicore_types::{Capability, Role};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::handlers;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Routes mounted under `/api`
pub fn api_routes(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth_routes(state))
        .nest("/users", user_routes(state))
        .nest("/meta", meta_routes())
}

/// Authentication and session routes
fn auth_routes(state: &AppState) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route("/google", get(handlers::oauth::google_start))
        .route("/google/callback", get(handlers::oauth::google_callback));

    let protected = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/sessions", get(handlers::auth::list_sessions))
        .route("/sessions/revoke-others", post(handlers::auth::revoke_other_sessions))
        .route("/sessions/:id", delete(handlers::auth::revoke_session))
        .route_layer(state.auth.required_layer());

    public.merge(protected)
}

/// Account management routes; all require authentication
fn user_routes(state: &AppState) -> Router<Arc<AppState>> {
    let viewers = Router::new()
        .route("/", get(handlers::admin::list_accounts))
        .route_layer(GateLayer::capability(Capability::ViewUsers));

    let admins = Router::new()
        .route("/", post(handlers::admin::create_account))
        .route("/:id", patch(handlers::admin::update_account))
        .route("/:id/restore", post(handlers::admin::restore_account))
        .route("/:id/permanent", delete(handlers::admin::purge_account))
        .route_layer(GateLayer::roles(&[Role::Admin]));

    let members = Router::new()
        .route("/me", patch(handlers::account::update_me))
        .route("/me/password", post(handlers::account::change_password))
        .route(
            "/:id",
            get(handlers::admin::get_account).delete(handlers::admin::delete_account),
        );

    viewers
        .merge(admins)
        .merge(members)
        .route_layer(state.auth.required_layer())
}

/// Static enumerations; public
fn meta_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/roles", get(handlers::meta::roles))
        .route("/departments", get(handlers::meta::departments))
        .route("/permissions", get(handlers::meta::permissions))
}

/// Machine-readable API description
pub fn docs_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
