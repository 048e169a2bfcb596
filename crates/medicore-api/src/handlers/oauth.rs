//! Federated sign-in (OAuth authorization-code grant)
//!
//! Both routes answer with a 302. The callback never renders an error body:
//! every failure lands on `<frontend>/login?error=oauth_failed`.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use medicore_auth::federation::generate_state;
use medicore_auth::{AuthError, AuthOutcome};
use std::sync::Arc;

use crate::cookies;
use crate::dto::OAuthCallbackQuery;
use crate::error::ApiError;
use crate::extractors::ClientMeta;
use crate::state::AppState;

/// 302 Found to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn frontend(state: &AppState) -> &str {
    state.auth.config().oauth.frontend_url.trim_end_matches('/')
}

fn failure_url(state: &AppState) -> String {
    format!("{}/login?error=oauth_failed", frontend(state))
}

/// Access tokens are base64url segments joined by dots and need no escaping
fn success_url(state: &AppState, access_token: &str) -> String {
    format!("{}/oauth/success?token={}", frontend(state), access_token)
}

/// Start federated sign-in with Google
#[utoipa::path(
    get,
    path = "/api/auth/google",
    tag = "Authentication",
    responses(
        (status = 302, description = "Redirect to the provider"),
        (status = 404, description = "Federated sign-in is not configured")
    )
)]
pub async fn google_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), ApiError> {
    let provider = state
        .identity
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("federated sign-in is not configured".to_string()))?;

    let oauth_state = generate_state();
    let config = state.auth.config();
    let jar = jar.add(cookies::oauth_state_cookie(
        &config.cookie,
        &config.oauth,
        &oauth_state,
    ));

    tracing::debug!(provider = provider.name(), "Starting federated sign-in");
    Ok((jar, found(&provider.authorization_url(&oauth_state))))
}

/// Provider callback
#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    tag = "Authentication",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State echoed by the provider")
    ),
    responses(
        (status = 302, description = "Redirect to the front end")
    )
)]
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    ClientMeta(ctx): ClientMeta,
    jar: CookieJar,
    query: Result<Query<OAuthCallbackQuery>, QueryRejection>,
) -> (CookieJar, Response) {
    let config = state.auth.config();
    let expected = jar.get(&config.oauth.state_cookie).map(|c| c.value().to_string());
    let jar = cookies::clear_oauth_state(jar, &config.cookie, &config.oauth);

    let result = match query {
        Ok(Query(query)) => complete(&state, expected.as_deref(), query, &ctx).await,
        Err(rejection) => Err(AuthError::Federation(format!(
            "malformed callback query: {}",
            rejection.body_text()
        ))),
    };

    match result {
        Ok(outcome) => {
            let jar = cookies::set_refresh(
                jar,
                &config.cookie,
                &outcome.refresh,
                config.jwt.refresh_token_lifetime,
            );
            let location = success_url(&state, &outcome.access_token);
            (jar, found(&location))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Federated sign-in failed");
            (jar, found(&failure_url(&state)))
        }
    }
}

async fn complete(
    state: &AppState,
    expected_state: Option<&str>,
    query: OAuthCallbackQuery,
    ctx: &medicore_auth::ClientContext,
) -> Result<AuthOutcome, AuthError> {
    let provider = state
        .identity
        .as_ref()
        .ok_or_else(|| AuthError::Federation("not configured".to_string()))?;

    if let Some(error) = query.error {
        return Err(AuthError::Federation(format!("provider returned {}", error)));
    }

    match (expected_state, query.state.as_deref()) {
        (Some(expected), Some(presented)) if !expected.is_empty() && expected == presented => {}
        _ => return Err(AuthError::Federation("state mismatch".to_string())),
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::Federation("missing code".to_string()))?;

    let profile = provider.exchange_code(&code).await?;
    state.auth.federated_login(profile, ctx).await
}
