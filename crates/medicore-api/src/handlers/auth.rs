//! Authentication Handlers
//!
//! Register, login, refresh and logout, plus the caller's own account and
//! session list. Access tokens are returned in the body; the refresh token
//! only ever travels in the http-only cookie.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use medicore_auth::{AccountEvent, AuthError, AuthOutcome, RequireAuth};
use std::sync::Arc;
use uuid::Uuid;

use crate::cookies;
use crate::dto::{
    AccountResponse, AuthResponse, LoginRequest, RegisterRequest, RevokedResponse,
    SessionResponse, SuccessResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{ClientMeta, ValidatedJson};
use crate::state::AppState;

/// Attach the refresh cookie for a fresh outcome
fn sign_in_response(state: &AppState, jar: CookieJar, outcome: AuthOutcome) -> (CookieJar, Json<AuthResponse>) {
    let config = state.auth.config();
    let jar = cookies::set_refresh(
        jar,
        &config.cookie,
        &outcome.refresh,
        config.jwt.refresh_token_lifetime,
    );
    (jar, Json(AuthResponse::from(outcome)))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "Invalid input or weak password"),
        (status = 403, description = "Role may not be self-assigned"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientMeta(ctx): ClientMeta,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let outcome = state.auth.register(request.into(), &ctx).await?;
    let (jar, body) = sign_in_response(&state, jar, outcome);
    Ok((StatusCode::CREATED, jar, body))
}

/// Password login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientMeta(ctx): ClientMeta,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let outcome = state
        .auth
        .login(&request.email, &request.password, &ctx)
        .await?;
    Ok(sign_in_response(&state, jar, outcome))
}

/// Exchange the refresh cookie for a new access token and a rotated cookie
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    responses(
        (status = 200, description = "Token refreshed", body = AuthResponse),
        (status = 401, description = "Missing, reused or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientMeta(ctx): ClientMeta,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), (CookieJar, ApiError)> {
    let cookie_config = &state.auth.config().cookie;
    let presented = cookies::refresh_token(&jar, cookie_config).map(str::to_string);

    match state.auth.refresh(presented.as_deref(), &ctx).await {
        Ok(outcome) => Ok(sign_in_response(&state, jar, outcome)),
        Err(e) => {
            // A dead cookie is useless to the client; drop it
            let jar = if presented.is_some() {
                cookies::clear_auth(jar, cookie_config)
            } else {
                jar
            };
            Err((jar, e.into()))
        }
    }
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Authentication",
    responses(
        (status = 200, description = "Logged out", body = SuccessResponse)
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    let cookie_config = &state.auth.config().cookie;
    state
        .auth
        .logout(cookies::refresh_token(&jar, cookie_config))
        .await;

    let jar = cookies::clear_auth(jar, cookie_config);
    (jar, Json(SuccessResponse::with_message("Logged out")))
}

/// Account of the caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = []))
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
) -> ApiResult<Json<AccountResponse>> {
    let account = state
        .store()
        .find_by_id(principal.account_id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    Ok(Json(account.into()))
}

/// Live sessions of the caller, newest first
#[utoipa::path(
    get,
    path = "/api/auth/sessions",
    tag = "Sessions",
    responses(
        (status = 200, description = "Live sessions", body = Vec<SessionResponse>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = []))
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    jar: CookieJar,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let current = current_session(&state, &jar, principal.account_id);
    let sessions = state
        .auth
        .sessions
        .list(principal.account_id, current)
        .await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// Revoke one session of the caller
#[utoipa::path(
    delete,
    path = "/api/auth/sessions/{id}",
    tag = "Sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session revoked", body = SuccessResponse),
        (status = 404, description = "No such session")
    ),
    security(("bearer" = []))
)]
pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    WithRejection(Path(session_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<SuccessResponse>> {
    state
        .auth
        .sessions
        .revoke_one(principal.account_id, session_id)
        .await?;

    tracing::info!(
        account_id = %principal.account_id,
        session_id = %session_id,
        "Session revoked"
    );
    state.auth.publish(AccountEvent::SessionsRevoked {
        account_id: principal.account_id,
        count: 1,
    });

    Ok(Json(SuccessResponse::ok()))
}

/// Sign out everywhere except the current session
#[utoipa::path(
    post,
    path = "/api/auth/sessions/revoke-others",
    tag = "Sessions",
    responses(
        (status = 200, description = "Other sessions revoked", body = RevokedResponse)
    ),
    security(("bearer" = []))
)]
pub async fn revoke_other_sessions(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    jar: CookieJar,
) -> ApiResult<Json<RevokedResponse>> {
    let keep = current_session(&state, &jar, principal.account_id);
    let revoked = state
        .auth
        .sessions
        .revoke_others(principal.account_id, keep)
        .await?;

    tracing::info!(account_id = %principal.account_id, revoked, "Other sessions revoked");
    if revoked > 0 {
        state.auth.publish(AccountEvent::SessionsRevoked {
            account_id: principal.account_id,
            count: revoked,
        });
    }

    Ok(Json(RevokedResponse { revoked }))
}

/// Session id of the caller's refresh cookie
pub(crate) fn current_session(state: &AppState, jar: &CookieJar, account_id: Uuid) -> Option<Uuid> {
    cookies::refresh_token(jar, &state.auth.config().cookie)
        .and_then(|raw| state.auth.sessions.session_id_of(raw, account_id))
}
