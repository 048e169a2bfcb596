//! Self-service account handlers

use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use medicore_auth::{AccountEvent, RequireAuth};
use std::sync::Arc;

use crate::dto::{AccountResponse, ChangePasswordRequest, RevokedResponse, UpdateProfileRequest};
use crate::error::{ApiError, ApiResult};
use crate::extractors::ValidatedJson;
use crate::handlers::auth::current_session;
use crate::state::AppState;

/// Update the caller's own profile
#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "Accounts",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AccountResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("bearer" = []))
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let patch = request.into_patch();
    if patch.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".to_string()));
    }

    let account = state
        .store()
        .update_account(principal.account_id, patch)
        .await?;

    state.auth.publish(AccountEvent::AccountUpdated {
        account_id: account.id,
        actor_id: principal.account_id,
    });

    Ok(Json(account.into()))
}

/// Change the caller's password; every other session is signed out
#[utoipa::path(
    post,
    path = "/api/users/me/password",
    tag = "Accounts",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = RevokedResponse),
        (status = 400, description = "Weak password or missing current password"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer" = []))
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<RevokedResponse>> {
    let keep = current_session(&state, &jar, principal.account_id);
    let revoked = state
        .auth
        .change_password(
            principal.account_id,
            request.current_password.as_deref(),
            &request.new_password,
            keep,
        )
        .await?;

    Ok(Json(RevokedResponse { revoked }))
}
