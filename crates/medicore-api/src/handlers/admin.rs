//! Account management
//!
//! Role and capability gates sit on the routes; the rules that depend on the
//! target account (SuperAdmin protection, Patient self-delete, the hard-delete
//! phrase) are checked here against the stored target.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use medicore_auth::{policy, AccountEvent, AuthError, Principal, RequireAuth};
use medicore_db::{Account, NewAccount};
use medicore_types::Capability;
use std::sync::Arc;
use uuid::Uuid;

use crate::cookies;
use crate::dto::{
    AccountResponse, AdminUpdateRequest, CreateAccountRequest, HardDeleteRequest,
    ListAccountsQuery, PaginatedResponse, SuccessResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{ValidatedJson, ValidatedQuery};
use crate::state::AppState;

type AccountId = WithRejection<Path<Uuid>, ApiError>;

async fn load(state: &AppState, id: Uuid) -> ApiResult<Account> {
    Ok(state
        .store()
        .find_by_id(id)
        .await?
        .ok_or(AuthError::AccountNotFound)?)
}

/// Live account; soft-deleted ones are reported missing
async fn load_live(state: &AppState, id: Uuid) -> ApiResult<Account> {
    let account = load(state, id).await?;
    ensure_live(&account)?;
    Ok(account)
}

fn ensure_live(account: &Account) -> ApiResult<()> {
    if account.is_deleted() {
        return Err(AuthError::AccountNotFound.into());
    }
    Ok(())
}

/// List accounts
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Accounts",
    params(
        ("role" = Option<String>, Query, description = "Filter by role"),
        ("department" = Option<String>, Query, description = "Filter by department"),
        ("search" = Option<String>, Query, description = "Substring of name or email"),
        ("include_deleted" = Option<bool>, Query, description = "Administrators only"),
        ("page" = Option<i64>, Query, description = "Page, 1-indexed"),
        ("limit" = Option<i64>, Query, description = "Page size, at most 100")
    ),
    responses(
        (status = 200, description = "Accounts", body = PaginatedAccounts),
        (status = 403, description = "Missing viewUsers")
    ),
    security(("bearer" = []))
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    ValidatedQuery(query): ValidatedQuery<ListAccountsQuery>,
) -> ApiResult<Json<PaginatedResponse<AccountResponse>>> {
    let pagination = query.pagination();
    let filter = query.into_filter(principal.role.is_administrator());

    let accounts = state.store().list_accounts(&filter).await?;
    let data = accounts.into_iter().map(AccountResponse::from).collect();

    Ok(Json(PaginatedResponse::new(
        data,
        pagination.page.max(1),
        pagination.limit(),
    )))
}

/// Fetch one account: the caller's own, or any with `viewUsers`
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = AccountResponse),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "No such account")
    ),
    security(("bearer" = []))
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    WithRejection(Path(id), _): AccountId,
) -> ApiResult<Json<AccountResponse>> {
    if principal.account_id != id {
        policy::check_capability(&principal, Capability::ViewUsers)?;
    }

    let account = if principal.role.is_administrator() {
        load(&state, id).await?
    } else {
        load_live(&state, id).await?
    };
    Ok(Json(account.into()))
}

/// Provision an account
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 403, description = "Only a SuperAdmin may create a SuperAdmin"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer" = []))
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    ValidatedJson(request): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    policy::check_assign_role(&principal, request.role)?;

    let password_hash = state.auth.password.hash_password(&request.password)?;
    let account = state
        .store()
        .create_account(NewAccount {
            email: request.email,
            name: request.name.trim().to_string(),
            phone: request.phone.filter(|p| !p.trim().is_empty()),
            password_hash: Some(password_hash),
            role: request.role,
            department: request.department.unwrap_or_default(),
        })
        .await?;

    tracing::info!(
        account_id = %account.id,
        role = %account.role,
        actor_id = %principal.account_id,
        "Account provisioned"
    );
    state.auth.publish(AccountEvent::Registered {
        account_id: account.id,
        role: account.role,
    });

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Change role, department or activation
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = AdminUpdateRequest,
    responses(
        (status = 200, description = "Account updated", body = AccountResponse),
        (status = 403, description = "Target or new role is protected"),
        (status = 404, description = "No such account")
    ),
    security(("bearer" = []))
)]
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    WithRejection(Path(id), _): AccountId,
    ValidatedJson(request): ValidatedJson<AdminUpdateRequest>,
) -> ApiResult<Json<AccountResponse>> {
    // Protection is decided before deletion state is revealed
    let target = load(&state, id).await?;
    policy::check_manage_target(&principal, target.role)?;
    ensure_live(&target)?;
    if let Some(role) = request.role {
        policy::check_assign_role(&principal, role)?;
    }

    let patch = request.into_patch();
    if patch.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".to_string()));
    }
    let deactivated = patch.is_active == Some(false) && target.is_active;

    let account = state.store().update_account(id, patch).await?;
    if deactivated {
        let revoked = state.auth.sessions.revoke_others(id, None).await?;
        tracing::info!(account_id = %id, revoked, "Account deactivated");
    }

    tracing::info!(
        account_id = %id,
        role = %account.role,
        actor_id = %principal.account_id,
        "Account updated"
    );
    state.auth.publish(AccountEvent::AccountUpdated {
        account_id: id,
        actor_id: principal.account_id,
    });

    Ok(Json(account.into()))
}

/// Soft delete
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account soft-deleted", body = SuccessResponse),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "No such account")
    ),
    security(("bearer" = []))
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    WithRejection(Path(id), _): AccountId,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<SuccessResponse>)> {
    let target = load(&state, id).await?;
    policy::check_soft_delete(&principal, target.id, target.role)?;
    ensure_live(&target)?;

    state.store().soft_delete(id, principal.account_id).await?;

    tracing::info!(account_id = %id, actor_id = %principal.account_id, "Account soft-deleted");
    state.auth.publish(AccountEvent::AccountDeleted {
        account_id: id,
        actor_id: principal.account_id,
        permanent: false,
    });

    let jar = if is_self(&principal, id) {
        cookies::clear_auth(jar, &state.auth.config().cookie)
    } else {
        jar
    };
    Ok((jar, Json(SuccessResponse::with_message("Account deleted"))))
}

/// Undo a soft delete
#[utoipa::path(
    post,
    path = "/api/users/{id}/restore",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account restored", body = AccountResponse),
        (status = 400, description = "Account is not deleted"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "No such account")
    ),
    security(("bearer" = []))
)]
pub async fn restore_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    WithRejection(Path(id), _): AccountId,
) -> ApiResult<Json<AccountResponse>> {
    let target = load(&state, id).await?;
    policy::check_manage_target(&principal, target.role)?;
    if !target.is_deleted() {
        return Err(ApiError::BadRequest("account is not deleted".to_string()));
    }

    let account = state.store().restore(id).await?;

    tracing::info!(account_id = %id, actor_id = %principal.account_id, "Account restored");
    state.auth.publish(AccountEvent::AccountRestored {
        account_id: id,
        actor_id: principal.account_id,
    });

    Ok(Json(account.into()))
}

/// Permanently remove an account
#[utoipa::path(
    delete,
    path = "/api/users/{id}/permanent",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = HardDeleteRequest,
    responses(
        (status = 200, description = "Account removed", body = SuccessResponse),
        (status = 400, description = "Confirmation phrase does not match"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "No such account")
    ),
    security(("bearer" = []))
)]
pub async fn purge_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    WithRejection(Path(id), _): AccountId,
    ValidatedJson(request): ValidatedJson<HardDeleteRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let target = load(&state, id).await?;
    policy::check_manage_target(&principal, target.role)?;
    policy::check_confirmation(id, request.confirmation.as_deref())?;

    state.store().hard_delete(id).await?;

    tracing::warn!(account_id = %id, actor_id = %principal.account_id, "Account permanently deleted");
    state.auth.publish(AccountEvent::AccountDeleted {
        account_id: id,
        actor_id: principal.account_id,
        permanent: true,
    });

    Ok(Json(SuccessResponse::with_message("Account permanently deleted")))
}

fn is_self(principal: &Principal, id: Uuid) -> bool {
    principal.account_id == id
}
