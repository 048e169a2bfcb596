//! Account DTOs

use chrono::{DateTime, Utc};
use medicore_auth::AccountView;
use medicore_db::{Account, AccountFilter, AccountPatch};
use medicore_types::{Department, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::extractors::PaginationParams;

/// Account as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[schema(value_type = String, example = "Doctor")]
    pub role: Role,
    #[schema(value_type = String, example = "Cardiology")]
    pub department: Department,
    pub is_active: bool,
    /// Set when the account is soft-deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountView> for AccountResponse {
    fn from(view: AccountView) -> Self {
        Self {
            id: view.id,
            email: view.email,
            name: view.name,
            phone: view.phone,
            role: view.role,
            department: view.department,
            is_active: view.is_active,
            deleted_at: view.deleted_at,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountView::from(account).into()
    }
}

// =============================================================================
// Self-service
// =============================================================================

/// Profile update by the account holder
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
    /// Empty string clears the phone number
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
}

impl UpdateProfileRequest {
    pub fn into_patch(self) -> AccountPatch {
        AccountPatch {
            name: self.name.map(|n| n.trim().to_string()),
            phone: self
                .phone
                .map(|p| Some(p.trim().to_string()).filter(|p| !p.is_empty())),
            ..Default::default()
        }
    }
}

/// Password change
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Required unless the account has no password yet
    pub current_password: Option<String>,
    pub new_password: String,
}

// =============================================================================
// Administration
// =============================================================================

/// Account provisioned by an administrator
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
    #[schema(value_type = String, example = "Nurse")]
    pub role: Role,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "Emergency")]
    pub department: Option<Department>,
}

/// Administrative update of role, department or activation
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateRequest {
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
    #[schema(value_type = Option<String>)]
    pub department: Option<Department>,
    pub is_active: Option<bool>,
}

impl AdminUpdateRequest {
    pub fn into_patch(self) -> AccountPatch {
        AccountPatch {
            role: self.role,
            department: self.department,
            is_active: self.is_active,
            ..Default::default()
        }
    }
}

/// Hard delete confirmation; must read exactly `DELETE <id>`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct HardDeleteRequest {
    pub confirmation: Option<String>,
}

/// Account listing query
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ListAccountsQuery {
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
    #[schema(value_type = Option<String>)]
    pub department: Option<Department>,
    /// Substring of name or email
    #[validate(length(max = 120, message = "Search must be at most 120 characters"))]
    pub search: Option<String>,
    /// Administrators only
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl ListAccountsQuery {
    pub fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }

    pub fn into_filter(self, allow_deleted: bool) -> AccountFilter {
        let pagination = self.pagination();
        AccountFilter {
            role: self.role,
            department: self.department,
            search: self.search.filter(|s| !s.trim().is_empty()),
            include_deleted: self.include_deleted && allow_deleted,
            offset: pagination.offset(),
            limit: pagination.limit(),
        }
    }
}
