//! Authentication DTOs

use medicore_auth::{AuthOutcome, RegisterInput};
use medicore_types::{Department, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::account::AccountResponse;

// =============================================================================
// Registration / Login
// =============================================================================

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    /// Email address
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// Password; strength is checked by the password policy
    pub password: String,
    /// Phone number
    #[serde(default)]
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
    /// Requested role, defaults to Patient
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "Patient")]
    pub role: Option<Role>,
    /// Department, defaults to None
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "Cardiology")]
    pub department: Option<Department>,
}

impl From<RegisterRequest> for RegisterInput {
    fn from(request: RegisterRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            password: request.password,
            phone: request.phone.filter(|p| !p.trim().is_empty()),
            role: request.role,
            department: request.department,
        }
    }
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Email address
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body returned by register, login and refresh. The refresh token is only
/// ever sent as a cookie.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Short-lived bearer token
    pub access_token: String,
    /// Signed-in account
    pub user: AccountResponse,
}

impl From<AuthOutcome> for AuthResponse {
    fn from(outcome: AuthOutcome) -> Self {
        Self {
            access_token: outcome.access_token,
            user: outcome.account.into(),
        }
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Live session of the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: uuid::Uuid,
    /// Device label
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Whether this is the session of the presented refresh cookie
    pub current: bool,
}

impl From<medicore_auth::SessionView> for SessionResponse {
    fn from(view: medicore_auth::SessionView) -> Self {
        Self {
            id: view.id,
            device: view.device,
            ip_address: view.ip_address,
            created_at: view.created_at,
            expires_at: view.expires_at,
            current: view.current,
        }
    }
}

/// Result of revoking sessions
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevokedResponse {
    /// Number of sessions removed
    pub revoked: u64,
}

// =============================================================================
// Federated sign-in
// =============================================================================

/// Query string of the provider callback
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
