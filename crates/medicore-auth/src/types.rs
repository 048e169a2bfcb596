//! Core authentication types
//!
//! Shared types used across all authentication components.

use chrono::{DateTime, Utc};
use medicore_db::{Account, RefreshSession};
use medicore_types::{Department, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Principal
// =============================================================================

/// Authenticated account resolved for the duration of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub department: Department,
}

impl Principal {
    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }
}

impl From<&Account> for Principal {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            role: account.role,
            department: account.department,
        }
    }
}

// =============================================================================
// Public projections
// =============================================================================

/// Account as returned to clients; never carries credential or session data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    pub department: Department,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            phone: account.phone,
            role: account.role,
            department: account.department,
            is_active: account.is_active,
            deleted_at: account.deleted_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Live refresh session as shown to its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Session the request's refresh cookie belongs to
    pub current: bool,
}

impl SessionView {
    pub fn new(session: RefreshSession, current: Option<Uuid>) -> Self {
        Self {
            current: current == Some(session.id),
            id: session.id,
            device: session.device,
            ip_address: session.ip_address,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

// =============================================================================
// Token Types
// =============================================================================

/// Token type enum for JWT claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account ID)
    pub sub: String,
    /// Account role at issue time
    pub role: Role,
    /// Token type
    pub typ: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// JWT ID (unique identifier)
    pub jti: String,
}

/// Refresh token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (account ID)
    pub sub: String,
    /// Session ID, matches one entry of the account's session list
    pub sid: String,
    /// Token type
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
    pub jti: String,
}

impl RefreshClaims {
    pub fn account_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sid).ok()
    }
}

/// Freshly signed refresh token
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// Raw token; goes to the client cookie only
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Gateway Types
// =============================================================================

/// Request metadata recorded on new session entries
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    /// Explicit device label supplied by the client
    pub device: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientContext {
    /// Device label for a new session: explicit label, else derived from the
    /// user agent, else "Unknown"
    pub fn device_label(&self) -> String {
        if let Some(device) = self.device.as_deref().map(str::trim) {
            if !device.is_empty() {
                return device.to_string();
            }
        }
        self.user_agent
            .as_deref()
            .map(describe_user_agent)
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    /// Defaults to `Role::Patient`
    pub role: Option<Role>,
    /// Defaults to `Department::None`
    pub department: Option<Department>,
}

/// Result of every token-minting gateway operation
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub access_token: String,
    pub refresh: IssuedRefreshToken,
    pub account: AccountView,
}

/// Identity asserted by a federated provider
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    /// Provider name, e.g. "google"
    pub provider: String,
    /// Provider-side subject identifier
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Short human-readable label for a user agent string
pub fn describe_user_agent(user_agent: &str) -> String {
    let ua = user_agent.trim();
    if ua.is_empty() {
        return "Unknown".to_string();
    }

    match (extract_browser(ua), extract_os(ua)) {
        (Some(browser), Some(os)) => format!("{} on {}", browser, os),
        (Some(browser), None) => browser.to_string(),
        (None, Some(os)) => os.to_string(),
        (None, None) if ua.contains("curl") || ua.contains("python") => "API client".to_string(),
        (None, None) => "Unknown".to_string(),
    }
}

fn extract_os(ua: &str) -> Option<&'static str> {
    // Check Android before Linux because Android UAs contain "Linux"
    if ua.contains("Android") {
        Some("Android")
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iOS") {
        Some("iOS")
    } else if ua.contains("Windows") {
        Some("Windows")
    } else if ua.contains("Mac OS") {
        Some("macOS")
    } else if ua.contains("Linux") {
        Some("Linux")
    } else {
        None
    }
}

fn extract_browser(ua: &str) -> Option<&'static str> {
    if ua.contains("Edg") {
        Some("Edge")
    } else if ua.contains("Firefox") {
        Some("Firefox")
    } else if ua.contains("Chrome") && !ua.contains("Chromium") {
        Some("Chrome")
    } else if ua.contains("Safari") {
        Some("Safari")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_user_agent_desktop() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
        assert_eq!(describe_user_agent(ua), "Chrome on Windows");
    }

    #[test]
    fn test_describe_user_agent_mobile() {
        let ua = "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.91 Mobile Safari/537.36";
        assert_eq!(describe_user_agent(ua), "Chrome on Android");
    }

    #[test]
    fn test_describe_user_agent_api_client() {
        assert_eq!(describe_user_agent("curl/8.4.0"), "API client");
        assert_eq!(describe_user_agent(""), "Unknown");
    }

    #[test]
    fn test_device_label_precedence() {
        let ctx = ClientContext {
            device: Some("Ward 3 tablet".to_string()),
            user_agent: Some("curl/8.4.0".to_string()),
            ip_address: None,
        };
        assert_eq!(ctx.device_label(), "Ward 3 tablet");

        let ctx = ClientContext {
            device: Some("   ".to_string()),
            user_agent: Some("curl/8.4.0".to_string()),
            ip_address: None,
        };
        assert_eq!(ctx.device_label(), "API client");

        assert_eq!(ClientContext::default().device_label(), "Unknown");
    }

    #[test]
    fn test_account_view_has_no_credentials() {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            name: "A".to_string(),
            phone: None,
            role: Role::Patient,
            department: Department::None,
            is_active: true,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(AccountView::from(account)).unwrap();
        assert_eq!(json["role"], "Patient");
        assert_eq!(json["department"], "None");
        assert_eq!(json["isActive"], true);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("sessions").is_none());
    }
}
