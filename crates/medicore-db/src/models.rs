//! Account and refresh-session models
//!
//! `Account` is the public projection: it never carries the password hash or
//! the session list. Credentials and sessions are loaded through dedicated
//! store calls so that a plain lookup cannot leak them.

use chrono::{DateTime, Utc};
use medicore_types::{Department, Role};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DbError;

// ============================================================================
// Domain Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Department,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Account together with its credential, for password login only
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account: Account,
    /// Absent for accounts that only ever signed in through a federated provider
    pub password_hash: Option<String>,
}

/// One issued refresh token, stored by hash only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSession {
    pub id: Uuid,
    pub token_hash: String,
    pub device: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub department: Department,
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub department: Option<Department>,
    pub is_active: Option<bool>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.role.is_none()
            && self.department.is_none()
            && self.is_active.is_none()
    }

    pub(crate) fn apply(&self, account: &mut Account) {
        if let Some(ref name) = self.name {
            account.name = name.clone();
        }
        if let Some(ref phone) = self.phone {
            account.phone = phone.clone();
        }
        if let Some(role) = self.role {
            account.role = role;
        }
        if let Some(department) = self.department {
            account.department = department;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
    }
}

/// Listing filter
#[derive(Debug, Clone)]
pub struct AccountFilter {
    pub role: Option<Role>,
    pub department: Option<Department>,
    /// Case-insensitive substring match on name or email
    pub search: Option<String>,
    pub include_deleted: bool,
    pub offset: i64,
    pub limit: i64,
}

impl Default for AccountFilter {
    fn default() -> Self {
        Self {
            role: None,
            department: None,
            search: None,
            include_deleted: false,
            offset: 0,
            limit: 50,
        }
    }
}

/// Result of an attempted session rotation
#[derive(Debug, Clone, PartialEq)]
pub enum RotateOutcome {
    /// The presented entry existed, passed the check, and was replaced
    Rotated { previous: RefreshSession },
    /// The entry was missing or failed the check; nothing changed
    Rejected,
}

/// Emails are unique case-insensitively; everything is stored lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// Row Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub department: String,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbAccount {
    pub fn into_credentials(self) -> Result<AccountCredentials, DbError> {
        let password_hash = self.password_hash.clone();
        Ok(AccountCredentials {
            account: Account::try_from(self)?,
            password_hash,
        })
    }
}

impl TryFrom<DbAccount> for Account {
    type Error = DbError;

    fn try_from(row: DbAccount) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let department = row
            .department
            .parse::<Department>()
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        Ok(Account {
            id: row.id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            role,
            department,
            is_active: row.is_active,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSession {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub device: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<DbSession> for RefreshSession {
    fn from(row: DbSession) -> Self {
        Self {
            id: row.id,
            token_hash: row.token_hash,
            device: row.device,
            ip_address: row.ip_address,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}
