//! Authentication and authorization failures
//!
//! Every variant maps to one HTTP status and one stable machine code. Client
//! messages never carry token, hash or store detail.

use medicore_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Missing or malformed request input
    #[error("{0}")]
    BadRequest(String),

    /// Password does not meet requirements
    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    /// Hard-delete confirmation phrase did not match
    #[error("Confirmation phrase does not match")]
    ConfirmationMismatch,

    // =========================================================================
    // Credential Errors
    // =========================================================================
    /// No credential presented
    #[error("Authentication required")]
    Unauthenticated,

    /// Invalid credentials (email/password)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token is invalid (malformed, wrong signature, etc.)
    #[error("Invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token type mismatch (expected access, got refresh, etc.)
    #[error("Invalid token type")]
    InvalidTokenType,

    /// Refresh token absent, unknown, reused or expired
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Account is deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// Federated sign-in could not be completed
    #[error("Federated sign-in failed: {0}")]
    Federation(String),

    // =========================================================================
    // Permission Errors
    // =========================================================================
    /// Account behind a valid token has been soft-deleted
    #[error("Account has been deleted")]
    AccountDeleted,

    /// Principal lacks the required role or capability
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// Target account may only be managed by a SuperAdmin
    #[error("Only a SuperAdmin may manage this account")]
    ProtectedAccount,

    // =========================================================================
    // Resource Errors
    // =========================================================================
    /// Account not found
    #[error("Account not found")]
    AccountNotFound,

    /// Session not found
    #[error("Session not found")]
    SessionNotFound,

    /// Email already registered
    #[error("Email is already registered")]
    EmailTaken,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Store error
    #[error("Database error: {0}")]
    Database(String),

    /// Password or token hashing failed
    #[error("Password hashing failed")]
    PasswordHashingFailed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not be exposed to clients)
    #[error("Internal error")]
    Internal(String),
}

impl AuthError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::BadRequest(_) | Self::WeakPassword(_) | Self::ConfirmationMismatch => 400,

            // 401 Unauthorized
            Self::Unauthenticated
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidTokenType
            | Self::InvalidRefreshToken
            | Self::AccountDisabled
            | Self::Federation(_) => 401,

            // 403 Forbidden
            Self::AccountDeleted | Self::InsufficientPermissions | Self::ProtectedAccount => 403,

            // 404 Not Found
            Self::AccountNotFound | Self::SessionNotFound => 404,

            // 409 Conflict
            Self::EmailTaken => 409,

            // 500 Internal Server Error
            Self::Database(_) | Self::PasswordHashingFailed | Self::Config(_) | Self::Internal(_) => {
                500
            }
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::ConfirmationMismatch => "CONFIRMATION_MISMATCH",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::Federation(_) => "FEDERATION_FAILED",
            Self::AccountDeleted => "ACCOUNT_DELETED",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::ProtectedAccount => "PROTECTED_ACCOUNT",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::Database(_)
            | Self::PasswordHashingFailed
            | Self::Config(_)
            | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Store or hashing failure rather than a client mistake
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message shown to clients
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_)
            | Self::PasswordHashingFailed
            | Self::Config(_)
            | Self::Internal(_) => "An internal error occurred".to_string(),
            // Provider responses can carry token material
            Self::Federation(_) => "Federated sign-in failed".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Error response for API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub code: String,
    /// Error message (human-readable)
    pub message: String,
}

impl From<&AuthError> for ErrorResponse {
    fn from(error: &AuthError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.client_message(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(_) => Self::EmailTaken,
            DbError::NotFound(_) => Self::AccountNotFound,
            other => Self::Database(other.to_string()),
        }
    }
}
