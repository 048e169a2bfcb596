//! Tag parsing errors

use thiserror::Error;

/// Error returned when a string does not name a member of a closed enumeration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown department: {0}")]
    UnknownDepartment(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),
}
