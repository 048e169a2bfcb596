//! Account roles
//!
//! Exactly one role per account. `SuperAdmin` is the top tier and passes every
//! role or capability gate; `Patient` is the lowest-privilege role and the
//! default for self-registration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TagError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    SuperAdmin,
    Admin,
    Doctor,
    Nurse,
    Pharmacist,
    Receptionist,
    LabTechnician,
    Accountant,
    #[default]
    Patient,
}

impl Role {
    /// Every role, highest privilege first
    pub const ALL: [Role; 9] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Pharmacist,
        Role::Receptionist,
        Role::LabTechnician,
        Role::Accountant,
        Role::Patient,
    ];

    /// Canonical wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SuperAdmin",
            Self::Admin => "Admin",
            Self::Doctor => "Doctor",
            Self::Nurse => "Nurse",
            Self::Pharmacist => "Pharmacist",
            Self::Receptionist => "Receptionist",
            Self::LabTechnician => "LabTechnician",
            Self::Accountant => "Accountant",
            Self::Patient => "Patient",
        }
    }

    /// Whether this is the top-tier role
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Admin or SuperAdmin
    pub fn is_administrator(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// Anyone who is not a patient
    pub fn is_staff(&self) -> bool {
        !matches!(self, Self::Patient)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| TagError::UnknownRole(s.to_string()))
    }
}
