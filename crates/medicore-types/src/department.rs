//! Hospital departments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TagError;

/// Department an account is attached to. Accounts outside any department
/// (patients, most administrators) carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Department {
    #[default]
    None,
    Emergency,
    Cardiology,
    Neurology,
    Orthopedics,
    Pediatrics,
    Radiology,
    Laboratory,
    Pharmacy,
    Administration,
}

impl Department {
    pub const ALL: [Department; 10] = [
        Department::None,
        Department::Emergency,
        Department::Cardiology,
        Department::Neurology,
        Department::Orthopedics,
        Department::Pediatrics,
        Department::Radiology,
        Department::Laboratory,
        Department::Pharmacy,
        Department::Administration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Emergency => "Emergency",
            Self::Cardiology => "Cardiology",
            Self::Neurology => "Neurology",
            Self::Orthopedics => "Orthopedics",
            Self::Pediatrics => "Pediatrics",
            Self::Radiology => "Radiology",
            Self::Laboratory => "Laboratory",
            Self::Pharmacy => "Pharmacy",
            Self::Administration => "Administration",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| TagError::UnknownDepartment(s.to_string()))
    }
}
