//! Named capabilities
//!
//! A capability is a permission granted to a role through the permission
//! table (see `medicore-auth::policy`). Names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TagError;

/// Named permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    // Account administration
    ManageUsers,
    ViewUsers,
    ManageDepartments,

    // Clinical
    ViewPatients,
    ManagePatients,
    ViewAppointments,
    ManageAppointments,
    ViewMedicalRecords,
    EditMedicalRecords,
    DispenseMedication,

    // Finance
    ViewBilling,
    ManageBilling,

    // Reporting & feeds
    ViewReports,
    ExportData,
    ViewActivityLog,
    SendNotifications,
}

impl Capability {
    pub const ALL: [Capability; 16] = [
        Capability::ManageUsers,
        Capability::ViewUsers,
        Capability::ManageDepartments,
        Capability::ViewPatients,
        Capability::ManagePatients,
        Capability::ViewAppointments,
        Capability::ManageAppointments,
        Capability::ViewMedicalRecords,
        Capability::EditMedicalRecords,
        Capability::DispenseMedication,
        Capability::ViewBilling,
        Capability::ManageBilling,
        Capability::ViewReports,
        Capability::ExportData,
        Capability::ViewActivityLog,
        Capability::SendNotifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageUsers => "manageUsers",
            Self::ViewUsers => "viewUsers",
            Self::ManageDepartments => "manageDepartments",
            Self::ViewPatients => "viewPatients",
            Self::ManagePatients => "managePatients",
            Self::ViewAppointments => "viewAppointments",
            Self::ManageAppointments => "manageAppointments",
            Self::ViewMedicalRecords => "viewMedicalRecords",
            Self::EditMedicalRecords => "editMedicalRecords",
            Self::DispenseMedication => "dispenseMedication",
            Self::ViewBilling => "viewBilling",
            Self::ManageBilling => "manageBilling",
            Self::ViewReports => "viewReports",
            Self::ExportData => "exportData",
            Self::ViewActivityLog => "viewActivityLog",
            Self::SendNotifications => "sendNotifications",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TagError::UnknownCapability(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for cap in Capability::ALL {
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{}\"", cap.as_str()));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("manageUsers".parse::<Capability>(), Ok(Capability::ManageUsers));
        assert!("launchMissiles".parse::<Capability>().is_err());
    }
}
