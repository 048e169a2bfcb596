//! Static enumerations for front ends

use medicore_auth::policy;
use medicore_types::{Capability, Department, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A role and what it may do
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleInfo {
    #[schema(value_type = String, example = "Nurse")]
    pub name: Role,
    /// Capabilities granted by the permission table
    #[schema(value_type = Vec<String>)]
    pub capabilities: Vec<Capability>,
}

impl RoleInfo {
    pub fn new(role: Role) -> Self {
        Self {
            name: role,
            capabilities: policy::capabilities_for(role).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolesResponse {
    pub roles: Vec<RoleInfo>,
}

impl RolesResponse {
    pub fn all() -> Self {
        Self {
            roles: Role::ALL.into_iter().map(RoleInfo::new).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepartmentsResponse {
    #[schema(value_type = Vec<String>)]
    pub departments: Vec<Department>,
}

impl DepartmentsResponse {
    pub fn all() -> Self {
        Self {
            departments: Department::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionsResponse {
    /// Every capability name
    #[schema(value_type = Vec<String>)]
    pub capabilities: Vec<Capability>,
}

impl PermissionsResponse {
    pub fn all() -> Self {
        Self {
            capabilities: Capability::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_admin_lists_every_capability() {
        let roles = RolesResponse::all();
        assert_eq!(roles.roles.len(), Role::ALL.len());
        assert_eq!(roles.roles[0].name, Role::SuperAdmin);
        assert_eq!(roles.roles[0].capabilities.len(), Capability::ALL.len());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(RoleInfo::new(Role::Pharmacist)).unwrap();
        assert_eq!(json["name"], "Pharmacist");
        assert!(json["capabilities"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "dispenseMedication"));
    }
}
