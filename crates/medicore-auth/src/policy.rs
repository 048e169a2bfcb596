//! Authorization evaluator
//!
//! Pure functions over a compile-time permission table. `SuperAdmin` passes
//! every gate regardless of table contents. Adding a capability to a role is
//! a change to [`capabilities_for`] only.

use medicore_types::{Capability, Role};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::types::Principal;

use Capability::*;

const ADMIN: &[Capability] = &[
    ManageUsers,
    ViewUsers,
    ManageDepartments,
    ViewPatients,
    ManagePatients,
    ViewAppointments,
    ManageAppointments,
    ViewMedicalRecords,
    ViewBilling,
    ManageBilling,
    ViewReports,
    ExportData,
    ViewActivityLog,
    SendNotifications,
];

const DOCTOR: &[Capability] = &[
    ViewPatients,
    ManagePatients,
    ViewAppointments,
    ManageAppointments,
    ViewMedicalRecords,
    EditMedicalRecords,
    ViewReports,
];

const NURSE: &[Capability] = &[
    ViewPatients,
    ViewAppointments,
    ManageAppointments,
    ViewMedicalRecords,
    EditMedicalRecords,
];

const PHARMACIST: &[Capability] = &[ViewPatients, ViewMedicalRecords, DispenseMedication];

const RECEPTIONIST: &[Capability] = &[
    ViewPatients,
    ManagePatients,
    ViewAppointments,
    ManageAppointments,
];

const LAB_TECHNICIAN: &[Capability] = &[ViewPatients, ViewMedicalRecords, EditMedicalRecords];

const ACCOUNTANT: &[Capability] = &[ViewBilling, ManageBilling, ViewReports, ExportData];

const PATIENT: &[Capability] = &[ViewAppointments];

/// Permission table entry for a role.
///
/// `SuperAdmin` maps to the full list for display purposes; the gates do not
/// consult the table for it.
pub fn capabilities_for(role: Role) -> &'static [Capability] {
    match role {
        Role::SuperAdmin => &Capability::ALL,
        Role::Admin => ADMIN,
        Role::Doctor => DOCTOR,
        Role::Nurse => NURSE,
        Role::Pharmacist => PHARMACIST,
        Role::Receptionist => RECEPTIONIST,
        Role::LabTechnician => LAB_TECHNICIAN,
        Role::Accountant => ACCOUNTANT,
        Role::Patient => PATIENT,
    }
}

pub fn role_has(role: Role, capability: Capability) -> bool {
    role.is_super_admin() || capabilities_for(role).contains(&capability)
}

/// Role gate: passes when the principal's role is listed, or is SuperAdmin
pub fn check_roles(principal: &Principal, allowed: &[Role]) -> AuthResult<()> {
    if principal.is_super_admin() || allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

/// Capability gate: passes when the role's table entry holds the capability,
/// or the principal is SuperAdmin
pub fn check_capability(principal: &Principal, capability: Capability) -> AuthResult<()> {
    if role_has(principal.role, capability) {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

/// Capability gate by name; unknown names are denied
pub fn check_capability_named(principal: &Principal, name: &str) -> AuthResult<()> {
    if principal.is_super_admin() {
        return Ok(());
    }
    let capability = name
        .parse::<Capability>()
        .map_err(|_| AuthError::InsufficientPermissions)?;
    check_capability(principal, capability)
}

/// Administrative action on another account.
///
/// Only Admin and SuperAdmin manage accounts; an account whose current role
/// is SuperAdmin may only be managed by a SuperAdmin.
pub fn check_manage_target(actor: &Principal, target_role: Role) -> AuthResult<()> {
    if !actor.role.is_administrator() {
        return Err(AuthError::InsufficientPermissions);
    }
    if target_role.is_super_admin() && !actor.is_super_admin() {
        return Err(AuthError::ProtectedAccount);
    }
    Ok(())
}

/// Granting a role: only a SuperAdmin may hand out SuperAdmin
pub fn check_assign_role(actor: &Principal, new_role: Role) -> AuthResult<()> {
    if new_role.is_super_admin() && !actor.is_super_admin() {
        return Err(AuthError::ProtectedAccount);
    }
    Ok(())
}

/// Soft delete: administrators per [`check_manage_target`], Patients only
/// their own account, everyone else not at all
pub fn check_soft_delete(actor: &Principal, target_id: Uuid, target_role: Role) -> AuthResult<()> {
    if actor.role.is_administrator() {
        return check_manage_target(actor, target_role);
    }
    check_self_delete(actor, target_id)
}

/// Self-service delete rule for Patients
pub fn check_self_delete(actor: &Principal, target_id: Uuid) -> AuthResult<()> {
    if actor.role == Role::Patient && actor.account_id == target_id {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

/// Phrase that must be echoed back to hard-delete `target_id`
pub fn confirmation_phrase(target_id: Uuid) -> String {
    format!("DELETE {}", target_id)
}

/// Exact match against [`confirmation_phrase`]; no trimming or case folding
pub fn check_confirmation(target_id: Uuid, provided: Option<&str>) -> AuthResult<()> {
    match provided {
        Some(phrase) if phrase == confirmation_phrase(target_id) => Ok(()),
        _ => Err(AuthError::ConfirmationMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicore_types::Department;

    fn principal(role: Role) -> Principal {
        Principal {
            account_id: Uuid::new_v4(),
            email: format!("{}@x.com", role.as_str().to_lowercase()),
            name: role.as_str().to_string(),
            role,
            department: Department::None,
        }
    }

    #[test]
    fn test_super_admin_passes_every_gate() {
        let sa = principal(Role::SuperAdmin);
        assert!(check_roles(&sa, &[]).is_ok());
        assert!(check_roles(&sa, &[Role::Patient]).is_ok());
        for cap in Capability::ALL {
            assert!(check_capability(&sa, cap).is_ok());
        }
        assert!(check_capability_named(&sa, "notARealCapability").is_ok());
    }

    #[test]
    fn test_role_gate() {
        let doctor = principal(Role::Doctor);
        assert!(check_roles(&doctor, &[Role::Doctor, Role::Nurse]).is_ok());
        assert!(matches!(
            check_roles(&doctor, &[Role::Admin]),
            Err(AuthError::InsufficientPermissions)
        ));
        assert!(check_roles(&doctor, &[]).is_err());
    }

    #[test]
    fn test_capability_gate() {
        let pharmacist = principal(Role::Pharmacist);
        assert!(check_capability(&pharmacist, DispenseMedication).is_ok());
        assert!(check_capability(&pharmacist, ManageUsers).is_err());

        let patient = principal(Role::Patient);
        assert!(check_capability(&patient, ViewUsers).is_err());
    }

    #[test]
    fn test_unknown_capability_denied() {
        let admin = principal(Role::Admin);
        assert!(check_capability_named(&admin, "manageUsers").is_ok());
        assert!(matches!(
            check_capability_named(&admin, "launchMissiles"),
            Err(AuthError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_admin_cannot_manage_super_admin() {
        let admin = principal(Role::Admin);
        assert!(matches!(
            check_manage_target(&admin, Role::SuperAdmin),
            Err(AuthError::ProtectedAccount)
        ));
        assert!(check_manage_target(&admin, Role::Admin).is_ok());
        assert!(check_manage_target(&admin, Role::Doctor).is_ok());

        let sa = principal(Role::SuperAdmin);
        assert!(check_manage_target(&sa, Role::SuperAdmin).is_ok());
    }

    #[test]
    fn test_only_super_admin_grants_super_admin() {
        assert!(check_assign_role(&principal(Role::Admin), Role::SuperAdmin).is_err());
        assert!(check_assign_role(&principal(Role::Admin), Role::Nurse).is_ok());
        assert!(check_assign_role(&principal(Role::SuperAdmin), Role::SuperAdmin).is_ok());
    }

    #[test]
    fn test_non_admin_cannot_manage() {
        let doctor = principal(Role::Doctor);
        assert!(matches!(
            check_manage_target(&doctor, Role::Patient),
            Err(AuthError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_patient_self_delete_only() {
        let patient = principal(Role::Patient);
        assert!(check_soft_delete(&patient, patient.account_id, Role::Patient).is_ok());
        assert!(check_soft_delete(&patient, Uuid::new_v4(), Role::Patient).is_err());

        let nurse = principal(Role::Nurse);
        assert!(check_soft_delete(&nurse, nurse.account_id, Role::Nurse).is_err());

        let admin = principal(Role::Admin);
        assert!(check_soft_delete(&admin, Uuid::new_v4(), Role::Patient).is_ok());
        assert!(check_soft_delete(&admin, Uuid::new_v4(), Role::SuperAdmin).is_err());
    }

    #[test]
    fn test_confirmation_phrase_exact() {
        let id = Uuid::new_v4();
        let phrase = confirmation_phrase(id);
        assert!(check_confirmation(id, Some(&phrase)).is_ok());
        assert!(check_confirmation(id, Some(&phrase.to_lowercase())).is_err());
        assert!(check_confirmation(id, Some(&format!(" {}", phrase))).is_err());
        assert!(check_confirmation(Uuid::new_v4(), Some(&phrase)).is_err());
        assert!(matches!(
            check_confirmation(id, None),
            Err(AuthError::ConfirmationMismatch)
        ));
    }

    #[test]
    fn test_table_covers_every_role() {
        for role in Role::ALL {
            if role != Role::Patient {
                assert!(!capabilities_for(role).is_empty(), "{} has no capabilities", role);
            }
        }
        assert_eq!(capabilities_for(Role::SuperAdmin).len(), Capability::ALL.len());
    }
}
