//! OpenAPI Documentation
//!
//! OpenAPI 3.0 description of the MediCore API, served as JSON at
//! `/api-docs/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

use crate::dto;
use crate::error::ErrorResponse;
use crate::handlers;

/// MediCore API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MediCore API",
        description = "Authentication, session and account management API for the MediCore clinic platform.",
        version = "1.0.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    paths(
        // Health
        handlers::health::health_check,
        handlers::health::readiness_check,
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::oauth::google_start,
        handlers::oauth::google_callback,
        // Sessions
        handlers::auth::list_sessions,
        handlers::auth::revoke_session,
        handlers::auth::revoke_other_sessions,
        // Accounts
        handlers::account::update_me,
        handlers::account::change_password,
        handlers::admin::list_accounts,
        handlers::admin::get_account,
        handlers::admin::create_account,
        handlers::admin::update_account,
        handlers::admin::delete_account,
        handlers::admin::restore_account,
        handlers::admin::purge_account,
        // Meta
        handlers::meta::roles,
        handlers::meta::departments,
        handlers::meta::permissions,
    ),
    components(
        schemas(
            // Common
            ErrorResponse,
            dto::SuccessResponse,
            dto::PaginatedAccounts,
            handlers::health::HealthResponse,
            handlers::health::ReadinessResponse,
            handlers::health::ComponentStatus,
            // Auth
            dto::RegisterRequest,
            dto::LoginRequest,
            dto::AuthResponse,
            dto::SessionResponse,
            dto::RevokedResponse,
            // Accounts
            dto::AccountResponse,
            dto::UpdateProfileRequest,
            dto::ChangePasswordRequest,
            dto::CreateAccountRequest,
            dto::AdminUpdateRequest,
            dto::HardDeleteRequest,
            // Meta
            dto::RoleInfo,
            dto::RolesResponse,
            dto::DepartmentsResponse,
            dto::PermissionsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Authentication", description = "Register, login, refresh, logout and federated sign-in"),
        (name = "Sessions", description = "Per-device refresh sessions"),
        (name = "Accounts", description = "Profiles and account management"),
        (name = "Meta", description = "Roles, departments and capabilities")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "MediCore API");
        assert!(doc.paths.paths.contains_key("/api/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/users/{id}/permanent"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("\"bearer\""));
        assert!(json.contains("MediCore API"));
    }
}
