//! Static enumerations: roles, departments and capabilities

use axum::Json;

use crate::dto::{DepartmentsResponse, PermissionsResponse, RolesResponse};

/// Roles with their capabilities
#[utoipa::path(
    get,
    path = "/api/meta/roles",
    tag = "Meta",
    responses((status = 200, description = "Every role", body = RolesResponse))
)]
pub async fn roles() -> Json<RolesResponse> {
    Json(RolesResponse::all())
}

/// Departments
#[utoipa::path(
    get,
    path = "/api/meta/departments",
    tag = "Meta",
    responses((status = 200, description = "Every department", body = DepartmentsResponse))
)]
pub async fn departments() -> Json<DepartmentsResponse> {
    Json(DepartmentsResponse::all())
}

/// Capability names
#[utoipa::path(
    get,
    path = "/api/meta/permissions",
    tag = "Meta",
    responses((status = 200, description = "Every capability", body = PermissionsResponse))
)]
pub async fn permissions() -> Json<PermissionsResponse> {
    Json(PermissionsResponse::all())
}
