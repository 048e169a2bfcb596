//! Common DTO types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AccountResponse;

/// Page of results
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(PaginatedAccounts = PaginatedResponse<AccountResponse>)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    /// Current page (1-indexed)
    pub page: i64,
    /// Items per page
    pub limit: i64,
    /// Whether another page may follow
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, limit: i64) -> Self {
        let has_more = data.len() as i64 >= limit;
        Self {
            data,
            page,
            limit,
            has_more,
        }
    }
}

/// Generic success response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    /// Success indicator
    pub success: bool,
    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_response() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 1, 3);
        assert!(response.has_more);

        let response = PaginatedResponse::new(vec![1, 2], 2, 3);
        assert!(!response.has_more);
    }

    #[test]
    fn test_success_message_omitted() {
        let json = serde_json::to_string(&SuccessResponse::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
