// HTTP API Error Types
use axum::{response::IntoResponse, http::StatusCode, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),
    TenantRequired,

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),
    TenantInactive(String),
    TenantMismatch,

    // 404 Not Found
    NotFound(String),
    TenantNotFound(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity (validation but semantically valid JSON)
    UnprocessableEntity {
        message: String,
        field_errors: HashMap<String, String>,
    },
    CrossTenantReference { column: String },
    PlanLimitReached { resource: String, limit: i64 },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::TenantRequired => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::TenantInactive(_) => 403,
            ApiError::TenantMismatch => 403,
            ApiError::NotFound(_) => 404,
            ApiError::TenantNotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::CrossTenantReference { .. } => 422,
            ApiError::PlanLimitReached { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::InvalidJson(msg) => msg.clone(),
            ApiError::TenantRequired => {
                "Tenant context required. Provide a tenant subdomain or tenant header".to_string()
            }
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::TenantInactive(slug) => format!("Tenant '{}' is suspended", slug),
            ApiError::TenantMismatch => {
                "Authenticated user does not belong to the requested tenant".to_string()
            }
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::TenantNotFound(slug) => format!("Tenant '{}' not found", slug),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::UnprocessableEntity { message, .. } => message.clone(),
            ApiError::CrossTenantReference { column } => {
                format!("Field '{}' references a record outside the current tenant", column)
            }
            ApiError::PlanLimitReached { resource, limit } => {
                format!("Plan limit reached: at most {} {} allowed", limit, resource)
            }
            ApiError::InternalServerError(msg) => msg.clone(),
            ApiError::ServiceUnavailable(msg) => msg.clone(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            ApiError::UnprocessableEntity { message, field_errors } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": "UNPROCESSABLE_ENTITY",
                    "field_errors": field_errors
                })
            }
            ApiError::CrossTenantReference { column } => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code(),
                    "field_errors": { column: "references a record outside the current tenant" }
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::TenantRequired => "TENANT_REQUIRED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::TenantInactive(_) => "TENANT_INACTIVE",
            ApiError::TenantMismatch => "TENANT_MISMATCH",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::CrossTenantReference { .. } => "CROSS_TENANT_REFERENCE",
            ApiError::PlanLimitReached { .. } => "PLAN_LIMIT_REACHED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unprocessable_entity(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::UnprocessableEntity {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::tenancy::TenancyError> for ApiError {
    fn from(err: crate::tenancy::TenancyError) -> Self {
        use crate::tenancy::TenancyError;
        match err {
            TenancyError::Required => ApiError::TenantRequired,
            TenancyError::NotFound(slug) => ApiError::TenantNotFound(slug),
            TenancyError::Inactive(slug) => ApiError::TenantInactive(slug),
            TenancyError::Mismatch => ApiError::TenantMismatch,
            TenancyError::CrossTenantReference { column } => {
                ApiError::CrossTenantReference { column }
            }
            TenancyError::Directory(e) => e.into(),
        }
    }
}

impl From<crate::tenancy::DirectoryError> for ApiError {
    fn from(err: crate::tenancy::DirectoryError) -> Self {
        tracing::error!("Tenant directory error: {}", err);
        ApiError::service_unavailable("Tenant directory temporarily unavailable")
    }
}

impl From<crate::filter::FilterError> for ApiError {
    fn from(err: crate::filter::FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<crate::database::record::RecordError> for ApiError {
    fn from(err: crate::database::record::RecordError) -> Self {
        use crate::database::record::RecordError;
        match err {
            RecordError::ProtectedField(field) => {
                ApiError::bad_request(format!("System field '{}' cannot be set via API", field))
            }
            RecordError::NotAnObject => {
                ApiError::invalid_json("Request body must be a JSON object")
            }
            RecordError::MissingRequiredField(field) => {
                let mut field_errors = HashMap::new();
                field_errors.insert(field, "This field is required".to_string());
                ApiError::validation_error("Missing required fields", Some(field_errors))
            }
            RecordError::InvalidUuid { field, value } => {
                let mut field_errors = HashMap::new();
                field_errors.insert(field, format!("Invalid UUID format: {}", value));
                ApiError::validation_error("Invalid field format", Some(field_errors))
            }
            RecordError::InvalidValue { field, reason } => {
                let mut field_errors = HashMap::new();
                field_errors.insert(field, reason);
                ApiError::validation_error("Invalid field value", Some(field_errors))
            }
        }
    }
}

impl From<crate::database::scoped::ScopeError> for ApiError {
    fn from(err: crate::database::scoped::ScopeError) -> Self {
        use crate::database::scoped::ScopeError;
        match err {
            ScopeError::Tenancy(e) => e.into(),
            ScopeError::Filter(e) => e.into(),
            ScopeError::Record(e) => e.into(),
            ScopeError::NotFound => ApiError::not_found("Record not found"),
            ScopeError::UnattributedBypass => {
                ApiError::bad_request("Cross-tenant access requires an actor and a reason")
            }
            ScopeError::Sqlx(e) => e.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Record not found"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::conflict("A record with the same unique value already exists")
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::TenantServiceError> for ApiError {
    fn from(err: crate::services::TenantServiceError) -> Self {
        use crate::services::TenantServiceError;
        match err {
            TenantServiceError::NotFound => ApiError::not_found("Tenant not found"),
            TenantServiceError::DomainTaken(domain) => {
                ApiError::conflict(format!("Domain '{}' is already bound to a tenant", domain))
            }
            TenantServiceError::VerificationFailed => {
                ApiError::bad_request("Verification token does not match")
            }
            TenantServiceError::Password(e) => e.into(),
            TenantServiceError::Scope(e) => e.into(),
            TenantServiceError::Database(e) => e.into(),
        }
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        use crate::auth::JwtError;
        match err {
            // Generation failures are ours, not the caller's.
            JwtError::TokenGeneration(_) | JwtError::InvalidSecret => {
                tracing::error!("JWT error: {}", err);
                ApiError::internal_server_error("Failed to issue token")
            }
            JwtError::TokenInvalid(msg) => ApiError::unauthorized(format!("Invalid token: {}", msg)),
        }
    }
}

impl From<crate::auth::password::PasswordError> for ApiError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        tracing::error!("password hashing error: {}", err);
        ApiError::internal_server_error("Credential processing failed")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenancy_status_codes() {
        assert_eq!(ApiError::TenantRequired.status_code(), 400);
        assert_eq!(ApiError::TenantNotFound("ghost".into()).status_code(), 404);
        assert_eq!(ApiError::TenantInactive("acme".into()).status_code(), 403);
        assert_eq!(ApiError::TenantMismatch.status_code(), 403);
        assert_eq!(
            ApiError::CrossTenantReference { column: "project_id".into() }.status_code(),
            422
        );
    }

    #[test]
    fn test_inactive_is_not_not_found() {
        let inactive = ApiError::TenantInactive("acme".into());
        let missing = ApiError::TenantNotFound("acme".into());
        assert_ne!(inactive.status_code(), missing.status_code());
        assert_ne!(inactive.error_code(), missing.error_code());
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = ApiError::TenantRequired.to_json();
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], "TENANT_REQUIRED");
        assert!(body["message"].as_str().is_some());
    }

    #[test]
    fn test_cross_tenant_reference_names_column() {
        let body = ApiError::CrossTenantReference { column: "account_id".into() }.to_json();
        assert_eq!(body["code"], "CROSS_TENANT_REFERENCE");
        assert!(body["field_errors"]["account_id"].as_str().is_some());
    }
}
