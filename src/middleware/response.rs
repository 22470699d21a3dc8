use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;

/// Success envelope for every JSON endpoint: `{"success": true, "data": …}`.
/// The error half of the contract lives on [`ApiError`].
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { data, status_code: None }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self { data, status_code: Some(status_code) }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    pub fn no_content() -> ApiResponse<()> {
        ApiResponse::with_status((), StatusCode::NO_CONTENT)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let data = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("failed to serialize response body: {}", err);
                return ApiError::internal_server_error("Failed to serialize response")
                    .into_response();
            }
        };

        (status, Json(json!({ "success": true, "data": data }))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_200_with_envelope() {
        let response = ApiResponse::success(json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_created_and_no_content_statuses() {
        assert_eq!(
            ApiResponse::created(json!({})).into_response().status(),
            StatusCode::CREATED
        );
        assert_eq!(
            ApiResponse::<()>::no_content().into_response().status(),
            StatusCode::NO_CONTENT
        );
    }
}
