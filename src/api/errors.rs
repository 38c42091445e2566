use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::TelemetryError;

impl IntoResponse for TelemetryError {
    fn into_response(self) -> Response {
        let status = match &self {
            TelemetryError::DeviceNotFound(_) | TelemetryError::DevicesNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            TelemetryError::InvalidValue(_) | TelemetryError::BatchTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            TelemetryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TelemetryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Deterministic rejections echo their detail so the caller can
        // correct and resubmit; infrastructure failures stay opaque.
        let message = match &self {
            TelemetryError::Unavailable(e) => {
                error!(error = %e, "storage unavailable");
                "storage unavailable, retry later".to_owned()
            }
            TelemetryError::Internal(e) => {
                error!(error = ?e, "unexpected internal error");
                "internal server error".to_owned()
            }
            rejection => rejection.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
