//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use panelhub_domain::error::PanelHubError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

/// Maps [`PanelHubError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub enum ApiError {
    Domain(PanelHubError),
    /// The request body could not be understood.
    BadRequest(String),
}

impl From<PanelHubError> for ApiError {
    fn from(err: PanelHubError) -> Self {
        Self::Domain(err)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        let err = match self {
            Self::Domain(err) => err,
            Self::BadRequest(message) => return (StatusCode::BAD_REQUEST, message.clone()),
        };
        match err {
            PanelHubError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            PanelHubError::UnknownPart(_) => (StatusCode::NOT_FOUND, "part not found".to_string()),
            PanelHubError::Conflict(name) => (
                StatusCode::CONFLICT,
                format!("part {name:?} already exists"),
            ),
            PanelHubError::Timeout { topic, waited } => {
                tracing::warn!(%topic, ?waited, "remote read timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    format!("no reading received within {}ms", waited.as_millis()),
                )
            }
            PanelHubError::AckTimeout { topic, waited } => {
                tracing::warn!(%topic, ?waited, "publish not acknowledged");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    format!(
                        "publish not acknowledged within {}ms, state unconfirmed",
                        waited.as_millis()
                    ),
                )
            }
            PanelHubError::Subscribe(err) => {
                tracing::error!(error = %err, "subscribe failed");
                (StatusCode::BAD_GATEWAY, format!("subscribe failed: {err}"))
            }
            PanelHubError::Publish(err) => {
                tracing::error!(error = %err, "publish failed");
                (StatusCode::BAD_GATEWAY, format!("publish failed: {err}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorBody { message })).into_response()
    }
}
