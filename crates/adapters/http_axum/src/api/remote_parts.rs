//! JSON handlers for the remote part catalog.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_app::services::remote_bridge::RemotePartStatus;
use panelhub_domain::id::PartId;
use panelhub_domain::part::SignalKind;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for registering a remote part.
#[derive(Deserialize)]
pub struct CreateRemotePartRequest {
    #[serde(default)]
    pub id: Option<PartId>,
    pub name: String,
    pub kind: SignalKind,
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<RemotePartStatus>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /remote-parts`: every remote part with its cached state.
pub async fn list<T, A>(State(state): State<AppState<T, A>>) -> Json<Vec<RemotePartStatus>>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Json(state.bridge.remote_parts())
}

/// `POST /remote-parts`
pub async fn create<T, A>(
    State(state): State<AppState<T, A>>,
    Json(req): Json<CreateRemotePartRequest>,
) -> Result<CreateResponse, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let created = state.bridge.register(req.id, req.name, req.kind)?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `DELETE /remote-parts/{name}`
pub async fn delete<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    state.bridge.delete(&name).await?;
    Ok(DeleteResponse::NoContent)
}
