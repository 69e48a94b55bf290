//! JSON handlers for local parts.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_app::services::local_parts::NewLocalPart;
use panelhub_domain::id::PartId;
use panelhub_domain::part::{AnalogState, BinaryState, PartView};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for adding a local part. The id defaults to the next free
/// one in the category.
#[derive(Deserialize)]
pub struct CreateLocalPartRequest {
    #[serde(default)]
    pub id: Option<PartId>,
    pub name: String,
    #[serde(default)]
    pub pin: Option<u32>,
}

impl From<CreateLocalPartRequest> for NewLocalPart {
    fn from(req: CreateLocalPartRequest) -> Self {
        Self {
            id: req.id,
            name: req.name,
            pin: req.pin,
        }
    }
}

/// Possible responses from the create endpoints.
pub enum CreateResponse<S> {
    Created(Json<PartView<S>>),
}

impl<S: serde::Serialize> IntoResponse for CreateResponse<S> {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /binary-parts`
pub async fn list_binary<T, A>(
    State(state): State<AppState<T, A>>,
) -> Json<Vec<PartView<BinaryState>>>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Json(state.local_parts.binary_parts())
}

/// `GET /binary-parts/{name}`
pub async fn get_binary<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
) -> Result<Json<PartView<BinaryState>>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Ok(Json(state.local_parts.binary_part(&name)?))
}

/// `POST /binary-parts`
pub async fn create_binary<T, A>(
    State(state): State<AppState<T, A>>,
    Json(req): Json<CreateLocalPartRequest>,
) -> Result<CreateResponse<BinaryState>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let created = state.local_parts.add_binary(req.into())?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PATCH /binary-parts/{name}`: flip the part, driving its pin when GPIO
/// is enabled.
pub async fn toggle_binary<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
) -> Result<Json<PartView<BinaryState>>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Ok(Json(state.local_parts.toggle(&name)?))
}

/// `GET /analog-parts`
pub async fn list_analog<T, A>(
    State(state): State<AppState<T, A>>,
) -> Json<Vec<PartView<AnalogState>>>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Json(state.local_parts.analog_parts())
}

/// `GET /analog-parts/{name}`
pub async fn get_analog<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
) -> Result<Json<PartView<AnalogState>>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Ok(Json(state.local_parts.analog_part(&name)?))
}

/// `POST /analog-parts`
pub async fn create_analog<T, A>(
    State(state): State<AppState<T, A>>,
    Json(req): Json<CreateLocalPartRequest>,
) -> Result<CreateResponse<AnalogState>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let created = state.local_parts.add_analog(req.into())?;
    Ok(CreateResponse::Created(Json(created)))
}
