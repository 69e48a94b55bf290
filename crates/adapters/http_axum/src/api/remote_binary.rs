//! JSON handlers for remote binary parts.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::Deserialize;

use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_app::services::publish_gateway::BinaryCommand;
use panelhub_app::services::remote_bridge::RemotePartStatus;
use panelhub_domain::state::RemoteEntry;

use crate::error::ApiError;
use crate::state::AppState;

/// Optional body of the write endpoint.
#[derive(Debug, Deserialize)]
pub struct SetBinaryRequest {
    pub on: bool,
}

/// `GET /remote-binary-parts/{name}`: last known state, no round trip.
pub async fn get<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
) -> Result<Json<RemotePartStatus>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Ok(Json(state.bridge.binary_state(&name)?))
}

/// `PATCH /remote-binary-parts/{name}`
///
/// `{"on": bool}` sets the part; an empty body toggles its last known
/// state. Responds with the state as settled by the broker.
pub async fn write<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<RemoteEntry>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let command = parse_command(&body)?;
    Ok(Json(state.bridge.write_binary(&name, command).await?))
}

fn parse_command(body: &[u8]) -> Result<BinaryCommand, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BinaryCommand::Toggle);
    }
    let req: SetBinaryRequest = serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid body: {err}")))?;
    Ok(BinaryCommand::Set(req.on))
}
