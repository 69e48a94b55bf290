//! Handlers for remote analog parts: one-shot reads and SSE standing reads.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::StreamExt;

use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_domain::part::SignalKind;
use panelhub_domain::state::RemoteEntry;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of the read endpoint.
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    /// Overrides the configured read timeout, up to the configured maximum.
    pub timeout_ms: Option<u64>,
}

/// `GET /remote-analog-parts/{name}`: wait for the next reading.
pub async fn read<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<RemoteEntry>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let timeout = query.timeout_ms.map(Duration::from_millis);
    Ok(Json(state.bridge.read_analog(&name, timeout).await?))
}

/// `GET /remote-analog-parts/{name}/stream`: SSE stream of readings.
///
/// Starts with the cached reading when there is one, then sends every new
/// reading as a JSON `data:` frame. The stream ends when the part is
/// deleted; the subscription is released when the client disconnects.
pub async fn stream<T, A>(
    State(state): State<AppState<T, A>>,
    Path(name): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    state
        .bridge
        .registry()
        .remote_of(&name, SignalKind::Analog)?;
    let watch = state.bridge.watch(&name).await?;
    tracing::debug!(part = %name, "standing read opened");

    let events = watch.filter_map(|entry| match serde_json::to_string(&entry) {
        Ok(json) => Some(Ok(Event::default().data(json))),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize reading for SSE stream");
            None
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
