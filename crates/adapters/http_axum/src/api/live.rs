//! WebSocket endpoint for the live observer.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;

use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_app::services::live_observer::LiveObserver;

use crate::state::AppState;

/// `GET /live`: attach the caller as the live observer.
///
/// The first frame is a snapshot of every cached remote part, then one
/// frame per change. Connecting evicts the previous observer, whose socket
/// is closed.
pub async fn connect<T, A>(ws: WebSocketUpgrade, State(state): State<AppState<T, A>>) -> Response
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let observer = Arc::clone(state.bridge.observer());
    ws.on_upgrade(move |socket| serve(socket, observer))
}

async fn serve(mut socket: WebSocket, observer: Arc<LiveObserver>) {
    let mut connection = observer.connect();

    loop {
        tokio::select! {
            message = connection.messages.recv() => {
                let Some(message) = message else {
                    // Evicted by a newer observer.
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(%err, "failed to serialize observer message");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    observer.disconnect(connection.id);
}
