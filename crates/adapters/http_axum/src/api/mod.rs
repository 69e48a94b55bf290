//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod live;
#[allow(clippy::missing_errors_doc)]
pub mod local_parts;
#[allow(clippy::missing_errors_doc)]
pub mod remote_analog;
#[allow(clippy::missing_errors_doc)]
pub mod remote_binary;
#[allow(clippy::missing_errors_doc)]
pub mod remote_parts;

use axum::Router;
use axum::routing::{delete, get};

use panelhub_app::ports::{PinActuator, PubSubTransport};

use crate::state::AppState;

/// Build the part routes. The live observer is mounted separately, see
/// [`crate::router::build`].
pub fn routes<T, A>() -> Router<AppState<T, A>>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    Router::new()
        // Local parts
        .route(
            "/binary-parts",
            get(local_parts::list_binary::<T, A>).post(local_parts::create_binary::<T, A>),
        )
        .route(
            "/binary-parts/{name}",
            get(local_parts::get_binary::<T, A>).patch(local_parts::toggle_binary::<T, A>),
        )
        .route(
            "/analog-parts",
            get(local_parts::list_analog::<T, A>).post(local_parts::create_analog::<T, A>),
        )
        .route("/analog-parts/{name}", get(local_parts::get_analog::<T, A>))
        // Remote parts
        .route(
            "/remote-parts",
            get(remote_parts::list::<T, A>).post(remote_parts::create::<T, A>),
        )
        .route("/remote-parts/{name}", delete(remote_parts::delete::<T, A>))
        .route("/remote-analog-parts/{name}", get(remote_analog::read::<T, A>))
        .route(
            "/remote-analog-parts/{name}/stream",
            get(remote_analog::stream::<T, A>),
        )
        .route(
            "/remote-binary-parts/{name}",
            get(remote_binary::get::<T, A>).patch(remote_binary::write::<T, A>),
        )
}
