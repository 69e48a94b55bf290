//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use panelhub_app::ports::{PinActuator, PubSubTransport};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the part routes, plus the `/live` WebSocket when
/// `live_observer` is set. Includes a [`TraceLayer`] that logs each HTTP
/// request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build<T, A>(state: AppState<T, A>, live_observer: bool) -> Router
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(crate::api::routes());
    if live_observer {
        router = router.route("/live", get(crate::api::live::connect::<T, A>));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use panelhub_adapter_virtual::{LoggingPinActuator, LoopbackBroker, VirtualSwitch};
    use panelhub_app::services::local_parts::{LocalPartService, NewLocalPart};
    use panelhub_app::services::part_registry::PartRegistry;
    use panelhub_app::services::remote_bridge::{BridgeSettings, RemoteBridge};
    use panelhub_domain::part::SignalKind;
    use panelhub_domain::payload::BinaryTokens;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        broker: Arc<LoopbackBroker>,
        actuator: Arc<LoggingPinActuator>,
    }

    fn harness(live_observer: bool) -> Harness {
        let broker = Arc::new(LoopbackBroker::new());
        let actuator = Arc::new(LoggingPinActuator::new());
        let registry = Arc::new(PartRegistry::new());

        let local_parts = LocalPartService::new(Arc::clone(&registry), Some(Arc::clone(&actuator)));
        local_parts
            .add_binary(NewLocalPart {
                id: None,
                name: "LED1".into(),
                pin: Some(17),
            })
            .unwrap();
        local_parts
            .add_analog(NewLocalPart {
                id: None,
                name: "TEMP1".into(),
                pin: Some(4),
            })
            .unwrap();

        let settings = BridgeSettings {
            read_timeout: Duration::from_secs(5),
            ..BridgeSettings::default()
        };
        let bridge = RemoteBridge::new(Arc::clone(&broker), registry, settings);
        bridge
            .register(None, "LED5".into(), SignalKind::Binary)
            .unwrap();
        bridge
            .register(None, "TEMP5".into(), SignalKind::Analog)
            .unwrap();

        let app = build(AppState::new(bridge, local_parts), live_observer);
        Harness {
            app,
            broker,
            actuator,
        }
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let Harness { app, .. } = harness(false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn should_list_local_parts() {
        let Harness { app, .. } = harness(false);

        let (status, json) = send(&app, request("GET", "/binary-parts", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["name"], "LED1");
        assert_eq!(json[0]["pin"], 17);
        assert_eq!(json[0]["on"], false);

        let (status, json) = send(&app, request("GET", "/analog-parts/TEMP1", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], 0.0);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_part() {
        let Harness { app, .. } = harness(false);

        let (status, json) = send(&app, request("GET", "/binary-parts/FOO", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "part not found");

        let (status, _) = send(&app, request("GET", "/remote-analog-parts/FOO", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_toggle_local_part_and_drive_pin() {
        let Harness { app, actuator, .. } = harness(false);

        let (status, json) = send(&app, request("PATCH", "/binary-parts/LED1", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["on"], true);
        assert!(actuator.level(17));
    }

    #[tokio::test]
    async fn should_create_local_part_and_reject_duplicate() {
        let Harness { app, .. } = harness(false);

        let body = r#"{"name": "LED2", "pin": 27}"#;
        let (status, json) = send(&app, request("POST", "/binary-parts", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["id"], 4);

        let (status, _) = send(&app, request("POST", "/binary-parts", body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let no_pin = r#"{"name": "TEMP2"}"#;
        let (status, _) = send(&app, request("POST", "/analog-parts", no_pin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_remote_reading_when_device_replies() {
        let Harness { app, broker, .. } = harness(false);
        let device = Arc::clone(&broker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            device.inject("topic/TEMP5", b"21.5");
        });

        let (status, json) = send(&app, request("GET", "/remote-analog-parts/TEMP5", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "TEMP5");
        assert_eq!(json["value"], "21.5");
        assert_eq!(json["confirmation"], "confirmed");
        assert!(!broker.is_subscribed("topic/TEMP5"));

        let (_, json) = send(&app, request("GET", "/remote-parts", "")).await;
        assert_eq!(json[1]["value"], "21.5");
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_gateway_timeout_when_device_silent() {
        let Harness { app, broker, .. } = harness(false);

        let uri = "/remote-analog-parts/TEMP5?timeout_ms=150";
        let (status, json) = send(&app, request("GET", uri, "")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["message"], "no reading received within 150ms");
        assert!(!broker.is_subscribed("topic/TEMP5"));
    }

    #[tokio::test]
    async fn should_reject_read_timeout_above_maximum() {
        let Harness { app, broker, .. } = harness(false);

        for timeout in ["0", "30001", "18446744073709551615"] {
            let uri = format!("/remote-analog-parts/TEMP5?timeout_ms={timeout}");
            let (status, json) = send(&app, request("GET", &uri, "")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{timeout}");
            assert_eq!(json["message"], "read timeout must be between 1 and 30000ms");
        }
        assert!(!broker.is_subscribed("topic/TEMP5"));
    }

    #[tokio::test]
    async fn should_write_remote_binary_part() {
        let Harness { app, broker, .. } = harness(false);
        let switch = VirtualSwitch::attach(&broker, "topic/LED5", BinaryTokens::default());

        let (status, json) = send(&app, request("PATCH", "/remote-binary-parts/LED5", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["on"], true);
        assert!(switch.is_on());

        let body = r#"{"on": false}"#;
        let (status, _) = send(&app, request("PATCH", "/remote-binary-parts/LED5", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!switch.is_on());

        let (status, json) = send(&app, request("GET", "/remote-binary-parts/LED5", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["on"], false);
        assert_eq!(json["confirmation"], "confirmed");
    }

    #[tokio::test]
    async fn should_return_bad_gateway_when_broker_unreachable() {
        let Harness { app, broker, .. } = harness(false);
        broker.set_reachable(false);

        let (status, _) = send(&app, request("PATCH", "/remote-binary-parts/LED5", "")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, json) = send(&app, request("GET", "/remote-binary-parts/LED5", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("on").is_none());
    }

    #[tokio::test]
    async fn should_register_and_delete_remote_part() {
        let Harness { app, .. } = harness(false);

        let body = r#"{"name": "FAN7", "kind": "binary"}"#;
        let (status, json) = send(&app, request("POST", "/remote-parts", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["kind"], "binary");
        assert_eq!(json["pin"], serde_json::Value::Null);

        let (status, _) = send(&app, request("DELETE", "/remote-parts/FAN7", "")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, request("DELETE", "/remote-parts/FAN7", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_mount_live_observer_only_when_enabled() {
        let Harness { app, .. } = harness(false);
        let (status, _) = send(&app, request("GET", "/live", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let Harness { app, .. } = harness(true);
        let (status, _) = send(&app, request("GET", "/live", "")).await;
        assert_ne!(status, StatusCode::NOT_FOUND);
    }
}
