//! End-to-end smoke tests for the full panelhubd stack.
//!
//! Each test spins up the complete application (loopback broker, simulated
//! devices, real services, real axum router) from the default
//! configuration and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot` — no TCP port is bound.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use panelhub_adapter_http_axum::router;
use panelhub_adapter_virtual::{LoggingPinActuator, LoopbackBroker};
use panelhubd::config::Config;
use panelhubd::wiring::{self, Simulation};
use tower::ServiceExt;

struct Stack {
    app: axum::Router,
    broker: Arc<LoopbackBroker>,
    simulation: Simulation,
}

/// Build a fully-wired router from `config` over a loopback broker.
fn stack(config: &Config) -> Stack {
    let settings = config
        .bridge
        .settings()
        .expect("default bridge settings should be valid");
    let broker = Arc::new(LoopbackBroker::new());
    let simulation = wiring::simulate(&config.simulation, &settings, &broker);
    let state = wiring::assemble(
        &config.parts,
        settings,
        Arc::clone(&broker),
        Some(LoggingPinActuator::new()),
    )
    .expect("default catalog should register");

    Stack {
        app: router::build(state, config.features.live_observer),
        broker,
        simulation,
    }
}

async fn call(app: &axum::Router, method: &str, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, bytes)
}

async fn call_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = call(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let Stack { app, .. } = stack(&Config::default());

    let (status, body) = call(&app, "GET", "/health", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

// ---------------------------------------------------------------------------
// Local parts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_seeded_local_parts() {
    let Stack { app, .. } = stack(&Config::default());

    let (status, json) = call_json(&app, "GET", "/binary-parts", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!([
            {"id": 0, "name": "LED1", "pin": 0, "on": false},
            {"id": 1, "name": "LED2", "pin": 1, "on": false},
        ])
    );

    let (status, json) = call_json(&app, "GET", "/analog-parts/TEMP1", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], 2);
    assert_eq!(json["value"], 0.0);
}

#[tokio::test]
async fn should_toggle_led1_twice() {
    let Stack { app, .. } = stack(&Config::default());

    let (_, json) = call_json(&app, "PATCH", "/binary-parts/LED1", "").await;
    assert_eq!(json["on"], true);
    let (_, json) = call_json(&app, "PATCH", "/binary-parts/LED1", "").await;
    assert_eq!(json["on"], false);

    let (_, json) = call_json(&app, "GET", "/binary-parts/LED1", "").await;
    assert_eq!(json["on"], false);
}

#[tokio::test]
async fn should_return_not_found_for_foo() {
    let Stack { app, .. } = stack(&Config::default());

    for uri in [
        "/binary-parts/FOO",
        "/analog-parts/FOO",
        "/remote-binary-parts/FOO",
        "/remote-analog-parts/FOO",
    ] {
        let (status, json) = call_json(&app, "GET", uri, "").await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json["message"], "part not found");
    }
}

// ---------------------------------------------------------------------------
// Remote parts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_read_simulated_sensor() {
    let Stack {
        app,
        broker,
        simulation,
    } = stack(&Config::default());

    let (status, json) = call_json(&app, "GET", "/remote-analog-parts/TEMP5", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "TEMP5");
    assert_eq!(json["pin"], serde_json::Value::Null);
    assert_eq!(json["confirmation"], "confirmed");
    assert!(json["value"].is_string());
    assert!(!broker.is_subscribed("topic/TEMP5"));

    let (_, json) = call_json(&app, "GET", "/remote-parts", "").await;
    assert_eq!(json[1]["name"], "TEMP5");
    assert!(json[1]["value"].is_string());
    assert!(json[0].get("on").is_none());

    simulation.stop();
}

#[tokio::test(start_paused = true)]
async fn should_time_out_when_no_sensor_reports() {
    let mut config = Config::default();
    config.simulation.sensors.clear();
    let Stack { app, .. } = stack(&config);

    let (status, json) = call_json(
        &app,
        "GET",
        "/remote-analog-parts/TEMP5?timeout_ms=500",
        "",
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["message"], "no reading received within 500ms");
}

#[tokio::test]
async fn should_switch_simulated_led5() {
    let Stack {
        app, simulation, ..
    } = stack(&Config::default());

    let (status, json) = call_json(&app, "PATCH", "/remote-binary-parts/LED5", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["on"], true);
    assert_eq!(json["confirmation"], "confirmed");
    assert!(simulation.switches[0].is_on());

    let (status, json) =
        call_json(&app, "PATCH", "/remote-binary-parts/LED5", r#"{"on": true}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["on"], true);

    let (_, json) = call_json(&app, "GET", "/remote-binary-parts/LED5", "").await;
    assert_eq!(json["on"], true);

    simulation.stop();
}

#[tokio::test]
async fn should_register_and_delete_remote_part() {
    let Stack { app, .. } = stack(&Config::default());

    let body = r#"{"name": "HUM3", "kind": "analog"}"#;
    let (status, json) = call_json(&app, "POST", "/remote-parts", body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], 6);

    let (status, _) = call_json(&app, "POST", "/remote-parts", body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "DELETE", "/remote-parts/HUM3", "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = call_json(&app, "GET", "/remote-parts", "").await;
    assert_eq!(json.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn should_hide_live_observer_when_disabled() {
    let mut config = Config::default();
    config.features.live_observer = false;
    let Stack { app, .. } = stack(&config);

    let (status, _) = call(&app, "GET", "/live", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
