// Integration tests: HTTP and WebSocket endpoints

mod common;

use axum_test::TestServer;
use common::*;
use resmon::clock::ManualClock;
use resmon::models::{SystemResources, Utilization};
use resmon::monitor::ResourceMonitor;
use resmon::routes;
use resmon::sampler::Sampler;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;

fn test_monitor() -> (Arc<ResourceMonitor>, Sampler) {
    let clock = Arc::new(ManualClock::with_auto_advance(t0(), TICK));
    let (monitor, sampler) =
        ResourceMonitor::prepare(&options(), &scripted_factory(), clock).unwrap();
    (Arc::new(monitor), sampler)
}

fn test_app(monitor: Arc<ResourceMonitor>) -> (axum::Router, broadcast::Sender<Utilization>) {
    let (tx, _) = broadcast::channel(10);
    let app = routes::app(monitor, tx.clone(), Arc::new(AtomicUsize::new(0)));
    (app, tx)
}

#[tokio::test]
async fn test_version_endpoint() {
    let (monitor, _) = test_monitor();
    let (app, _) = test_app(monitor);
    let server = TestServer::new(app);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("resmon"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_resources_endpoint() {
    let (monitor, _) = test_monitor();
    let (app, _) = test_app(monitor);
    let server = TestServer::new(app);
    let response = server.get("/api/resources").await;
    response.assert_status_ok();
    let res: SystemResources = response.json();
    assert_eq!(res, resources());
}

#[tokio::test]
async fn test_utilization_endpoint() {
    let (monitor, mut sampler) = test_monitor();
    for _ in 0..4 {
        sampler.tick();
    }
    let (app, _) = test_app(monitor);
    let server = TestServer::new(app);
    let response = server
        .get("/api/utilization")
        .add_query_param("windowMs", 120_000)
        .await;
    response.assert_status_ok();
    let u: Utilization = response.json();
    assert_eq!(u.window_requested, std::time::Duration::from_secs(120));
    // the snapshot on the boundary is preceded by one more baseline
    assert_eq!(u.span_start, t0() + chrono::Duration::seconds(60));
    assert_eq!(u.span_end, t0() + chrono::Duration::seconds(240));
    assert!((u.cpu_used_fraction - 0.5).abs() < 1e-9);
    assert_eq!(u.system_resources, resources());
}

#[tokio::test]
async fn test_utilization_window_too_large_is_bad_request() {
    let (monitor, mut sampler) = test_monitor();
    sampler.tick();
    let (app, _) = test_app(monitor);
    let server = TestServer::new(app);
    let response = server
        .get("/api/utilization")
        .add_query_param("windowMs", 301_000)
        .expect_failure()
        .await;
    response.assert_status_bad_request();
    let json: serde_json::Value = response.json();
    assert_eq!(json["kind"], "window_out_of_range");
    assert_eq!(json["retryable"], false);
}

#[tokio::test]
async fn test_utilization_before_second_snapshot_is_unavailable() {
    let (monitor, _sampler) = test_monitor();
    let (app, _) = test_app(monitor);
    let server = TestServer::new(app);
    let response = server
        .get("/api/utilization")
        .add_query_param("windowMs", 60_000)
        .expect_failure()
        .await;
    response.assert_status_service_unavailable();
    let json: serde_json::Value = response.json();
    assert_eq!(json["kind"], "insufficient_data");
    assert_eq!(json["retryable"], true);
}

// --- WebSocket tests (require http_transport + ws feature) ---
// Receive until we get valid JSON of the wanted shape (the welcome message comes first).

async fn receive_first_json_text<T: serde::de::DeserializeOwned>(
    ws: &mut axum_test::TestWebSocket,
) -> T {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(v) = serde_json::from_str::<T>(&text) {
            return v;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for JSON"
        );
    }
}

#[tokio::test]
async fn test_ws_utilization_receives_welcome_then_broadcast() {
    let (monitor, mut sampler) = test_monitor();
    sampler.tick();
    sampler.tick();
    let utilization = monitor
        .get_utilization(std::time::Duration::from_secs(60))
        .unwrap();
    let (app, tx) = test_app(monitor);
    let server = TestServer::builder().http_transport().build(app);

    let mut ws = server
        .get_websocket("/ws/utilization")
        .await
        .into_websocket()
        .await;
    let welcome: serde_json::Value = receive_first_json_text(&mut ws).await;
    assert_eq!(welcome["type"], "info");
    assert_eq!(welcome["systemResources"]["logicalCpus"], 8);

    let tx_clone = tx.clone();
    let expected = utilization.clone();
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let _ = tx_clone.send(expected);
    });
    let received: Utilization = receive_first_json_text(&mut ws).await;
    assert_eq!(received.span_end, utilization.span_end);
    assert_eq!(received.per_disk_busy_fraction, utilization.per_disk_busy_fraction);
}
