//! Integration tests for the gateway HTTP surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use paygate::api::{create_router, AppState};
use paygate::circuit::{CircuitStatus, StatusCell};
use paygate::config::GatewayConfig;
use paygate::dispatch::PaymentQueue;
use paygate::payment::PaymentRequest;
use paygate::store::PaymentStore;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    app: axum::Router,
    queue: Arc<PaymentQueue>,
    status: Arc<StatusCell>,
    store: Arc<PaymentStore>,
}

fn make_app_with(config: GatewayConfig, queue_capacity: usize) -> TestApp {
    let queue = Arc::new(PaymentQueue::new(queue_capacity));
    let status = Arc::new(StatusCell::default());
    let store = Arc::new(PaymentStore::new());
    let state = Arc::new(AppState::new(
        Arc::clone(&queue),
        Arc::clone(&status),
        Arc::clone(&store),
        Arc::new(config),
    ));
    TestApp {
        app: create_router(state),
        queue,
        status,
        store,
    }
}

fn make_app() -> TestApp {
    make_app_with(GatewayConfig::default(), 100)
}

fn intake_request(amount: f64) -> Request<Body> {
    let body = serde_json::json!({
        "correlationId": Uuid::new_v4(),
        "amount": amount,
    });
    Request::builder()
        .method("POST")
        .uri("/payments")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn intake_accepts_payment_into_queue() {
    let test = make_app();

    let response = test.app.oneshot(intake_request(42.0)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(test.queue.depth(), 1);
}

#[tokio::test]
async fn intake_rejects_malformed_body() {
    let test = make_app();

    let response = test
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(test.queue.depth(), 0);
}

#[tokio::test]
async fn intake_full_queue_returns_503() {
    let test = make_app_with(GatewayConfig::default(), 1);

    let response = test.app.clone().oneshot(intake_request(1.0)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = test.app.oneshot(intake_request(2.0)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn summary_aggregates_local_range() {
    let test = make_app();
    let at = |secs: u32| Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, secs).unwrap();

    test.store.append(PaymentRequest {
        correlation_id: Uuid::new_v4(),
        amount: 10.0,
        requested_at: at(10),
        routed_via_fallback: false,
    });
    test.store.append(PaymentRequest {
        correlation_id: Uuid::new_v4(),
        amount: 5.0,
        requested_at: at(20),
        routed_via_fallback: true,
    });
    test.store.append(PaymentRequest {
        correlation_id: Uuid::new_v4(),
        amount: 99.0,
        requested_at: at(50),
        routed_via_fallback: false,
    });

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=2025-01-01T00:00:00Z&to=2025-01-01T00:00:30Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["default"]["totalRequests"], 1);
    assert_eq!(json["default"]["totalAmount"], 10.0);
    assert_eq!(json["fallback"]["totalRequests"], 1);
    assert_eq!(json["fallback"]["totalAmount"], 5.0);
}

#[tokio::test]
async fn summary_rejects_invalid_range() {
    let test = make_app();

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=yesterday&to=2025-01-01T00:00:30Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_merges_peer_totals() {
    let peer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments-summary"))
        .and(query_param("internal", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "default": {"totalRequests": 3, "totalAmount": 30.0},
            "fallback": {"totalRequests": 1, "totalAmount": 7.0}
        })))
        .expect(1)
        .mount(&peer)
        .await;

    let mut config = GatewayConfig::default();
    config.upstream.peer_url = Some(peer.uri());
    let test = make_app_with(config, 100);

    test.store.append(PaymentRequest {
        correlation_id: Uuid::new_v4(),
        amount: 10.0,
        requested_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap(),
        routed_via_fallback: false,
    });

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=2025-01-01T00:00:00Z&to=2025-01-01T00:01:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["default"]["totalRequests"], 4);
    assert_eq!(json["default"]["totalAmount"], 40.0);
    assert_eq!(json["fallback"]["totalRequests"], 1);
    peer.verify().await;
}

#[tokio::test]
async fn internal_summary_skips_peer_fetch() {
    let peer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments-summary"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&peer)
        .await;

    let mut config = GatewayConfig::default();
    config.upstream.peer_url = Some(peer.uri());
    let test = make_app_with(config, 100);

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=2025-01-01T00:00:00Z&to=2025-01-01T00:01:00Z&internal=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    peer.verify().await;
}

#[tokio::test]
async fn peer_failure_degrades_to_local_totals() {
    let mut config = GatewayConfig::default();
    config.upstream.peer_url = Some("http://127.0.0.1:1".to_string());
    let test = make_app_with(config, 100);

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=2025-01-01T00:00:00Z&to=2025-01-01T00:01:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["default"]["totalRequests"], 0);
}

#[tokio::test]
async fn circuit_push_overwrites_status() {
    let test = make_app();
    assert_eq!(test.status.load(), CircuitStatus::Primary);

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/circuit/2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.status.load(), CircuitStatus::Open);

    let response = test
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/circuit/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.status.load(), CircuitStatus::Fallback);
}

#[tokio::test]
async fn circuit_push_unparseable_status_defaults_to_primary() {
    let test = make_app();
    test.status.store(CircuitStatus::Open);

    let response = test
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/circuit/garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.status.load(), CircuitStatus::Primary);
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let test = make_app();

    let response = test
        .app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let test = make_app();

    let response = test
        .app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
