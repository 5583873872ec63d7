//! Integration tests for the reverse proxy with mock backends.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use paygate::config::ProxyConfig;
use paygate::proxy::{create_router, BackendPool, ProxyState};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_state(backends: &[String], config: &ProxyConfig) -> Arc<ProxyState> {
    let pool = Arc::new(BackendPool::from_urls(backends).unwrap());
    Arc::new(ProxyState::new(pool, config))
}

fn make_app(backends: &[String]) -> axum::Router {
    create_router(make_state(backends, &ProxyConfig::default()))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn forwards_method_path_and_query() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .and(query_param("probe", "1"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&backend)
        .await;

    let app = make_app(&[backend.uri()]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments?probe=1")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, "created");
    backend.verify().await;
}

#[tokio::test]
async fn joins_base_path_with_single_slash() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/foo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend)
        .await;

    let app = make_app(&[format!("{}/api/", backend.uri())]);
    let response = app
        .oneshot(Request::builder().uri("/foo").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    backend.verify().await;
}

#[tokio::test]
async fn strips_hop_headers_and_connection_listed_names() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;

    let app = make_app(&[backend.uri()]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/check")
                .header("connection", "X-Custom")
                .header("x-custom", "secret")
                .header("x-forwarded-for", "203.0.113.9")
                .header("host", "edge.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let received = &backend.received_requests().await.unwrap()[0];
    assert!(!received.headers.contains_key("connection"));
    assert!(!received.headers.contains_key("x-custom"));
    assert_eq!(
        received.headers.get("x-forwarded-proto").unwrap(),
        "http"
    );
    assert_eq!(
        received.headers.get("x-forwarded-host").unwrap(),
        "edge.example.com"
    );
}

#[tokio::test]
async fn overrides_host_with_backend_host() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;

    let app = make_app(&[backend.uri()]);
    app.oneshot(
        Request::builder()
            .uri("/check")
            .header("host", "edge.example.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let received = &backend.received_requests().await.unwrap()[0];
    let backend_host = backend.uri().trim_start_matches("http://").to_string();
    assert_eq!(
        received.headers.get("host").unwrap().to_str().unwrap(),
        backend_host
    );
}

#[tokio::test]
async fn unreachable_backend_yields_bad_gateway() {
    let app = make_app(&["http://127.0.0.1:1".to_string()]);
    let response = app
        .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn stalled_backend_yields_gateway_timeout() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&backend)
        .await;

    let config = ProxyConfig {
        deadline_ms: 100,
        ..Default::default()
    };
    let app = create_router(make_state(&[backend.uri()], &config));
    let response = app
        .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn empty_pool_yields_bad_gateway_without_dialing() {
    let app = make_app(&[]);
    let response = app
        .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn in_flight_counts_return_to_zero_after_burst() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;

    let state = make_state(
        &[backend.uri(), "http://127.0.0.1:1".to_string()],
        &ProxyConfig::default(),
    );
    let app = create_router(Arc::clone(&state));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(Request::builder().uri("/burst").body(Body::empty()).unwrap())
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        // Mixed successes and bad-gateway failures are both fine here.
        let _ = handle.await.unwrap();
    }

    for backend in state.pool().backends() {
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn response_hop_headers_are_stripped() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("keep-alive", "timeout=5")
                .insert_header("x-app", "v1"),
        )
        .mount(&backend)
        .await;

    let app = make_app(&[backend.uri()]);
    let response = app
        .oneshot(Request::builder().uri("/resp").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().get("keep-alive").is_none());
    assert_eq!(response.headers().get("x-app").unwrap(), "v1");
}
