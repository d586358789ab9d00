//! In-process tests of the assembled router.
//!
//! Requests are driven through `tower::ServiceExt::oneshot`, so no socket
//! is bound and the shutdown handle can be flipped without stopping a
//! server.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use echo_service::{
    App, BuildOptions, Config, Environment, MIDDLEWARE_ORDER, Stage, build_app,
};

fn development() -> Config {
    Config {
        environment: Environment::Development,
        rate_limit_max: 1000,
        cors_origins: vec!["https://app.example.com".to_string()],
        ..Config::default()
    }
}

fn app(config: Config) -> App {
    build_app(config, BuildOptions::default()).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Health State Transition
// ============================================================================

#[tokio::test]
async fn test_health_before_and_after_close() {
    let app = app(development());

    let (status, _, body) = send(app.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, _, body) = send(app.router(), get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ready": true }));

    assert!(app.shutdown_handle().close());

    let (status, _, body) = send(app.router(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "shutting down");
    assert!(body["timestamp"].is_string());

    let (status, _, body) = send(app.router(), get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "ready": false, "reason": "shutting down" }));
}

#[tokio::test]
async fn test_liveness_unaffected_by_close() {
    let app = app(development());

    let (status, _, _) = send(app.router(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);

    app.shutdown_handle().close();
    app.shutdown_handle().close();

    let (status, _, body) = send(app.router(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "alive": true }));
}

// ============================================================================
// Error Envelope
// ============================================================================

#[tokio::test]
async fn test_wrong_method_is_not_found() {
    let app = app(development());

    let (status, _, body) = send(app.router(), get("/echo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "statusCode": 404,
            "error": "Not Found",
            "message": "Route GET:/echo not found"
        })
    );

    let (status, _, body) = send(app.router(), post_json("/health", &json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route POST:/health not found");
}

#[tokio::test]
async fn test_not_found_includes_method_and_path() {
    let app = app(development());

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/nowhere?x=1")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app.router(), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route DELETE:/nowhere not found");
}

#[tokio::test]
async fn test_body_limit_returns_413_envelope() {
    let app = app(Config {
        max_request_body_size: 64,
        ..development()
    });

    let body = json!({ "message": "x".repeat(200) });
    let (status, _, body) = send(app.router(), post_json("/echo", &body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["statusCode"], 413);
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn test_error_test_route_by_environment() {
    let dev = app(development());
    let (status, _, body) = send(dev.router(), get("/error-test")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "This is a test error");

    let test_env = app(Config {
        environment: Environment::Test,
        ..development()
    });
    let (status, _, _) = send(test_env.router(), get("/error-test")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let prod = app(Config {
        environment: Environment::Production,
        ..development()
    });
    let (status, _, _) = send(prod.router(), get("/error-test")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_echo_validation_in_production_keeps_message() {
    let app = app(Config {
        environment: Environment::Production,
        ..development()
    });

    let (status, _, body) = send(app.router(), post_json("/echo", &json!({ "msg": "hi" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert_eq!(
        body["message"],
        "body must have required property 'message', body must NOT have additional properties"
    );
}

// ============================================================================
// Rate Limiting (in-process callers are keyed by forwarding headers)
// ============================================================================

#[tokio::test]
async fn test_rate_limit_exhaustion_in_process() {
    let app = app(Config {
        rate_limit_max: 2,
        ..development()
    });

    let from = |ip: &str| {
        Request::get("/health")
            .header("x-forwarded-for", ip)
            .header("origin", "https://app.example.com")
            .body(Body::empty())
            .unwrap()
    };

    let (status, headers, _) = send(app.router(), from("198.51.100.7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "1");

    send(app.router(), from("198.51.100.7")).await;
    let (status, headers, body) = send(app.router(), from("198.51.100.7")).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key("retry-after"));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body["error"], "Too Many Requests");
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn test_preflights_are_rate_limited() {
    let app = app(Config {
        rate_limit_max: 2,
        ..development()
    });

    let preflight = || {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/echo")
            .header("x-forwarded-for", "198.51.100.9")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    };

    for expected_remaining in ["1", "0"] {
        let (status, headers, _) = send(app.router(), preflight()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers["x-ratelimit-remaining"], expected_remaining);
        assert_eq!(
            headers["access-control-allow-origin"],
            "https://app.example.com"
        );
    }

    let (status, headers, body) = send(app.router(), preflight()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.get("access-control-allow-origin").is_none());
    assert_eq!(body["statusCode"], 429);
}

#[tokio::test]
async fn test_rate_limited_request_never_reaches_handler() {
    let app = app(Config {
        rate_limit_max: 1,
        ..development()
    });

    let request = || {
        Request::post("/echo")
            .header("content-type", "application/json")
            .header("x-real-ip", "192.0.2.10")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap()
    };

    let (status, _, body) = send(app.router(), request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "echo": "hi" }));

    let (status, _, body) = send(app.router(), request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body.get("echo").is_none());
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_middleware_order_contract() {
    assert_eq!(
        MIDDLEWARE_ORDER,
        [
            Stage::RequestLogging,
            Stage::RequestId,
            Stage::RateLimit,
            Stage::Cors,
            Stage::SecurityHeaders,
            Stage::ErrorHandler,
        ]
    );
}

#[tokio::test]
async fn test_request_logging_can_be_disabled() {
    let app = build_app(development(), BuildOptions { request_logging: false }).unwrap();

    let (status, headers, _) = send(app.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_state_exposes_config() {
    let app = app(development());

    assert_eq!(app.state().config.environment, Environment::Development);
    assert_eq!(app.state().config.rate_limit_max, 1000);
}
