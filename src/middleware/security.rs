//! CORS policy and defensive response headers.
//!
//! # CORS
//!
//! Only origins listed in `CORS_ORIGINS` are echoed back. An empty list
//! denies every cross-origin request. Preflights are answered by the layer
//! itself with `204 No Content` and never reach a route.
//!
//! # Security Headers
//!
//! | Header                              | Value                                  |
//! |-------------------------------------|----------------------------------------|
//! | `Content-Security-Policy`           | see [`CONTENT_SECURITY_POLICY`]        |
//! | `Cross-Origin-Opener-Policy`        | `same-origin`                          |
//! | `Cross-Origin-Resource-Policy`      | `same-origin`                          |
//! | `Strict-Transport-Security`         | `max-age=15552000; includeSubDomains`  |
//! | `X-Frame-Options`                   | `DENY`                                 |
//! | `X-Content-Type-Options`            | `nosniff`                              |
//! | `Referrer-Policy`                   | `no-referrer`                          |
//! | `X-DNS-Prefetch-Control`            | `off`                                  |
//! | `X-Download-Options`                | `noopen`                               |
//! | `X-Permitted-Cross-Domain-Policies`  | `none`                                 |
//! | `Origin-Agent-Cluster`              | `?1`                                   |
//! | `X-XSS-Protection`                  | `0`                                    |
//!
//! `X-Powered-By` and `Server` are removed from every response.

use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, Response, StatusCode};
use axum::middleware::Next;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; connect-src 'self'; script-src 'self'; img-src 'self' data:; style-src 'self' 'unsafe-inline'";
pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=15552000; includeSubDomains";

/// How long browsers may cache a preflight result.
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Every defensive header set on responses, as `(name, value)` pairs.
pub const SECURITY_HEADERS: [(&str, &str); 12] = [
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("strict-transport-security", STRICT_TRANSPORT_SECURITY),
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("origin-agent-cluster", "?1"),
    ("x-xss-protection", "0"),
];

/// Headers that reveal the server stack.
const FINGERPRINT_HEADERS: [&str; 2] = ["x-powered-by", "server"];

/// Build the CORS layer for an origin allow-list.
///
/// Entries that are not valid header values are skipped with a warning.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

/// Wrap a router with the CORS policy for `allowed_origins`.
pub fn apply_cors(router: Router, allowed_origins: &[String]) -> Router {
    router
        .layer(cors_layer(allowed_origins))
        .layer(axum::middleware::from_fn(preflight_no_content))
}

/// Answer successful preflights with `204` instead of `200`.
async fn preflight_no_content(req: Request, next: Next) -> axum::response::Response {
    let preflight = req.method() == Method::OPTIONS
        && req
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    let mut response = next.run(req).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Wrap a router with the security header layers.
pub fn apply_security_headers(router: Router) -> Router {
    let router = router.layer(axum::middleware::map_response(strip_fingerprint_headers));

    SECURITY_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
}

/// Remove headers that advertise the server implementation.
pub async fn strip_fingerprint_headers<B>(mut response: Response<B>) -> Response<B> {
    for name in FINGERPRINT_HEADERS {
        response.headers_mut().remove(name);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn router(origins: &[String]) -> Router {
        let routes = Router::new().route(
            "/",
            get(|| async { ([("x-powered-by", "Express"), ("server", "hyper")], "ok") }),
        );
        apply_cors(apply_security_headers(routes), origins)
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let response = router(&[])
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        for (name, value) in SECURITY_HEADERS {
            assert_eq!(response.headers()[name], value, "{name}");
        }
    }

    #[tokio::test]
    async fn test_fingerprint_headers_removed() {
        let response = router(&[])
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().get("x-powered-by").is_none());
        assert!(response.headers().get("server").is_none());
    }

    #[tokio::test]
    async fn test_allowed_origin_echoed() {
        let origins = vec!["https://app.example.com".to_string()];
        let response = router(&origins)
            .oneshot(
                Request::get("/")
                    .header("origin", "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }

    #[tokio::test]
    async fn test_unlisted_origin_not_echoed() {
        let origins = vec!["https://app.example.com".to_string()];
        let response = router(&origins)
            .oneshot(
                Request::get("/")
                    .header("origin", "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_preflight_answered_with_no_content() {
        let origins = vec!["https://app.example.com".to_string()];
        let response = router(&origins)
            .oneshot(
                Request::options("/")
                    .header("origin", "https://app.example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
        let methods = response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap();
        assert!(methods.contains("GET") && methods.contains("POST"));
        assert!(!methods.contains("DELETE"));
    }

    #[test]
    fn test_unparseable_origin_skipped() {
        let origins = vec!["https://ok.example.com".to_string(), "bad\norigin".to_string()];
        let _layer = cors_layer(&origins);
    }
}
