//! Request completion logging.
//!
//! Installed as the outermost layer, so the status it records is the one
//! the client actually receives, including 429s from the rate limiter and
//! bodies rewritten by the error handler.
//!
//! Each request produces exactly one `info` record:
//!
//! ```json
//! {"level":"INFO","fields":{"message":"request completed","method":"GET","url":"/health",
//!  "headers":"{\"authorization\": \"[REDACTED]\"}","remote_addr":"10.0.0.7",
//!  "request_id":"0b6c...","status":200,"response_time_ms":0.41}}
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::info;

use super::ip::{TrustedProxies, resolve_client_ip};
use super::redact::redact_headers;
use super::request_id::REQUEST_ID_HEADER;
use crate::metrics;

/// Request logging layer for Tower middleware stack.
#[derive(Clone)]
pub struct RequestLogLayer {
    trusted_proxies: Arc<TrustedProxies>,
}

impl RequestLogLayer {
    pub fn new(trusted_proxies: Arc<TrustedProxies>) -> Self {
        Self { trusted_proxies }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

/// Request logging service wrapper.
#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    trusted_proxies: Arc<TrustedProxies>,
}

impl<S> Service<Request<Body>> for RequestLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let started_at = Instant::now();
        let method = req.method().clone();
        let url = req.uri().clone();
        let headers = redact_headers(req.headers());
        let remote_addr = resolve_client_ip(&req, &self.trusted_proxies).into_owned();

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let elapsed = started_at.elapsed();
            let status = response.status();
            let request_id = response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");

            info!(
                method = %method,
                url = %url,
                headers = ?headers,
                remote_addr = %remote_addr,
                request_id = %request_id,
                status = status.as_u16(),
                response_time_ms = elapsed.as_secs_f64() * 1000.0,
                "request completed"
            );
            metrics::record_request(method.as_str(), status.as_u16(), elapsed.as_secs_f64());

            Ok(response)
        })
    }
}
