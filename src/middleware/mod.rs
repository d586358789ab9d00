//! HTTP middleware for security, rate limiting, and observability.
//!
//! - **Request logging**: One structured record per completed request
//! - **Request ID**: Generation and propagation of `X-Request-Id`
//! - **Rate limiting**: Per-client GCRA quota with `X-RateLimit-*` headers
//! - **CORS / security headers**: Origin allow-list and defensive headers
//! - **Error handling**: Central rendering of every fault into an envelope
//! - **Redaction / client IP**: Helpers shared by the layers above
//!
//! # Architecture
//!
//! ```text
//! Request → Log → Request ID → Rate Limit → CORS → Security → Errors → Handler
//!                                   ↓                           ↓
//!                            answers 429 itself         renders AppError
//! ```
//!
//! The order is fixed in [`crate::routes::MIDDLEWARE_ORDER`].

pub mod error_handler;
pub mod ip;
pub mod rate_limit;
pub mod redact;
pub mod request_id;
pub mod request_log;
pub mod security;

pub use error_handler::ErrorHandlerLayer;
pub use ip::{CidrRange, TrustedProxies, UNKNOWN_IP, resolve_client_ip};
pub use rate_limit::{RateLimitError, RateLimitLayer};
pub use redact::{REDACTED, SENSITIVE_HEADERS, redact_headers};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer};
pub use request_log::RequestLogLayer;
pub use security::{apply_cors, apply_security_headers, cors_layer};
