//! Fault taxonomy and the central error translator.
//!
//! Handlers and middleware never format error bodies themselves. They
//! return an [`AppError`]; its `IntoResponse` impl produces a bare response
//! that carries the fault in its extensions, and the error handler layer
//! hands it to [`ErrorTranslator::render`] together with the request that
//! caused it. This keeps logging and the production-mode policy in one
//! place.
//!
//! # Response Body
//!
//! ```json
//! { "statusCode": 400, "error": "Bad Request", "message": "body must have required property 'message'" }
//! ```

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::config::Environment;
use crate::metrics;
use crate::middleware::redact::redact_headers;
use crate::middleware::request_id::RequestId;

/// Message returned for 500 responses in production mode.
pub const GENERIC_INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// Faults raised while serving a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The request body failed schema validation.
    #[error("{0}")]
    Validation(String),

    /// The client exhausted its rate limit quota.
    #[error("Rate limit exceeded, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// No route matched the request.
    #[error("{0}")]
    NotFound(String),

    /// A transport-level fault with its own status, such as malformed JSON,
    /// an unsupported content type or an oversized body.
    #[error("{message}")]
    Framework { status: StatusCode, message: String },

    /// Anything unexpected.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::NotFound(_) => "not_found",
            AppError::Framework { .. } => "framework",
            AppError::Internal(_) => "internal",
        }
    }

    /// HTTP status the fault maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Framework { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Framework {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// Defers rendering to the error handler layer.
///
/// The returned response only has the fault's status; the body is written
/// by [`ErrorTranslator::render`] once the layer sees the fault in the
/// response extensions.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl ErrorEnvelope {
    fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error: error.into(),
            message: message.into(),
        }
    }
}

/// The parts of a request needed to log a fault.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Set once the request id layer has run
    pub request_id: Option<RequestId>,
}

impl RequestSummary {
    pub fn capture<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            request_id: req.extensions().get::<RequestId>().cloned(),
        }
    }
}

/// Maps faults to status codes and envelopes.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    environment: Environment,
}

impl ErrorTranslator {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    /// Compose the client-facing envelope for a fault.
    ///
    /// | Fault                          | `error`                 | `message`                   |
    /// |--------------------------------|-------------------------|-----------------------------|
    /// | `Validation`                   | "Bad Request"           | validation failure          |
    /// | `Framework` (status != 500)    | fault message           | fault message               |
    /// | `NotFound`, `RateLimited`      | status reason phrase    | fault message               |
    /// | `Internal`, `Framework` (500)  | "Internal Server Error" | generic text in production  |
    pub fn translate(&self, fault: &AppError) -> ErrorEnvelope {
        match fault {
            AppError::Validation(message) => {
                ErrorEnvelope::new(StatusCode::BAD_REQUEST, "Bad Request", message.as_str())
            }
            AppError::Framework { status, message } if *status != StatusCode::INTERNAL_SERVER_ERROR => {
                ErrorEnvelope::new(*status, message.as_str(), message.as_str())
            }
            AppError::NotFound(_) | AppError::RateLimited { .. } => {
                let status = fault.status();
                let reason = status.canonical_reason().unwrap_or("Error");
                ErrorEnvelope::new(status, reason, fault.to_string())
            }
            AppError::Framework { .. } | AppError::Internal(_) => {
                let message = if self.environment.is_production() {
                    GENERIC_INTERNAL_MESSAGE.to_string()
                } else {
                    fault.to_string()
                };
                ErrorEnvelope::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    message,
                )
            }
        }
    }

    /// Log the fault with its request context, then build the response.
    pub fn render(&self, fault: &AppError, request: &RequestSummary) -> Response {
        let headers = redact_headers(&request.headers);
        let request_id = request.request_id.as_ref().map(RequestId::as_str);
        error!(
            method = %request.method,
            url = %request.uri,
            headers = ?headers,
            request_id,
            kind = fault.kind(),
            status = fault.status().as_u16(),
            error = %fault,
            "request failed"
        );
        metrics::record_fault(fault.kind());

        let envelope = self.translate(fault);
        let status =
            StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(envelope)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
