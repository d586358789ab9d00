//! Routing fallbacks and the diagnostic error route.

use axum::http::{Method, Uri};

use crate::error::AppError;

/// Handler for requests that match no route.
///
/// Also installed for known paths requested with an unregistered method, so
/// `POST /health` is a routing miss like any other.
pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {method}:{} not found", uri.path()))
}

/// Deliberately fails so the error pipeline can be exercised end to end.
///
/// Registered outside production only.
pub async fn error_test() -> AppError {
    AppError::Internal("This is a test error".to_string())
}
