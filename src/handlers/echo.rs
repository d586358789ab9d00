//! Echo endpoint.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::AppResult;
use crate::models::EchoResponse;
use crate::validation::validate_echo_body;

/// Return the submitted message unchanged.
///
/// # Request Body
///
/// ```json
/// { "message": "hello" }
/// ```
///
/// # Errors
///
/// - Malformed JSON or a wrong content type surface with the status the
///   extractor chose (400, 413 or 415).
/// - Schema violations surface as 400 validation faults.
#[instrument(skip(payload))]
pub async fn echo(payload: Result<Json<Value>, JsonRejection>) -> AppResult<Json<EchoResponse>> {
    let Json(body) = payload?;
    let message = validate_echo_body(&body)?;

    debug!(length = message.chars().count(), "Echoing message");

    Ok(Json(EchoResponse {
        echo: message.to_string(),
    }))
}
