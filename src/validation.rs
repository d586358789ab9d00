//! Request body validation for the echo endpoint.
//!
//! The body is checked against the schema
//! `{ message: string, minLength 1, maxLength 1000 }` with no additional
//! properties. Every violation is reported, not just the first, and the
//! messages follow the `body/<field> must ...` wording clients of the JSON
//! schema validator already expect:
//!
//! ```text
//! body must have required property 'message', body must NOT have additional properties
//! ```

use serde_json::Value;

use crate::error::{AppError, AppResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Minimum message length, in Unicode scalar values.
pub const MIN_MESSAGE_LENGTH: usize = 1;

/// Maximum message length, in Unicode scalar values.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// The only property an echo body may carry.
pub const MESSAGE_FIELD: &str = "message";

/// Validate an echo request body and return the message on success.
///
/// # Errors
///
/// Returns `AppError::Validation` listing every violation, joined by `", "`.
pub fn validate_echo_body(body: &Value) -> AppResult<&str> {
    let Some(object) = body.as_object() else {
        return Err(AppError::Validation("body must be object".to_string()));
    };

    let mut violations: Vec<String> = Vec::new();

    if !object.contains_key(MESSAGE_FIELD) {
        violations.push(format!(
            "body must have required property '{MESSAGE_FIELD}'"
        ));
    }

    if object.keys().any(|key| key != MESSAGE_FIELD) {
        violations.push("body must NOT have additional properties".to_string());
    }

    let message = match object.get(MESSAGE_FIELD) {
        Some(Value::String(message)) => {
            violations.extend(check_message_length(message));
            Some(message.as_str())
        }
        Some(_) => {
            violations.push(format!("body/{MESSAGE_FIELD} must be string"));
            None
        }
        None => None,
    };

    match message {
        Some(message) if violations.is_empty() => Ok(message),
        _ => Err(AppError::Validation(violations.join(", "))),
    }
}

/// Check message length bounds.
fn check_message_length(message: &str) -> Option<String> {
    let length = message.chars().count();

    if length < MIN_MESSAGE_LENGTH {
        Some(format!(
            "body/{MESSAGE_FIELD} must NOT have fewer than {MIN_MESSAGE_LENGTH} characters"
        ))
    } else if length > MAX_MESSAGE_LENGTH {
        Some(format!(
            "body/{MESSAGE_FIELD} must NOT have more than {MAX_MESSAGE_LENGTH} characters"
        ))
    } else {
        None
    }
}
