//! Sensitive header redaction for log records.
//!
//! Every place that logs request headers goes through [`redact_headers`],
//! which returns an owned copy. The request itself is never modified.

use std::collections::BTreeMap;

use axum::http::HeaderMap;

/// Replacement value for sensitive headers.
pub const REDACTED: &str = "[REDACTED]";

/// Headers whose values must never reach a log sink.
pub const SENSITIVE_HEADERS: [&str; 6] = [
    "authorization",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
    "x-session-token",
];

/// Placeholder for header values that are not valid UTF-8.
const BINARY_VALUE: &str = "<binary>";

/// Check whether a header name is in the sensitive set (ASCII case-insensitive).
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// Copy headers into a sorted map, masking sensitive values.
///
/// Repeated headers are joined with `", "`.
pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut view: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let rendered = if is_sensitive_header(name.as_str()) {
            REDACTED
        } else {
            value.to_str().unwrap_or(BINARY_VALUE)
        };

        view.entry(name.as_str().to_string())
            .and_modify(|existing| {
                // One marker is enough for a repeated sensitive header
                if rendered != REDACTED {
                    existing.push_str(", ");
                    existing.push_str(rendered);
                }
            })
            .or_insert_with(|| rendered.to_string());
    }

    view
}
