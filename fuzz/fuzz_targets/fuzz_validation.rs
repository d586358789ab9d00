//! Fuzz testing for request validation and configuration parsing.
//!
//! Ensures that, for arbitrary input, the validators:
//!
//! - Never panic
//! - Accept a body exactly when it is `{"message": <1..=1000 chars>}`
//! - Return the message unchanged on success
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the validation fuzz target
//! cargo +nightly fuzz run fuzz_validation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `validate_echo_body`: Echo request schema validation
//! - `parse_window`: `RATE_LIMIT_WINDOW` parsing

#![no_main]

use echo_service::middleware::rate_limit::parse_window;
use echo_service::validation::{MAX_MESSAGE_LENGTH, MIN_MESSAGE_LENGTH, validate_echo_body};
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON documents
    if let Ok(body) = serde_json::from_slice::<Value>(data) {
        let _ = validate_echo_body(&body);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        // Any string wrapped as a message must be accepted iff its length fits
        let body = json!({ "message": s });
        let length = s.chars().count();
        let fits = (MIN_MESSAGE_LENGTH..=MAX_MESSAGE_LENGTH).contains(&length);
        match validate_echo_body(&body) {
            Ok(message) => {
                assert!(fits);
                assert_eq!(message, s);
            }
            Err(_) => assert!(!fits),
        }

        // Window parsing must not panic and never yields a zero window
        if let Ok(window) = parse_window(s) {
            assert!(!window.is_zero());
        }
    }
});
