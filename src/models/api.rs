use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported while the service is draining.
pub const SHUTTING_DOWN: &str = "shutting down";

/// Body of a successful echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    /// The message exactly as received
    pub echo: String,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `false` once shutdown has started
    pub ok: bool,
    /// Present only while shutting down
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    /// Current timestamp (RFC 3339)
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn running(timestamp: DateTime<Utc>) -> Self {
        Self {
            ok: true,
            status: None,
            timestamp,
        }
    }

    pub fn shutting_down(timestamp: DateTime<Utc>) -> Self {
        Self {
            ok: false,
            status: Some(SHUTTING_DOWN.to_string()),
            timestamp,
        }
    }
}

/// Liveness probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub alive: bool,
}

/// Readiness probe response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    /// Why the service is not ready
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}
