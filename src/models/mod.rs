mod api;

pub use api::{EchoResponse, HealthResponse, LivenessResponse, ReadinessResponse, SHUTTING_DOWN};
