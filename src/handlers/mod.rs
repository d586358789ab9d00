mod echo;
mod fallback;
mod health;

pub use echo::echo;
pub use fallback::{error_test, not_found};
pub use health::{health_check, liveness_check, readiness_check};
