//! # Echo Service
//!
//! A small, hardened JSON echo service built on Axum, featuring:
//!
//! - **Probes**: `/health`, `/health/live`, `/health/ready` wired to graceful shutdown
//! - **Security**: Per-client rate limiting, CORS allow-list, defensive headers
//! - **Observability**: Structured request logs with header redaction, request IDs,
//!   optional Prometheus metrics
//! - **Errors**: One translator renders every fault into `{statusCode, error, message}`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Log → Request ID → Rate Limit → CORS →         │
//! │              Security Headers → Error Handler)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, echo, fallbacks)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  AppState (Config, ShutdownHandle)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use echo_service::{BuildOptions, Config, build_app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr = config.server_addr();
//!     let app = build_app(config, BuildOptions::default())?;
//!     let shutdown = app.shutdown_handle();
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(
//!         listener,
//!         app.into_router()
//!             .into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .with_graceful_shutdown(shutdown.closed())
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! NODE_ENV=production PORT=8080 RATE_LIMIT_MAX=100 RATE_LIMIT_WINDOW="1 minute" \
//!   CORS_ORIGINS=https://app.example.com cargo run --release
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::{Config, ConfigError, Environment, LogFormat};
pub use error::{AppError, AppResult, ErrorEnvelope, ErrorTranslator};
pub use routes::{App, BuildOptions, MIDDLEWARE_ORDER, Stage, build_app};
pub use state::{AppState, Lifecycle, ShutdownHandle};
pub use telemetry::LogSettings;
