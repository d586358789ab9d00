//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │ Request Logging  │ ← one "request completed" record per request
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← X-RateLimit-* headers, marks over-quota requests
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← answers preflights, grants listed origins
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Security Headers │ ← CSP, HSTS, frame-deny, nosniff, ...
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Error Handler   │ ← renders every AppError (and 429s)
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! The order is data ([`MIDDLEWARE_ORDER`]), not a side effect of call
//! order, and [`build_app`] applies it by walking that list.
//!
//! # Routes
//!
//! - `GET /health`, `GET /health/live`, `GET /health/ready` - Probes
//! - `POST /echo` - Echo a validated message
//! - `GET /error-test` - Diagnostic failure (not registered in production)

use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ErrorTranslator;
use crate::handlers;
use crate::middleware::{
    ErrorHandlerLayer, RateLimitError, RateLimitLayer, RequestIdLayer, RequestLogLayer,
    TrustedProxies, apply_cors, apply_security_headers,
};
use crate::state::{AppState, ShutdownHandle};

/// A middleware stage of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestLogging,
    RequestId,
    RateLimit,
    Cors,
    SecurityHeaders,
    ErrorHandler,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RequestLogging => "request_logging",
            Stage::RequestId => "request_id",
            Stage::RateLimit => "rate_limit",
            Stage::Cors => "cors",
            Stage::SecurityHeaders => "security_headers",
            Stage::ErrorHandler => "error_handler",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Middleware order, outermost first. Routes sit inside the last stage.
///
/// Logging must wrap everything so it sees the final status, and the error
/// handler must sit directly around the routes so every fault is rendered.
pub const MIDDLEWARE_ORDER: [Stage; 6] = [
    Stage::RequestLogging,
    Stage::RequestId,
    Stage::RateLimit,
    Stage::Cors,
    Stage::SecurityHeaders,
    Stage::ErrorHandler,
];

/// Options for [`build_app`].
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Emit a log record for every completed request
    pub request_logging: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            request_logging: true,
        }
    }
}

/// A fully assembled application, ready to be served.
#[derive(Clone)]
pub struct App {
    router: Router,
    state: AppState,
    rate_limit: RateLimitLayer,
    /// Tracks background maintenance tasks for graceful shutdown
    tasks: TaskTracker,
}

impl App {
    /// A clone of the router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Handle that flips health/readiness and stops the server.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.state.shutdown.clone()
    }

    /// Spawn the periodic maintenance tasks onto the current runtime.
    ///
    /// Tasks stop once the shutdown handle is closed; await
    /// [`wait_background_tasks`](Self::wait_background_tasks) to join them.
    pub fn spawn_background_tasks(&self) {
        let rate_limit = self.rate_limit.clone();
        let shutdown = self.state.shutdown.clone();
        self.tasks.spawn(async move {
            let mut ticker = interval(rate_limit.prune_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.clone().closed() => break,
                    _ = ticker.tick() => {
                        rate_limit.prune();
                        debug!(clients = rate_limit.tracked_clients(), "Pruned idle rate limit entries");
                    }
                }
            }

            debug!("Rate limit pruning task stopped");
        });
    }

    /// Wait for the background tasks to finish after shutdown.
    pub async fn wait_background_tasks(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

/// Build the application: routes, state, and the middleware stack.
///
/// Binding a socket and wiring signals are left to the caller.
///
/// # Errors
///
/// Returns `RateLimitError` if the rate limit configuration is invalid.
pub fn build_app(config: Config, options: BuildOptions) -> Result<App, RateLimitError> {
    let trusted_proxies = Arc::new(TrustedProxies::new(&config.trusted_proxies));
    let translator = ErrorTranslator::new(config.environment);

    // Built up front so a bad window fails the build, not the first request
    let rate_limit = RateLimitLayer::new(
        config.rate_limit_max,
        &config.rate_limit_window,
        trusted_proxies.clone(),
        translator,
    )?;
    info!(
        max = config.rate_limit_max,
        window = %config.rate_limit_window,
        trusted_proxies = config.trusted_proxies.len(),
        "Rate limiting enabled"
    );

    if config.cors_origins.is_empty() {
        info!("CORS disabled (no CORS_ORIGINS set); cross-origin requests are denied");
    } else {
        info!(origins = ?config.cors_origins, "CORS enabled");
    }

    let state = AppState::new(config, ShutdownHandle::new());
    let config = state.config.clone();

    // =========================================================================
    // Routes
    // =========================================================================
    let mut routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness_check))
        .route("/health/ready", get(handlers::readiness_check))
        .route("/echo", post(handlers::echo));

    if config.environment.is_production() {
        info!("Diagnostic route /error-test disabled in production");
    } else {
        routes = routes.route("/error-test", get(handlers::error_test));
    }

    let mut router = routes
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .with_state(state.clone());

    // =========================================================================
    // Middleware, innermost first
    // =========================================================================
    for stage in MIDDLEWARE_ORDER.iter().rev() {
        router = match stage {
            Stage::ErrorHandler => router.layer(ErrorHandlerLayer::new(translator)),
            Stage::SecurityHeaders => apply_security_headers(router),
            Stage::Cors => apply_cors(router, &config.cors_origins),
            Stage::RateLimit => router.layer(rate_limit.clone()),
            Stage::RequestId => router.layer(RequestIdLayer::new()),
            Stage::RequestLogging if options.request_logging => {
                router.layer(RequestLogLayer::new(trusted_proxies.clone()))
            }
            Stage::RequestLogging => {
                info!("Request logging disabled");
                router
            }
        };
    }

    Ok(App {
        router,
        state,
        rate_limit,
        tasks: TaskTracker::new(),
    })
}
