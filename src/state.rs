//! Shared application state for Axum handlers.
//!
//! Holds the configuration and the shutdown handle. The handle is owned by
//! the composition root and injected here; health handlers read it, the
//! entry point's signal watcher writes it.
//!
//! # Lifecycle
//!
//! ```text
//! Running ──close()──▶ ShuttingDown
//! ```
//!
//! The transition happens once. Later `close()` calls are no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::metrics;

/// Serving state derived from the shutdown flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    ShuttingDown,
}

/// One-way shutdown switch shared by the server, health handlers and the
/// signal watcher.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin shutting down.
    ///
    /// Returns `true` for the call that performed the transition and
    /// `false` for every later call.
    pub fn close(&self) -> bool {
        if self.flag.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!("Shutdown started; readiness now reports not ready");
        metrics::set_shutting_down(true);
        self.token.cancel();
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.is_shutting_down() {
            Lifecycle::ShuttingDown
        } else {
            Lifecycle::Running
        }
    }

    /// Resolves once [`close`](Self::close) has been called.
    ///
    /// Suitable for `axum::serve(..).with_graceful_shutdown(..)`.
    pub async fn closed(self) {
        self.token.cancelled().await;
    }
}

/// Shared application state for Axum handlers.
///
/// Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shutdown flag read by the health handlers
    pub shutdown: ShutdownHandle,
}

impl AppState {
    pub fn new(config: Config, shutdown: ShutdownHandle) -> Self {
        Self {
            config: Arc::new(config),
            shutdown,
        }
    }
}
