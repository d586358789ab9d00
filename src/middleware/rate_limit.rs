//! Per-client rate limiting.
//!
//! # Algorithm
//!
//! Uses the Governor crate's Generic Cell Rate Algorithm (GCRA). A client
//! may send `max` requests at once; capacity then refills continuously so
//! that `max` requests are replenished over one window. Compared to a fixed
//! window counter this avoids the double burst at window boundaries.
//!
//! # Response Headers
//!
//! Every response carries:
//! - `X-RateLimit-Limit`: Requests allowed per window
//! - `X-RateLimit-Remaining`: Requests left before throttling
//! - `X-RateLimit-Reset`: Seconds until the quota is fully restored
//!   (or, when throttled, until the next request is admitted)
//!
//! Throttled responses also carry `Retry-After`.
//!
//! # Rejection Flow
//!
//! A rejected request goes no further. The limiter logs it, then answers
//! with an `AppError::RateLimited` rendered by the [`ErrorTranslator`].
//! Inner layers never see it, so a CORS preflight is throttled like any
//! other request.
//!
//! # Memory
//!
//! One entry is kept per client key. [`RateLimitLayer::prune`] drops the
//! entries whose quota is fully restored; the application runs it on a
//! timer (see `App::spawn_background_tasks`).

use std::num::NonZeroU32;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, Response, header};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::warn;

use super::ip::{TrustedProxies, resolve_client_ip};
use crate::error::{AppError, ErrorTranslator, RequestSummary};
use crate::metrics;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Longest accepted window. The limiter stores times as `u64` nanoseconds.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Bounds on how often idle client entries are pruned.
const MIN_PRUNE_INTERVAL: Duration = Duration::from_secs(1);
const MAX_PRUNE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Error type for rate limit layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// The request budget per window cannot be zero.
    #[error("RATE_LIMIT_MAX must be greater than 0")]
    ZeroMax,

    /// The window string could not be understood.
    #[error("invalid RATE_LIMIT_WINDOW '{0}'; expected e.g. '1 minute', '30s' or a number of milliseconds")]
    InvalidWindow(String),
}

/// Per-client limiter that reports remaining capacity on success.
type KeyedLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock, StateInformationMiddleware>;

/// Parse a human-written window such as `"1 minute"`, `"5 minutes"`,
/// `"30s"` or `"1500"` (milliseconds).
///
/// Windows shorter than a millisecond or longer than [`MAX_WINDOW`] are
/// rejected.
pub fn parse_window(raw: &str) -> Result<Duration, RateLimitError> {
    let invalid = || RateLimitError::InvalidWindow(raw.to_string());
    let trimmed = raw.trim();

    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (amount, unit) = trimmed.split_at(split_at);

    let amount: f64 = amount.parse().map_err(|_| invalid())?;
    let millis_per_unit: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        _ => return Err(invalid()),
    };

    let millis = amount * millis_per_unit;
    if !millis.is_finite() || millis < 1.0 || millis > MAX_WINDOW.as_millis() as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_millis(millis as u64))
}

/// Round a duration up to whole seconds.
fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Rate limiting layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let translator = ErrorTranslator::new(Environment::Production);
/// let layer = RateLimitLayer::new(10, "1 minute", Arc::new(TrustedProxies::default()), translator)?;
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(layer);
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<KeyedLimiter>,
    /// Requests allowed per window (for headers)
    limit: u32,
    window: Duration,
    /// Time for one unit of capacity to come back
    replenish_interval: Duration,
    trusted_proxies: Arc<TrustedProxies>,
    translator: ErrorTranslator,
}

impl RateLimitLayer {
    /// Create a per-client limiter allowing `max` requests per `window`.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroMax` if `max` is 0 and
    /// `RateLimitError::InvalidWindow` if the window cannot be parsed.
    pub fn new(
        max: u32,
        window: &str,
        trusted_proxies: Arc<TrustedProxies>,
        translator: ErrorTranslator,
    ) -> Result<Self, RateLimitError> {
        let burst = NonZeroU32::new(max).ok_or(RateLimitError::ZeroMax)?;
        let window_duration = parse_window(window)?;

        let replenish_interval = (window_duration / max).max(Duration::from_nanos(1));
        let quota = Quota::with_period(replenish_interval)
            .ok_or_else(|| RateLimitError::InvalidWindow(window.to_string()))?
            .allow_burst(burst);

        let limiter: KeyedLimiter =
            RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>();

        Ok(Self {
            limiter: Arc::new(limiter),
            limit: max,
            window: window_duration,
            replenish_interval,
            trusted_proxies,
            translator,
        })
    }

    /// Forget clients whose quota has been fully restored.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of client keys currently held.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// How often [`prune`](Self::prune) should run: once per window,
    /// clamped to between one second and five minutes.
    pub fn prune_interval(&self) -> Duration {
        self.window.clamp(MIN_PRUNE_INTERVAL, MAX_PRUNE_INTERVAL)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            limit: self.limit,
            replenish_interval: self.replenish_interval,
            trusted_proxies: self.trusted_proxies.clone(),
            translator: self.translator,
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<KeyedLimiter>,
    limit: u32,
    replenish_interval: Duration,
    trusted_proxies: Arc<TrustedProxies>,
    translator: ErrorTranslator,
}

/// Header values computed before the request is forwarded.
#[derive(Debug, Clone, Copy)]
struct QuotaHeaders {
    limit: u32,
    remaining: u32,
    reset_secs: u64,
    retry_after_secs: Option<u64>,
}

impl QuotaHeaders {
    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from(self.reset_secs));
        if let Some(retry_after) = self.retry_after_secs {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
    }
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let client_ip = resolve_client_ip(&req, &self.trusted_proxies).into_owned();

        let quota = match self.limiter.check_key(&client_ip) {
            Ok(snapshot) => {
                let remaining = snapshot.remaining_burst_capacity();
                let used = self.limit.saturating_sub(remaining);
                QuotaHeaders {
                    limit: self.limit,
                    remaining,
                    reset_secs: ceil_secs(self.replenish_interval * used),
                    retry_after_secs: None,
                }
            }
            Err(not_until) => {
                let wait_time = not_until.wait_time_from(DefaultClock::default().now());
                let retry_after_secs = ceil_secs(wait_time).max(1);

                warn!(
                    client_ip = %client_ip,
                    url = %req.uri(),
                    retry_after_secs,
                    "rate limit exceeded"
                );
                metrics::record_rate_limited();

                let fault = AppError::RateLimited { retry_after_secs };
                let mut response = self
                    .translator
                    .render(&fault, &RequestSummary::capture(&req));
                QuotaHeaders {
                    limit: self.limit,
                    remaining: 0,
                    reset_secs: retry_after_secs,
                    retry_after_secs: Some(retry_after_secs),
                }
                .apply(response.headers_mut());

                return Box::pin(async move { Ok(response) });
            }
        };

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            quota.apply(response.headers_mut());
            Ok(response)
        })
    }
}
