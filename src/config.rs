//! Application configuration loaded from environment variables.
//!
//! # Validation
//!
//! Configuration is validated once at startup. Every rule is checked and all
//! violations are reported together, so an operator fixing a broken
//! deployment sees the full list instead of one error per restart.
//!
//! # Variables
//!
//! - `NODE_ENV`: Deployment mode, one of `development`, `production`, `test` (required)
//! - `PORT`: Listen port, 1-65535 (default: 3000)
//! - `HOST`: Listen address (default: `127.0.0.1`)
//! - `RATE_LIMIT_MAX`: Requests allowed per client per window, any number >= 1 (default: 10)
//! - `RATE_LIMIT_WINDOW`: Window length, e.g. `1 minute`, `30s` (default: `1 minute`)
//! - `CORS_ORIGINS`: Comma-separated origin allow-list (default: empty, no origin allowed)
//!
//! # Operational Tuning
//!
//! - `TRUSTED_PROXIES`: CIDR ranges whose forwarding headers are honored (default: all)
//! - `MAX_REQUEST_BODY_SIZE`: Body limit in bytes (default: 1 MiB)
//! - `LOG_FORMAT`: `json` or `text` (default: `json`)
//! - `RUST_LOG`: Log filter directive (default: `info`)
//! - `METRICS_PORT`: Prometheus exporter port, 0 disables it (default: 0)

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::middleware::ip::CidrRange;

/// Accepted `NODE_ENV` values, in the order they are reported.
pub const VALID_ENVIRONMENTS: [&str; 3] = ["development", "production", "test"];

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW: &str = "1 minute";
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Deployment mode selected by `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    /// Production mode hides internal error detail from clients and
    /// disables diagnostic routes.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, suitable for log shippers
    #[default]
    Json,
    /// Human-readable output for local development
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Aggregated configuration failure.
///
/// Holds every violated rule; `Display` renders them as a bulleted list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Environment validation failed:\n{}", render_violations(.violations))]
pub struct ConfigError {
    pub violations: Vec<String>,
}

fn render_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Application configuration, immutable after startup.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Deployment mode (`NODE_ENV`)
    pub environment: Environment,

    /// Server host address (default: "127.0.0.1")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Maximum request body size in bytes (default: 1 MiB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Requests allowed per client within one window (default: 10)
    pub rate_limit_max: u32,

    /// Window length as written by the operator (default: "1 minute").
    /// Parsed when the rate limiter is built.
    pub rate_limit_window: String,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Origins granted CORS access. Empty means no origin is allowed.
    pub cors_origins: Vec<String>,

    /// Trusted proxy CIDR ranges. Forwarding headers are honored only when
    /// the peer address falls inside one of them; empty trusts every peer.
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log output format (default: json)
    pub log_format: LogFormat,

    /// Log filter directive (default: "info")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// An optional `.env` file is loaded first; variables already present
    /// in the environment take precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] listing every violated rule.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Validate a variable mapping and resolve defaults.
    ///
    /// Empty values are treated the same as missing ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] listing every violated rule.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let mut violations = Vec::new();

        // Required: NODE_ENV
        let environment = match lookup("NODE_ENV") {
            None => {
                violations.push("NODE_ENV is required".to_string());
                None
            }
            Some(raw) => match raw.parse::<Environment>() {
                Ok(environment) => Some(environment),
                Err(_) => {
                    violations.push(format!(
                        "NODE_ENV must be one of: {}",
                        VALID_ENVIRONMENTS.join(", ")
                    ));
                    None
                }
            },
        };

        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port >= 1 => port,
                _ => {
                    violations.push("PORT must be a valid port number (1-65535)".to_string());
                    DEFAULT_PORT
                }
            },
        };

        let host = lookup("HOST").unwrap_or(DEFAULT_HOST).to_string();

        let rate_limit_max = match lookup("RATE_LIMIT_MAX") {
            None => DEFAULT_RATE_LIMIT_MAX,
            Some(raw) => parse_rate_limit_max(raw).unwrap_or_else(|| {
                violations.push("RATE_LIMIT_MAX must be a positive number".to_string());
                DEFAULT_RATE_LIMIT_MAX
            }),
        };

        let rate_limit_window = lookup("RATE_LIMIT_WINDOW")
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW)
            .to_string();

        let cors_origins = lookup("CORS_ORIGINS")
            .map(split_list)
            .unwrap_or_default();

        let trusted_proxies = lookup("TRUSTED_PROXIES")
            .map(split_list)
            .unwrap_or_default();
        for cidr in &trusted_proxies {
            if CidrRange::parse(cidr).is_none() {
                violations.push(format!("TRUSTED_PROXIES contains an invalid CIDR range: {cidr}"));
            }
        }

        let max_request_body_size = match lookup("MAX_REQUEST_BODY_SIZE") {
            None => DEFAULT_MAX_REQUEST_BODY_SIZE,
            Some(raw) => match raw.parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    violations
                        .push("MAX_REQUEST_BODY_SIZE must be a positive number of bytes".to_string());
                    DEFAULT_MAX_REQUEST_BODY_SIZE
                }
            },
        };

        let log_format = match lookup("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                violations.push("LOG_FORMAT must be one of: json, text".to_string());
                LogFormat::default()
            }),
        };

        let log_level = lookup("RUST_LOG").unwrap_or("info").to_string();

        let metrics_port = match lookup("METRICS_PORT") {
            None => 0,
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                violations.push("METRICS_PORT must be a valid port number (0-65535)".to_string());
                0
            }),
        };

        match environment {
            Some(environment) if violations.is_empty() => Ok(Self {
                environment,
                host,
                port,
                max_request_body_size,
                rate_limit_max,
                rate_limit_window,
                cors_origins,
                trusted_proxies,
                log_format,
                log_level,
                metrics_port,
            }),
            _ => Err(ConfigError { violations }),
        }
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        if self.metrics_enabled() {
            Some(SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
        } else {
            None
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a request budget: any finite number of at least one, with the
/// fraction dropped. Values beyond `u32::MAX` saturate.
fn parse_rate_limit_max(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    Some(value.floor().min(f64::from(u32::MAX)) as u32)
}

/// Default configuration for tests.
///
/// Deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Test,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW.to_string(),
            cors_origins: Vec::new(),
            trusted_proxies: Vec::new(),
            log_format: LogFormat::Json,
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_config_with_required_vars() {
        let config = Config::from_vars(&vars(&[
            ("NODE_ENV", "development"),
            ("PORT", "3000"),
            ("HOST", "127.0.0.1"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_missing_node_env() {
        let err = Config::from_vars(&vars(&[("PORT", "3000")])).unwrap_err();
        assert!(err.to_string().contains("NODE_ENV"));
    }

    #[test]
    fn test_invalid_node_env() {
        let err = Config::from_vars(&vars(&[("NODE_ENV", "staging")])).unwrap_err();
        assert!(err.to_string().contains("NODE_ENV must be one of"));
    }

    #[test]
    fn test_accepts_every_valid_node_env() {
        for name in VALID_ENVIRONMENTS {
            let config = Config::from_vars(&vars(&[("NODE_ENV", name)])).unwrap();
            assert_eq!(config.environment.as_str(), name);
        }
    }

    #[test]
    fn test_port_not_numeric() {
        let err = Config::from_vars(&vars(&[("NODE_ENV", "test"), ("PORT", "invalid")]))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_port_out_of_range() {
        for port in ["0", "70000", "-1"] {
            let err =
                Config::from_vars(&vars(&[("NODE_ENV", "test"), ("PORT", port)])).unwrap_err();
            assert!(err.to_string().contains("PORT"), "port {port} should be rejected");
        }
    }

    #[test]
    fn test_defaults_for_optional_vars() {
        let config = Config::from_vars(&vars(&[("NODE_ENV", "development")])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.rate_limit_max, 10);
        assert_eq!(config.rate_limit_window, "1 minute");
        assert!(config.cors_origins.is_empty());
        assert!(config.trusted_proxies.is_empty());
        assert_eq!(config.max_request_body_size, 1024 * 1024);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.metrics_enabled());
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config =
            Config::from_vars(&vars(&[("NODE_ENV", "test"), ("PORT", ""), ("HOST", "")]))
                .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_rate_limit_settings() {
        let config = Config::from_vars(&vars(&[
            ("NODE_ENV", "development"),
            ("RATE_LIMIT_MAX", "100"),
            ("RATE_LIMIT_WINDOW", "5 minutes"),
        ]))
        .unwrap();

        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window, "5 minutes");
    }

    #[test]
    fn test_rate_limit_max_must_be_positive() {
        for max in ["0", "abc"] {
            let err = Config::from_vars(&vars(&[("NODE_ENV", "test"), ("RATE_LIMIT_MAX", max)]))
                .unwrap_err();
            assert!(err.to_string().contains("RATE_LIMIT_MAX"));
        }
    }

    #[test]
    fn test_rate_limit_max_accepts_any_number_from_one() {
        let cases = [
            ("10.0", 10),
            ("2.5", 2),
            ("1e3", 1000),
            (" 7 ", 7),
            ("1", 1),
            ("99999999999", u32::MAX),
        ];
        for (raw, expected) in cases {
            let config =
                Config::from_vars(&vars(&[("NODE_ENV", "test"), ("RATE_LIMIT_MAX", raw)]))
                    .unwrap();
            assert_eq!(config.rate_limit_max, expected, "{raw:?}");
        }

        for raw in ["0.5", "-3", "NaN", "inf"] {
            assert!(
                Config::from_vars(&vars(&[("NODE_ENV", "test"), ("RATE_LIMIT_MAX", raw)])).is_err(),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_cors_origins_trimmed_and_blank_entries_dropped() {
        let config = Config::from_vars(&vars(&[
            ("NODE_ENV", "test"),
            ("CORS_ORIGINS", " https://example.com , ,https://app.example.com,"),
        ]))
        .unwrap();

        assert_eq!(
            config.cors_origins,
            vec!["https://example.com", "https://app.example.com"]
        );
    }

    #[test]
    fn test_violations_are_aggregated() {
        let err = Config::from_vars(&vars(&[("PORT", "99999"), ("RATE_LIMIT_MAX", "0")]))
            .unwrap_err();

        assert_eq!(err.violations.len(), 3);
        let text = err.to_string();
        assert!(text.starts_with("Environment validation failed:"));
        assert!(text.contains("  - NODE_ENV is required"));
        assert!(text.contains("  - PORT"));
        assert!(text.contains("  - RATE_LIMIT_MAX"));
    }

    #[test]
    fn test_invalid_trusted_proxy_rejected() {
        let err = Config::from_vars(&vars(&[
            ("NODE_ENV", "test"),
            ("TRUSTED_PROXIES", "10.0.0.0/8,not-a-cidr"),
        ]))
        .unwrap_err();

        assert_eq!(err.violations.len(), 1);
        assert!(err.to_string().contains("not-a-cidr"));
    }

    #[test]
    fn test_log_format_parsing() {
        let config =
            Config::from_vars(&vars(&[("NODE_ENV", "test"), ("LOG_FORMAT", "text")])).unwrap();
        assert_eq!(config.log_format, LogFormat::Text);

        let err = Config::from_vars(&vars(&[("NODE_ENV", "test"), ("LOG_FORMAT", "xml")]))
            .unwrap_err();
        assert!(err.to_string().contains("LOG_FORMAT"));
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "localhost".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "localhost:8080");
    }

    #[test]
    fn test_metrics_addr() {
        assert!(Config::default().metrics_addr().is_none());

        let config = Config {
            metrics_port: 9090,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
    }
}
