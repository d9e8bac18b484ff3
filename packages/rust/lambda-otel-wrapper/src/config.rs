//! Configuration resolution for the wrapper.
//!
//! Every setting is read from a named environment variable and falls back to a
//! hard-coded default when absent, empty or unparsable. Resolution never fails:
//! a malformed value degrades to the default instead of blocking startup.
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME`: Service name (default: `unknown-service`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint (default: `http://localhost:4317`)
//! - `OTEL_EXPORTER_OTLP_TIMEOUT`: Exporter timeout in ms (default: 5000)
//! - `OTEL_LOG_LEVEL`: `debug` for verbose wrapper logs (default: `error`)
//! - `OTEL_SAMPLING_RATE`: Fraction of invocations to trace (default: 1.0)

use crate::constants::{defaults, env_vars};
use std::{env, fmt, time::Duration};

/// Verbosity of the wrapper's own diagnostic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only warnings and errors.
    #[default]
    Quiet,
    /// Everything, including bootstrap progress.
    Debug,
}

impl LogLevel {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("debug") {
            LogLevel::Debug
        } else {
            LogLevel::Quiet
        }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "warn",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Quiet => write!(f, "quiet"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

/// Resolved wrapper configuration. Built once per process and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperConfig {
    pub service_name: String,
    pub endpoint: String,
    pub exporter_timeout: Duration,
    pub log_level: LogLevel,
    pub sampling_rate: f64,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl WrapperConfig {
    /// Resolve the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve the configuration from an arbitrary name → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let exporter_timeout_ms = get(env_vars::OTLP_TIMEOUT)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(defaults::OTLP_TIMEOUT_MS);

        let sampling_rate = get(env_vars::SAMPLING_RATE)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|rate| !rate.is_nan())
            .unwrap_or(defaults::SAMPLING_RATE);

        let log_level = LogLevel::parse(
            &get(env_vars::LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
        );

        Self {
            service_name: get(env_vars::SERVICE_NAME)
                .unwrap_or_else(|| defaults::SERVICE_NAME.to_string()),
            endpoint: get(env_vars::OTLP_ENDPOINT)
                .unwrap_or_else(|| defaults::OTLP_ENDPOINT.to_string()),
            exporter_timeout: Duration::from_millis(exporter_timeout_ms),
            log_level,
            sampling_rate,
        }
    }

    /// Endpoint as dialed by the exporter. Bare `host:port` values get an `http://` scheme.
    pub fn dial_endpoint(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}
