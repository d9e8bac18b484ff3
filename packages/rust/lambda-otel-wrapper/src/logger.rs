//! Diagnostic logging for the wrapper itself.
//!
//! All wrapper messages go through `tracing` and are written to stderr, where
//! the Lambda runtime forwards them to CloudWatch. `RUST_LOG` overrides the
//! verbosity derived from `OTEL_LOG_LEVEL`, and `AWS_LAMBDA_LOG_FORMAT=JSON`
//! switches to one JSON object per line.
//!
//! # Example
//! ```
//! use lambda_otel_wrapper::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Debug);
//! tracing::debug!("visible with OTEL_LOG_LEVEL=debug");
//! ```

use crate::config::LogLevel;
use crate::constants::env_vars;
use std::env;
use tracing_subscriber::EnvFilter;

fn build_filter(level: LogLevel) -> EnvFilter {
    match env::var(env_vars::RUST_LOG) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::builder()
            .with_env_var(env_vars::RUST_LOG)
            .from_env_lossy(),
        _ => EnvFilter::new(level.as_filter()),
    }
}

fn json_format() -> bool {
    env::var(env_vars::AWS_LAMBDA_LOG_FORMAT)
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing one is kept.
pub fn init_logging(level: LogLevel) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .without_time();

    if json_format() {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
