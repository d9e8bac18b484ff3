//! Error types, split by how far a failure is allowed to travel.
//!
//! Only [`WrapperError`] is fatal. Bootstrap and shutdown errors degrade the
//! process to untraced operation; invocation errors stay with their invocation.

use std::time::Duration;
use thiserror::Error;

/// Fatal configuration errors. The process exits before serving any invocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WrapperError {
    /// No target handler identity configured.
    #[error("ORIGINAL_HANDLER environment variable is not set")]
    MissingHandler,
}

/// Telemetry bootstrap failures. The wrapper keeps running without tracing.
///
/// `Clone` so that every caller of the run-once bootstrap observes the same value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BootstrapError {
    /// The exporter could not be constructed.
    #[error("failed to create span exporter: {0}")]
    Exporter(String),

    /// Construction did not finish within the exporter timeout.
    #[error("telemetry bootstrap timed out after {0:?}")]
    TimedOut(Duration),

    /// Construction panicked.
    #[error("telemetry bootstrap panicked: {0}")]
    Panicked(String),
}

/// Teardown flush failures. Reported, never escalated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShutdownError {
    /// The flush was abandoned at the deadline.
    #[error("telemetry shutdown exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The provider reported a flush or export failure.
    #[error("telemetry shutdown failed: {0}")]
    Flush(String),

    /// The flush worker panicked.
    #[error("telemetry shutdown panicked: {0}")]
    Panicked(String),
}

/// A panic raised by the wrapped handler, converted into a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("panic recovered: {0}")]
pub struct PanicError(pub String);

impl PanicError {
    /// Build from a `catch_unwind` payload.
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        PanicError(panic_message(payload.as_ref()))
    }
}

/// Failures of the process-based handler invoker.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The handler executable could not be started.
    #[error("failed to start handler '{handler}': {source}")]
    Spawn {
        handler: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the payload or collecting output failed.
    #[error("handler I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The handler exited unsuccessfully.
    #[error("handler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
