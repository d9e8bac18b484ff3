//! Bounded-latency teardown of the telemetry backend.
//!
//! A [`ShutdownHandle`] is always available, even when the bootstrap failed: in
//! that case it is a no-op that returns immediately without any I/O. With a
//! live backend it shuts the tracer provider down, which drains the batch
//! queue through the exporter, and gives up once the deadline passes.

use crate::constants::defaults;
use crate::deadline::{run_bounded, Bounded};
use crate::error::ShutdownError;
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::time::Duration;

/// Flushes and releases the telemetry backend at process teardown.
///
/// Cheap to clone; calling it more than once is harmless.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    provider: Option<SdkTracerProvider>,
    deadline: Duration,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::noop()
    }
}

impl ShutdownHandle {
    /// Handle for a process without a telemetry backend.
    pub fn noop() -> Self {
        Self {
            provider: None,
            deadline: defaults::SHUTDOWN_DEADLINE,
        }
    }

    pub(crate) fn new(provider: SdkTracerProvider, deadline: Duration) -> Self {
        Self {
            provider: Some(provider),
            deadline,
        }
    }

    /// Whether this handle has nothing to flush.
    pub fn is_noop(&self) -> bool {
        self.provider.is_none()
    }

    /// The handle's own deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Flush buffered spans and release the exporter within the handle's deadline.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        self.shutdown_within(self.deadline).await
    }

    /// Like [`shutdown`](Self::shutdown), bounded by the tighter of the
    /// caller's deadline and the handle's own.
    pub async fn shutdown_within(&self, caller_deadline: Duration) -> Result<(), ShutdownError> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };

        let deadline = caller_deadline.min(self.deadline);
        let provider = provider.clone();

        match run_bounded(deadline, move || provider.shutdown()).await {
            Bounded::Completed(Ok(())) | Bounded::Completed(Err(OTelSdkError::AlreadyShutdown)) => {
                tracing::debug!("Telemetry shut down");
                Ok(())
            }
            Bounded::Completed(Err(e)) => Err(ShutdownError::Flush(e.to_string())),
            Bounded::Failed(message) => Err(ShutdownError::Panicked(message)),
            Bounded::TimedOut => Err(ShutdownError::DeadlineExceeded(deadline)),
        }
    }
}
