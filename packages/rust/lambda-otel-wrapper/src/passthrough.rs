//! Uninstrumented forwarding path used when observability is disabled.
//!
//! No telemetry component is touched here: no exporter, no provider, no span.

use crate::invoker::{Invoker, ProcessInvoker};
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;

/// Forwards each event to the wrapped handler and returns its result unchanged.
pub struct PassthroughHandler<I = ProcessInvoker> {
    handler_name: String,
    invoker: I,
}

impl PassthroughHandler<ProcessInvoker> {
    /// Passthrough that runs `handler` as an executable.
    pub fn new(handler: &str) -> Self {
        Self::with_invoker(handler, ProcessInvoker::new(handler))
    }
}

impl<I: Invoker> PassthroughHandler<I> {
    pub fn with_invoker(handler_name: impl Into<String>, invoker: I) -> Self {
        Self {
            handler_name: handler_name.into(),
            invoker,
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub async fn invoke(&self, event: LambdaEvent<Value>) -> Result<Value, Error> {
        self.invoker.invoke(event.payload).await
    }
}
