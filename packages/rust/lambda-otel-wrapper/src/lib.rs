//! Fail-open OpenTelemetry wrapper for AWS Lambda handlers.
//!
//! This crate wraps an existing Lambda handler so that every invocation is traced,
//! without the telemetry pipeline ever being able to break, slow down or crash the
//! function it wraps. A single switch turns the whole thing into a passthrough.
//!
//! # Features
//!
//! - **Kill Switch**: `OBS_ENABLED` routes the process to a passthrough that never touches telemetry
//! - **Fail-Open Bootstrap**: Exporter problems degrade to "no telemetry", never to a failed start
//! - **Panic Isolation**: A panicking handler becomes an errored span and an error response
//! - **Bounded Teardown**: Buffered spans are flushed at shutdown within a hard deadline
//!
//! # Architecture
//!
//! - [`Mode`]: Decides at startup between the bypass and the instrumented path
//! - [`TelemetryBootstrap`]: Builds the exporter, batch processor and tracer exactly once
//! - [`InstrumentedHandler`]: Wraps each invocation in a `lambda.invoke` SERVER span
//! - [`PassthroughHandler`]: Forwards invocations without instrumentation
//! - [`ShutdownHandle`]: Flushes and releases the backend at process exit
//! - [`Invoker`]: Seam between the wrapper and the business logic
//!
//! # Configuration
//!
//! - `OBS_ENABLED`: `1` or `true` enables instrumentation (default: disabled)
//! - `ORIGINAL_HANDLER`: The wrapped handler (required)
//! - `OTEL_SERVICE_NAME`: Service name (default: `unknown-service`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP/gRPC collector (default: `http://localhost:4317`)
//! - `OTEL_EXPORTER_OTLP_TIMEOUT`: Exporter timeout in milliseconds (default: 5000)
//! - `OTEL_LOG_LEVEL`: `debug` for verbose wrapper logs (default: `error`)
//! - `OTEL_SAMPLING_RATE`: Fraction of invocations traced (default: 1.0)
//!
//! See [`config`] for how malformed values are handled.
//!
//! # Quick Start
//!
//! ```no_run
//! use lambda_otel_wrapper::{
//!     invoker_fn, InstrumentedHandler, LambdaMetadata, TelemetryBootstrap, WrapperConfig,
//! };
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let initialized = TelemetryBootstrap::new(WrapperConfig::from_env())
//!         .initialize()
//!         .await;
//!
//!     let handler = Arc::new(InstrumentedHandler::new(
//!         "echo",
//!         LambdaMetadata::from_env(),
//!         initialized.telemetry,
//!         invoker_fn(|payload: Value| async move { Ok(payload) }),
//!     ));
//!
//!     let result = lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
//!         let handler = Arc::clone(&handler);
//!         async move { handler.invoke(event).await }
//!     }))
//!     .await;
//!
//!     let _ = initialized.shutdown.shutdown().await;
//!     result
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;

mod deadline;
mod gate;
mod handler;
mod invoker;
mod logger;
mod passthrough;
mod resource;
mod shutdown;
mod telemetry;

pub use config::{LogLevel, WrapperConfig};
pub use error::{BootstrapError, InvokeError, PanicError, ShutdownError, WrapperError};
pub use gate::Mode;
pub use handler::InstrumentedHandler;
pub use invoker::{invoker_fn, Invoker, InvokerFn, ProcessInvoker};
pub use logger::init_logging;
pub use passthrough::PassthroughHandler;
pub use resource::{get_lambda_resource, LambdaMetadata};
pub use shutdown::ShutdownHandle;
pub use telemetry::{
    build_sampler, otlp_exporter, BootstrapOptions, Bootstrapped, TelemetryBootstrap,
    TelemetryHandle,
};
