//! Per-invocation span lifecycle around the wrapped handler.
//!
//! Every call to [`InstrumentedHandler::invoke`]:
//! 1. Starts a root `lambda.invoke` span of kind SERVER with the invocation metadata
//! 2. Runs the wrapped invoker inside a panic boundary
//! 3. Records `lambda.duration_ms` and the outcome status
//! 4. Ends the span exactly once, whichever way the call exits
//!
//! # Span Attributes
//!
//! Always present (empty strings when the environment lacks a value):
//! - `faas.execution`: X-Ray trace id of the invocation
//! - `faas.handler`: Wrapped handler identity
//! - `cloud.provider`, `cloud.region`, `faas.name`, `faas.version`
//! - `faas.invocation_id`, `cloud.resource_id`
//! - `lambda.duration_ms`: Wall time of the wrapped call
//!
//! When available:
//! - `cloud.account.id`: Parsed from the invoked function ARN
//! - `faas.coldstart`: `true` on the first invocation of the process
//!
//! Ending a span only hands it to the batch processor; no network I/O happens
//! on the invocation path.

use crate::constants::{env_vars, span};
use crate::error::PanicError;
use crate::invoker::Invoker;
use crate::resource::LambdaMetadata;
use crate::telemetry::TelemetryHandle;
use futures_util::FutureExt;
use lambda_runtime::{Context as LambdaContext, Error, LambdaEvent};
use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer;
use serde_json::Value;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::{Duration, Instant};

type SdkSpan = <Tracer as opentelemetry::trace::Tracer>::Span;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static BACKTRACE_HOOK: Once = Once::new();

/// Chain a panic hook that keeps the panicking thread's stack for the recovery log.
///
/// The panic and its `catch_unwind` happen within one poll, on one thread, so a
/// thread-local slot carries the backtrace from the hook to the boundary.
fn install_backtrace_hook() {
    BACKTRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let _ = PANIC_BACKTRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(Backtrace::force_capture());
                }
            });
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

/// Owns the invocation span and ends it when dropped.
///
/// All exit paths of [`InstrumentedHandler::invoke`] (success, handler error,
/// captured panic, cancellation of the future) release the span through `Drop`.
struct InvocationSpan {
    span: Option<SdkSpan>,
}

impl InvocationSpan {
    fn start(tracer: Option<&Tracer>, attributes: Vec<KeyValue>) -> Self {
        let span = tracer.map(|tracer| {
            tracer
                .span_builder(span::INVOCATION_SPAN_NAME)
                .with_kind(SpanKind::Server)
                .with_attributes(attributes)
                .start_with_context(tracer, &Context::new())
        });
        Self { span }
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        if let Some(span) = self.span.as_mut() {
            span.set_attribute(attribute);
        }
    }

    fn fail(&mut self, error: &(dyn std::error::Error + 'static)) {
        if let Some(span) = self.span.as_mut() {
            span.record_error(error);
            span.set_status(Status::error(error.to_string()));
        }
    }

    fn succeed(&mut self) {
        if let Some(span) = self.span.as_mut() {
            span.set_status(Status::Ok);
        }
    }
}

impl Drop for InvocationSpan {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

/// Wraps an [`Invoker`] with a root span per invocation.
///
/// # Examples
///
/// ```no_run
/// use lambda_otel_wrapper::{
///     invoker_fn, InstrumentedHandler, LambdaMetadata, TelemetryBootstrap, WrapperConfig,
/// };
/// use lambda_runtime::{service_fn, Error, LambdaEvent};
/// use serde_json::Value;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let bootstrap = TelemetryBootstrap::new(WrapperConfig::from_env());
///     let initialized = bootstrap.initialize().await;
///
///     let handler = Arc::new(InstrumentedHandler::new(
///         "index.handler",
///         LambdaMetadata::from_env(),
///         initialized.telemetry,
///         invoker_fn(|payload: Value| async move { Ok(payload) }),
///     ));
///
///     lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
///         let handler = Arc::clone(&handler);
///         async move { handler.invoke(event).await }
///     }))
///     .await
/// }
/// ```
pub struct InstrumentedHandler<I> {
    handler_name: String,
    metadata: LambdaMetadata,
    telemetry: TelemetryHandle,
    invoker: I,
    cold_start: AtomicBool,
}

impl<I: Invoker> InstrumentedHandler<I> {
    pub fn new(
        handler_name: impl Into<String>,
        metadata: LambdaMetadata,
        telemetry: TelemetryHandle,
        invoker: I,
    ) -> Self {
        install_backtrace_hook();
        Self {
            handler_name: handler_name.into(),
            metadata,
            telemetry,
            invoker,
            cold_start: AtomicBool::new(true),
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    /// Run one invocation under a span.
    ///
    /// A panic in the wrapped invoker is captured, recorded on the span and
    /// returned as a [`PanicError`]; the handler stays usable afterwards.
    pub async fn invoke(&self, event: LambdaEvent<Value>) -> Result<Value, Error> {
        let LambdaEvent { payload, context } = event;
        let started = Instant::now();
        let mut invocation =
            InvocationSpan::start(self.telemetry.tracer(), self.span_attributes(&context));

        let outcome = AssertUnwindSafe(async { self.invoker.invoke(payload).await })
            .catch_unwind()
            .await;

        let result = outcome.unwrap_or_else(|panic| {
            let err = PanicError::from_payload(panic);
            let backtrace = take_panic_backtrace()
                .map(|backtrace| backtrace.to_string())
                .unwrap_or_default();
            tracing::error!(
                handler = %self.handler_name,
                request_id = %context.request_id,
                "PANIC in handler: {}\n{}",
                err.0,
                backtrace
            );
            Err(Box::new(err) as Error)
        });

        invocation.set_attribute(KeyValue::new(
            span::DURATION_MS,
            duration_ms(started.elapsed()),
        ));

        match result {
            Ok(response) => {
                invocation.succeed();
                Ok(response)
            }
            Err(err) => {
                invocation.fail(err.as_ref());
                Err(err)
            }
        }
    }

    fn span_attributes(&self, context: &LambdaContext) -> Vec<KeyValue> {
        let trace_id = context
            .xray_trace_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| env::var(env_vars::X_AMZN_TRACE_ID).ok())
            .unwrap_or_default();

        let mut attributes = vec![
            KeyValue::new(span::FAAS_EXECUTION, trace_id),
            KeyValue::new(span::FAAS_HANDLER, self.handler_name.clone()),
        ];
        attributes.extend(self.metadata.function_attributes());
        attributes.push(KeyValue::new(
            span::FAAS_INVOCATION_ID,
            context.request_id.clone(),
        ));
        attributes.push(KeyValue::new(
            span::CLOUD_RESOURCE_ID,
            context.invoked_function_arn.clone(),
        ));

        if let Some(account_id) = context
            .invoked_function_arn
            .split(':')
            .nth(4)
            .filter(|id| !id.is_empty())
        {
            attributes.push(KeyValue::new(span::CLOUD_ACCOUNT_ID, account_id.to_string()));
        }

        if self.cold_start.swap(false, Ordering::Relaxed) {
            attributes.push(KeyValue::new(span::FAAS_COLDSTART, true));
        }

        attributes
    }
}

fn duration_ms(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}
