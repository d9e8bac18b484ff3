//! Run-once, fail-open construction of the tracing backend.
//!
//! This module provides the bootstrap components:
//! - `TelemetryBootstrap`: Owns the run-once guard and the exporter factory
//! - `TelemetryHandle`: Read-only access to the tracer, or nothing when degraded
//! - `BootstrapOptions`: Builder for the knobs that are not environment driven
//!
//! # Architecture
//!
//! The initialization flow:
//! 1. Resource attributes are built from the configuration and Lambda metadata
//! 2. The exporter is constructed, bounded by the exporter timeout
//! 3. A batch span processor wraps the exporter (500ms delay, 512 per batch, 2048 queued)
//! 4. The sampler is derived from the sampling rate
//! 5. Provider and propagators are installed globally (unless disabled)
//!
//! The first call to [`TelemetryBootstrap::initialize`] performs these steps; every
//! other call, concurrent or later, waits for and observes the same outcome. A
//! failure at any step yields a disabled handle, a no-op shutdown and the error.
//!
//! # Basic Usage
//!
//! ```no_run
//! use lambda_otel_wrapper::{TelemetryBootstrap, WrapperConfig};
//!
//! # async fn example() {
//! let bootstrap = TelemetryBootstrap::new(WrapperConfig::from_env());
//! let initialized = bootstrap.initialize().await;
//! if let Some(err) = &initialized.error {
//!     eprintln!("continuing without telemetry: {}", err);
//! }
//! let _ = initialized.shutdown.shutdown().await;
//! # }
//! ```

use crate::config::WrapperConfig;
use crate::constants::{defaults, span};
use crate::deadline::{run_bounded, Bounded};
use crate::error::BootstrapError;
use crate::resource::{get_lambda_resource, LambdaMetadata};
use crate::shutdown::ShutdownHandle;
use bon::Builder;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, InstrumentationScope};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider, SpanExporter, Tracer,
};
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

type ProviderFactory =
    dyn Fn(&WrapperConfig, Resource) -> Result<SdkTracerProvider, BootstrapError> + Send + Sync;

/// Options for the bootstrap that do not come from the environment.
///
/// # Examples
///
/// ```no_run
/// use lambda_otel_wrapper::BootstrapOptions;
/// use std::time::Duration;
///
/// let options = BootstrapOptions::builder()
///     .set_global_provider(false)
///     .shutdown_deadline(Duration::from_millis(500))
///     .build();
/// ```
#[derive(Builder, Debug, Clone)]
pub struct BootstrapOptions {
    /// Install the provider and the trace-context/baggage propagators globally.
    ///
    /// Default: `true`
    #[builder(default = true)]
    pub set_global_provider: bool,

    /// Resource to use instead of the one derived from the Lambda environment.
    pub resource: Option<Resource>,

    /// Deadline of the final flush performed by the shutdown handle.
    ///
    /// Default: 2 seconds
    #[builder(default = defaults::SHUTDOWN_DEADLINE)]
    pub shutdown_deadline: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct TelemetryBackend {
    provider: SdkTracerProvider,
    tracer: Tracer,
}

/// Access to the process-wide tracer.
///
/// Disabled when telemetry was never bootstrapped or the bootstrap failed; the
/// span lifecycle then skips span work but still isolates the handler.
#[derive(Clone, Default)]
pub struct TelemetryHandle {
    backend: Option<Arc<TelemetryBackend>>,
}

impl TelemetryHandle {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Tracer scoped to this wrapper, when a backend exists.
    pub fn tracer(&self) -> Option<&Tracer> {
        self.backend.as_ref().map(|backend| &backend.tracer)
    }

    /// Push every queued span to the exporter. Blocks until the batch worker answers.
    pub fn force_flush(&self) -> Result<(), OTelSdkError> {
        match &self.backend {
            Some(backend) => backend.provider.force_flush(),
            None => Ok(()),
        }
    }
}

/// Result of [`TelemetryBootstrap::initialize`].
///
/// `shutdown` is always callable; it is a no-op when `error` is set.
pub struct Bootstrapped {
    pub telemetry: TelemetryHandle,
    pub shutdown: ShutdownHandle,
    pub error: Option<BootstrapError>,
}

/// Builds the tracing backend at most once.
pub struct TelemetryBootstrap {
    config: WrapperConfig,
    metadata: LambdaMetadata,
    options: BootstrapOptions,
    factory: Arc<ProviderFactory>,
    state: OnceCell<Result<Arc<TelemetryBackend>, BootstrapError>>,
}

impl TelemetryBootstrap {
    /// Bootstrap exporting over OTLP/gRPC to the configured endpoint.
    pub fn new(config: WrapperConfig) -> Self {
        Self::with_exporter(config, BootstrapOptions::default(), otlp_exporter)
    }

    /// Bootstrap with a caller-supplied exporter factory.
    ///
    /// The factory runs at most once, during the first [`initialize`](Self::initialize).
    pub fn with_exporter<E, F>(
        config: WrapperConfig,
        options: BootstrapOptions,
        make_exporter: F,
    ) -> Self
    where
        E: SpanExporter + 'static,
        F: Fn(&WrapperConfig) -> Result<E, BootstrapError> + Send + Sync + 'static,
    {
        let factory = move |config: &WrapperConfig,
                            resource: Resource|
              -> Result<SdkTracerProvider, BootstrapError> {
            let exporter = make_exporter(config)?;
            Ok(build_provider(config, exporter, resource))
        };

        Self {
            config,
            metadata: LambdaMetadata::from_env(),
            options,
            factory: Arc::new(factory),
            state: OnceCell::new(),
        }
    }

    /// Replace the Lambda metadata read from the environment.
    pub fn with_metadata(mut self, metadata: LambdaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    /// Build the backend on the first call; later calls share the first outcome.
    pub async fn initialize(&self) -> Bootstrapped {
        match self.state.get_or_init(|| self.construct()).await {
            Ok(backend) => Bootstrapped {
                telemetry: TelemetryHandle {
                    backend: Some(Arc::clone(backend)),
                },
                shutdown: ShutdownHandle::new(
                    backend.provider.clone(),
                    self.options.shutdown_deadline,
                ),
                error: None,
            },
            Err(e) => Bootstrapped {
                telemetry: TelemetryHandle::disabled(),
                shutdown: ShutdownHandle::noop(),
                error: Some(e.clone()),
            },
        }
    }

    async fn construct(&self) -> Result<Arc<TelemetryBackend>, BootstrapError> {
        let resource = self
            .options
            .resource
            .clone()
            .unwrap_or_else(|| get_lambda_resource(&self.config, &self.metadata));
        let factory = Arc::clone(&self.factory);
        let config = self.config.clone();
        let timeout = self.config.exporter_timeout;

        let provider = match run_bounded(timeout, move || factory(&config, resource)).await {
            Bounded::Completed(result) => result?,
            Bounded::Failed(message) => return Err(BootstrapError::Panicked(message)),
            Bounded::TimedOut => return Err(BootstrapError::TimedOut(timeout)),
        };

        let scope = InstrumentationScope::builder(span::TRACER_NAME)
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let tracer = provider.tracer_with_scope(scope);

        if self.options.set_global_provider {
            global::set_tracer_provider(provider.clone());
            global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
                Box::new(TraceContextPropagator::new()),
                Box::new(BaggagePropagator::new()),
            ]));
        }

        tracing::debug!(
            service_name = %self.config.service_name,
            endpoint = %self.config.endpoint,
            sampling_rate = self.config.sampling_rate,
            "OpenTelemetry initialized successfully"
        );

        Ok(Arc::new(TelemetryBackend { provider, tracer }))
    }
}

/// Default exporter: OTLP over gRPC to the configured endpoint.
pub fn otlp_exporter(
    config: &WrapperConfig,
) -> Result<opentelemetry_otlp::SpanExporter, BootstrapError> {
    opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.dial_endpoint())
        .with_timeout(config.exporter_timeout)
        .build()
        .map_err(|e| BootstrapError::Exporter(e.to_string()))
}

/// Sampler for a rate: at or above 1 keeps everything, at or below 0 keeps
/// nothing, in between samples that fraction of traces by trace id.
pub fn build_sampler(rate: f64) -> Sampler {
    if rate.is_nan() || rate >= 1.0 {
        Sampler::AlwaysOn
    } else if rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(rate)
    }
}

fn build_provider<E>(config: &WrapperConfig, exporter: E, resource: Resource) -> SdkTracerProvider
where
    E: SpanExporter + 'static,
{
    // Full queue drops new spans instead of blocking the invocation
    let batch_config = BatchConfigBuilder::default()
        .with_scheduled_delay(defaults::BATCH_SCHEDULED_DELAY)
        .with_max_export_batch_size(defaults::MAX_EXPORT_BATCH_SIZE)
        .with_max_queue_size(defaults::MAX_QUEUE_SIZE)
        .build();

    let processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build();

    SdkTracerProvider::builder()
        .with_span_processor(processor)
        .with_sampler(build_sampler(config.sampling_rate))
        .with_resource(resource)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::trace::InMemorySpanExporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_options() -> BootstrapOptions {
        BootstrapOptions::builder()
            .set_global_provider(false)
            .resource(Resource::builder_empty().build())
            .build()
    }

    fn counting_bootstrap(
        calls: Arc<AtomicUsize>,
        outcome: Result<(), BootstrapError>,
    ) -> TelemetryBootstrap {
        TelemetryBootstrap::with_exporter(WrapperConfig::default(), test_options(), move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            outcome.clone().map(|_| InMemorySpanExporter::default())
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_constructs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bootstrap = Arc::new(counting_bootstrap(calls.clone(), Ok(())));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let bootstrap = Arc::clone(&bootstrap);
                tokio::spawn(async move {
                    let initialized = bootstrap.initialize().await;
                    (initialized.telemetry.is_enabled(), initialized.error)
                })
            })
            .collect();

        for task in tasks {
            let (enabled, error) = task.await.unwrap();
            assert!(enabled);
            assert_eq!(error, None);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let initialized = bootstrap.initialize().await;
        assert!(initialized.telemetry.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(initialized.shutdown.shutdown().await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_is_cached_and_shared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = BootstrapError::Exporter("collector unreachable".to_string());
        let bootstrap = Arc::new(counting_bootstrap(calls.clone(), Err(failure.clone())));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let bootstrap = Arc::clone(&bootstrap);
                tokio::spawn(async move { bootstrap.initialize().await.error })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Some(failure.clone()));
        }

        let initialized = bootstrap.initialize().await;
        assert_eq!(initialized.error, Some(failure));
        assert!(!initialized.telemetry.is_enabled());
        assert!(initialized.telemetry.tracer().is_none());
        assert!(initialized.shutdown.is_noop());
        assert_eq!(initialized.shutdown.shutdown().await, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_factory_panic_is_contained() {
        let bootstrap =
            TelemetryBootstrap::with_exporter(
                WrapperConfig::default(),
                test_options(),
                |_| -> Result<InMemorySpanExporter, BootstrapError> { panic!("bad exporter config") },
            );

        let initialized = bootstrap.initialize().await;
        assert_eq!(
            initialized.error,
            Some(BootstrapError::Panicked("bad exporter config".to_string()))
        );
        assert!(initialized.shutdown.is_noop());
    }

    #[tokio::test]
    async fn test_slow_factory_times_out() {
        let config = WrapperConfig {
            exporter_timeout: Duration::from_millis(50),
            ..WrapperConfig::default()
        };
        let bootstrap = TelemetryBootstrap::with_exporter(config, test_options(), |_| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(InMemorySpanExporter::default())
        });

        let initialized = bootstrap.initialize().await;
        assert_eq!(
            initialized.error,
            Some(BootstrapError::TimedOut(Duration::from_millis(50)))
        );
        assert!(!initialized.telemetry.is_enabled());
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_open() {
        let config = WrapperConfig {
            endpoint: "http://invalid host:9999".to_string(),
            exporter_timeout: Duration::from_millis(100),
            ..WrapperConfig::default()
        };
        let bootstrap = TelemetryBootstrap::with_exporter(config, test_options(), otlp_exporter);

        // Whatever the outcome, there is a callable shutdown and no panic
        let initialized = bootstrap.initialize().await;
        if initialized.error.is_some() {
            assert!(initialized.shutdown.is_noop());
        }
        let _ = initialized
            .shutdown
            .shutdown_within(Duration::from_millis(200))
            .await;
    }

    #[tokio::test]
    async fn test_spans_reach_exporter() {
        let exporter = InMemorySpanExporter::default();
        let captured = exporter.clone();
        let bootstrap = TelemetryBootstrap::with_exporter(
            WrapperConfig::default(),
            test_options(),
            move |_| Ok(exporter.clone()),
        );

        let initialized = bootstrap.initialize().await;
        let tracer = initialized.telemetry.tracer().expect("tracer");
        let mut span = tracer.start("unit-of-work");
        span.end();

        initialized.telemetry.force_flush().unwrap();
        let spans = captured.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "unit-of-work");
        assert_eq!(spans[0].instrumentation_scope.name(), "lambda-wrapper");
    }

    fn sampled_fraction(rate: f64, trials: usize) -> f64 {
        let provider = SdkTracerProvider::builder()
            .with_sampler(build_sampler(rate))
            .build();
        let tracer = provider.tracer("sampling");
        let sampled = (0..trials)
            .filter(|_| {
                let span = tracer.start("invocation");
                span.span_context().is_sampled()
            })
            .count();
        sampled as f64 / trials as f64
    }

    #[test]
    fn test_sampler_bounds() {
        assert!(matches!(build_sampler(1.0), Sampler::AlwaysOn));
        assert!(matches!(build_sampler(3.5), Sampler::AlwaysOn));
        assert!(matches!(build_sampler(f64::NAN), Sampler::AlwaysOn));
        assert!(matches!(build_sampler(0.0), Sampler::AlwaysOff));
        assert!(matches!(build_sampler(-1.0), Sampler::AlwaysOff));
        assert!(matches!(build_sampler(0.3), Sampler::TraceIdRatioBased(r) if r == 0.3));
    }

    #[test]
    fn test_sampling_rates() {
        assert_eq!(sampled_fraction(1.0, 1_000), 1.0);
        assert_eq!(sampled_fraction(0.0, 1_000), 0.0);

        let fraction = sampled_fraction(0.25, 20_000);
        assert!(
            (fraction - 0.25).abs() < 0.03,
            "sampled fraction {} too far from 0.25",
            fraction
        );
    }
}
