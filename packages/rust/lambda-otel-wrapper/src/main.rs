use lambda_otel_wrapper::{
    init_logging, InstrumentedHandler, LambdaMetadata, Mode, PassthroughHandler, ProcessInvoker,
    TelemetryBootstrap, WrapperConfig,
};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let config = WrapperConfig::from_env();
    init_logging(config.log_level);

    let mode = match Mode::from_env() {
        Ok(mode) => mode,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match mode {
        Mode::Bypass { handler } => run_passthrough(&handler).await,
        Mode::Instrumented { handler } => run_instrumented(config, &handler).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Lambda runtime failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_passthrough(handler: &str) -> Result<(), Error> {
    tracing::warn!("Observability disabled, invoking {} directly", handler);
    let passthrough = Arc::new(PassthroughHandler::new(handler));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let passthrough = Arc::clone(&passthrough);
        async move { passthrough.invoke(event).await }
    }))
    .await
}

async fn run_instrumented(config: WrapperConfig, handler: &str) -> Result<(), Error> {
    let bootstrap = TelemetryBootstrap::new(config);
    let initialized = bootstrap.initialize().await;
    if let Some(e) = &initialized.error {
        tracing::warn!(
            "OTEL initialization failed (continuing without observability): {}",
            e
        );
    }

    let instrumented = Arc::new(InstrumentedHandler::new(
        handler,
        LambdaMetadata::from_env(),
        initialized.telemetry,
        ProcessInvoker::new(handler),
    ));

    let runtime = lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let instrumented = Arc::clone(&instrumented);
        async move { instrumented.invoke(event).await }
    }));

    let result = tokio::select! {
        result = runtime => result,
        _ = terminated() => {
            tracing::debug!("SIGTERM received, shutting down");
            Ok(())
        }
    };

    if let Err(e) = initialized.shutdown.shutdown().await {
        tracing::warn!("OTEL shutdown failed: {}", e);
    }

    result
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await;
}
