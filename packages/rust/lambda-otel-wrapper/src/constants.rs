//! Constants for the lambda-otel-wrapper package.
//!
//! Environment variable names, defaults and attribute keys live here so the
//! configuration resolver, the bootstrap and the handler agree on them.

use std::time::Duration;

/// Environment variable names for configuration.
pub mod env_vars {
    /// Kill switch. Instrumentation runs only when this is `1` or `true`.
    pub const OBS_ENABLED: &str = "OBS_ENABLED";

    /// Identity of the wrapped handler (executable path).
    pub const ORIGINAL_HANDLER: &str = "ORIGINAL_HANDLER";

    /// Service name for telemetry.
    pub const SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

    /// OTLP collector endpoint.
    pub const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

    /// Exporter timeout in milliseconds.
    pub const OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";

    /// Wrapper log verbosity (`debug` or anything else for quiet).
    pub const LOG_LEVEL: &str = "OTEL_LOG_LEVEL";

    /// Trace sampling rate in `[0, 1]`.
    pub const SAMPLING_RATE: &str = "OTEL_SAMPLING_RATE";

    /// Log output format selected for the function (`JSON` or `Text`).
    pub const AWS_LAMBDA_LOG_FORMAT: &str = "AWS_LAMBDA_LOG_FORMAT";

    /// Standard tracing filter override.
    pub const RUST_LOG: &str = "RUST_LOG";

    /// AWS Lambda function name.
    pub const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";

    /// AWS Lambda function version.
    pub const AWS_LAMBDA_FUNCTION_VERSION: &str = "AWS_LAMBDA_FUNCTION_VERSION";

    /// AWS Lambda configured memory in MB.
    pub const AWS_LAMBDA_FUNCTION_MEMORY_SIZE: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";

    /// AWS Lambda log stream, used as the function instance id.
    pub const AWS_LAMBDA_LOG_STREAM_NAME: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

    /// AWS region the function runs in.
    pub const AWS_REGION: &str = "AWS_REGION";

    /// X-Ray trace header of the current invocation.
    pub const X_AMZN_TRACE_ID: &str = "_X_AMZN_TRACE_ID";
}

/// Default values for configuration parameters.
pub mod defaults {
    use super::Duration;

    /// Default service name if not provided.
    pub const SERVICE_NAME: &str = "unknown-service";

    /// Default collector endpoint (local OTLP/gRPC).
    pub const OTLP_ENDPOINT: &str = "http://localhost:4317";

    /// Default exporter timeout in milliseconds.
    pub const OTLP_TIMEOUT_MS: u64 = 5000;

    /// Default log level.
    pub const LOG_LEVEL: &str = "error";

    /// Default sampling rate (sample everything).
    pub const SAMPLING_RATE: f64 = 1.0;

    /// Interval between scheduled batch exports.
    pub const BATCH_SCHEDULED_DELAY: Duration = Duration::from_millis(500);

    /// Maximum number of spans per export.
    pub const MAX_EXPORT_BATCH_SIZE: usize = 512;

    /// Maximum number of queued spans before new ones are dropped.
    pub const MAX_QUEUE_SIZE: usize = 2048;

    /// Hard deadline for the final flush at teardown.
    pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(2);
}

/// Span naming and attribute keys.
pub mod span {
    /// Name of the root span created for every invocation.
    pub const INVOCATION_SPAN_NAME: &str = "lambda.invoke";

    /// Instrumentation scope name used for the tracer.
    pub const TRACER_NAME: &str = "lambda-wrapper";

    /// Integer attribute carrying the wrapped call's duration.
    pub const DURATION_MS: &str = "lambda.duration_ms";

    pub const FAAS_EXECUTION: &str = "faas.execution";
    pub const FAAS_HANDLER: &str = "faas.handler";
    pub const FAAS_NAME: &str = "faas.name";
    pub const FAAS_VERSION: &str = "faas.version";
    pub const FAAS_INVOCATION_ID: &str = "faas.invocation_id";
    pub const FAAS_COLDSTART: &str = "faas.coldstart";
    pub const FAAS_MAX_MEMORY: &str = "faas.max_memory";
    pub const FAAS_INSTANCE: &str = "faas.instance";
    pub const CLOUD_PROVIDER: &str = "cloud.provider";
    pub const CLOUD_REGION: &str = "cloud.region";
    pub const CLOUD_RESOURCE_ID: &str = "cloud.resource_id";
    pub const CLOUD_ACCOUNT_ID: &str = "cloud.account.id";

    /// Value of `cloud.provider`.
    pub const CLOUD_PROVIDER_AWS: &str = "aws";
}
