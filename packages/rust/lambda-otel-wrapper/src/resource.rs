//! Lambda execution environment metadata and resource attributes.
//!
//! The metadata is read once per process. It feeds both the tracer provider's
//! resource and the per-invocation span attributes.
//!
//! ## Resource Attributes
//! - `service.name`: From the resolved configuration
//! - `cloud.provider`: Always "aws"
//! - `cloud.region`: From AWS_REGION
//! - `faas.name`: From AWS_LAMBDA_FUNCTION_NAME
//! - `faas.version`: From AWS_LAMBDA_FUNCTION_VERSION
//! - `faas.max_memory`: From AWS_LAMBDA_FUNCTION_MEMORY_SIZE (bytes), when present
//! - `faas.instance`: From AWS_LAMBDA_LOG_STREAM_NAME, when present
//!
//! Extra attributes from `OTEL_RESOURCE_ATTRIBUTES` are merged in by the SDK's
//! environment detector.

use crate::config::WrapperConfig;
use crate::constants::{env_vars, span};
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use std::env;

/// Function identity as reported by the Lambda environment.
///
/// Missing values are empty strings: these attributes are always present on spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LambdaMetadata {
    pub function_name: String,
    pub function_version: String,
    pub region: String,
    pub memory_size_mb: Option<i64>,
    pub log_stream: Option<String>,
}

impl LambdaMetadata {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            function_name: lookup(env_vars::AWS_LAMBDA_FUNCTION_NAME).unwrap_or_default(),
            function_version: lookup(env_vars::AWS_LAMBDA_FUNCTION_VERSION).unwrap_or_default(),
            region: lookup(env_vars::AWS_REGION).unwrap_or_default(),
            memory_size_mb: lookup(env_vars::AWS_LAMBDA_FUNCTION_MEMORY_SIZE)
                .and_then(|memory| memory.trim().parse::<i64>().ok()),
            log_stream: lookup(env_vars::AWS_LAMBDA_LOG_STREAM_NAME)
                .filter(|stream| !stream.is_empty()),
        }
    }

    /// Attributes describing the function, shared by the resource and the invocation span.
    pub fn function_attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(span::CLOUD_PROVIDER, span::CLOUD_PROVIDER_AWS),
            KeyValue::new(span::FAAS_NAME, self.function_name.clone()),
            KeyValue::new(span::FAAS_VERSION, self.function_version.clone()),
            KeyValue::new(span::CLOUD_REGION, self.region.clone()),
        ]
    }
}

/// Build the tracer provider resource for this process.
pub fn get_lambda_resource(config: &WrapperConfig, metadata: &LambdaMetadata) -> Resource {
    let mut attributes = metadata.function_attributes();

    if let Some(memory_mb) = metadata.memory_size_mb {
        attributes.push(KeyValue::new(
            span::FAAS_MAX_MEMORY,
            memory_mb * 1024 * 1024,
        ));
    }

    if let Some(log_stream) = &metadata.log_stream {
        attributes.push(KeyValue::new(span::FAAS_INSTANCE, log_stream.clone()));
    }

    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes(attributes)
        .build()
}
