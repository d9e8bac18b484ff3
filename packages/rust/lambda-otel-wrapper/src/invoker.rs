//! The wrapped handler, seen as an opaque callable.
//!
//! Both the instrumented and the passthrough paths run the business logic
//! through the [`Invoker`] trait. The payload is handed over untouched and the
//! result comes back untouched.
//!
//! [`ProcessInvoker`] is the collaborator used by the `bootstrap` binary: the
//! handler identity names an executable that receives the JSON payload on
//! stdin and writes its JSON result to stdout.

use crate::error::InvokeError;
use async_trait::async_trait;
use lambda_runtime::Error;
use serde_json::Value;
use std::future::Future;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Executes one invocation of the wrapped function.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, payload: Value) -> Result<Value, Error>;
}

#[async_trait]
impl<T: Invoker + ?Sized> Invoker for Arc<T> {
    async fn invoke(&self, payload: Value) -> Result<Value, Error> {
        (**self).invoke(payload).await
    }
}

/// [`Invoker`] backed by an async closure. See [`invoker_fn`].
#[derive(Clone)]
pub struct InvokerFn<F>(F);

/// Wrap an async closure as an [`Invoker`].
///
/// # Examples
///
/// ```
/// use lambda_otel_wrapper::invoker_fn;
///
/// let echo = invoker_fn(|payload: serde_json::Value| async move {
///     Ok::<_, lambda_runtime::Error>(payload)
/// });
/// ```
pub fn invoker_fn<F, Fut>(f: F) -> InvokerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    InvokerFn(f)
}

#[async_trait]
impl<F, Fut> Invoker for InvokerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    async fn invoke(&self, payload: Value) -> Result<Value, Error> {
        (self.0)(payload).await
    }
}

/// Runs the handler identity as an executable, one process per invocation.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    handler: String,
}

impl ProcessInvoker {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
        }
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Run the handler with `payload` on stdin and decode its stdout.
    pub async fn run(&self, payload: Value) -> Result<Value, InvokeError> {
        let input = serde_json::to_vec(&payload)?;

        let mut child = Command::new(&self.handler)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                handler: self.handler.clone(),
                source,
            })?;

        // Stdin is fed while stdout and stderr are drained; a handler that writes
        // as it reads would otherwise block on a full pipe.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok::<(), std::io::Error>(());
            };
            match stdin.write_all(&input).await {
                // A handler may exit without reading its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if !output.status.success() {
            return Err(InvokeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        fed?;

        Ok(decode_output(&output.stdout))
    }
}

#[async_trait]
impl Invoker for ProcessInvoker {
    async fn invoke(&self, payload: Value) -> Result<Value, Error> {
        Ok(self.run(payload).await?)
    }
}

/// JSON output is returned as parsed; anything else as a JSON string.
fn decode_output(stdout: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice(stdout) {
        return value;
    }
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim_end();
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}
