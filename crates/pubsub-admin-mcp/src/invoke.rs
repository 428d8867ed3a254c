//! The bounded-wait combinator every tool goes through.
//!
//! [`invoke`] awaits one remote operation under [`OPERATION_TIMEOUT`] and
//! classifies the outcome: success goes to the tool's formatter, a timeout
//! or a server failure becomes a flagged error result tagged with the tool
//! name and its key arguments. Nothing is retried.

use crate::error::InvocationError;
use crate::format::{self, KeyArguments};
use crate::mcp::ToolResult;
use crate::sdk::RemoteResult;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fixed bound on every remote operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Awaits `operation` for at most [`OPERATION_TIMEOUT`].
///
/// The operation future is dropped on timeout; the server may still
/// complete it, but the caller never sees that result.
pub async fn bounded<T, F>(operation: F) -> Result<T, InvocationError>
where
    F: Future<Output = RemoteResult<T>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, operation).await {
        Ok(result) => result.map_err(InvocationError::from),
        Err(_) => Err(InvocationError::Timeout(OPERATION_TIMEOUT)),
    }
}

/// The tool and key arguments a result is reported against.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    tool: &'a str,
    arguments: &'a KeyArguments,
}

impl<'a> CallSite<'a> {
    pub fn new(tool: &'a str, arguments: &'a KeyArguments) -> Self {
        Self { tool, arguments }
    }

    pub fn tool(&self) -> &str {
        self.tool
    }

    pub fn arguments(&self) -> &KeyArguments {
        self.arguments
    }

    /// Turns `error` into this call's error result.
    pub fn fail(&self, error: &InvocationError) -> ToolResult {
        warn!(
            tool = self.tool,
            kind = %error.kind(),
            arguments = %self.arguments,
            error = %error,
            "Tool invocation failed"
        );
        format::failure(self.tool, self.arguments, error)
    }
}

/// Awaits `operation` under the timeout and produces exactly one result.
pub async fn invoke<T, F, R>(call: CallSite<'_>, operation: F, formatter: R) -> ToolResult
where
    F: Future<Output = RemoteResult<T>>,
    R: FnOnce(T) -> ToolResult,
{
    let started = Instant::now();
    match bounded(operation).await {
        Ok(value) => {
            debug!(
                tool = call.tool,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tool invocation succeeded"
            );
            formatter(value)
        }
        Err(error) => call.fail(&error),
    }
}
