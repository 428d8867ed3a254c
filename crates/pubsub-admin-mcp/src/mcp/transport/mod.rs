//! Transports carry JSON-RPC messages between client and server.
//!
//! - [`StdioTransport`]: line-delimited JSON over stdin/stdout (or any
//!   async reader/writer pair)
//! - [`MockTransport`]: queued requests and captured responses, for tests

mod mock;
mod stdio;

pub use mock::MockTransport;
pub use stdio::StdioTransport;

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::error::TransportError;
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send {
    /// Next request, or `None` once the input is exhausted.
    ///
    /// Must be cancel safe: the server polls it inside `select!`.
    async fn recv(&mut self) -> Option<JsonRpcRequest>;

    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;
}
