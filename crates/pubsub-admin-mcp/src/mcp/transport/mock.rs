//! In-memory transport for tests.

use super::Transport;
use crate::error::TransportError;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Serves queued requests, then reports end of input. Responses are
/// captured for inspection. Clones share state.
///
/// ```
/// use pubsub_admin_mcp::mcp::{JsonRpcRequest, MockTransport, Transport};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut transport = MockTransport::new();
/// transport.push_request(JsonRpcRequest::new(Some(json!(1)), "ping", None));
///
/// assert!(transport.recv().await.is_some());
/// assert!(transport.recv().await.is_none());
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

#[derive(Default)]
struct MockTransportState {
    requests: VecDeque<JsonRpcRequest>,
    responses: Vec<JsonRpcResponse>,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_request(&self, request: JsonRpcRequest) {
        self.state.lock().requests.push_back(request);
    }

    pub fn responses(&self) -> Vec<JsonRpcResponse> {
        self.state.lock().responses.clone()
    }

    /// The captured response whose id equals `id`.
    pub fn response_for(&self, id: &serde_json::Value) -> Option<JsonRpcResponse> {
        self.state
            .lock()
            .responses
            .iter()
            .find(|response| response.id.as_ref() == Some(id))
            .cloned()
    }

    pub fn response_count(&self) -> usize {
        self.state.lock().responses.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self) -> Option<JsonRpcRequest> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.requests.pop_front()
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.responses.push(response);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let mut transport = MockTransport::new();
        transport.close().await.unwrap();
        let result = transport
            .send(JsonRpcResponse::success(Some(json!(1)), json!({})))
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_response_for() {
        let mut transport = MockTransport::new();
        transport
            .send(JsonRpcResponse::success(Some(json!("a")), json!(1)))
            .await
            .unwrap();
        transport
            .send(JsonRpcResponse::success(Some(json!("b")), json!(2)))
            .await
            .unwrap();

        let response = transport.response_for(&json!("b")).unwrap();
        assert_eq!(response.result, Some(json!(2)));
        assert_eq!(transport.response_count(), 2);
    }
}
