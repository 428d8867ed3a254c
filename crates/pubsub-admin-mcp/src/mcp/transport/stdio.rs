//! Line-delimited JSON transport.
//!
//! Each message is one line of JSON. Lines that do not parse as a JSON-RPC
//! request are logged and skipped. End of input closes the transport.

use super::Transport;
use crate::error::TransportError;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use tokio::io::{
    stdin, stdout, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin,
    Stdout,
};
use tracing::{error, warn};

pub struct StdioTransport<R = Stdin, W = Stdout> {
    lines: Lines<BufReader<R>>,
    writer: W,
    closed: bool,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self::with_io(stdin(), stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            closed: false,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Option<JsonRpcRequest> {
        loop {
            if self.closed {
                return None;
            }

            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<JsonRpcRequest>(line) {
                        Ok(request) => return Some(request),
                        Err(e) => warn!(error = %e, line, "Skipping malformed JSON-RPC message"),
                    }
                }
                Ok(None) => {
                    self.closed = true;
                    return None;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from input");
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError> {
        let mut json = serde_json::to_string(&response)
            .map_err(|e| TransportError::InvalidMessage(e.to_string()))?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.writer.flush().await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
