//! Request dispatch and the serve loop.

use super::protocol::{
    CallToolParams, ClientInfo, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability, PROTOCOL_VERSION,
};
use super::{ToolContext, ToolRegistry, Transport};
use crate::error::Result;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "Administrative tools for a publish/subscribe server. \
    Every tool acts on an already established session; pass `_meta.sessionId` \
    to address a session other than the default one.";

/// MCP server exposing the tools of a [`ToolRegistry`].
///
/// Cloning is cheap; each in-flight request holds its own clone.
#[derive(Clone, Debug)]
pub struct AdminMcpServer {
    info: ServerInfo,
    registry: ToolRegistry,
    default_session_id: Arc<str>,
    client: Arc<RwLock<Option<ClientInfo>>>,
}

impl AdminMcpServer {
    pub fn new(info: ServerInfo, registry: ToolRegistry) -> Self {
        Self {
            info,
            registry,
            default_session_id: Arc::from(crate::DEFAULT_SESSION_ID),
            client: Arc::default(),
        }
    }

    /// Session id used for calls that do not name one.
    pub fn with_default_session(mut self, session_id: impl AsRef<str>) -> Self {
        self.default_session_id = Arc::from(session_id.as_ref());
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn default_session_id(&self) -> &str {
        &self.default_session_id
    }

    /// Client that sent `initialize`, if any.
    pub fn client(&self) -> Option<ClientInfo> {
        self.client.read().clone()
    }

    /// Handles one message. Notifications produce no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let notification = request.is_notification();
        let id = request.id.clone();

        let response = match request.method.as_str() {
            "initialize" => self.initialize(id, request.params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.registry.list().await,
                };
                to_response(id, &result)
            }
            "tools/call" => self.call_tool(id, request.params).await,
            method if method.starts_with("notifications/") => {
                debug!(method, "Notification received");
                return None;
            }
            method => {
                debug!(method, "Unknown method");
                JsonRpcResponse::method_not_found(id, method)
            }
        };

        if notification { None } else { Some(response) }
    }

    fn initialize(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = params.and_then(|p| serde_json::from_value::<InitializeParams>(p).ok());
        if let Some(client) = params.and_then(|p| p.client_info) {
            info!(client = %client.name, version = %client.version, "Client initialized");
            *self.client.write() = Some(client);
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: self.info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        };
        to_response(id, &result)
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = match params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => return JsonRpcResponse::invalid_params(id, e.to_string()),
            None => return JsonRpcResponse::invalid_params(id, "Missing tools/call params"),
        };

        let Some(tool) = self.registry.get(&params.name).await else {
            warn!(tool = %params.name, "Unknown tool requested");
            return JsonRpcResponse::tool_not_found(id, &params.name);
        };

        let session_id = params
            .meta
            .and_then(|meta| meta.session_id)
            .unwrap_or_else(|| self.default_session_id.to_string());

        let mut context = ToolContext::builder().session_id(session_id);
        if let Some(request_id) = id.clone() {
            context = context.request_id(request_id);
        }
        if let Some(client) = self.client() {
            context = context.client_info(client.name, client.version);
        }

        let result = tool.execute(params.arguments, &context.build()).await;
        to_response(id, &result)
    }

    /// Serves `transport` until its input ends.
    ///
    /// Every request runs on its own task, so a slow tool call never holds
    /// up other calls. Responses are written as they complete; calls still
    /// in flight when the input ends are awaited before returning.
    pub async fn serve<T: Transport>(&self, mut transport: T) -> Result<()> {
        info!(
            server = %self.info.name,
            tools = self.registry.count().await,
            "Serving MCP requests"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let mut tx = Some(tx);

        loop {
            tokio::select! {
                request = transport.recv(), if tx.is_some() => match request {
                    Some(request) => {
                        debug!(method = %request.method, id = ?request.id, "Request received");
                        if let Some(sender) = tx.clone() {
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Some(response) = server.handle(request).await {
                                    // The receiver lives until every sender is gone.
                                    let _ = sender.send(response);
                                }
                            });
                        }
                    }
                    None => {
                        debug!("Input closed, draining in-flight requests");
                        tx = None;
                    }
                },
                Some(response) = rx.recv() => transport.send(response).await?,
                else => break,
            }
        }

        transport.close().await?;
        info!("MCP server stopped");
        Ok(())
    }
}

fn to_response<T: serde::Serialize>(id: Option<Value>, value: &T) -> JsonRpcResponse {
    match serde_json::to_value(value) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::internal_error(id, e.to_string()),
    }
}
