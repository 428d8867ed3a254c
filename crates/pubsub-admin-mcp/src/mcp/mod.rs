//! Minimal MCP server framework: tools, registry, JSON-RPC dispatch and
//! transports.

pub mod protocol;
mod registry;
mod result;
mod server;
mod tool;
mod transport;

pub use protocol::{
    CallToolParams, ClientInfo, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerInfo,
    ToolDefinition,
};
pub use registry::ToolRegistry;
pub use result::{ToolContent, ToolResult};
pub use server::AdminMcpServer;
pub use tool::{Tool, ToolContext, ToolContextBuilder};
pub use transport::{MockTransport, StdioTransport, Transport};
