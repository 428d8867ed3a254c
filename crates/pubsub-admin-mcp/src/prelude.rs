//! Commonly used types.

pub use crate::config::AdminConfig;
pub use crate::error::{ErrorKind, InvocationError, ServerError};
pub use crate::mcp::{
    AdminMcpServer, MockTransport, StdioTransport, Tool, ToolContext, ToolRegistry, ToolResult,
    Transport,
};
pub use crate::sdk::loopback::LoopbackServer;
pub use crate::sdk::{RemoteError, RemoteErrorReason, Session, SessionHandle};
pub use crate::session::{SessionLookup, SessionRegistry};
pub use crate::{build_server, DEFAULT_SESSION_ID, OPERATION_TIMEOUT};
