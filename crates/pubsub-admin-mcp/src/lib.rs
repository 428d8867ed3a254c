//! # pubsub-admin-mcp
//!
//! MCP tools for administering a publish/subscribe messaging server through
//! an already established client session.
//!
//! Every tool follows the same shape: validate the arguments, find the
//! caller's session in a [`SessionRegistry`], dispatch one remote operation
//! and wait for it for at most [`OPERATION_TIMEOUT`]. Success is rendered
//! as a JSON envelope of the key arguments plus a `status`; a validation
//! failure, a missing session, a timeout or a server error is rendered as a
//! flagged error result. Tools never fail at the protocol level.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pubsub_admin_mcp::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loopback = LoopbackServer::new();
//!     let sessions = Arc::new(SessionRegistry::new());
//!     sessions.bind(DEFAULT_SESSION_ID, loopback.connect("admin", "password")?);
//!
//!     let server = build_server(&AdminConfig::default(), sessions).await?;
//!     server.serve(StdioTransport::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sdk`]: the session interface to the messaging server, plus an
//!   in-process loopback implementation
//! - [`session`]: the session registry tools look sessions up in
//! - [`invoke`]: the bounded-wait combinator
//! - [`tools`]: the admin tool catalogue
//! - [`mcp`]: tool framework, JSON-RPC dispatch and transports
//! - [`config`]: host configuration

#![warn(clippy::all)]

pub mod args;
pub mod config;
pub mod error;
pub mod format;
pub mod invoke;
pub mod mcp;
pub mod prelude;
pub mod sdk;
pub mod session;
pub mod tools;

pub use config::AdminConfig;
pub use error::{ErrorKind, InvocationError, Result, ServerError};
pub use invoke::OPERATION_TIMEOUT;
pub use mcp::{AdminMcpServer, ToolRegistry, ToolResult};
pub use session::{SessionLookup, SessionRegistry};

use std::sync::Arc;

/// Session id that calls without an explicit session id resolve to.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds a server with the full tool catalogue bound to `sessions`.
pub async fn build_server(
    config: &AdminConfig,
    sessions: Arc<dyn SessionLookup>,
) -> Result<AdminMcpServer> {
    let registry = ToolRegistry::new();
    tools::register_all(&registry, sessions).await?;

    let info = mcp::ServerInfo {
        name: config.server.name.clone(),
        version: config.server.version.clone(),
    };
    Ok(AdminMcpServer::new(info, registry).with_default_session(&config.session.default_id))
}
