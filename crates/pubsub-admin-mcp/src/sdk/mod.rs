//! Client-side interface to the messaging server.
//!
//! A [`Session`] is one established connection. It exposes the server's
//! administrative features as separate facets, each offering asynchronous
//! operations that resolve to a single value or a [`RemoteError`]:
//!
//! - [`SecurityFeature`]: roles, permissions, isolated paths
//! - [`SystemAuthenticationFeature`]: principals and anonymous access
//! - [`MetricsFeature`]: metric collectors, alerts and samples
//! - [`TopicViewsFeature`]: topic views
//! - [`RemoteServersFeature`]: remote server links
//!
//! Establishing and closing sessions is the host's business; tools only
//! ever borrow an existing session. The [`loopback`] module provides an
//! in-process implementation for tests and local development.

mod authentication;
mod error;
pub mod loopback;
mod metrics;
mod remote_servers;
mod security;
mod topic_views;

pub use authentication::{
    AnonymousConnectionAction, AuthenticationCommand, SessionPropertyValidation,
    SystemAuthenticationConfiguration, SystemAuthenticationFeature, SystemAuthenticationScript,
    SystemPrincipal,
};
pub use error::{RemoteError, RemoteErrorReason, RemoteResult};
pub use metrics::{
    MetricAlert, MetricSample, MetricsFeature, SessionMetricCollector, TopicMetricCollector,
};
pub use remote_servers::{
    CheckRemoteServerResult, RemoteServer, RemoteServerDefinition, RemoteServerEndpoint,
    RemoteServerState, RemoteServerType, RemoteServersFeature,
};
pub use security::{
    GlobalPermission, PathPermission, Role, SecurityCommand, SecurityConfiguration,
    SecurityFeature, SecurityScript,
};
pub use topic_views::{TopicView, TopicViewsFeature};

use std::sync::Arc;

/// An established connection to the messaging server.
pub trait Session: Send + Sync + std::fmt::Debug {
    /// Server-assigned session identifier.
    fn id(&self) -> &str;

    /// The authenticated principal, or `None` for an anonymous session.
    fn principal(&self) -> Option<&str>;

    fn security(&self) -> &dyn SecurityFeature;

    fn system_authentication(&self) -> &dyn SystemAuthenticationFeature;

    fn metrics(&self) -> &dyn MetricsFeature;

    fn topic_views(&self) -> &dyn TopicViewsFeature;

    fn remote_servers(&self) -> &dyn RemoteServersFeature;
}

/// Shared handle to a session.
pub type SessionHandle = Arc<dyn Session>;
