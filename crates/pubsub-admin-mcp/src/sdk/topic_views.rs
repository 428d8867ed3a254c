//! Topic views: server-side mappings from source topics to reference topics.

use super::error::RemoteResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub name: String,
    pub specification: String,
    /// Roles of the session that created the view; the view evaluates with them.
    pub roles: BTreeSet<String>,
}

#[async_trait]
pub trait TopicViewsFeature: Send + Sync {
    /// Creates a view, replacing any existing view with the same name.
    async fn create_topic_view(&self, name: &str, specification: &str) -> RemoteResult<TopicView>;

    async fn list_topic_views(&self) -> RemoteResult<Vec<TopicView>>;

    /// Returns `None` if there is no view with this name.
    async fn get_topic_view(&self, name: &str) -> RemoteResult<Option<TopicView>>;

    async fn remove_topic_view(&self, name: &str) -> RemoteResult<()>;
}
