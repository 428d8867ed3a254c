//! Security store: roles, permissions and isolated paths.
//!
//! The store is read as a whole with [`SecurityFeature::get_security`] and
//! modified by submitting a [`SecurityScript`], an ordered list of commands
//! that the server applies atomically.

use super::error::RemoteResult;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Permissions that apply to the server as a whole.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalPermission {
    Authenticate,
    ViewSession,
    ModifySession,
    RegisterHandler,
    ViewServer,
    ControlServer,
    ViewSecurity,
    ModifySecurity,
    ReadTopicViews,
    ModifyTopicViews,
}

impl GlobalPermission {
    pub const ALL: [GlobalPermission; 10] = [
        Self::Authenticate,
        Self::ViewSession,
        Self::ModifySession,
        Self::RegisterHandler,
        Self::ViewServer,
        Self::ControlServer,
        Self::ViewSecurity,
        Self::ModifySecurity,
        Self::ReadTopicViews,
        Self::ModifyTopicViews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticate => "AUTHENTICATE",
            Self::ViewSession => "VIEW_SESSION",
            Self::ModifySession => "MODIFY_SESSION",
            Self::RegisterHandler => "REGISTER_HANDLER",
            Self::ViewServer => "VIEW_SERVER",
            Self::ControlServer => "CONTROL_SERVER",
            Self::ViewSecurity => "VIEW_SECURITY",
            Self::ModifySecurity => "MODIFY_SECURITY",
            Self::ReadTopicViews => "READ_TOPIC_VIEWS",
            Self::ModifyTopicViews => "MODIFY_TOPIC_VIEWS",
        }
    }
}

impl fmt::Display for GlobalPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions scoped to a topic path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathPermission {
    SelectTopic,
    ReadTopic,
    UpdateTopic,
    ModifyTopic,
    SendToMessageHandler,
    SendToSession,
    QueryObsoleteTimeSeriesEvents,
    EditTimeSeriesEvents,
    EditOwnTimeSeriesEvents,
    AcquireLock,
    ExposeBranch,
}

impl PathPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelectTopic => "SELECT_TOPIC",
            Self::ReadTopic => "READ_TOPIC",
            Self::UpdateTopic => "UPDATE_TOPIC",
            Self::ModifyTopic => "MODIFY_TOPIC",
            Self::SendToMessageHandler => "SEND_TO_MESSAGE_HANDLER",
            Self::SendToSession => "SEND_TO_SESSION",
            Self::QueryObsoleteTimeSeriesEvents => "QUERY_OBSOLETE_TIME_SERIES_EVENTS",
            Self::EditTimeSeriesEvents => "EDIT_TIME_SERIES_EVENTS",
            Self::EditOwnTimeSeriesEvents => "EDIT_OWN_TIME_SERIES_EVENTS",
            Self::AcquireLock => "ACQUIRE_LOCK",
            Self::ExposeBranch => "EXPOSE_BRANCH",
        }
    }
}

impl fmt::Display for PathPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named role and the permissions it grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub global_permissions: BTreeSet<GlobalPermission>,
    pub default_path_permissions: BTreeSet<PathPermission>,
    pub path_permissions: BTreeMap<String, BTreeSet<PathPermission>>,
    pub included_roles: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locking_principal: Option<String>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Snapshot of the security store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfiguration {
    pub roles_for_anonymous_sessions: BTreeSet<String>,
    pub roles_for_named_sessions: BTreeSet<String>,
    pub roles: Vec<Role>,
    pub isolated_paths: BTreeSet<String>,
}

impl SecurityConfiguration {
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|role| role.name == name)
    }
}

/// One statement of a security script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityCommand {
    SetRolesForAnonymousSessions(Vec<String>),
    SetRolesForNamedSessions(Vec<String>),
    SetGlobalPermissions {
        role: String,
        permissions: Vec<GlobalPermission>,
    },
    SetDefaultPathPermissions {
        role: String,
        permissions: Vec<PathPermission>,
    },
    SetPathPermissions {
        role: String,
        path: String,
        permissions: Vec<PathPermission>,
    },
    RemovePathPermissions {
        role: String,
        path: String,
    },
    SetRoleIncludes {
        role: String,
        included_roles: Vec<String>,
    },
    SetRoleLockedByPrincipal {
        role: String,
        locking_principal: String,
    },
    IsolatePath(String),
    DeisolatePath(String),
}

impl fmt::Display for SecurityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetRolesForAnonymousSessions(roles) => {
                write!(f, "set roles for anonymous sessions {}", quoted_list(roles))
            }
            Self::SetRolesForNamedSessions(roles) => {
                write!(f, "set roles for named sessions {}", quoted_list(roles))
            }
            Self::SetGlobalPermissions { role, permissions } => write!(
                f,
                "set global permissions for {} {}",
                quoted(role),
                bare_list(permissions)
            ),
            Self::SetDefaultPathPermissions { role, permissions } => write!(
                f,
                "set default path permissions for {} {}",
                quoted(role),
                bare_list(permissions)
            ),
            Self::SetPathPermissions {
                role,
                path,
                permissions,
            } => write!(
                f,
                "set path permissions for {} at {} {}",
                quoted(role),
                quoted(path),
                bare_list(permissions)
            ),
            Self::RemovePathPermissions { role, path } => write!(
                f,
                "remove path permissions for {} at {}",
                quoted(role),
                quoted(path)
            ),
            Self::SetRoleIncludes {
                role,
                included_roles,
            } => write!(f, "set {} includes {}", quoted(role), quoted_list(included_roles)),
            Self::SetRoleLockedByPrincipal {
                role,
                locking_principal,
            } => write!(f, "set {} locked by {}", quoted(role), quoted(locking_principal)),
            Self::IsolatePath(path) => write!(f, "isolate path {}", quoted(path)),
            Self::DeisolatePath(path) => write!(f, "deisolate path {}", quoted(path)),
        }
    }
}

/// An ordered batch of security store changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityScript {
    commands: Vec<SecurityCommand>,
}

impl SecurityScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn with(mut self, command: SecurityCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[SecurityCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl From<SecurityCommand> for SecurityScript {
    fn from(command: SecurityCommand) -> Self {
        Self::new().with(command)
    }
}

impl fmt::Display for SecurityScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}

/// Security store operations available on a session.
#[async_trait]
pub trait SecurityFeature: Send + Sync {
    /// Fetches the complete security configuration.
    async fn get_security(&self) -> RemoteResult<SecurityConfiguration>;

    /// Applies every command of `script`, or none of them.
    async fn update_store(&self, script: &SecurityScript) -> RemoteResult<()>;
}

/// Renders a string in the script syntax's double-quoted form.
pub(crate) fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

pub(crate) fn quoted_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quoted(v)).collect();
    format!("[{}]", items.join(", "))
}

fn bare_list<T: fmt::Display>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_script_rendering() {
        let script = SecurityScript::new()
            .with(SecurityCommand::IsolatePath("secure/".to_string()))
            .with(SecurityCommand::SetGlobalPermissions {
                role: "OPERATOR".to_string(),
                permissions: vec![GlobalPermission::ViewServer, GlobalPermission::ControlServer],
            })
            .with(SecurityCommand::SetRolesForAnonymousSessions(vec![
                "CLIENT".to_string(),
            ]));

        assert_eq!(
            script.to_string(),
            "isolate path \"secure/\"\n\
             set global permissions for \"OPERATOR\" [VIEW_SERVER, CONTROL_SERVER]\n\
             set roles for anonymous sessions [\"CLIENT\"]"
        );
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(quoted(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn test_permission_serde_names() {
        let json = serde_json::to_value(PathPermission::QueryObsoleteTimeSeriesEvents).unwrap();
        assert_eq!(json, "QUERY_OBSOLETE_TIME_SERIES_EVENTS");
        let parsed: GlobalPermission = serde_json::from_value(json!("MODIFY_SECURITY")).unwrap();
        assert_eq!(parsed, GlobalPermission::ModifySecurity);
        assert!(serde_json::from_value::<GlobalPermission>(json!("FLY")).is_err());
    }

    #[test]
    fn test_as_str_matches_serde() {
        for permission in GlobalPermission::ALL {
            let json = serde_json::to_value(permission).unwrap();
            assert_eq!(json, permission.as_str());
        }
    }
}
