//! System authentication store: principals, anonymous connection policy
//! and trusted client-proposed session properties.

use super::error::RemoteResult;
use super::security::{quoted, quoted_list};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A principal known to the system authentication handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPrincipal {
    pub name: String,
    pub roles: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locking_principal: Option<String>,
}

/// What the system authentication handler does with anonymous connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnonymousConnectionAction {
    Allow,
    Deny,
    Abstain,
}

impl fmt::Display for AnonymousConnectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::Abstain => "ABSTAIN",
        })
    }
}

/// How a client-proposed session property value is checked before it is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SessionPropertyValidation {
    Values { values: BTreeSet<String> },
    Regex { regex: String },
}

impl fmt::Display for SessionPropertyValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Values { values } => {
                let values: Vec<String> = values.iter().cloned().collect();
                write!(f, "in {}", quoted_list(&values))
            }
            Self::Regex { regex } => write!(f, "matches {}", quoted(regex)),
        }
    }
}

/// Snapshot of the system authentication store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAuthenticationConfiguration {
    pub principals: Vec<SystemPrincipal>,
    pub anonymous_action: AnonymousConnectionAction,
    pub roles_for_anonymous_sessions: BTreeSet<String>,
    pub trusted_client_proposed_properties: BTreeMap<String, SessionPropertyValidation>,
}

/// One statement of a system authentication script.
///
/// `Debug` redacts passwords; `Display` renders the wire syntax and must
/// not be logged.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthenticationCommand {
    AddPrincipal {
        name: String,
        password: String,
        roles: Vec<String>,
        locking_principal: Option<String>,
    },
    RemovePrincipal(String),
    AssignRoles {
        name: String,
        roles: Vec<String>,
    },
    SetPassword {
        name: String,
        password: String,
    },
    VerifyPassword {
        name: String,
        password: String,
    },
    AllowAnonymousConnections(Vec<String>),
    DenyAnonymousConnections,
    AbstainAnonymousConnections,
    TrustClientProposedPropertyIn {
        property: String,
        values: Vec<String>,
    },
    TrustClientProposedPropertyMatches {
        property: String,
        regex: String,
    },
    IgnoreClientProposedProperty(String),
}

impl fmt::Debug for AuthenticationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddPrincipal {
                name,
                roles,
                locking_principal,
                ..
            } => f
                .debug_struct("AddPrincipal")
                .field("name", name)
                .field("password", &"<redacted>")
                .field("roles", roles)
                .field("locking_principal", locking_principal)
                .finish(),
            Self::RemovePrincipal(name) => f.debug_tuple("RemovePrincipal").field(name).finish(),
            Self::AssignRoles { name, roles } => f
                .debug_struct("AssignRoles")
                .field("name", name)
                .field("roles", roles)
                .finish(),
            Self::SetPassword { name, .. } => f
                .debug_struct("SetPassword")
                .field("name", name)
                .field("password", &"<redacted>")
                .finish(),
            Self::VerifyPassword { name, .. } => f
                .debug_struct("VerifyPassword")
                .field("name", name)
                .field("password", &"<redacted>")
                .finish(),
            Self::AllowAnonymousConnections(roles) => {
                f.debug_tuple("AllowAnonymousConnections").field(roles).finish()
            }
            Self::DenyAnonymousConnections => f.write_str("DenyAnonymousConnections"),
            Self::AbstainAnonymousConnections => f.write_str("AbstainAnonymousConnections"),
            Self::TrustClientProposedPropertyIn { property, values } => f
                .debug_struct("TrustClientProposedPropertyIn")
                .field("property", property)
                .field("values", values)
                .finish(),
            Self::TrustClientProposedPropertyMatches { property, regex } => f
                .debug_struct("TrustClientProposedPropertyMatches")
                .field("property", property)
                .field("regex", regex)
                .finish(),
            Self::IgnoreClientProposedProperty(property) => f
                .debug_tuple("IgnoreClientProposedProperty")
                .field(property)
                .finish(),
        }
    }
}

impl fmt::Display for AuthenticationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddPrincipal {
                name,
                password,
                roles,
                locking_principal,
            } => {
                write!(
                    f,
                    "add principal {} {} {}",
                    quoted(name),
                    quoted(password),
                    quoted_list(roles)
                )?;
                if let Some(locker) = locking_principal {
                    write!(f, " locked by {}", quoted(locker))?;
                }
                Ok(())
            }
            Self::RemovePrincipal(name) => write!(f, "remove principal {}", quoted(name)),
            Self::AssignRoles { name, roles } => {
                write!(f, "assign roles {} {}", quoted(name), quoted_list(roles))
            }
            Self::SetPassword { name, password } => {
                write!(f, "set password {} {}", quoted(name), quoted(password))
            }
            Self::VerifyPassword { name, password } => {
                write!(f, "verify password {} {}", quoted(name), quoted(password))
            }
            Self::AllowAnonymousConnections(roles) => {
                write!(f, "allow anonymous connections {}", quoted_list(roles))
            }
            Self::DenyAnonymousConnections => f.write_str("deny anonymous connections"),
            Self::AbstainAnonymousConnections => f.write_str("abstain anonymous connections"),
            Self::TrustClientProposedPropertyIn { property, values } => write!(
                f,
                "trust client proposed property {} in {}",
                quoted(property),
                quoted_list(values)
            ),
            Self::TrustClientProposedPropertyMatches { property, regex } => write!(
                f,
                "trust client proposed property {} matches {}",
                quoted(property),
                quoted(regex)
            ),
            Self::IgnoreClientProposedProperty(property) => {
                write!(f, "ignore client proposed property {}", quoted(property))
            }
        }
    }
}

/// An ordered batch of system authentication store changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemAuthenticationScript {
    commands: Vec<AuthenticationCommand>,
}

impl SystemAuthenticationScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, command: AuthenticationCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[AuthenticationCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl From<AuthenticationCommand> for SystemAuthenticationScript {
    fn from(command: AuthenticationCommand) -> Self {
        Self::new().with(command)
    }
}

impl fmt::Display for SystemAuthenticationScript {
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

#[async_trait]
pub trait SystemAuthenticationFeature: Send + Sync {
    async fn get_system_authentication(&self) -> RemoteResult<SystemAuthenticationConfiguration>;

    async fn update_store(&self, script: &SystemAuthenticationScript) -> RemoteResult<()>;
}
