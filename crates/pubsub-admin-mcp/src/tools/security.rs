//! Security store tools.
//!
//! Every update is submitted as a one-command security script.

use super::{add, status, AdminOperation, NoArguments};
use crate::args;
use crate::error::{InvocationError, RegistryError};
use crate::format::{bracketed, KeyArguments, TextBlock};
use crate::mcp::{ToolRegistry, ToolResult};
use crate::sdk::{
    GlobalPermission, PathPermission, RemoteResult, SecurityCommand, SecurityConfiguration,
    SecurityScript, Session,
};
use crate::session::SessionLookup;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

pub(crate) async fn register(
    registry: &ToolRegistry,
    sessions: &Arc<dyn SessionLookup>,
) -> Result<(), RegistryError> {
    add(registry, sessions, GetSecurity).await?;
    add(registry, sessions, SetRolesForAnonymousSessions).await?;
    add(registry, sessions, SetRolesForNamedSessions).await?;
    add(registry, sessions, SetGlobalPermissions).await?;
    add(registry, sessions, SetDefaultPathPermissions).await?;
    add(registry, sessions, SetPathPermissions).await?;
    add(registry, sessions, RemovePathPermissions).await?;
    add(registry, sessions, SetRoleIncludes).await?;
    add(registry, sessions, SetRoleLockedByPrincipal).await?;
    add(registry, sessions, IsolatePath).await?;
    add(registry, sessions, DeisolatePath).await?;
    Ok(())
}

async fn submit(session: &dyn Session, command: SecurityCommand) -> RemoteResult<()> {
    let script = SecurityScript::from(command);
    session.security().update_store(&script).await
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RolesInput {
    /// Role names; may be empty
    #[schemars(extend("uniqueItems" = true))]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GlobalPermissionsInput {
    /// Role to modify
    #[schemars(length(min = 1))]
    pub role: String,
    /// Replaces the role's global permissions
    #[schemars(extend("uniqueItems" = true))]
    pub permissions: Vec<GlobalPermission>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DefaultPathPermissionsInput {
    /// Role to modify
    #[schemars(length(min = 1))]
    pub role: String,
    /// Replaces the role's default path permissions
    #[schemars(extend("uniqueItems" = true))]
    pub permissions: Vec<PathPermission>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PathPermissionsInput {
    /// Role to modify
    #[schemars(length(min = 1))]
    pub role: String,
    /// Topic path the permissions apply to
    #[schemars(length(min = 1))]
    pub path: String,
    /// Permissions granted at the path
    #[schemars(extend("uniqueItems" = true))]
    pub permissions: Vec<PathPermission>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RolePathInput {
    #[schemars(length(min = 1))]
    pub role: String,
    #[schemars(length(min = 1))]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleIncludesInput {
    /// Role to modify
    #[schemars(length(min = 1))]
    pub role: String,
    /// Roles whose permissions the role inherits
    #[schemars(extend("uniqueItems" = true))]
    pub included_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleLockInput {
    #[schemars(length(min = 1))]
    pub role: String,
    /// Only this principal may modify the role afterwards
    #[schemars(length(min = 1))]
    pub locking_principal: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PathInput {
    /// Topic path
    #[schemars(length(min = 1))]
    pub path: String,
}

pub struct GetSecurity;

#[async_trait]
impl AdminOperation for GetSecurity {
    type Input = NoArguments;
    type Output = SecurityConfiguration;

    const NAME: &'static str = "get_security";
    const DESCRIPTION: &'static str =
        "Show the security store: session roles, isolated paths and every role's permissions.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<SecurityConfiguration> {
        session.security().get_security().await
    }

    fn format(&self, _arguments: &KeyArguments, config: SecurityConfiguration) -> ToolResult {
        let structured = serde_json::to_value(&config).unwrap_or_default();
        ToolResult::success_text(render_security(&config)).with_structured(structured)
    }
}

pub(crate) fn render_security(config: &SecurityConfiguration) -> String {
    let mut block = TextBlock::new("Security configuration");
    block
        .field(0, "Roles for anonymous sessions", bracketed(&config.roles_for_anonymous_sessions))
        .field(0, "Roles for named sessions", bracketed(&config.roles_for_named_sessions))
        .field(0, "Isolated paths", bracketed(&config.isolated_paths))
        .line(0, format_args!("Roles ({}):", config.roles.len()));

    for role in &config.roles {
        block
            .line(1, &role.name)
            .field(2, "Global permissions", bracketed(&role.global_permissions))
            .field(2, "Default path permissions", bracketed(&role.default_path_permissions));
        if !role.path_permissions.is_empty() {
            block.line(2, "Path permissions:");
            for (path, permissions) in &role.path_permissions {
                block.field(3, path, bracketed(permissions));
            }
        }
        if !role.included_roles.is_empty() {
            block.field(2, "Includes", bracketed(&role.included_roles));
        }
        if let Some(principal) = &role.locking_principal {
            block.field(2, "Locked by", principal);
        }
    }
    block.finish()
}

pub struct SetRolesForAnonymousSessions;

#[async_trait]
impl AdminOperation for SetRolesForAnonymousSessions {
    type Input = RolesInput;
    type Output = ();

    const NAME: &'static str = "set_roles_for_anonymous_sessions";
    const KEY_FIELDS: &'static [&'static str] = &["roles"];
    const DESCRIPTION: &'static str = "Set the roles assigned to anonymous sessions.";

    fn validate(&self, input: &RolesInput) -> Result<(), InvocationError> {
        args::require_names("roles", &input.roles)
    }

    fn key_arguments(&self, input: &RolesInput) -> KeyArguments {
        KeyArguments::new().with("roles", &input.roles)
    }

    async fn dispatch(&self, session: &dyn Session, input: &RolesInput) -> RemoteResult<()> {
        submit(session, SecurityCommand::SetRolesForAnonymousSessions(input.roles.clone())).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct SetRolesForNamedSessions;

#[async_trait]
impl AdminOperation for SetRolesForNamedSessions {
    type Input = RolesInput;
    type Output = ();

    const NAME: &'static str = "set_roles_for_named_sessions";
    const KEY_FIELDS: &'static [&'static str] = &["roles"];
    const DESCRIPTION: &'static str = "Set the roles assigned to sessions authenticated with a principal.";

    fn validate(&self, input: &RolesInput) -> Result<(), InvocationError> {
        args::require_names("roles", &input.roles)
    }

    fn key_arguments(&self, input: &RolesInput) -> KeyArguments {
        KeyArguments::new().with("roles", &input.roles)
    }

    async fn dispatch(&self, session: &dyn Session, input: &RolesInput) -> RemoteResult<()> {
        submit(session, SecurityCommand::SetRolesForNamedSessions(input.roles.clone())).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct SetGlobalPermissions;

#[async_trait]
impl AdminOperation for SetGlobalPermissions {
    type Input = GlobalPermissionsInput;
    type Output = ();

    const NAME: &'static str = "set_global_permissions";
    const KEY_FIELDS: &'static [&'static str] = &["role", "permissions"];
    const DESCRIPTION: &'static str = "Replace the global permissions of a role.";

    fn validate(&self, input: &GlobalPermissionsInput) -> Result<(), InvocationError> {
        args::require_non_blank("role", &input.role)?;
        args::require_unique("permissions", &input.permissions)
    }

    fn key_arguments(&self, input: &GlobalPermissionsInput) -> KeyArguments {
        KeyArguments::new()
            .with("role", &input.role)
            .with("permissions", &input.permissions)
    }

    async fn dispatch(&self, session: &dyn Session, input: &GlobalPermissionsInput) -> RemoteResult<()> {
        submit(
            session,
            SecurityCommand::SetGlobalPermissions {
                role: input.role.clone(),
                permissions: input.permissions.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct SetDefaultPathPermissions;

#[async_trait]
impl AdminOperation for SetDefaultPathPermissions {
    type Input = DefaultPathPermissionsInput;
    type Output = ();

    const NAME: &'static str = "set_default_path_permissions";
    const KEY_FIELDS: &'static [&'static str] = &["role", "permissions"];
    const DESCRIPTION: &'static str =
        "Replace the path permissions a role has wherever no path-specific permissions apply.";

    fn validate(&self, input: &DefaultPathPermissionsInput) -> Result<(), InvocationError> {
        args::require_non_blank("role", &input.role)?;
        args::require_unique("permissions", &input.permissions)
    }

    fn key_arguments(&self, input: &DefaultPathPermissionsInput) -> KeyArguments {
        KeyArguments::new()
            .with("role", &input.role)
            .with("permissions", &input.permissions)
    }

    async fn dispatch(&self, session: &dyn Session, input: &DefaultPathPermissionsInput) -> RemoteResult<()> {
        submit(
            session,
            SecurityCommand::SetDefaultPathPermissions {
                role: input.role.clone(),
                permissions: input.permissions.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct SetPathPermissions;

#[async_trait]
impl AdminOperation for SetPathPermissions {
    type Input = PathPermissionsInput;
    type Output = ();

    const NAME: &'static str = "set_path_permissions";
    const KEY_FIELDS: &'static [&'static str] = &["role", "path", "permissions"];
    const DESCRIPTION: &'static str = "Set the permissions a role has at a topic path and below it.";

    fn validate(&self, input: &PathPermissionsInput) -> Result<(), InvocationError> {
        args::require_non_blank("role", &input.role)?;
        args::require_non_blank("path", &input.path)?;
        args::require_unique("permissions", &input.permissions)
    }

    fn key_arguments(&self, input: &PathPermissionsInput) -> KeyArguments {
        KeyArguments::new()
            .with("role", &input.role)
            .with("path", &input.path)
            .with("permissions", &input.permissions)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PathPermissionsInput) -> RemoteResult<()> {
        submit(
            session,
            SecurityCommand::SetPathPermissions {
                role: input.role.clone(),
                path: input.path.clone(),
                permissions: input.permissions.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct RemovePathPermissions;

#[async_trait]
impl AdminOperation for RemovePathPermissions {
    type Input = RolePathInput;
    type Output = ();

    const NAME: &'static str = "remove_path_permissions";
    const KEY_FIELDS: &'static [&'static str] = &["role", "path"];
    const DESCRIPTION: &'static str = "Remove a role's path-specific permissions at a topic path.";

    fn validate(&self, input: &RolePathInput) -> Result<(), InvocationError> {
        args::require_non_blank("role", &input.role)?;
        args::require_non_blank("path", &input.path)
    }

    fn key_arguments(&self, input: &RolePathInput) -> KeyArguments {
        KeyArguments::new()
            .with("role", &input.role)
            .with("path", &input.path)
    }

    async fn dispatch(&self, session: &dyn Session, input: &RolePathInput) -> RemoteResult<()> {
        submit(
            session,
            SecurityCommand::RemovePathPermissions {
                role: input.role.clone(),
                path: input.path.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}

pub struct SetRoleIncludes;

#[async_trait]
impl AdminOperation for SetRoleIncludes {
    type Input = RoleIncludesInput;
    type Output = ();

    const NAME: &'static str = "set_role_includes";
    const KEY_FIELDS: &'static [&'static str] = &["role", "includedRoles"];
    const DESCRIPTION: &'static str = "Set the roles whose permissions a role inherits.";

    fn validate(&self, input: &RoleIncludesInput) -> Result<(), InvocationError> {
        args::require_non_blank("role", &input.role)?;
        args::require_names("includedRoles", &input.included_roles)
    }

    fn key_arguments(&self, input: &RoleIncludesInput) -> KeyArguments {
        KeyArguments::new()
            .with("role", &input.role)
            .with("includedRoles", &input.included_roles)
    }

    async fn dispatch(&self, session: &dyn Session, input: &RoleIncludesInput) -> RemoteResult<()> {
        submit(
            session,
            SecurityCommand::SetRoleIncludes {
                role: input.role.clone(),
                included_roles: input.included_roles.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct SetRoleLockedByPrincipal;

#[async_trait]
impl AdminOperation for SetRoleLockedByPrincipal {
    type Input = RoleLockInput;
    type Output = ();

    const NAME: &'static str = "set_role_locked_by_principal";
    const KEY_FIELDS: &'static [&'static str] = &["role", "lockingPrincipal"];
    const DESCRIPTION: &'static str = "Lock a role so that only the given principal can modify it.";

    fn validate(&self, input: &RoleLockInput) -> Result<(), InvocationError> {
        args::require_non_blank("role", &input.role)?;
        args::require_non_blank("lockingPrincipal", &input.locking_principal)
    }

    fn key_arguments(&self, input: &RoleLockInput) -> KeyArguments {
        KeyArguments::new()
            .with("role", &input.role)
            .with("lockingPrincipal", &input.locking_principal)
    }

    async fn dispatch(&self, session: &dyn Session, input: &RoleLockInput) -> RemoteResult<()> {
        submit(
            session,
            SecurityCommand::SetRoleLockedByPrincipal {
                role: input.role.clone(),
                locking_principal: input.locking_principal.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "locked")
    }
}

pub struct IsolatePath;

#[async_trait]
impl AdminOperation for IsolatePath {
    type Input = PathInput;
    type Output = ();

    const NAME: &'static str = "isolate_path";
    const KEY_FIELDS: &'static [&'static str] = &["path"];
    const DESCRIPTION: &'static str =
        "Isolate a topic path so it no longer inherits permissions from its parent paths.";

    fn validate(&self, input: &PathInput) -> Result<(), InvocationError> {
        args::require_non_blank("path", &input.path)
    }

    fn key_arguments(&self, input: &PathInput) -> KeyArguments {
        KeyArguments::new().with("path", &input.path)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PathInput) -> RemoteResult<()> {
        submit(session, SecurityCommand::IsolatePath(input.path.clone())).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "isolated")
    }
}

pub struct DeisolatePath;

#[async_trait]
impl AdminOperation for DeisolatePath {
    type Input = PathInput;
    type Output = ();

    const NAME: &'static str = "deisolate_path";
    const KEY_FIELDS: &'static [&'static str] = &["path"];
    const DESCRIPTION: &'static str = "Restore permission inheritance for an isolated topic path.";

    fn validate(&self, input: &PathInput) -> Result<(), InvocationError> {
        args::require_non_blank("path", &input.path)
    }

    fn key_arguments(&self, input: &PathInput) -> KeyArguments {
        KeyArguments::new().with("path", &input.path)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PathInput) -> RemoteResult<()> {
        submit(session, SecurityCommand::DeisolatePath(input.path.clone())).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "deisolated")
    }
}
