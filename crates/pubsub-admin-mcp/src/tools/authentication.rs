//! System authentication store tools.
//!
//! Passwords are accepted as arguments but never reported back: they are
//! not key arguments and never reach a log line.

use super::{add, status, AdminOperation, NoArguments};
use crate::args;
use crate::error::{InvocationError, RegistryError};
use crate::format::{bracketed, KeyArguments, TextBlock};
use crate::mcp::{ToolRegistry, ToolResult};
use crate::sdk::{
    AuthenticationCommand, RemoteResult, Session, SystemAuthenticationConfiguration,
    SystemAuthenticationScript,
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
    add(registry, sessions, GetSystemAuthentication).await?;
    add(registry, sessions, AddPrincipal).await?;
    add(registry, sessions, RemovePrincipal).await?;
    add(registry, sessions, AssignRoles).await?;
    add(registry, sessions, SetPassword).await?;
    add(registry, sessions, VerifyPassword).await?;
    add(registry, sessions, AllowAnonymousConnections).await?;
    add(registry, sessions, DenyAnonymousConnections).await?;
    add(registry, sessions, AbstainAnonymousConnections).await?;
    add(registry, sessions, TrustClientProposedPropertyIn).await?;
    add(registry, sessions, TrustClientProposedPropertyMatches).await?;
    add(registry, sessions, IgnoreClientProposedProperty).await?;
    Ok(())
}

async fn submit(session: &dyn Session, command: AuthenticationCommand) -> RemoteResult<()> {
    let script = SystemAuthenticationScript::from(command);
    session.system_authentication().update_store(&script).await
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddPrincipalInput {
    #[schemars(length(min = 1))]
    pub principal_name: String,
    #[schemars(length(min = 1))]
    pub password: String,
    /// Roles assigned to sessions that authenticate as this principal
    #[schemars(extend("uniqueItems" = true))]
    pub roles: Vec<String>,
    /// Only this principal may modify the new principal afterwards
    #[serde(default)]
    pub locking_principal: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalInput {
    #[schemars(length(min = 1))]
    pub principal_name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesInput {
    #[schemars(length(min = 1))]
    pub principal_name: String,
    /// Replaces the principal's roles
    #[schemars(extend("uniqueItems" = true))]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordInput {
    #[schemars(length(min = 1))]
    pub principal_name: String,
    #[schemars(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnonymousRolesInput {
    /// Roles assigned to anonymous sessions; may be empty
    #[schemars(extend("uniqueItems" = true))]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrustValuesInput {
    /// Session property a client may propose
    #[schemars(length(min = 1))]
    pub property_name: String,
    /// Values accepted for the property
    #[schemars(length(min = 1), extend("uniqueItems" = true))]
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrustRegexInput {
    /// Session property a client may propose
    #[schemars(length(min = 1))]
    pub property_name: String,
    /// Regular expression accepted values must match
    #[schemars(length(min = 1))]
    pub regex: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    #[schemars(length(min = 1))]
    pub property_name: String,
}

pub struct GetSystemAuthentication;

#[async_trait]
impl AdminOperation for GetSystemAuthentication {
    type Input = NoArguments;
    type Output = SystemAuthenticationConfiguration;

    const NAME: &'static str = "get_system_authentication";
    const DESCRIPTION: &'static str =
        "Show the system authentication store: principals, anonymous connection policy and trusted session properties.";

    async fn dispatch(
        &self,
        session: &dyn Session,
        _input: &NoArguments,
    ) -> RemoteResult<SystemAuthenticationConfiguration> {
        session.system_authentication().get_system_authentication().await
    }

    fn format(&self, _arguments: &KeyArguments, config: SystemAuthenticationConfiguration) -> ToolResult {
        let structured = serde_json::to_value(&config).unwrap_or_default();
        ToolResult::success_text(render_authentication(&config)).with_structured(structured)
    }
}

pub(crate) fn render_authentication(config: &SystemAuthenticationConfiguration) -> String {
    let mut block = TextBlock::new("System authentication configuration");
    block.line(0, format_args!("Principals ({}):", config.principals.len()));
    for principal in &config.principals {
        block.line(1, format_args!("{} {}", principal.name, bracketed(&principal.roles)));
        if let Some(locker) = &principal.locking_principal {
            block.field(2, "Locked by", locker);
        }
    }

    block.field(0, "Anonymous connections", config.anonymous_action);
    if !config.roles_for_anonymous_sessions.is_empty() {
        block.field(1, "Roles", bracketed(&config.roles_for_anonymous_sessions));
    }

    if config.trusted_client_proposed_properties.is_empty() {
        block.line(0, "Trusted client proposed properties: none");
    } else {
        block.line(0, "Trusted client proposed properties:");
        for (property, validation) in &config.trusted_client_proposed_properties {
            block.line(1, format_args!("{} {}", property, validation));
        }
    }
    block.finish()
}

pub struct AddPrincipal;

#[async_trait]
impl AdminOperation for AddPrincipal {
    type Input = AddPrincipalInput;
    type Output = ();

    const NAME: &'static str = "add_principal";
    const KEY_FIELDS: &'static [&'static str] = &["principalName", "roles", "lockingPrincipal"];
    const DESCRIPTION: &'static str = "Add a principal with a password and roles.";

    fn validate(&self, input: &AddPrincipalInput) -> Result<(), InvocationError> {
        args::require_non_blank("principalName", &input.principal_name)?;
        args::require_non_blank("password", &input.password)?;
        args::require_names("roles", &input.roles)?;
        if let Some(locker) = &input.locking_principal {
            args::require_non_blank("lockingPrincipal", locker)?;
        }
        Ok(())
    }

    fn key_arguments(&self, input: &AddPrincipalInput) -> KeyArguments {
        KeyArguments::new()
            .with("principalName", &input.principal_name)
            .with("roles", &input.roles)
            .with_optional("lockingPrincipal", input.locking_principal.as_ref())
    }

    async fn dispatch(&self, session: &dyn Session, input: &AddPrincipalInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::AddPrincipal {
                name: input.principal_name.clone(),
                password: input.password.clone(),
                roles: input.roles.clone(),
                locking_principal: input.locking_principal.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "added")
    }
}

pub struct RemovePrincipal;

#[async_trait]
impl AdminOperation for RemovePrincipal {
    type Input = PrincipalInput;
    type Output = ();

    const NAME: &'static str = "remove_principal";
    const KEY_FIELDS: &'static [&'static str] = &["principalName"];
    const DESCRIPTION: &'static str = "Remove a principal. Removing an unknown principal succeeds.";

    fn validate(&self, input: &PrincipalInput) -> Result<(), InvocationError> {
        args::require_non_blank("principalName", &input.principal_name)
    }

    fn key_arguments(&self, input: &PrincipalInput) -> KeyArguments {
        KeyArguments::new().with("principalName", &input.principal_name)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PrincipalInput) -> RemoteResult<()> {
        submit(session, AuthenticationCommand::RemovePrincipal(input.principal_name.clone())).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}

pub struct AssignRoles;

#[async_trait]
impl AdminOperation for AssignRoles {
    type Input = AssignRolesInput;
    type Output = ();

    const NAME: &'static str = "assign_roles";
    const KEY_FIELDS: &'static [&'static str] = &["principalName", "roles"];
    const DESCRIPTION: &'static str = "Replace the roles of an existing principal.";

    fn validate(&self, input: &AssignRolesInput) -> Result<(), InvocationError> {
        args::require_non_blank("principalName", &input.principal_name)?;
        args::require_names("roles", &input.roles)
    }

    fn key_arguments(&self, input: &AssignRolesInput) -> KeyArguments {
        KeyArguments::new()
            .with("principalName", &input.principal_name)
            .with("roles", &input.roles)
    }

    async fn dispatch(&self, session: &dyn Session, input: &AssignRolesInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::AssignRoles {
                name: input.principal_name.clone(),
                roles: input.roles.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct SetPassword;

#[async_trait]
impl AdminOperation for SetPassword {
    type Input = PasswordInput;
    type Output = ();

    const NAME: &'static str = "set_password";
    const KEY_FIELDS: &'static [&'static str] = &["principalName"];
    const DESCRIPTION: &'static str = "Change the password of an existing principal.";

    fn validate(&self, input: &PasswordInput) -> Result<(), InvocationError> {
        args::require_non_blank("principalName", &input.principal_name)?;
        args::require_non_blank("password", &input.password)
    }

    fn key_arguments(&self, input: &PasswordInput) -> KeyArguments {
        KeyArguments::new().with("principalName", &input.principal_name)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PasswordInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::SetPassword {
                name: input.principal_name.clone(),
                password: input.password.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "updated")
    }
}

pub struct VerifyPassword;

#[async_trait]
impl AdminOperation for VerifyPassword {
    type Input = PasswordInput;
    type Output = ();

    const NAME: &'static str = "verify_password";
    const KEY_FIELDS: &'static [&'static str] = &["principalName"];
    const DESCRIPTION: &'static str =
        "Check a principal's password. A wrong password is reported as a failure.";

    fn validate(&self, input: &PasswordInput) -> Result<(), InvocationError> {
        args::require_non_blank("principalName", &input.principal_name)?;
        args::require_non_blank("password", &input.password)
    }

    fn key_arguments(&self, input: &PasswordInput) -> KeyArguments {
        KeyArguments::new().with("principalName", &input.principal_name)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PasswordInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::VerifyPassword {
                name: input.principal_name.clone(),
                password: input.password.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "verified")
    }
}

pub struct AllowAnonymousConnections;

#[async_trait]
impl AdminOperation for AllowAnonymousConnections {
    type Input = AnonymousRolesInput;
    type Output = ();

    const NAME: &'static str = "allow_anonymous_connections";
    const KEY_FIELDS: &'static [&'static str] = &["roles"];
    const DESCRIPTION: &'static str = "Accept anonymous connections and give them the listed roles.";

    fn validate(&self, input: &AnonymousRolesInput) -> Result<(), InvocationError> {
        args::require_names("roles", &input.roles)
    }

    fn key_arguments(&self, input: &AnonymousRolesInput) -> KeyArguments {
        KeyArguments::new().with("roles", &input.roles)
    }

    async fn dispatch(&self, session: &dyn Session, input: &AnonymousRolesInput) -> RemoteResult<()> {
        submit(session, AuthenticationCommand::AllowAnonymousConnections(input.roles.clone())).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "allowed")
    }
}

pub struct DenyAnonymousConnections;

#[async_trait]
impl AdminOperation for DenyAnonymousConnections {
    type Input = NoArguments;
    type Output = ();

    const NAME: &'static str = "deny_anonymous_connections";
    const DESCRIPTION: &'static str = "Reject anonymous connections.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<()> {
        submit(session, AuthenticationCommand::DenyAnonymousConnections).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "denied")
    }
}

pub struct AbstainAnonymousConnections;

#[async_trait]
impl AdminOperation for AbstainAnonymousConnections {
    type Input = NoArguments;
    type Output = ();

    const NAME: &'static str = "abstain_anonymous_connections";
    const DESCRIPTION: &'static str =
        "Leave the decision on anonymous connections to the next authentication handler.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<()> {
        submit(session, AuthenticationCommand::AbstainAnonymousConnections).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "abstained")
    }
}

pub struct TrustClientProposedPropertyIn;

#[async_trait]
impl AdminOperation for TrustClientProposedPropertyIn {
    type Input = TrustValuesInput;
    type Output = ();

    const NAME: &'static str = "trust_client_proposed_property_in";
    const KEY_FIELDS: &'static [&'static str] = &["propertyName", "allowedValues"];
    const DESCRIPTION: &'static str =
        "Trust a client-proposed session property when its value is one of the allowed values.";

    fn validate(&self, input: &TrustValuesInput) -> Result<(), InvocationError> {
        args::require_non_blank("propertyName", &input.property_name)?;
        args::require_non_empty("allowedValues", &input.allowed_values)?;
        args::require_unique("allowedValues", &input.allowed_values)
    }

    fn key_arguments(&self, input: &TrustValuesInput) -> KeyArguments {
        KeyArguments::new()
            .with("propertyName", &input.property_name)
            .with("allowedValues", &input.allowed_values)
    }

    async fn dispatch(&self, session: &dyn Session, input: &TrustValuesInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::TrustClientProposedPropertyIn {
                property: input.property_name.clone(),
                values: input.allowed_values.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "trusted")
    }
}

pub struct TrustClientProposedPropertyMatches;

#[async_trait]
impl AdminOperation for TrustClientProposedPropertyMatches {
    type Input = TrustRegexInput;
    type Output = ();

    const NAME: &'static str = "trust_client_proposed_property_matches";
    const KEY_FIELDS: &'static [&'static str] = &["propertyName", "regex"];
    const DESCRIPTION: &'static str =
        "Trust a client-proposed session property when its value matches a regular expression.";

    fn validate(&self, input: &TrustRegexInput) -> Result<(), InvocationError> {
        args::require_non_blank("propertyName", &input.property_name)?;
        args::require_non_blank("regex", &input.regex)?;
        regex::Regex::new(&input.regex).map_err(|e| {
            InvocationError::validation(format!("`regex` is not a valid regular expression: {}", e))
        })?;
        Ok(())
    }

    fn key_arguments(&self, input: &TrustRegexInput) -> KeyArguments {
        KeyArguments::new()
            .with("propertyName", &input.property_name)
            .with("regex", &input.regex)
    }

    async fn dispatch(&self, session: &dyn Session, input: &TrustRegexInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::TrustClientProposedPropertyMatches {
                property: input.property_name.clone(),
                regex: input.regex.clone(),
            },
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "trusted")
    }
}

pub struct IgnoreClientProposedProperty;

#[async_trait]
impl AdminOperation for IgnoreClientProposedProperty {
    type Input = PropertyInput;
    type Output = ();

    const NAME: &'static str = "ignore_client_proposed_property";
    const KEY_FIELDS: &'static [&'static str] = &["propertyName"];
    const DESCRIPTION: &'static str = "Stop trusting a client-proposed session property.";

    fn validate(&self, input: &PropertyInput) -> Result<(), InvocationError> {
        args::require_non_blank("propertyName", &input.property_name)
    }

    fn key_arguments(&self, input: &PropertyInput) -> KeyArguments {
        KeyArguments::new().with("propertyName", &input.property_name)
    }

    async fn dispatch(&self, session: &dyn Session, input: &PropertyInput) -> RemoteResult<()> {
        submit(
            session,
            AuthenticationCommand::IgnoreClientProposedProperty(input.property_name.clone()),
        )
        .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "ignored")
    }
}
