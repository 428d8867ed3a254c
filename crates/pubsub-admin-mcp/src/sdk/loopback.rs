//! In-process messaging server for tests and local development.
//!
//! [`LoopbackServer`] keeps the administrative stores in memory and hands
//! out sessions that implement every feature trait. It enforces the same
//! permission checks and syntax checks a real server applies to these
//! operations, and lets tests inject failures and stalls.
//!
//! # Examples
//!
//! ```
//! use pubsub_admin_mcp::sdk::loopback::LoopbackServer;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let server = LoopbackServer::new();
//! let session = server.connect("admin", "password").unwrap();
//!
//! let views = session.topic_views().list_topic_views().await.unwrap();
//! assert!(views.is_empty());
//! assert_eq!(server.calls(), 1);
//! # }
//! ```

use super::{
    AnonymousConnectionAction, AuthenticationCommand, CheckRemoteServerResult, GlobalPermission,
    MetricAlert, MetricSample, MetricsFeature, PathPermission, RemoteError, RemoteResult,
    RemoteServer, RemoteServerDefinition, RemoteServerEndpoint, RemoteServerState,
    RemoteServersFeature, Role, SecurityCommand, SecurityConfiguration, SecurityFeature,
    SecurityScript, Session, SessionHandle, SessionMetricCollector, SessionPropertyValidation,
    SystemAuthenticationConfiguration, SystemAuthenticationFeature, SystemAuthenticationScript,
    SystemPrincipal, TopicMetricCollector, TopicView, TopicViewsFeature,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const ADMINISTRATOR: &str = "ADMINISTRATOR";
const OPERATOR: &str = "OPERATOR";
const CLIENT: &str = "CLIENT";
const AUTHENTICATED: &str = "AUTHENTICATED";

#[derive(Debug, Clone, Copy)]
enum Stall {
    For(Duration),
    Forever,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: Option<RemoteError>,
    stall: Option<Stall>,
}

#[derive(Debug, Clone)]
struct PrincipalRecord {
    password: String,
    roles: BTreeSet<String>,
    locking_principal: Option<String>,
}

#[derive(Debug, Clone)]
struct AuthenticationState {
    principals: BTreeMap<String, PrincipalRecord>,
    anonymous_action: AnonymousConnectionAction,
    roles_for_anonymous_sessions: BTreeSet<String>,
    trusted_properties: BTreeMap<String, SessionPropertyValidation>,
}

#[derive(Debug)]
struct State {
    security: SecurityConfiguration,
    authentication: AuthenticationState,
    session_collectors: BTreeMap<String, SessionMetricCollector>,
    topic_collectors: BTreeMap<String, TopicMetricCollector>,
    alerts: BTreeMap<String, MetricAlert>,
    topic_views: BTreeMap<String, TopicView>,
    remote_servers: BTreeMap<String, RemoteServer>,
}

impl State {
    fn initial() -> Self {
        let mut administrator = Role::new(ADMINISTRATOR);
        administrator.global_permissions = GlobalPermission::ALL.into_iter().collect();
        administrator.default_path_permissions = [
            PathPermission::SelectTopic,
            PathPermission::ReadTopic,
            PathPermission::UpdateTopic,
            PathPermission::ModifyTopic,
        ]
        .into_iter()
        .collect();

        let mut operator = Role::new(OPERATOR);
        operator.global_permissions = [
            GlobalPermission::ViewServer,
            GlobalPermission::ControlServer,
            GlobalPermission::ViewSession,
            GlobalPermission::ReadTopicViews,
        ]
        .into_iter()
        .collect();

        let mut client = Role::new(CLIENT);
        client.default_path_permissions = [PathPermission::SelectTopic, PathPermission::ReadTopic]
            .into_iter()
            .collect();

        let mut authenticated = Role::new(AUTHENTICATED);
        authenticated.global_permissions = [GlobalPermission::Authenticate].into_iter().collect();
        authenticated.included_roles = [CLIENT.to_string()].into_iter().collect();

        let security = SecurityConfiguration {
            roles_for_anonymous_sessions: [CLIENT.to_string()].into_iter().collect(),
            roles_for_named_sessions: [AUTHENTICATED.to_string()].into_iter().collect(),
            roles: vec![administrator, operator, client, authenticated],
            isolated_paths: BTreeSet::new(),
        };

        let mut principals = BTreeMap::new();
        principals.insert(
            "admin".to_string(),
            PrincipalRecord {
                password: "password".to_string(),
                roles: [ADMINISTRATOR.to_string()].into_iter().collect(),
                locking_principal: None,
            },
        );
        principals.insert(
            "control".to_string(),
            PrincipalRecord {
                password: "password".to_string(),
                roles: [OPERATOR.to_string()].into_iter().collect(),
                locking_principal: None,
            },
        );

        Self {
            security,
            authentication: AuthenticationState {
                principals,
                anonymous_action: AnonymousConnectionAction::Allow,
                roles_for_anonymous_sessions: [CLIENT.to_string()].into_iter().collect(),
                trusted_properties: BTreeMap::new(),
            },
            session_collectors: BTreeMap::new(),
            topic_collectors: BTreeMap::new(),
            alerts: BTreeMap::new(),
            topic_views: BTreeMap::new(),
            remote_servers: BTreeMap::new(),
        }
    }

    /// Expands `roles` through role inclusion.
    fn effective_roles(&self, roles: &BTreeSet<String>) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<String> = roles.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(role) = self.security.role(&name) {
                queue.extend(role.included_roles.iter().cloned());
            }
        }
        seen
    }

    fn has_permission(&self, roles: &BTreeSet<String>, permission: GlobalPermission) -> bool {
        self.effective_roles(roles).iter().any(|name| {
            self.security
                .role(name)
                .is_some_and(|role| role.global_permissions.contains(&permission))
        })
    }
}

struct Core {
    name: String,
    state: Mutex<State>,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
}

/// An in-memory messaging server.
#[derive(Clone)]
pub struct LoopbackServer {
    core: Arc<Core>,
}

impl std::fmt::Debug for LoopbackServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackServer")
            .field("name", &self.core.name)
            .field("calls", &self.calls())
            .finish()
    }
}

impl Default for LoopbackServer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackServer {
    /// Creates a server with the stock roles (`ADMINISTRATOR`, `OPERATOR`,
    /// `CLIENT`, `AUTHENTICATED`) and principals `admin` and `control`, both
    /// with password `password`.
    pub fn new() -> Self {
        Self::named("loopback")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            core: Arc::new(Core {
                name: name.into(),
                state: Mutex::new(State::initial()),
                faults: Mutex::new(Faults::default()),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Opens a session authenticated as `principal`.
    pub fn connect(&self, principal: &str, password: &str) -> RemoteResult<SessionHandle> {
        let state = self.core.state.lock();
        let record = state
            .authentication
            .principals
            .get(principal)
            .filter(|record| record.password == password)
            .ok_or_else(|| {
                RemoteError::rejected(format!("Authentication failed for principal '{}'", principal))
            })?;

        let mut roles = record.roles.clone();
        roles.extend(state.security.roles_for_named_sessions.iter().cloned());
        drop(state);

        Ok(self.open(Some(principal.to_string()), roles))
    }

    /// Opens an anonymous session, if anonymous connections are allowed.
    pub fn connect_anonymous(&self) -> RemoteResult<SessionHandle> {
        let state = self.core.state.lock();
        if state.authentication.anonymous_action != AnonymousConnectionAction::Allow {
            return Err(RemoteError::rejected("Anonymous connections are not allowed"));
        }
        let mut roles = state.authentication.roles_for_anonymous_sessions.clone();
        roles.extend(state.security.roles_for_anonymous_sessions.iter().cloned());
        drop(state);

        Ok(self.open(None, roles))
    }

    fn open(&self, principal: Option<String>, roles: BTreeSet<String>) -> SessionHandle {
        let session = LoopbackSession {
            id: uuid::Uuid::new_v4().to_string(),
            principal,
            roles,
            closed: AtomicBool::new(false),
            core: Arc::clone(&self.core),
        };
        debug!(
            session_id = %session.id,
            principal = session.principal.as_deref().unwrap_or("ANONYMOUS"),
            "Loopback session opened"
        );
        Arc::new(session)
    }

    /// Number of operations that reached the server.
    pub fn calls(&self) -> usize {
        self.core.calls.load(Ordering::SeqCst)
    }

    /// Makes the next operation fail with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.core.faults.lock().fail_next = Some(error);
    }

    /// Delays every subsequent operation by `delay`.
    pub fn stall(&self, delay: Duration) {
        self.core.faults.lock().stall = Some(Stall::For(delay));
    }

    /// Makes every subsequent operation hang.
    pub fn stall_forever(&self) {
        self.core.faults.lock().stall = Some(Stall::Forever);
    }

    pub fn clear_faults(&self) {
        *self.core.faults.lock() = Faults::default();
    }
}

/// A session opened against a [`LoopbackServer`].
pub struct LoopbackSession {
    id: String,
    principal: Option<String>,
    roles: BTreeSet<String>,
    closed: AtomicBool,
    core: Arc<Core>,
}

impl std::fmt::Debug for LoopbackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackSession")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("roles", &self.roles)
            .finish()
    }
}

impl LoopbackSession {
    /// Closes the session; later operations fail with `SessionClosed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn principal_name(&self) -> &str {
        self.principal.as_deref().unwrap_or("ANONYMOUS")
    }

    async fn round_trip(&self, operation: &'static str) -> RemoteResult<()> {
        self.core.calls.fetch_add(1, Ordering::SeqCst);
        let (stall, failure) = {
            let mut faults = self.core.faults.lock();
            (faults.stall, faults.fail_next.take())
        };

        match stall {
            Some(Stall::For(delay)) => tokio::time::sleep(delay).await,
            Some(Stall::Forever) => std::future::pending::<()>().await,
            None => {}
        }

        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::session_closed(format!("Session {} is closed", self.id)));
        }
        if let Some(error) = failure {
            return Err(error);
        }

        trace!(session_id = %self.id, operation, "Loopback round trip");
        Ok(())
    }

    fn require(&self, state: &State, permission: GlobalPermission) -> RemoteResult<()> {
        if state.has_permission(&self.roles, permission) {
            Ok(())
        } else {
            Err(RemoteError::permission_denied(format!(
                "Permission {} is required for this operation",
                permission
            )))
        }
    }

    fn check_role_lock(&self, role: Option<&Role>) -> RemoteResult<()> {
        match role.and_then(|role| role.locking_principal.as_deref().map(|p| (role, p))) {
            Some((role, locker)) if Some(locker) != self.principal.as_deref() => {
                Err(RemoteError::permission_denied(format!(
                    "Role '{}' is locked by principal '{}'",
                    role.name, locker
                )))
            }
            _ => Ok(()),
        }
    }

    fn apply_security(
        &self,
        config: &mut SecurityConfiguration,
        command: &SecurityCommand,
    ) -> RemoteResult<()> {
        match command {
            SecurityCommand::SetRolesForAnonymousSessions(roles) => {
                config.roles_for_anonymous_sessions = roles.iter().cloned().collect();
            }
            SecurityCommand::SetRolesForNamedSessions(roles) => {
                config.roles_for_named_sessions = roles.iter().cloned().collect();
            }
            SecurityCommand::SetGlobalPermissions { role, permissions } => {
                self.role_mut(config, role)?.global_permissions =
                    permissions.iter().copied().collect();
            }
            SecurityCommand::SetDefaultPathPermissions { role, permissions } => {
                self.role_mut(config, role)?.default_path_permissions =
                    permissions.iter().copied().collect();
            }
            SecurityCommand::SetPathPermissions {
                role,
                path,
                permissions,
            } => {
                self.role_mut(config, role)?
                    .path_permissions
                    .insert(path.clone(), permissions.iter().copied().collect());
            }
            SecurityCommand::RemovePathPermissions { role, path } => {
                self.check_role_lock(config.role(role))?;
                if let Some(role) = config.roles.iter_mut().find(|r| &r.name == role) {
                    role.path_permissions.remove(path);
                }
            }
            SecurityCommand::SetRoleIncludes {
                role,
                included_roles,
            } => {
                if included_roles.iter().any(|included| included == role) {
                    return Err(RemoteError::rejected(format!(
                        "Role '{}' cannot include itself",
                        role
                    )));
                }
                self.role_mut(config, role)?.included_roles =
                    included_roles.iter().cloned().collect();
            }
            SecurityCommand::SetRoleLockedByPrincipal {
                role,
                locking_principal,
            } => {
                self.role_mut(config, role)?.locking_principal = Some(locking_principal.clone());
            }
            SecurityCommand::IsolatePath(path) => {
                config.isolated_paths.insert(path.clone());
            }
            SecurityCommand::DeisolatePath(path) => {
                config.isolated_paths.remove(path);
            }
        }
        Ok(())
    }

    fn role_mut<'a>(
        &self,
        config: &'a mut SecurityConfiguration,
        name: &str,
    ) -> RemoteResult<&'a mut Role> {
        self.check_role_lock(config.role(name))?;
        if config.role(name).is_none() {
            config.roles.push(Role::new(name));
        }
        config
            .roles
            .iter_mut()
            .find(|role| role.name == name)
            .ok_or_else(|| RemoteError::rejected(format!("Role '{}' could not be created", name)))
    }

    fn apply_authentication(
        &self,
        auth: &mut AuthenticationState,
        command: &AuthenticationCommand,
    ) -> RemoteResult<()> {
        match command {
            AuthenticationCommand::AddPrincipal {
                name,
                password,
                roles,
                locking_principal,
            } => {
                if auth.principals.contains_key(name) {
                    return Err(RemoteError::already_exists(format!(
                        "Principal '{}' already exists",
                        name
                    )));
                }
                auth.principals.insert(
                    name.clone(),
                    PrincipalRecord {
                        password: password.clone(),
                        roles: roles.iter().cloned().collect(),
                        locking_principal: locking_principal.clone(),
                    },
                );
            }
            AuthenticationCommand::RemovePrincipal(name) => {
                if let Some(record) = auth.principals.get(name) {
                    self.check_principal_lock(name, record)?;
                    auth.principals.remove(name);
                }
            }
            AuthenticationCommand::AssignRoles { name, roles } => {
                let record = self.principal_mut(auth, name)?;
                record.roles = roles.iter().cloned().collect();
            }
            AuthenticationCommand::SetPassword { name, password } => {
                let record = self.principal_mut(auth, name)?;
                record.password = password.clone();
            }
            AuthenticationCommand::VerifyPassword { name, password } => {
                let record = auth
                    .principals
                    .get(name)
                    .ok_or_else(|| principal_not_found(name))?;
                if &record.password != password {
                    return Err(RemoteError::rejected(format!(
                        "Password verification failed for principal '{}'",
                        name
                    )));
                }
            }
            AuthenticationCommand::AllowAnonymousConnections(roles) => {
                auth.anonymous_action = AnonymousConnectionAction::Allow;
                auth.roles_for_anonymous_sessions = roles.iter().cloned().collect();
            }
            AuthenticationCommand::DenyAnonymousConnections => {
                auth.anonymous_action = AnonymousConnectionAction::Deny;
                auth.roles_for_anonymous_sessions.clear();
            }
            AuthenticationCommand::AbstainAnonymousConnections => {
                auth.anonymous_action = AnonymousConnectionAction::Abstain;
                auth.roles_for_anonymous_sessions.clear();
            }
            AuthenticationCommand::TrustClientProposedPropertyIn { property, values } => {
                auth.trusted_properties.insert(
                    property.clone(),
                    SessionPropertyValidation::Values {
                        values: values.iter().cloned().collect(),
                    },
                );
            }
            AuthenticationCommand::TrustClientProposedPropertyMatches { property, regex } => {
                Regex::new(regex).map_err(|e| {
                    RemoteError::invalid_syntax(format!("Invalid regular expression: {}", e))
                })?;
                auth.trusted_properties.insert(
                    property.clone(),
                    SessionPropertyValidation::Regex {
                        regex: regex.clone(),
                    },
                );
            }
            AuthenticationCommand::IgnoreClientProposedProperty(property) => {
                auth.trusted_properties.remove(property);
            }
        }
        Ok(())
    }

    fn check_principal_lock(&self, name: &str, record: &PrincipalRecord) -> RemoteResult<()> {
        match record.locking_principal.as_deref() {
            Some(locker) if Some(locker) != self.principal.as_deref() => {
                Err(RemoteError::permission_denied(format!(
                    "Principal '{}' is locked by principal '{}'",
                    name, locker
                )))
            }
            _ => Ok(()),
        }
    }

    fn principal_mut<'a>(
        &self,
        auth: &'a mut AuthenticationState,
        name: &str,
    ) -> RemoteResult<&'a mut PrincipalRecord> {
        let record = auth
            .principals
            .get_mut(name)
            .ok_or_else(|| principal_not_found(name))?;
        self.check_principal_lock(name, record)?;
        Ok(record)
    }
}

fn principal_not_found(name: &str) -> RemoteError {
    RemoteError::not_found(format!("Principal '{}' not found", name))
}

/// Rejects filters with unbalanced quotes or parentheses.
fn check_session_filter(filter: &str) -> RemoteResult<()> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in filter.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    if filter.trim().is_empty() || depth != 0 || quote.is_some() {
        return Err(RemoteError::invalid_syntax(format!(
            "Invalid session filter: {}",
            filter
        )));
    }
    Ok(())
}

/// Regular expression selectors (`?` or `*` prefix) must compile.
fn check_topic_selector(selector: &str) -> RemoteResult<()> {
    let pattern = selector
        .strip_prefix('?')
        .or_else(|| selector.strip_prefix('*'));
    if let Some(pattern) = pattern {
        let pattern = pattern.trim_end_matches("//");
        Regex::new(pattern).map_err(|e| {
            RemoteError::invalid_syntax(format!("Invalid topic selector '{}': {}", selector, e))
        })?;
    } else if selector.trim().is_empty() {
        return Err(RemoteError::invalid_syntax("Topic selector must not be empty"));
    }
    Ok(())
}

fn check_topic_view_specification(specification: &str) -> RemoteResult<()> {
    let words: Vec<&str> = specification.split_whitespace().collect();
    let valid = words.len() >= 4
        && words[0] == "map"
        && words.iter().skip(2).take(words.len() - 3).any(|w| *w == "to");
    if valid {
        Ok(())
    } else {
        Err(RemoteError::invalid_syntax(format!(
            "Invalid topic view specification: {}",
            specification
        )))
    }
}

#[async_trait]
impl SecurityFeature for LoopbackSession {
    async fn get_security(&self) -> RemoteResult<SecurityConfiguration> {
        self.round_trip("get_security").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewSecurity)?;
        Ok(state.security.clone())
    }

    async fn update_store(&self, script: &SecurityScript) -> RemoteResult<()> {
        self.round_trip("update_security_store").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ModifySecurity)?;

        let mut updated = state.security.clone();
        for command in script.commands() {
            self.apply_security(&mut updated, command)?;
        }
        state.security = updated;
        debug!(commands = script.commands().len(), "Security store updated");
        Ok(())
    }
}

#[async_trait]
impl SystemAuthenticationFeature for LoopbackSession {
    async fn get_system_authentication(&self) -> RemoteResult<SystemAuthenticationConfiguration> {
        self.round_trip("get_system_authentication").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewSecurity)?;

        let auth = &state.authentication;
        Ok(SystemAuthenticationConfiguration {
            principals: auth
                .principals
                .iter()
                .map(|(name, record)| SystemPrincipal {
                    name: name.clone(),
                    roles: record.roles.clone(),
                    locking_principal: record.locking_principal.clone(),
                })
                .collect(),
            anonymous_action: auth.anonymous_action,
            roles_for_anonymous_sessions: auth.roles_for_anonymous_sessions.clone(),
            trusted_client_proposed_properties: auth.trusted_properties.clone(),
        })
    }

    async fn update_store(&self, script: &SystemAuthenticationScript) -> RemoteResult<()> {
        self.round_trip("update_authentication_store").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ModifySecurity)?;

        let mut updated = state.authentication.clone();
        for command in script.commands() {
            self.apply_authentication(&mut updated, command)?;
        }
        state.authentication = updated;
        debug!(commands = script.commands().len(), "System authentication store updated");
        Ok(())
    }
}

#[async_trait]
impl MetricsFeature for LoopbackSession {
    async fn put_session_metric_collector(&self, collector: &SessionMetricCollector) -> RemoteResult<()> {
        self.round_trip("put_session_metric_collector").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        check_session_filter(&collector.session_filter)?;
        state
            .session_collectors
            .insert(collector.name.clone(), collector.clone());
        Ok(())
    }

    async fn list_session_metric_collectors(&self) -> RemoteResult<Vec<SessionMetricCollector>> {
        self.round_trip("list_session_metric_collectors").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewServer)?;
        Ok(state.session_collectors.values().cloned().collect())
    }

    async fn remove_session_metric_collector(&self, name: &str) -> RemoteResult<()> {
        self.round_trip("remove_session_metric_collector").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        state.session_collectors.remove(name);
        Ok(())
    }

    async fn put_topic_metric_collector(&self, collector: &TopicMetricCollector) -> RemoteResult<()> {
        self.round_trip("put_topic_metric_collector").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        check_topic_selector(&collector.topic_selector)?;
        state
            .topic_collectors
            .insert(collector.name.clone(), collector.clone());
        Ok(())
    }

    async fn list_topic_metric_collectors(&self) -> RemoteResult<Vec<TopicMetricCollector>> {
        self.round_trip("list_topic_metric_collectors").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewServer)?;
        Ok(state.topic_collectors.values().cloned().collect())
    }

    async fn remove_topic_metric_collector(&self, name: &str) -> RemoteResult<()> {
        self.round_trip("remove_topic_metric_collector").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        state.topic_collectors.remove(name);
        Ok(())
    }

    async fn set_metric_alert(&self, name: &str, specification: &str) -> RemoteResult<()> {
        self.round_trip("set_metric_alert").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        let starts_with_select = specification
            .split_whitespace()
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("select"));
        if !starts_with_select {
            return Err(RemoteError::invalid_syntax(format!(
                "Invalid metric alert specification: {}",
                specification
            )));
        }
        state.alerts.insert(
            name.to_string(),
            MetricAlert {
                name: name.to_string(),
                specification: specification.to_string(),
                principal: self.principal_name().to_string(),
            },
        );
        Ok(())
    }

    async fn list_metric_alerts(&self) -> RemoteResult<Vec<MetricAlert>> {
        self.round_trip("list_metric_alerts").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewServer)?;
        Ok(state.alerts.values().cloned().collect())
    }

    async fn remove_metric_alert(&self, name: &str) -> RemoteResult<()> {
        self.round_trip("remove_metric_alert").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        state.alerts.remove(name);
        Ok(())
    }

    async fn fetch_metrics(&self, filter: &[String]) -> RemoteResult<Vec<MetricSample>> {
        self.round_trip("fetch_metrics").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewServer)?;

        let counts = [
            ("admin_principals", state.authentication.principals.len()),
            ("admin_roles", state.security.roles.len()),
            ("admin_isolated_paths", state.security.isolated_paths.len()),
            ("metrics_session_collectors", state.session_collectors.len()),
            ("metrics_topic_collectors", state.topic_collectors.len()),
            ("metrics_alerts", state.alerts.len()),
            ("remote_servers", state.remote_servers.len()),
            ("topic_views", state.topic_views.len()),
            ("server_operations_total", self.core.calls.load(Ordering::SeqCst)),
        ];

        Ok(counts
            .into_iter()
            .filter(|(name, _)| filter.is_empty() || filter.iter().any(|f| name.starts_with(f.as_str())))
            .map(|(name, count)| MetricSample {
                name: name.to_string(),
                server: self.core.name.clone(),
                value: count as f64,
                labels: BTreeMap::new(),
            })
            .collect())
    }
}

#[async_trait]
impl TopicViewsFeature for LoopbackSession {
    async fn create_topic_view(&self, name: &str, specification: &str) -> RemoteResult<TopicView> {
        self.round_trip("create_topic_view").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ModifyTopicViews)?;
        check_topic_view_specification(specification)?;

        let view = TopicView {
            name: name.to_string(),
            specification: specification.to_string(),
            roles: self.roles.clone(),
        };
        state.topic_views.insert(name.to_string(), view.clone());
        Ok(view)
    }

    async fn list_topic_views(&self) -> RemoteResult<Vec<TopicView>> {
        self.round_trip("list_topic_views").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ReadTopicViews)?;
        Ok(state.topic_views.values().cloned().collect())
    }

    async fn get_topic_view(&self, name: &str) -> RemoteResult<Option<TopicView>> {
        self.round_trip("get_topic_view").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ReadTopicViews)?;
        Ok(state.topic_views.get(name).cloned())
    }

    async fn remove_topic_view(&self, name: &str) -> RemoteResult<()> {
        self.round_trip("remove_topic_view").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ModifyTopicViews)?;
        state.topic_views.remove(name);
        Ok(())
    }
}

#[async_trait]
impl RemoteServersFeature for LoopbackSession {
    async fn create_remote_server(&self, definition: &RemoteServerDefinition) -> RemoteResult<RemoteServer> {
        self.round_trip("create_remote_server").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        if state.remote_servers.contains_key(&definition.name) {
            return Err(RemoteError::already_exists(format!(
                "Remote server '{}' already exists",
                definition.name
            )));
        }

        let server = RemoteServer {
            name: definition.name.clone(),
            endpoint: definition.endpoint.clone(),
            principal: definition.principal.clone(),
            connection_options: definition.connection_options.clone(),
            missing_topic_notification_filter: definition.missing_topic_notification_filter.clone(),
        };
        state
            .remote_servers
            .insert(definition.name.clone(), server.clone());
        Ok(server)
    }

    async fn list_remote_servers(&self) -> RemoteResult<Vec<RemoteServer>> {
        self.round_trip("list_remote_servers").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewServer)?;
        Ok(state.remote_servers.values().cloned().collect())
    }

    async fn check_remote_server(&self, name: &str) -> RemoteResult<CheckRemoteServerResult> {
        self.round_trip("check_remote_server").await?;
        let state = self.core.state.lock();
        self.require(&state, GlobalPermission::ViewServer)?;

        let result = match state.remote_servers.get(name).map(|server| &server.endpoint) {
            None => CheckRemoteServerResult {
                state: RemoteServerState::Missing,
                failure_message: None,
            },
            Some(RemoteServerEndpoint::SecondaryInitiator { url })
                if !(url.starts_with("ws://") || url.starts_with("wss://")) =>
            {
                CheckRemoteServerResult {
                    state: RemoteServerState::Failed,
                    failure_message: Some(format!("Unable to connect to {}", url)),
                }
            }
            Some(RemoteServerEndpoint::SecondaryAcceptor { .. }) => CheckRemoteServerResult {
                state: RemoteServerState::Inactive,
                failure_message: None,
            },
            Some(_) => CheckRemoteServerResult {
                state: RemoteServerState::Connected,
                failure_message: None,
            },
        };
        Ok(result)
    }

    async fn remove_remote_server(&self, name: &str) -> RemoteResult<()> {
        self.round_trip("remove_remote_server").await?;
        let mut state = self.core.state.lock();
        self.require(&state, GlobalPermission::ControlServer)?;
        state.remote_servers.remove(name);
        Ok(())
    }
}

impl Session for LoopbackSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    fn security(&self) -> &dyn SecurityFeature {
        self
    }

    fn system_authentication(&self) -> &dyn SystemAuthenticationFeature {
        self
    }

    fn metrics(&self) -> &dyn MetricsFeature {
        self
    }

    fn topic_views(&self) -> &dyn TopicViewsFeature {
        self
    }

    fn remote_servers(&self) -> &dyn RemoteServersFeature {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::RemoteErrorReason;

    fn admin(server: &LoopbackServer) -> SessionHandle {
        server.connect("admin", "password").unwrap()
    }

    #[test]
    fn test_connect_rejects_bad_password() {
        let server = LoopbackServer::new();
        let error = server.connect("admin", "wrong").unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::Rejected);
        assert_eq!(server.calls(), 0);
    }

    #[tokio::test]
    async fn test_security_script_is_applied() {
        let server = LoopbackServer::new();
        let session = admin(&server);

        let script = SecurityScript::new()
            .with(SecurityCommand::IsolatePath("secure/".to_string()))
            .with(SecurityCommand::SetPathPermissions {
                role: "TRADER".to_string(),
                path: "prices/".to_string(),
                permissions: vec![PathPermission::ReadTopic],
            });
        session.security().update_store(&script).await.unwrap();

        let config = session.security().get_security().await.unwrap();
        assert!(config.isolated_paths.contains("secure/"));
        let trader = config.role("TRADER").unwrap();
        assert!(trader.path_permissions["prices/"].contains(&PathPermission::ReadTopic));
    }

    #[tokio::test]
    async fn test_removing_path_permissions_of_unknown_role_creates_nothing() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        let before = session.security().get_security().await.unwrap();

        session
            .security()
            .update_store(
                &SecurityCommand::RemovePathPermissions {
                    role: "GHOST".to_string(),
                    path: "prices/".to_string(),
                }
                .into(),
            )
            .await
            .unwrap();

        let after = session.security().get_security().await.unwrap();
        assert!(after.role("GHOST").is_none());
        assert_eq!(after.roles.len(), before.roles.len());
    }

    #[tokio::test]
    async fn test_failed_script_changes_nothing() {
        let server = LoopbackServer::new();
        let session = admin(&server);

        let script = SecurityScript::new()
            .with(SecurityCommand::IsolatePath("a/".to_string()))
            .with(SecurityCommand::SetRoleIncludes {
                role: "LOOP".to_string(),
                included_roles: vec!["LOOP".to_string()],
            });
        let error = session.security().update_store(&script).await.unwrap_err();
        assert_eq!(error.message(), "Role 'LOOP' cannot include itself");

        let config = session.security().get_security().await.unwrap();
        assert!(!config.isolated_paths.contains("a/"));
    }

    #[tokio::test]
    async fn test_permission_denied_without_modify_security() {
        let server = LoopbackServer::new();
        let session = server.connect("control", "password").unwrap();

        let error = session
            .security()
            .update_store(&SecurityCommand::IsolatePath("x/".to_string()).into())
            .await
            .unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::PermissionDenied);
        assert!(error.message().contains("MODIFY_SECURITY"));
    }

    #[tokio::test]
    async fn test_role_inclusion_grants_permissions() {
        let server = LoopbackServer::new();
        let admin_session = admin(&server);
        admin_session
            .system_authentication()
            .update_store(
                &AuthenticationCommand::AddPrincipal {
                    name: "deputy".to_string(),
                    password: "pw".to_string(),
                    roles: vec!["DEPUTY".to_string()],
                    locking_principal: None,
                }
                .into(),
            )
            .await
            .unwrap();
        admin_session
            .security()
            .update_store(
                &SecurityCommand::SetRoleIncludes {
                    role: "DEPUTY".to_string(),
                    included_roles: vec![ADMINISTRATOR.to_string()],
                }
                .into(),
            )
            .await
            .unwrap();

        let deputy = server.connect("deputy", "pw").unwrap();
        assert!(deputy.security().get_security().await.is_ok());
    }

    #[tokio::test]
    async fn test_locked_principal_cannot_be_changed_by_others() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        session
            .system_authentication()
            .update_store(
                &AuthenticationCommand::AddPrincipal {
                    name: "alice".to_string(),
                    password: "x".to_string(),
                    roles: vec![],
                    locking_principal: Some("root".to_string()),
                }
                .into(),
            )
            .await
            .unwrap();

        let error = session
            .system_authentication()
            .update_store(&AuthenticationCommand::RemovePrincipal("alice".to_string()).into())
            .await
            .unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::PermissionDenied);
    }

    #[tokio::test]
    async fn test_verify_password() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        let auth = session.system_authentication();

        let ok = AuthenticationCommand::VerifyPassword {
            name: "admin".to_string(),
            password: "password".to_string(),
        };
        assert!(auth.update_store(&ok.into()).await.is_ok());

        let bad = AuthenticationCommand::VerifyPassword {
            name: "admin".to_string(),
            password: "nope".to_string(),
        };
        let error = auth.update_store(&bad.into()).await.unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::Rejected);

        let missing = AuthenticationCommand::VerifyPassword {
            name: "ghost".to_string(),
            password: "x".to_string(),
        };
        let error = auth.update_store(&missing.into()).await.unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::NotFound);
    }

    #[tokio::test]
    async fn test_deny_anonymous_connections() {
        let server = LoopbackServer::new();
        assert!(server.connect_anonymous().is_ok());

        admin(&server)
            .system_authentication()
            .update_store(&AuthenticationCommand::DenyAnonymousConnections.into())
            .await
            .unwrap();
        assert!(server.connect_anonymous().is_err());
    }

    #[tokio::test]
    async fn test_removes_are_idempotent() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        assert!(session.topic_views().remove_topic_view("nope").await.is_ok());
        assert!(session.remote_servers().remove_remote_server("nope").await.is_ok());
        assert!(session.metrics().remove_metric_alert("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_topic_view_specification_syntax() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        let views = session.topic_views();

        let view = views
            .create_topic_view("prices", "map ?prices// to views/<path(1)>")
            .await
            .unwrap();
        assert!(view.roles.contains(ADMINISTRATOR));

        let error = views.create_topic_view("bad", "select everything").await.unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::InvalidSyntax);
    }

    #[tokio::test]
    async fn test_check_remote_server_states() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        let remote = session.remote_servers();

        let missing = remote.check_remote_server("absent").await.unwrap();
        assert_eq!(missing.state, RemoteServerState::Missing);

        remote
            .create_remote_server(&RemoteServerDefinition {
                name: "bad-url".to_string(),
                endpoint: RemoteServerEndpoint::SecondaryInitiator {
                    url: "tcp://nowhere".to_string(),
                },
                principal: None,
                password: None,
                connection_options: BTreeMap::new(),
                missing_topic_notification_filter: None,
                retry_delay_ms: None,
            })
            .await
            .unwrap();
        let failed = remote.check_remote_server("bad-url").await.unwrap();
        assert_eq!(failed.state, RemoteServerState::Failed);
        assert!(failed.failure_message.unwrap().contains("tcp://nowhere"));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let server = LoopbackServer::new();
        let session = admin(&server);
        server.fail_next(RemoteError::rejected("boom"));

        let error = session.topic_views().list_topic_views().await.unwrap_err();
        assert_eq!(error.message(), "boom");
        assert!(session.topic_views().list_topic_views().await.is_ok());
        assert_eq!(server.calls(), 2);
    }

    #[tokio::test]
    async fn test_closed_session() {
        let server = LoopbackServer::new();
        let session = LoopbackSession {
            id: "s1".to_string(),
            principal: Some("admin".to_string()),
            roles: [ADMINISTRATOR.to_string()].into_iter().collect(),
            closed: AtomicBool::new(false),
            core: Arc::clone(&server.core),
        };
        session.close();
        let error = session.list_topic_views().await.unwrap_err();
        assert_eq!(error.reason(), RemoteErrorReason::SessionClosed);
    }

    #[test]
    fn test_session_filter_check() {
        assert!(check_session_filter("$Principal is 'alice'").is_ok());
        assert!(check_session_filter("(a is 'b' or c is 'd')").is_ok());
        assert!(check_session_filter("$Principal is 'alice").is_err());
        assert!(check_session_filter("(a is 'b'").is_err());
        assert!(check_session_filter("a is 'b')").is_err());
        assert!(check_session_filter("  ").is_err());
    }

    #[test]
    fn test_topic_selector_check() {
        assert!(check_topic_selector(">prices/fx").is_ok());
        assert!(check_topic_selector("?prices/.*//").is_ok());
        assert!(check_topic_selector("?prices/[").is_err());
    }
}
