//! Permission data models

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PermissionError;

/// Caller privilege level, resolved by the session layer before a request
/// reaches the browsing core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[serde(alias = "anonymous")]
    Anonymous,
    #[serde(alias = "guest")]
    Guest,
    #[serde(alias = "verified")]
    Verified,
    #[serde(alias = "admin")]
    Admin,
}

impl Role {
    /// Every role, lowest privilege first
    pub const ALL: [Role; 4] = [Role::Anonymous, Role::Guest, Role::Verified, Role::Admin];

    /// Upper-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "ANONYMOUS",
            Role::Guest => "GUEST",
            Role::Verified => "VERIFIED",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ANONYMOUS" => Ok(Role::Anonymous),
            "GUEST" => Ok(Role::Guest),
            "VERIFIED" => Ok(Role::Verified),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(PermissionError::InvalidRole(s.to_string())),
        }
    }
}

/// An action a caller may attempt on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
    Create,
}

impl Action {
    /// Every action
    pub const ALL: [Action; 4] = [Action::Read, Action::Write, Action::Delete, Action::Create];

    /// Whether the action changes repository content
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::Read)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Read => write!(f, "read"),
            Action::Write => write!(f, "write"),
            Action::Delete => write!(f, "delete"),
            Action::Create => write!(f, "create"),
        }
    }
}

/// Explicit per-action grants carried by a rule
///
/// Unset flags fall back to the defaults: read granted, everything else denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<bool>,
}

impl ActionFlags {
    /// Grant every action
    pub fn all() -> Self {
        Self {
            read: Some(true),
            write: Some(true),
            delete: Some(true),
            create: Some(true),
        }
    }

    /// Explicit flag for an action, if set
    pub fn get(&self, action: Action) -> Option<bool> {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Delete => self.delete,
            Action::Create => self.create,
        }
    }

    /// Set the flag for an action
    pub fn set(mut self, action: Action, allowed: bool) -> Self {
        match action {
            Action::Read => self.read = Some(allowed),
            Action::Write => self.write = Some(allowed),
            Action::Delete => self.delete = Some(allowed),
            Action::Create => self.create = Some(allowed),
        }
        self
    }
}

/// A path-pattern rule granting access to a set of roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Path pattern; `*` matches any substring
    pub pattern: String,
    /// Roles allowed by this rule
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    /// Public rules grant read to every role
    #[serde(default)]
    pub is_public: bool,
    /// Optional explicit per-action grants for allowed roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ActionFlags>,
}

impl PermissionRule {
    /// Create a rule restricting a pattern to the given roles
    pub fn new(pattern: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            pattern: pattern.into(),
            roles: roles.into_iter().collect(),
            is_public: false,
            actions: None,
        }
    }

    /// Create a public rule: anyone may read, nobody else gets more by default
    pub fn public(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            roles: BTreeSet::new(),
            is_public: true,
            actions: None,
        }
    }

    /// Attach explicit per-action grants
    pub fn with_actions(mut self, actions: ActionFlags) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Mark the rule public
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Check whether a role belongs to the rule's allowed set
    pub fn allows_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Decide a single action for a role under this rule
    pub fn decide(&self, role: Role, action: Action) -> bool {
        if self.is_public && action == Action::Read {
            return true;
        }
        if !self.allows_role(role) {
            return false;
        }
        match self.actions.and_then(|flags| flags.get(action)) {
            Some(allowed) => allowed,
            None => !action.is_mutating(),
        }
    }
}

/// The effective permissions of a role on a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermission {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub create: bool,
    pub is_public: bool,
    /// Roles the governing rule admits; empty when no rule applies
    pub required_roles: Vec<Role>,
}

impl ResolvedPermission {
    /// Permissions for a path no rule governs
    pub fn unrestricted() -> Self {
        Self {
            read: true,
            write: false,
            delete: false,
            create: false,
            is_public: false,
            required_roles: Vec::new(),
        }
    }

    /// Permissions of a role under a specific rule
    pub fn from_rule(rule: &PermissionRule, role: Role) -> Self {
        Self {
            read: rule.decide(role, Action::Read),
            write: rule.decide(role, Action::Write),
            delete: rule.decide(role, Action::Delete),
            create: rule.decide(role, Action::Create),
            is_public: rule.is_public,
            required_roles: rule.roles.iter().copied().collect(),
        }
    }

    /// Whether an action is allowed
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Delete => self.delete,
            Action::Create => self.create,
        }
    }
}
