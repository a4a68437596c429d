//! Rule evaluation

use tracing::debug;

use crate::error::Result;
use crate::path::normalize_path;
use crate::pattern::{resolve_conflicts, CompiledPattern};
use crate::permission::config::PermissionConfig;
use crate::permission::models::{Action, PermissionRule, ResolvedPermission, Role};

/// Immutable, stateless permission evaluator
///
/// Rules are compiled once at construction. Evaluation is a pure function of
/// `(role, path, action)`, so an engine can be shared across tasks behind an
/// `Arc` without synchronization.
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    rules: Vec<PermissionRule>,
    patterns: Vec<CompiledPattern>,
}

impl PermissionEngine {
    /// Compile a rule set
    ///
    /// # Returns
    /// An error naming the first rule whose pattern is invalid
    pub fn new(config: PermissionConfig) -> Result<Self> {
        config.validate()?;

        let patterns = config
            .rules
            .iter()
            .map(|rule| CompiledPattern::compile(&rule.pattern))
            .collect::<Result<Vec<_>>>()?;

        debug!(rules = patterns.len(), "Compiled permission rules");

        Ok(Self {
            rules: config.rules,
            patterns,
        })
    }

    /// An engine without rules: everything readable, nothing mutable
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// The loaded rules in declaration order
    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// Number of loaded rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are loaded
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule governing a path, if any
    pub fn matching_rule(&self, path: &str) -> Option<&PermissionRule> {
        let normalized = normalize_path(path);
        resolve_conflicts(&self.patterns, &normalized).map(|idx| &self.rules[idx])
    }

    /// Decide whether `role` may perform `action` on `path`
    pub fn evaluate(&self, role: Role, path: &str, action: Action) -> bool {
        match self.matching_rule(path) {
            Some(rule) => rule.decide(role, action),
            None => !action.is_mutating(),
        }
    }

    /// Resolve every action for `role` on `path` at once
    pub fn resolve(&self, role: Role, path: &str) -> ResolvedPermission {
        match self.matching_rule(path) {
            Some(rule) => ResolvedPermission::from_rule(rule, role),
            None => ResolvedPermission::unrestricted(),
        }
    }

    /// Shorthand for `evaluate(role, path, Action::Read)`
    pub fn can_read(&self, role: Role, path: &str) -> bool {
        self.evaluate(role, path, Action::Read)
    }
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::empty()
    }
}
