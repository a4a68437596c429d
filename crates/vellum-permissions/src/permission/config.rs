//! Permission rule documents

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PermissionError, Result};
use crate::pattern::validate_pattern;
use crate::permission::models::{PermissionRule, Role};

/// An ordered set of permission rules
///
/// Declaration order matters: when two matching rules are equally specific,
/// the one declared first governs the path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}

/// Either the structured document or the compact `{pattern: [roles]}` map
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleDocument {
    Structured { rules: Vec<PermissionRule> },
    RoleMap(DeclaredRoleMap),
}

/// `{pattern: [roles]}` entries in document order
struct DeclaredRoleMap(Vec<(String, Vec<Role>)>);

impl<'de> Deserialize<'de> for DeclaredRoleMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RoleMapVisitor;

        impl<'de> Visitor<'de> for RoleMapVisitor {
            type Value = DeclaredRoleMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rule patterns to role lists")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, Vec<Role>>()? {
                    entries.push(entry);
                }
                Ok(DeclaredRoleMap(entries))
            }
        }

        deserializer.deserialize_map(RoleMapVisitor)
    }
}

impl PermissionConfig {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(pattern, roles)` pairs, keeping their order
    pub fn from_role_map<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<Role>)>,
        P: Into<String>,
    {
        Self {
            rules: entries
                .into_iter()
                .map(|(pattern, roles)| PermissionRule::new(pattern, roles))
                .collect(),
        }
    }

    /// Parse a rule document
    ///
    /// Accepts `{"rules": [...]}` or the compact `{"/pattern*": ["ADMIN"]}`
    /// form. Compact entries keep their document order.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = match serde_json::from_str::<RuleDocument>(json)? {
            RuleDocument::Structured { rules } => Self { rules },
            RuleDocument::RoleMap(DeclaredRoleMap(entries)) => Self::from_role_map(entries),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a rule document from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Add a rule after the existing ones
    pub fn add_rule(&mut self, rule: PermissionRule) {
        self.rules.push(rule);
    }

    /// Append every rule of another document
    pub fn extend(&mut self, other: PermissionConfig) {
        self.rules.extend(other.rules);
    }

    /// Get all rules
    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// Check every rule for structural problems
    pub fn validate(&self) -> Result<()> {
        for (idx, rule) in self.rules.iter().enumerate() {
            validate_pattern(&rule.pattern).map_err(|e| {
                PermissionError::ConfigError(format!("rule #{}: {}", idx + 1, e))
            })?;
            if !rule.is_public && rule.roles.is_empty() {
                return Err(PermissionError::ConfigError(format!(
                    "rule #{} ({}): a non-public rule needs at least one role",
                    idx + 1,
                    rule.pattern
                )));
            }
        }
        Ok(())
    }
}
