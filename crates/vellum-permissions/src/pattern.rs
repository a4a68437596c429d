//! Rule pattern compilation and specificity ranking

use regex::{Regex, RegexBuilder};

use crate::error::{PermissionError, Result};
use crate::path::normalize_path;

/// Score deducted from a pattern's length for every `*` it contains.
pub const WILDCARD_PENALTY: i64 = 10;

/// A rule pattern compiled into an anchored, case-insensitive matcher
///
/// Patterns are written like repository paths (`/guides/*`, `/97. 보안 폴더*`).
/// Every character except `*` is matched literally; `*` matches any
/// substring, separators included.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    normalized: String,
    regex: Regex,
    wildcard_count: usize,
}

impl CompiledPattern {
    /// Compile a pattern
    ///
    /// # Returns
    /// An error if the pattern is empty or does not compile
    pub fn compile(pattern: &str) -> Result<Self> {
        validate_pattern(pattern)?;

        let normalized = normalize_path(pattern.trim());
        let body = normalized
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = RegexBuilder::new(&format!("^{}$", body))
            .case_insensitive(true)
            .build()
            .map_err(|e| PermissionError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source: pattern.to_string(),
            wildcard_count: normalized.matches('*').count(),
            normalized,
            regex,
        })
    }

    /// The pattern as declared
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The pattern with its path portion normalized
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Number of `*` wildcards in the pattern
    pub fn wildcard_count(&self) -> usize {
        self.wildcard_count
    }

    /// Match an already-normalized path
    pub fn matches(&self, normalized_path: &str) -> bool {
        self.regex.is_match(normalized_path)
    }

    /// Specificity score: pattern length minus a penalty per wildcard
    ///
    /// Longer literal patterns outrank shorter ones, and any wildcard costs
    /// more than a handful of literal characters.
    pub fn specificity(&self) -> i64 {
        self.normalized.chars().count() as i64 - WILDCARD_PENALTY * self.wildcard_count as i64
    }
}

/// Validate a pattern before compilation
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(PermissionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "Pattern cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Pick the most specific pattern matching a normalized path
///
/// Ties keep the earliest-declared pattern.
///
/// # Returns
/// The index of the winning pattern, or `None` if nothing matches
pub fn resolve_conflicts<'a, I>(patterns: I, normalized_path: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a CompiledPattern>,
{
    let mut best_match: Option<(usize, i64)> = None;

    for (idx, pattern) in patterns.into_iter().enumerate() {
        if !pattern.matches(normalized_path) {
            continue;
        }
        let specificity = pattern.specificity();
        match best_match {
            Some((_, best)) if specificity <= best => {}
            _ => best_match = Some((idx, specificity)),
        }
    }

    best_match.map(|(idx, _)| idx)
}
