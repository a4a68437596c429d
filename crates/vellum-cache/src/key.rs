//! Cache key derivation
//!
//! Keys follow the template `<resource>:/<path>:<params hash>:<ROLE>`. The
//! path and role segments are kept in clear text so that bulk invalidation
//! can address them with `*` patterns.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use vellum_permissions::{path as repo_path, Role};

use crate::error::{CacheError, Result};

/// A derived cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a resource read
    ///
    /// `params` is every query parameter that influences the cached value,
    /// excluding the path itself. It is serialized to JSON with object keys
    /// sorted, then hashed, so field order never changes the key.
    pub fn derive<P>(resource: &str, path: &str, params: &P, role: Role) -> Result<Self>
    where
        P: Serialize + ?Sized,
    {
        if resource.is_empty() || resource.contains([':', '*']) {
            return Err(CacheError::InvalidKey {
                key: resource.to_string(),
            });
        }

        let normalized = repo_path::normalize_path(path);
        Ok(Self(format!(
            "{}:{}:{}:{}",
            resource,
            path_segment(&normalized),
            params_hash(params)?,
            role
        )))
    }

    /// The key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Patterns removing everything cached for a path, its descendants and
    /// every ancestor up to the root
    pub fn path_invalidation_patterns(path: &str) -> Vec<String> {
        let normalized = repo_path::normalize_path(path);
        if normalized.is_empty() {
            return vec!["*".to_string()];
        }

        let mut patterns = vec![
            format!("*:{}:*", path_segment(&normalized)),
            format!("*:{}/*", path_segment(&normalized)),
        ];
        patterns.extend(
            repo_path::ancestors(&normalized)
                .iter()
                .map(|ancestor| format!("*:{}:*", path_segment(ancestor))),
        );
        patterns
    }

    /// Pattern removing everything cached for a role
    pub fn role_pattern(role: Role) -> String {
        format!("*:{}", role)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn path_segment(normalized: &str) -> String {
    repo_path::to_repository_path(normalized)
}

/// SHA-256 of the canonical JSON form of `params`
pub fn params_hash<P: Serialize + ?Sized>(params: &P) -> Result<String> {
    let value = serde_json::to_value(params).map_err(|e| CacheError::Serialization {
        message: e.to_string(),
    })?;
    let canonical = serde_json::to_string(&canonicalize(value))?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Rebuild every object with its keys in sorted order
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Match `text` against a pattern where `*` matches any substring
///
/// Every other character is literal, so keys containing glob or regex
/// metacharacters need no escaping.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, mark)) = backtrack {
            p = star + 1;
            t = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_template() {
        let key = CacheKey::derive("files", "/docs/guide/", &json!({"page": 1}), Role::Guest).unwrap();
        let parts: Vec<&str> = key.as_str().split(':').collect();
        assert_eq!(parts[0], "files");
        assert_eq!(parts[1], "/docs/guide");
        assert_eq!(parts[2].len(), 64);
        assert_eq!(parts[3], "GUEST");
    }

    #[test]
    fn test_root_key() {
        let key = CacheKey::derive("tree", "", &json!({}), Role::Admin).unwrap();
        assert!(key.as_str().starts_with("tree:/:"));
        assert!(key.as_str().ends_with(":ADMIN"));
    }

    #[test]
    fn test_key_ignores_param_order() {
        let a = CacheKey::derive("files", "/a", &json!({"page": 1, "sort": "name"}), Role::Guest).unwrap();
        let b = CacheKey::derive("files", "/a", &json!({"sort": "name", "page": 1}), Role::Guest).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_inputs() {
        let params = json!({"page": 1});
        let base = CacheKey::derive("files", "/a", &params, Role::Guest).unwrap();
        assert_ne!(base, CacheKey::derive("tree", "/a", &params, Role::Guest).unwrap());
        assert_ne!(base, CacheKey::derive("files", "/b", &params, Role::Guest).unwrap());
        assert_ne!(base, CacheKey::derive("files", "/a", &json!({"page": 2}), Role::Guest).unwrap());
        assert_ne!(base, CacheKey::derive("files", "/a", &params, Role::Admin).unwrap());
    }

    #[test]
    fn test_key_normalizes_path() {
        let params = json!({});
        assert_eq!(
            CacheKey::derive("files", "/a/b/", &params, Role::Guest).unwrap(),
            CacheKey::derive("files", "a/./b", &params, Role::Guest).unwrap()
        );
    }

    #[test]
    fn test_invalid_resource() {
        assert!(CacheKey::derive("a:b", "/", &json!({}), Role::Guest).is_err());
        assert!(CacheKey::derive("", "/", &json!({}), Role::Guest).is_err());
    }

    #[test]
    fn test_path_invalidation_patterns() {
        let patterns = CacheKey::path_invalidation_patterns("/a/b");
        assert_eq!(patterns, vec!["*:/a/b:*", "*:/a/b/*", "*:/a:*", "*:/:*"]);
        assert_eq!(CacheKey::path_invalidation_patterns("/"), vec!["*"]);
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("files:/a:*", "files:/a:abc:GUEST"));
        assert!(!wildcard_match("files:/a:*", "files:/ab:abc:GUEST"));
        assert!(wildcard_match("*:/a/*", "tree:/a/b/c:h:ADMIN"));
        assert!(wildcard_match("*:GUEST", "files:/:h:GUEST"));
        assert!(!wildcard_match("*:GUEST", "files:/:h:ADMIN"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("a*b*c", "aXXbYY"));
        assert!(wildcard_match("files:/[x]?:*", "files:/[x]?:h:GUEST"));
    }

    #[test]
    fn test_path_patterns_match_expected_keys() {
        let params = json!({});
        let key = |path: &str| CacheKey::derive("files", path, &params, Role::Guest).unwrap();
        let patterns = CacheKey::path_invalidation_patterns("/a/b");
        let hit = |k: &CacheKey| patterns.iter().any(|p| wildcard_match(p, k.as_str()));

        assert!(hit(&key("/a/b")));
        assert!(hit(&key("/a/b/c")));
        assert!(hit(&key("/a")));
        assert!(hit(&key("/")));
        assert!(!hit(&key("/z")));
        assert!(!hit(&key("/a/bc")));
        assert!(!hit(&key("/a/x")));
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn role_strategy() -> impl Strategy<Value = Role> {
            prop::sample::select(Role::ALL.to_vec())
        }

        fn request_strategy() -> impl Strategy<Value = (String, u8, Role)> {
            ("[a-z]{1,4}(/[a-z]{1,4}){0,2}", 0u8..4, role_strategy())
        }

        proptest! {
            /// Distinct (path, params, role) requests never share a key.
            #[test]
            fn prop_distinct_requests_get_distinct_keys(
                a in request_strategy(),
                b in request_strategy(),
            ) {
                let key_a = CacheKey::derive("files", &a.0, &json!({"page": a.1}), a.2).unwrap();
                let key_b = CacheKey::derive("files", &b.0, &json!({"page": b.1}), b.2).unwrap();
                prop_assert_eq!(a == b, key_a == key_b);
            }

            /// A role pattern removes that role's keys and no other role's.
            #[test]
            fn prop_role_pattern_is_exact(
                (path, page, role) in request_strategy(),
                other in role_strategy(),
            ) {
                let key = CacheKey::derive("tree", &path, &json!({"page": page}), role).unwrap();
                prop_assert_eq!(
                    wildcard_match(&CacheKey::role_pattern(other), key.as_str()),
                    other == role
                );
            }
        }
    }
}
