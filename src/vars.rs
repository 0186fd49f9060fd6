//! Case-insensitive mappings for resolved request variables and headers.
//!
//! Lookup semantics are explicit: keys compare case-insensitively (ASCII),
//! while the original casing of the first insertion is preserved for
//! iteration and header emission. Inserting under a key that already exists
//! (under any casing) replaces the value but keeps the stored casing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolved request variables keyed case-insensitively.
///
/// Values are JSON values so typed parameters survive untouched until a
/// textual representation is required (URL tokens, idempotency seeds).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vars {
    entries: HashMap<String, VarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct VarEntry {
    name: String,
    value: serde_json::Value,
}

impl Vars {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a variable, replacing any value stored under the same name
    /// in any casing.
    pub fn insert(&mut self, name: impl Into<String>, value: serde_json::Value) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.entries.insert(key, VarEntry { name, value });
    }

    /// Looks up a variable by name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| &entry.value)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(original_name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), &entry.value))
    }

    /// Merges `other` into `self`; entries of `other` win on key collision.
    pub fn merge_from(&mut self, other: &Self) {
        for (name, value) in other.iter() {
            self.insert(name.to_string(), value.clone());
        }
    }

    /// Textual representation of a variable for URL substitution and
    /// idempotency seeds.
    ///
    /// JSON strings yield their raw characters; other values yield their
    /// canonical JSON text. Null and absent variables yield `None`.
    #[must_use]
    pub fn token_value(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl FromIterator<(String, serde_json::Value)> for Vars {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        let mut vars = Self::new();
        for (name, value) in iter {
            vars.insert(name, value);
        }
        vars
    }
}

/// Case-insensitive header map preserving emission casing.
///
/// Unlike [`Vars`] the values are strings, matching what goes on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct HeaderMap {
    entries: HashMap<String, HeaderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    value: String,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any value stored under the same name in
    /// any casing. The casing of the supplied name is kept for emission.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.entries.insert(
            key,
            HeaderEntry {
                name,
                value: value.into(),
            },
        );
    }

    /// Inserts only if no value exists under the name in any casing.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.insert(name, value);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.value.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(emission_name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), entry.value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vars_lookup_is_case_insensitive() {
        let mut vars = Vars::new();
        vars.insert("PaymentId", json!("p-42"));
        assert_eq!(vars.get("paymentid"), Some(&json!("p-42")));
        assert_eq!(vars.get("PAYMENTID"), Some(&json!("p-42")));
        assert!(vars.contains("paymentId"));
    }

    #[test]
    fn vars_insert_replaces_across_casings() {
        let mut vars = Vars::new();
        vars.insert("id", json!(1));
        vars.insert("ID", json!(2));
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("id"), Some(&json!(2)));
    }

    #[test]
    fn token_value_strings_are_raw() {
        let mut vars = Vars::new();
        vars.insert("s", json!("hello"));
        vars.insert("n", json!(42));
        vars.insert("b", json!(true));
        vars.insert("nothing", json!(null));
        assert_eq!(vars.token_value("s").as_deref(), Some("hello"));
        assert_eq!(vars.token_value("n").as_deref(), Some("42"));
        assert_eq!(vars.token_value("b").as_deref(), Some("true"));
        assert_eq!(vars.token_value("nothing"), None);
        assert_eq!(vars.token_value("absent"), None);
    }

    #[test]
    fn merge_prefers_other() {
        let mut base: Vars = [("a".to_string(), json!(1)), ("b".to_string(), json!(2))]
            .into_iter()
            .collect();
        let overlay: Vars = [("B".to_string(), json!(3))].into_iter().collect();
        base.merge_from(&overlay);
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.get("a"), Some(&json!(1)));
    }

    #[test]
    fn headers_keep_emission_casing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", "abc");
        headers.insert("X-Correlation-Id", "def");
        let emitted: Vec<_> = headers.iter().collect();
        assert_eq!(emitted, vec![("X-Correlation-Id", "def")]);
    }

    #[test]
    fn insert_if_absent_never_overwrites() {
        let mut headers = HeaderMap::new();
        headers.insert("Idempotency-Key", "k1");
        headers.insert_if_absent("idempotency-key", "k2");
        assert_eq!(headers.get("Idempotency-Key"), Some("k1"));
    }
}
