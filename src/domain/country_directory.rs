//! Player name → country mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CountryCode;

/// Mapping from player name to a country code, or `null` for unknown.
///
/// Entries are added and edited, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryDirectory {
    entries: BTreeMap<String, Option<String>>,
}

impl CountryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Country for `name`: `None` if the name was never seen.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CountryCode> {
        self.entries.get(name).map(|code| {
            code.as_deref()
                .and_then(CountryCode::parse)
                .unwrap_or(CountryCode::Unknown)
        })
    }

    /// Adds `name` as unknown. Returns `false` if the name was already present.
    pub fn insert_unknown(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), None);
        true
    }

    /// Sets or replaces the country for `name`.
    pub fn set(&mut self, name: &str, code: &CountryCode) {
        self.entries.insert(
            name.to_string(),
            code.as_directory_value().map(str::to_string),
        );
    }

    /// Number of names in the directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory holds no names.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names and their stored codes, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Checks every entry before the directory is persisted.
    ///
    /// # Errors
    ///
    /// Returns every offending entry.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .entries
            .iter()
            .filter_map(|(name, code)| {
                if name.trim().is_empty() {
                    return Some("empty player name".to_string());
                }
                match code {
                    Some(code) if CountryCode::parse(code).is_none() => {
                        Some(format!("{name:?}: invalid country code {code:?}"))
                    }
                    _ => None,
                }
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_absent_are_distinct() {
        let mut dir = CountryDirectory::new();
        assert_eq!(dir.get("Alice"), None);
        assert!(dir.insert_unknown("Alice"));
        assert_eq!(dir.get("Alice"), Some(CountryCode::Unknown));
        assert!(!dir.insert_unknown("Alice"));
    }

    #[test]
    fn insert_unknown_keeps_known_code() {
        let mut dir = CountryDirectory::new();
        dir.set("Bob", &CountryCode::Code("fi".to_string()));
        assert!(!dir.insert_unknown("Bob"));
        assert_eq!(dir.get("Bob"), Some(CountryCode::Code("fi".to_string())));
    }

    #[test]
    fn serializes_as_flat_object_with_null() {
        let mut dir = CountryDirectory::new();
        dir.insert_unknown("Alice");
        dir.set("Bob", &CountryCode::Code("fi".to_string()));
        let Ok(json) = serde_json::to_value(&dir) else {
            panic!("serialization failed");
        };
        assert_eq!(json, serde_json::json!({"Alice": null, "Bob": "fi"}));
    }

    #[test]
    fn validate_rejects_bad_codes() {
        let Ok(dir) = serde_json::from_str::<CountryDirectory>(r#"{"A": "xyz", "": null}"#)
        else {
            panic!("decode failed");
        };
        let Err(errors) = dir.validate() else {
            panic!("invalid directory accepted");
        };
        assert_eq!(errors.len(), 2);
    }
}
