//! Environment snapshot and overrides
//!
//! The process environment is captured once into an [`EnvSnapshot`] and
//! threaded through the start sequence. Components never mutate the ambient
//! environment; they return [`EnvOverrides`] that the launcher merges on top
//! of the inherited environment of the child.

use std::collections::BTreeMap;

/// Provider module override, becomes `-Dprovider.module.class=<value>`
pub const PROVIDER_MODULE_VAR: &str = "IGNITION_PROVIDER_MODULE";
/// Replaces the configured JVM heap arguments
pub const JVM_ARGS_VAR: &str = "IGNITION_JVM_ARGS";
/// Master key value
pub const MASTER_KEY_VAR: &str = "IGNITION_SECURITY_MASTER_KEY";
/// Path of a file holding the master key
pub const MASTER_KEY_LOCATION_VAR: &str = "IGNITION_MASTER_KEY_LOCATION";
/// JDK fallback when `javaHome` is not configured
pub const JAVA_HOME_VAR: &str = "JAVA_HOME";

/// Immutable copy of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Empty snapshot
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style insertion, mostly useful in tests
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up a variable, treating an empty value as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Variables to set in the child's environment on top of the inherited ones
pub type EnvOverrides = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_non_empty() {
        let env = EnvSnapshot::empty().with("A", "").with("B", "x");
        assert_eq!(env.get("A"), Some(""));
        assert_eq!(env.get_non_empty("A"), None);
        assert_eq!(env.get_non_empty("B"), Some("x"));
        assert_eq!(env.get_non_empty("C"), None);
    }

    #[test]
    fn test_from_iter() {
        let env: EnvSnapshot = vec![("K", "V")].into_iter().collect();
        assert_eq!(env.get("K"), Some("V"));
    }
}
