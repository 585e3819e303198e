//! Registry configuration.

use serde::{Deserialize, Serialize};

/// What [`ClassRegistry::register`](crate::ClassRegistry::register) does with
/// a qualified name that is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateClass` and keep the registered class.
    #[default]
    Reject,
    /// Swap in the new class. Classes derived from the old one lose it as a base.
    Replace,
}

/// What happens when removing or replacing a class would leave registered
/// classes with a dangling base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Proceed and log a warning naming the orphaned classes.
    #[default]
    Warn,
    /// Fail with `ClassInUse`.
    Reject,
}

/// Configuration for a [`ClassRegistry`](crate::ClassRegistry).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub duplicates: DuplicatePolicy,
    pub orphans: OrphanPolicy,
}

impl RegistryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    #[must_use]
    pub fn with_orphans(mut self, policy: OrphanPolicy) -> Self {
        self.orphans = policy;
        self
    }

    /// Parse a JSON document. Missing keys take their defaults.
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The config as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "duplicates": self.duplicates,
            "orphans": self.orphans,
        })
    }
}
