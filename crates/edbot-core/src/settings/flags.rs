//! Flag registry
//!
//! The set of valid feature flags is declared here, once, as data. Each flag
//! carries its static default, a description, and whether it is
//! safety-critical (may never be disabled at runtime in production).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declaration of a single feature flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    /// Flag name, following the `enable_*` convention
    pub name: String,

    /// Value used when no override is present
    pub default: bool,

    /// What the flag controls
    pub description: String,

    /// Whether disabling this flag in production is forbidden
    #[serde(default)]
    pub safety_critical: bool,
}

impl FlagDefinition {
    /// Create a regular flag definition
    pub fn new(name: impl Into<String>, default: bool, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default,
            description: description.into(),
            safety_critical: false,
        }
    }

    /// Create a safety-critical flag definition
    pub fn safety_critical(
        name: impl Into<String>,
        default: bool,
        description: impl Into<String>,
    ) -> Self {
        Self {
            safety_critical: true,
            ..Self::new(name, default, description)
        }
    }
}

/// Ordered, enumerable registry of known flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagRegistry {
    flags: BTreeMap<String, FlagDefinition>,
}

impl FlagRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every flag ED Bot ships with
    pub fn builtin() -> Self {
        Self::empty()
            .with_flag(FlagDefinition::safety_critical(
                "enable_phi_scrubbing",
                true,
                "Scrub protected health information from queries and responses",
            ))
            .with_flag(FlagDefinition::safety_critical(
                "enable_response_validation",
                true,
                "Validate generated answers against curated medical sources",
            ))
            .with_flag(FlagDefinition::new(
                "enable_hybrid_search",
                false,
                "Combine keyword search with vector retrieval",
            ))
            .with_flag(FlagDefinition::new(
                "enable_elasticsearch",
                false,
                "Use Elasticsearch as the keyword search engine",
            ))
            .with_flag(FlagDefinition::new(
                "enable_source_highlighting",
                false,
                "Highlight cited passages in source documents",
            ))
            .with_flag(FlagDefinition::new(
                "enable_pdf_viewer",
                false,
                "Serve the inline PDF viewer for source documents",
            ))
            .with_flag(FlagDefinition::new(
                "enable_table_extraction",
                false,
                "Extract tables from protocol documents during retrieval",
            ))
            .with_flag(FlagDefinition::new(
                "enable_semantic_cache",
                false,
                "Reuse answers for semantically equivalent queries",
            ))
            .with_flag(FlagDefinition::new(
                "enable_streaming",
                false,
                "Stream responses to the client as they are generated",
            ))
            .with_flag(FlagDefinition::new(
                "enable_medical_metrics",
                true,
                "Record query-type and retrieval quality metrics",
            ))
    }

    /// Add or replace a flag definition
    pub fn with_flag(mut self, definition: FlagDefinition) -> Self {
        self.insert(definition);
        self
    }

    /// Add or replace a flag definition in place
    pub fn insert(&mut self, definition: FlagDefinition) {
        self.flags.insert(definition.name.clone(), definition);
    }

    /// Look up a flag definition
    pub fn get(&self, name: &str) -> Option<&FlagDefinition> {
        self.flags.get(name)
    }

    /// Whether a flag is registered
    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Static default for a flag, if registered
    pub fn default_value(&self, name: &str) -> Option<bool> {
        self.flags.get(name).map(|f| f.default)
    }

    /// Change the default of a registered flag. Returns false for unknown names.
    pub fn set_default(&mut self, name: &str, value: bool) -> bool {
        match self.flags.get_mut(name) {
            Some(flag) => {
                flag.default = value;
                true
            }
            None => false,
        }
    }

    /// Whether a flag may not be disabled in production
    pub fn is_safety_critical(&self, name: &str) -> bool {
        self.flags.get(name).map(|f| f.safety_critical).unwrap_or(false)
    }

    /// Names of every safety-critical flag
    pub fn safety_critical_flags(&self) -> Vec<&str> {
        self.flags
            .values()
            .filter(|f| f.safety_critical)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// All flag names, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    /// All flag definitions, in name order
    pub fn iter(&self) -> impl Iterator<Item = &FlagDefinition> {
        self.flags.values()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
