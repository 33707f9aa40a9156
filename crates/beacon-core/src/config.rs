//! Tracking configuration (`tracking.toml` / `tracking.json`)
//!
//! The [`ConfigurationRegistry`] holds the ruleset that decides which
//! (class, method) pairs are eligible for tracking. It is constructed
//! explicitly and injected into the dispatcher; `load` and `clear` define
//! its lifecycle.
//!
//! ```toml
//! [[rule]]
//! class = "Cart"
//! method = "checkout"
//! event = "cart_checkout"
//!
//! [[rule]]
//! class = "Cart"
//! method = "*"
//!
//! [[rule]]
//! class = "Cart"
//! method = "peek"
//! enabled = false
//! ```
//!
//! Lookup precedence: exact `(class, method)`, then `(class, *)`, then
//! `(*, method)`, then `(*, *)`. The first matching rule decides, so a
//! disabled exact rule switches off a method that a wildcard would track.

use std::path::Path;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pattern matching every class or every method
pub const WILDCARD: &str = "*";

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Failed to parse JSON
    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to serialize the ruleset as TOML
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// File extension is neither `.toml` nor `.json`
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// One tracking rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingRule {
    /// Class name, or `*`
    pub class: String,

    /// Method name, or `*`
    pub method: String,

    /// Whether matching calls are tracked (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Event identifier reported for matching calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl TrackingRule {
    /// Create an enabled rule without an event identifier
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            enabled: true,
            event: None,
        }
    }

    /// Set the reported event identifier
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Mark the rule disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Strip surrounding whitespace from patterns and event identifier
    fn trimmed(mut self) -> Self {
        self.class = self.class.trim().to_string();
        self.method = self.method.trim().to_string();
        if let Some(event) = self.event.as_mut() {
            *event = event.trim().to_string();
        }
        self
    }

    /// Validate the rule
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.class.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "rule for method '{}' has an empty class pattern",
                self.method
            )));
        }
        if self.method.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "rule for class '{}' has an empty method pattern",
                self.class
            )));
        }
        if matches!(&self.event, Some(event) if event.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "rule {}.{} has an empty event identifier",
                self.class, self.method
            )));
        }
        Ok(())
    }
}

/// On-disk layout: `[[rule]]` tables in TOML, `{"rules": [...]}` in JSON
#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule", alias = "rules")]
    rules: Vec<TrackingRule>,
}

/// Rules indexed by class, then method (wildcards stored under `*`)
#[derive(Debug, Default)]
struct RuleSet {
    by_class: FxHashMap<String, FxHashMap<String, TrackingRule>>,
    count: usize,
}

impl RuleSet {
    fn build(rules: Vec<TrackingRule>) -> Self {
        let mut set = RuleSet::default();
        for rule in rules {
            let methods = set.by_class.entry(rule.class.clone()).or_default();
            // Later rules override earlier duplicates
            if methods.insert(rule.method.clone(), rule).is_none() {
                set.count += 1;
            }
        }
        set
    }

    fn exact(&self, class: &str, method: &str) -> Option<&TrackingRule> {
        self.by_class.get(class).and_then(|methods| methods.get(method))
    }

    fn lookup(&self, class: &str, method: &str) -> Option<&TrackingRule> {
        self.exact(class, method)
            .or_else(|| self.exact(class, WILDCARD))
            .or_else(|| self.exact(WILDCARD, method))
            .or_else(|| self.exact(WILDCARD, WILDCARD))
    }

    fn rules(&self) -> Vec<TrackingRule> {
        let mut rules: Vec<TrackingRule> = self
            .by_class
            .values()
            .flat_map(|methods| methods.values().cloned())
            .collect();
        rules.sort_by(|a, b| (&a.class, &a.method).cmp(&(&b.class, &b.method)));
        rules
    }
}

/// Ruleset deciding tracking eligibility.
#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    rules: RwLock<RuleSet>,
}

impl ConfigurationRegistry {
    /// Create an empty registry (nothing is trackable)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from in-memory rules
    pub fn from_rules(rules: Vec<TrackingRule>) -> Result<Self, ConfigError> {
        let registry = Self::new();
        registry.load(rules)?;
        Ok(registry)
    }

    /// Parse a configuration file; the format follows the extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_rules(read_rules(path)?)
    }

    /// Parse a TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = toml::from_str(content)?;
        Self::from_rules(file.rules)
    }

    /// Parse a JSON configuration
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = serde_json::from_str(content)?;
        Self::from_rules(file.rules)
    }

    /// Replace the ruleset. Patterns are trimmed before validation; on a
    /// validation error the previous ruleset is kept. Returns the number of
    /// rules loaded.
    pub fn load(&self, rules: Vec<TrackingRule>) -> Result<usize, ConfigError> {
        let rules: Vec<TrackingRule> = rules.into_iter().map(TrackingRule::trimmed).collect();
        for rule in &rules {
            rule.validate()?;
        }
        let set = RuleSet::build(rules);
        let count = set.count;
        *self.rules.write() = set;

        tracing::debug!(rules = count, "loaded tracking configuration");
        Ok(count)
    }

    /// Replace the ruleset from a file
    pub fn load_file(&self, path: &Path) -> Result<usize, ConfigError> {
        self.load(read_rules(path)?)
    }

    /// Tear down the ruleset; nothing is trackable afterwards
    pub fn clear(&self) {
        *self.rules.write() = RuleSet::default();
    }

    /// Check if a call is eligible for tracking
    pub fn is_trackable(&self, class: &str, method: &str) -> bool {
        self.rules
            .read()
            .lookup(class, method)
            .is_some_and(|rule| rule.enabled)
    }

    /// The rule deciding a (class, method) pair, enabled or not
    pub fn rule_for(&self, class: &str, method: &str) -> Option<TrackingRule> {
        self.rules.read().lookup(class, method).cloned()
    }

    /// All rules, sorted by class then method
    pub fn rules(&self) -> Vec<TrackingRule> {
        self.rules.read().rules()
    }

    /// Number of distinct rules
    pub fn len(&self) -> usize {
        self.rules.read().count
    }

    /// Check if no rules are loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the ruleset back to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let file = RuleFile {
            rules: self.rules(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}

fn read_rules(path: &Path) -> Result<Vec<TrackingRule>, ConfigError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let file: RuleFile = match extension.as_str() {
        "toml" => toml::from_str(&std::fs::read_to_string(path)?)?,
        "json" => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    };
    Ok(file.rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_tracks_nothing() {
        let registry = ConfigurationRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_trackable("Cart", "checkout"));
    }

    #[test]
    fn test_precedence() {
        let registry = ConfigurationRegistry::from_rules(vec![
            TrackingRule::new("Cart", "*"),
            TrackingRule::new("Cart", "peek").disabled(),
            TrackingRule::new("*", "login").with_event("login"),
        ])
        .unwrap();

        assert!(registry.is_trackable("Cart", "checkout"));
        assert!(!registry.is_trackable("Cart", "peek"));
        assert!(registry.is_trackable("Session", "login"));
        assert!(!registry.is_trackable("Session", "logout"));
        assert_eq!(
            registry.rule_for("Session", "login").and_then(|r| r.event),
            Some("login".to_string())
        );
    }

    #[test]
    fn test_later_duplicate_wins() {
        let registry = ConfigurationRegistry::from_rules(vec![
            TrackingRule::new("Cart", "checkout").with_event("a"),
            TrackingRule::new("Cart", "checkout").with_event("b"),
        ])
        .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.rule_for("Cart", "checkout").unwrap().event.as_deref(),
            Some("b")
        );
    }

    #[test]
    fn test_load_and_clear_lifecycle() {
        let registry = ConfigurationRegistry::new();
        assert_eq!(registry.load(vec![TrackingRule::new("A", "b")]).unwrap(), 1);
        assert!(registry.is_trackable("A", "b"));

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.is_trackable("A", "b"));
    }

    #[test]
    fn test_invalid_rule_keeps_previous_ruleset() {
        let registry = ConfigurationRegistry::from_rules(vec![TrackingRule::new("A", "b")]).unwrap();
        let result = registry.load(vec![TrackingRule::new("", "b")]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert!(registry.is_trackable("A", "b"));

        let result = registry.load(vec![TrackingRule::new("A", "b").with_event(" ")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml() {
        let registry = ConfigurationRegistry::from_toml_str(
            r#"
[[rule]]
class = "Cart"
method = "checkout"
event = "cart_checkout"

[[rule]]
class = "Cart"
method = "peek"
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_trackable("Cart", "checkout"));
        assert!(!registry.is_trackable("Cart", "peek"));
    }

    #[test]
    fn test_parse_json() {
        let registry = ConfigurationRegistry::from_json_str(
            r#"{"rules": [{"class": "Feed", "method": "refresh", "event": "feed_refresh"}]}"#,
        )
        .unwrap();
        assert!(registry.is_trackable("Feed", "refresh"));
    }

    #[test]
    fn test_patterns_are_trimmed() {
        let registry = ConfigurationRegistry::from_toml_str(
            r#"
[[rule]]
class = " Cart"
method = "checkout "
event = " cart_checkout "
"#,
        )
        .unwrap();

        assert!(registry.is_trackable("Cart", "checkout"));
        let rule = registry.rule_for("Cart", "checkout").unwrap();
        assert_eq!(rule.class, "Cart");
        assert_eq!(rule.event.as_deref(), Some("cart_checkout"));
    }

    #[test]
    fn test_serialize_error_variant() {
        let err: ConfigError = toml::to_string(&1u8).unwrap_err().into();
        assert!(matches!(err, ConfigError::Serialize(_)));
        assert!(err.to_string().starts_with("Failed to serialize configuration"));
    }

    #[test]
    fn test_toml_round_trip() {
        let registry = ConfigurationRegistry::from_rules(vec![
            TrackingRule::new("B", "y"),
            TrackingRule::new("A", "x").with_event("ax"),
        ])
        .unwrap();
        let text = registry.to_toml_string().unwrap();
        let reparsed = ConfigurationRegistry::from_toml_str(&text).unwrap();
        assert_eq!(reparsed.rules(), registry.rules());
        assert_eq!(reparsed.rules()[0].class, "A");
    }
}
