//! `beacon match`: show whether a class/method pair is tracked.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use beacon_core::{ConfigurationRegistry, TrackingRule};

/// Eligibility verdict for one pair
#[derive(Debug, PartialEq)]
pub enum Decision {
    /// A matching enabled rule
    Tracked { rule: TrackingRule, event: String },
    /// The deciding rule is disabled
    Disabled { rule: TrackingRule },
    /// No rule matches
    Untracked,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Tracked { rule, event } => {
                write!(f, "tracked as '{}' (rule {}.{})", event, rule.class, rule.method)
            }
            Decision::Disabled { rule } => {
                write!(f, "not tracked (disabled by rule {}.{})", rule.class, rule.method)
            }
            Decision::Untracked => f.write_str("not tracked (no matching rule)"),
        }
    }
}

/// Decide a pair the way the runtime's rule tracker does
pub fn decide(registry: &ConfigurationRegistry, class: &str, method: &str) -> Decision {
    match registry.rule_for(class, method) {
        Some(rule) if rule.enabled => {
            let event = rule
                .event
                .clone()
                .unwrap_or_else(|| format!("{}.{}", class, method));
            Decision::Tracked { rule, event }
        }
        Some(rule) => Decision::Disabled { rule },
        None => Decision::Untracked,
    }
}

pub fn execute(config: &Path, class: &str, method: &str) -> anyhow::Result<()> {
    let registry = ConfigurationRegistry::from_file(config)
        .with_context(|| format!("invalid configuration: {}", config.display()))?;

    println!("{}.{}: {}", class, method, decide(&registry, class, method));
    Ok(())
}
