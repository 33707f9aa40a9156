//! `beacon check`: validate a configuration file and list its rules.

use std::path::Path;

use anyhow::Context;
use beacon_core::{ConfigurationRegistry, TrackingRule};

pub fn execute(config: &Path, normalize: bool) -> anyhow::Result<()> {
    let registry = ConfigurationRegistry::from_file(config)
        .with_context(|| format!("invalid configuration: {}", config.display()))?;
    tracing::debug!(path = %config.display(), rules = registry.len(), "configuration parsed");

    if normalize {
        print!("{}", registry.to_toml_string()?);
        return Ok(());
    }

    println!("{}: {} rule(s)", config.display(), registry.len());
    for rule in registry.rules() {
        println!("  {}", describe_rule(&rule));
    }
    Ok(())
}

/// One-line summary of a rule
pub fn describe_rule(rule: &TrackingRule) -> String {
    let mut line = format!("{}.{}", rule.class, rule.method);
    if !rule.enabled {
        line.push_str("  [disabled]");
    } else if let Some(event) = &rule.event {
        line.push_str(&format!("  -> {}", event));
    }
    line
}
