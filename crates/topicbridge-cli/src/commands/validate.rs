//! Validate settings and the rule table

use anyhow::{Context, Result};
use std::path::Path;

use crate::settings::{RuleArgs, load_rules, load_settings};

/// Run the validate command
pub fn run(config: Option<&Path>, rules: RuleArgs, json: bool) -> Result<()> {
    let mut settings = load_settings(config)?;
    rules.apply(&mut settings.rules);

    let table = load_rules(&settings)?;
    if json {
        let rules: Vec<_> = table.iter().collect();
        let output = serde_json::to_string_pretty(&rules).context("Failed to serialize rules")?;
        println!("{output}");
    } else {
        for rule in table.iter() {
            println!("{} {}", rule.match_key, rule);
        }
    }

    tracing::info!("✓ {} rules are valid", table.len());
    Ok(())
}
