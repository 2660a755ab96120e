//! Transform a single message without connecting

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use topicbridge_core::{Outcome, Transformer};

use crate::settings::{BridgeArgs, load_rules, load_settings};

/// Print where and how a message would be republished
pub fn run(config: Option<&Path>, bridge: BridgeArgs, topic: &str, payload: &[u8]) -> Result<()> {
    let mut settings = load_settings(config)?;
    bridge.apply(&mut settings);

    let rules = load_rules(&settings)?;
    let transformer = Transformer::new(Arc::new(rules), settings.transform_options());

    match transformer
        .transform(topic, payload)
        .context("Failed to transform message")?
    {
        Outcome::Skip => println!("no rule for topic '{}'", topic),
        Outcome::Publish { topic, payload } => {
            println!("{} {}", topic, String::from_utf8_lossy(&payload));
        }
    }
    Ok(())
}
