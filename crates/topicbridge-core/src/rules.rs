//! Rule table
//!
//! The rule table maps a match key to a [`Rule`]. It is built once at
//! start-up from a JSON object of strings, either given inline or read from
//! a file:
//!
//! ```json
//! {
//!   "temperature": "climate/temp",
//!   "shellies/plug/relay/0/power": "energy/plug:0.001",
//!   "rh": "climate/humidity->humidity"
//! }
//! ```
//!
//! Lookups try the full inbound topic first, then its sensor name (the last
//! `/` segment).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::rule::Rule;

/// Where the rule table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// JSON object given as text
    Inline(String),
    /// Path to a file holding the JSON object
    File(PathBuf),
}

impl RuleSource {
    /// Pick the single rule source out of the inline and file options.
    ///
    /// Exactly one must be given.
    pub fn from_options(inline: Option<String>, file: Option<PathBuf>) -> Result<Self> {
        match (inline, file) {
            (Some(inline), None) => Ok(Self::Inline(inline)),
            (None, Some(file)) => Ok(Self::File(file)),
            (None, None) => Err(Error::ConfigInvalid {
                message: "either a rule map or a rule map file is required".to_string(),
            }),
            (Some(_), Some(_)) => Err(Error::ConfigInvalid {
                message: "a rule map and a rule map file are mutually exclusive".to_string(),
            }),
        }
    }
}

/// Immutable mapping from match key to rule
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: BTreeMap<String, Rule>,
}

impl RuleTable {
    /// Build the table from its configured source
    pub fn load(source: &RuleSource) -> Result<Self> {
        match source {
            RuleSource::Inline(json) => Self::from_json_str(json),
            RuleSource::File(path) => Self::from_file(path),
        }
    }

    /// Read and parse a JSON rule file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&contents)?;
        tracing::debug!("Loaded {} rules from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse a JSON object of rule strings
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or_else(|| Error::ConfigInvalid {
            message: "rule map must be a JSON object".to_string(),
        })?;

        let mut rules = BTreeMap::new();
        for (key, spec) in object {
            let spec = spec.as_str().ok_or_else(|| Error::InvalidRule {
                key: key.clone(),
                message: format!("expected a string, found {spec}"),
            })?;
            rules.insert(key.clone(), Rule::parse(key, spec)?);
        }
        Ok(Self { rules })
    }

    /// Find the rule for an inbound topic.
    ///
    /// A rule keyed by the full topic takes precedence over one keyed by the
    /// sensor name.
    pub fn resolve(&self, topic: &str) -> Option<&Rule> {
        self.rules
            .get(topic)
            .or_else(|| self.rules.get(sensor_name(topic)))
    }

    /// Iterate rules sorted by match key
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Last `/` segment of a topic, or the whole topic when it has none
pub fn sensor_name(topic: &str) -> &str {
    topic.rsplit_once('/').map_or(topic, |(_, name)| name)
}
