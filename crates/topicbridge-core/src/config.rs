//! Bridge settings
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! command-line flags (applied by the CLI).
//!
//! # Example
//!
//! ```yaml
//! mqtt:
//!   host: broker.local
//!   port: 1883
//!   username: bridge
//!   password: secret
//!   topic: "sensors/#"
//! destination: home
//! add_timestamp: false
//! dry_run: false
//! rules:
//!   file: rules.json
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::rules::RuleSource;
use crate::transform::TransformOptions;

/// Root settings from the YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Broker connection
    #[serde(default)]
    pub mqtt: MqttSettings,

    /// Topic prefix under which rewritten topics are published
    #[serde(default)]
    pub destination: String,

    /// Inject a `time` field into outbound JSON objects
    #[serde(default)]
    pub add_timestamp: bool,

    /// Compute and log outcomes without publishing
    #[serde(default)]
    pub dry_run: bool,

    /// Rule table source
    #[serde(default)]
    pub rules: RulesConfig,
}

/// MQTT broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttSettings {
    /// Broker host
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login username
    #[serde(default)]
    pub username: Option<String>,

    /// Login password (requires a username)
    #[serde(default)]
    pub password: Option<String>,

    /// Client identifier; generated when absent
    #[serde(default)]
    pub client_id: Option<String>,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Subscription pattern
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: default_keep_alive(),
            topic: default_topic(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_topic() -> String {
    "#".to_string()
}

/// Rule table source; exactly one field must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    /// Rule map as JSON text
    #[serde(default)]
    pub inline: Option<String>,

    /// Path to a JSON rule map file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// A relative `rules.file` is resolved against the directory holding the
    /// settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_yaml::from_str(&contents)?;

        let base_path = path.parent().unwrap_or(Path::new("."));
        if let Some(file) = settings.rules.file.as_mut() {
            if file.is_relative() {
                *file = base_path.join(&*file);
            }
        }

        Ok(settings)
    }

    /// Check settings that the types alone cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.password.is_some() && self.mqtt.username.is_none() {
            return Err(Error::ConfigInvalid {
                message: "login with password requires a username".to_string(),
            });
        }
        if self.mqtt.port == 0 {
            return Err(Error::ConfigInvalid {
                message: "MQTT port must not be 0".to_string(),
            });
        }
        if self.mqtt.topic.is_empty() {
            return Err(Error::ConfigInvalid {
                message: "subscription topic must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The single configured rule source
    pub fn rule_source(&self) -> Result<RuleSource> {
        RuleSource::from_options(self.rules.inline.clone(), self.rules.file.clone())
    }

    /// Options for the transformer
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            destination_base: self.destination.clone(),
            add_timestamp: self.add_timestamp,
        }
    }
}
