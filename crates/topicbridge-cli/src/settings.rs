//! Command-line overrides for bridge settings

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use topicbridge_core::{MqttSettings, RuleTable, RulesConfig, Settings};

/// Rule table source
#[derive(Args, Debug, Default, Clone)]
pub struct RuleArgs {
    /// Map of MQTT topics to forward, as a JSON object
    #[arg(short = 'a', long = "rules", visible_alias = "hash-map", value_name = "JSON")]
    pub rules: Option<String>,

    /// File holding the map of MQTT topics to forward
    #[arg(
        short = 'c',
        long = "rules-file",
        visible_alias = "hash-map-file",
        value_name = "FILE"
    )]
    pub rules_file: Option<PathBuf>,
}

impl RuleArgs {
    /// Replace the configured rule source when one is given on the command line
    pub fn apply(self, rules: &mut RulesConfig) {
        if self.rules.is_some() || self.rules_file.is_some() {
            *rules = RulesConfig {
                inline: self.rules,
                file: self.rules_file,
            };
        }
    }
}

/// Options that shape the transformation
#[derive(Args, Debug, Default, Clone)]
pub struct BridgeArgs {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// The destination MQTT topic base
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Interpret MQTT payload as JSON and add timestamp
    #[arg(short = 'D', long = "add-date")]
    pub add_date: bool,
}

impl BridgeArgs {
    /// Apply the overrides to the settings
    pub fn apply(self, settings: &mut Settings) {
        self.rules.apply(&mut settings.rules);
        if let Some(destination) = self.destination {
            settings.destination = destination;
        }
        if self.add_date {
            settings.add_timestamp = true;
        }
    }
}

/// Broker connection options
#[derive(Args, Debug, Default, Clone)]
pub struct BrokerArgs {
    /// The MQTT host to connect to
    #[arg(short = 'm', long = "mqtt-host")]
    pub host: Option<String>,

    /// MQTT broker port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// MQTT broker login username
    #[arg(short, long)]
    pub username: Option<String>,

    /// MQTT broker login password
    #[arg(short, long, env = "TOPICBRIDGE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// MQTT client identifier
    #[arg(short = 'i', long)]
    pub client_id: Option<String>,

    /// Keep-alive interval in seconds
    #[arg(short = 'k', long = "keep-alive", value_name = "SECS")]
    pub keep_alive: Option<u64>,

    /// The listening MQTT topic
    #[arg(short, long)]
    pub topic: Option<String>,
}

impl BrokerArgs {
    /// Apply the overrides to the broker settings
    pub fn apply(self, mqtt: &mut MqttSettings) {
        if let Some(host) = self.host {
            mqtt.host = host;
        }
        if let Some(port) = self.port {
            mqtt.port = port;
        }
        if self.username.is_some() {
            mqtt.username = self.username;
        }
        if self.password.is_some() {
            mqtt.password = self.password;
        }
        if self.client_id.is_some() {
            mqtt.client_id = self.client_id;
        }
        if let Some(keep_alive) = self.keep_alive {
            mqtt.keep_alive_secs = keep_alive;
        }
        if let Some(topic) = self.topic {
            mqtt.topic = topic;
        }
    }
}

/// Load the settings file if given, defaults otherwise
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => {
            tracing::info!("Loading settings from {}", path.display());
            Settings::load(path).context("Failed to load settings")
        }
        None => Ok(Settings::default()),
    }
}

/// Validate settings and build the rule table they point at
pub fn load_rules(settings: &Settings) -> Result<RuleTable> {
    settings.validate().context("Invalid settings")?;
    let source = settings.rule_source().context("No usable rule source")?;
    RuleTable::load(&source).context("Failed to load rule table")
}
