//! topicbridge CLI
//!
//! Republishes MQTT messages under rewritten topics, optionally extracting
//! JSON fields, scaling numbers and adding timestamps on the way.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod settings;

use settings::{BridgeArgs, BrokerArgs, RuleArgs};

/// topicbridge - MQTT topic rewriting bridge
#[derive(Parser)]
#[command(name = "topicbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (YAML); command-line flags take precedence
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and bridge messages until interrupted
    Run {
        #[command(flatten)]
        broker: BrokerArgs,

        #[command(flatten)]
        bridge: BridgeArgs,

        /// No data will be sent to the MQTT broker
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Check settings and the rule table without connecting
    Validate {
        #[command(flatten)]
        rules: RuleArgs,

        /// Print the parsed rules as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a single message through the rules and print the outcome
    Transform {
        #[command(flatten)]
        bridge: BridgeArgs,

        /// Inbound topic
        #[arg(long)]
        topic: String,

        /// Inbound payload
        #[arg(long, default_value = "")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            broker,
            bridge,
            dry_run,
        } => {
            commands::run::run(config, broker, bridge, dry_run).await?;
        }
        Commands::Validate { rules, json } => {
            commands::validate::run(config, rules, json)?;
        }
        Commands::Transform {
            bridge,
            topic,
            payload,
        } => {
            commands::transform::run(config, bridge, &topic, payload.as_bytes())?;
        }
    }

    Ok(())
}
