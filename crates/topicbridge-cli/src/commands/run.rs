//! Run the bridge against an MQTT broker

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use topicbridge_core::Transformer;
use topicbridge_runtime::{Bridge, CancellationToken, MqttTransport};

use crate::settings::{BridgeArgs, BrokerArgs, load_rules, load_settings};

/// Run the bridge until interrupted
pub async fn run(
    config: Option<&Path>,
    broker: BrokerArgs,
    bridge: BridgeArgs,
    dry_run: bool,
) -> Result<()> {
    let mut settings = load_settings(config)?;
    broker.apply(&mut settings.mqtt);
    bridge.apply(&mut settings);
    if dry_run {
        settings.dry_run = true;
    }

    let rules = load_rules(&settings)?;
    tracing::info!("Loaded {} rules", rules.len());

    let transformer = Transformer::new(Arc::new(rules), settings.transform_options());
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let MqttTransport {
        publisher,
        mut source,
        event_loop,
    } = MqttTransport::start(&settings.mqtt, cancel.clone());

    tracing::info!("Starting bridge (press Ctrl+C to stop)");
    let result = Bridge::new(transformer, publisher, settings.dry_run)
        .run(&mut source, cancel.clone())
        .await;

    cancel.cancel();
    event_loop.await.context("MQTT event loop panicked")?;

    let stats = result?;
    tracing::info!(
        received = stats.received,
        published = stats.published,
        dry_run = stats.dry_run,
        lagged = stats.lagged,
        "topicbridge stopped"
    );
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}
