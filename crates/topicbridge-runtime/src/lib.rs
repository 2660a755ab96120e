//! topicbridge Runtime
//!
//! This crate runs the bridge: it connects the transformer from
//! `topicbridge-core` to an MQTT broker.
//!
//! # Features
//!
//! - Bridge loop with dry-run support and per-outcome stats
//! - MQTT transport with re-subscription on reconnect
//! - Cooperative shutdown through a `CancellationToken`
//!
//! # Usage
//!
//! ```rust,ignore
//! use topicbridge_runtime::{Bridge, MqttTransport};
//!
//! let mut transport = MqttTransport::start(&settings.mqtt, cancel.clone());
//! let bridge = Bridge::new(transformer, transport.publisher.clone(), settings.dry_run);
//! bridge.run(&mut transport.source, cancel).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod mqtt;

pub use engine::{Bridge, BridgeStats, Dispatch};
pub use mqtt::{MqttPublisher, MqttSource, MqttTransport};
pub use tokio_util::sync::CancellationToken;
