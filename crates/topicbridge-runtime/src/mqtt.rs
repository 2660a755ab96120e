//! MQTT transport on top of `rumqttc`
//!
//! The event loop runs in its own task. It subscribes on every `ConnAck`,
//! so the subscription is renewed after each reconnect, and forwards
//! incoming publishes to [`MqttSource`]. [`MqttPublisher`] sends through the
//! shared client with QoS 0.
//!
//! Publishes that arrive while the bridge is behind are dropped and counted;
//! see [`MqttSource`]'s `dropped`.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use topicbridge_core::{Error, InboundMessage, MessageSource, MqttSettings, Publisher, Result};

const CONNECTOR: &str = "mqtt";

/// Pending client requests (publish/subscribe) before `publish` waits
const REQUEST_CAPACITY: usize = 64;

/// Inbound messages buffered between the event loop and the bridge
const INBOUND_CAPACITY: usize = 1024;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Build client options from settings
pub fn mqtt_options(settings: &MqttSettings) -> MqttOptions {
    let client_id = settings.client_id.clone().unwrap_or_else(|| {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("topicbridge-{}", &id[..8])
    });

    let mut options = MqttOptions::new(client_id, settings.host.clone(), settings.port);
    options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs));
    options.set_clean_session(true);
    if let Some(username) = &settings.username {
        options.set_credentials(
            username.clone(),
            settings.password.clone().unwrap_or_default(),
        );
    }
    options
}

/// A running MQTT connection
pub struct MqttTransport {
    /// Outbound side
    pub publisher: MqttPublisher,
    /// Inbound side
    pub source: MqttSource,
    /// Event loop task; finishes after `cancel` fires
    pub event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Start the event loop and subscribe to `settings.topic`.
    ///
    /// Returns immediately; connecting and reconnecting happen in the
    /// background until `cancel` fires.
    pub fn start(settings: &MqttSettings, cancel: CancellationToken) -> Self {
        let options = mqtt_options(settings);
        tracing::info!(
            host = %settings.host,
            port = settings.port,
            client_id = %options.client_id(),
            "Connecting to MQTT broker"
        );

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let dropped = Arc::new(AtomicU64::new(0));

        let event_loop = tokio::spawn(drive(
            client.clone(),
            eventloop,
            settings.topic.clone(),
            Inbound {
                tx,
                dropped: Arc::clone(&dropped),
            },
            cancel,
        ));

        Self {
            publisher: MqttPublisher { client },
            source: MqttSource { rx, dropped },
            event_loop,
        }
    }
}

/// Sending half of the inbound channel
struct Inbound {
    tx: mpsc::Sender<InboundMessage>,
    dropped: Arc<AtomicU64>,
}

impl Inbound {
    /// Hand a message to the bridge without waiting; `false` once the bridge is gone
    fn forward(&self, message: InboundMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(topic = %message.topic, "Bridge is lagging, dropping message");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

async fn drive(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topic: String,
    inbound: Inbound,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!("Connected with result: {:?}", ack.code);
                // `try_` variants: awaiting here would stall the loop that drains requests.
                if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                    tracing::warn!(topic = %topic, "Subscribe failed: {}", e);
                } else {
                    tracing::debug!(topic = %topic, "Subscribed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if !inbound.forward(message) {
                    break;
                }
            }
            Ok(event) => tracing::trace!("MQTT event: {:?}", event),
            Err(e) => {
                tracing::warn!("MQTT connection error: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    disconnect(&client, &mut eventloop).await;
    tracing::info!("MQTT event loop stopped");
}

async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }
    let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        tracing::debug!("Timed out waiting for DISCONNECT to be sent");
    }
}

/// Inbound side of the MQTT transport
pub struct MqttSource {
    rx: mpsc::Receiver<InboundMessage>,
    dropped: Arc<AtomicU64>,
}

#[async_trait]
impl MessageSource for MqttSource {
    async fn recv(&mut self) -> Result<Option<InboundMessage>> {
        Ok(self.rx.recv().await)
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Outbound side of the MQTT transport
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| Error::Connector {
                connector: CONNECTOR.to_string(),
                message: e.to_string(),
            })
    }
}
