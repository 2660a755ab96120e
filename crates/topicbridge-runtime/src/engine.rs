//! Bridge engine
//!
//! Pulls messages from a [`MessageSource`], runs them through the
//! [`Transformer`] and hands the result to a [`Publisher`]. Messages are
//! handled one at a time in delivery order.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use topicbridge_core::{InboundMessage, MessageSource, Outcome, Publisher, Transformer};

/// What happened to a single inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No rule matched the topic
    Skipped,
    /// Republished through the publisher
    Published,
    /// Transformed and logged, but not published (dry run)
    DryRun,
    /// Payload could not be transformed
    Dropped,
    /// The publisher rejected the outbound message
    PublishFailed,
}

/// Per-outcome counters for a bridge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Messages received from the source
    pub received: u64,
    /// Messages without a matching rule
    pub skipped: u64,
    /// Messages republished
    pub published: u64,
    /// Messages suppressed by dry run
    pub dry_run: u64,
    /// Messages dropped because of payload errors
    pub dropped: u64,
    /// Messages the publisher failed to send
    pub publish_failed: u64,
    /// Messages the transport dropped because the bridge fell behind
    pub lagged: u64,
}

impl BridgeStats {
    fn record(&mut self, dispatch: Dispatch) {
        self.received += 1;
        let counter = match dispatch {
            Dispatch::Skipped => &mut self.skipped,
            Dispatch::Published => &mut self.published,
            Dispatch::DryRun => &mut self.dry_run,
            Dispatch::Dropped => &mut self.dropped,
            Dispatch::PublishFailed => &mut self.publish_failed,
        };
        *counter += 1;
    }
}

/// Topic-rewriting bridge between a source and a publisher
pub struct Bridge<P> {
    transformer: Transformer,
    publisher: P,
    dry_run: bool,
}

impl<P: Publisher> Bridge<P> {
    /// Create a bridge; with `dry_run` the publisher is never called
    pub fn new(transformer: Transformer, publisher: P, dry_run: bool) -> Self {
        Self {
            transformer,
            publisher,
            dry_run,
        }
    }

    #[cfg(test)]
    fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Transform one message and publish the result.
    ///
    /// Never fails: payload and publish errors are logged and reported
    /// through the returned [`Dispatch`].
    pub async fn handle(&self, message: &InboundMessage) -> Dispatch {
        let outcome = match self.transformer.transform(&message.topic, &message.payload) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(topic = %message.topic, "Dropping message: {}", e);
                return Dispatch::Dropped;
            }
        };

        let (topic, payload) = match outcome {
            Outcome::Skip => return Dispatch::Skipped,
            Outcome::Publish { topic, payload } => (topic, payload),
        };

        tracing::debug!(
            "Received message from {} with payload {} to be published to {} as {}",
            message.topic,
            String::from_utf8_lossy(&message.payload),
            topic,
            String::from_utf8_lossy(&payload)
        );

        if self.dry_run {
            tracing::info!(
                topic = %topic,
                payload = %String::from_utf8_lossy(&payload),
                "Dry run, not publishing"
            );
            return Dispatch::DryRun;
        }

        match self.publisher.publish(&topic, payload).await {
            Ok(()) => Dispatch::Published,
            Err(e) => {
                tracing::warn!(topic = %topic, "Publish failed: {}", e);
                Dispatch::PublishFailed
            }
        }
    }

    /// Bridge messages until the source closes or `cancel` fires
    pub async fn run<S>(&self, source: &mut S, cancel: CancellationToken) -> Result<BridgeStats>
    where
        S: MessageSource + ?Sized,
    {
        tracing::info!(
            rules = self.transformer.rules().len(),
            dry_run = self.dry_run,
            "Bridge started"
        );

        let mut stats = BridgeStats::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
                next = source.recv() => next.context("Failed to receive message")?,
            };

            let Some(message) = next else {
                tracing::info!("Message source closed");
                break;
            };
            stats.record(self.handle(&message).await);
        }
        stats.lagged = source.dropped();

        tracing::info!(
            received = stats.received,
            published = stats.published,
            skipped = stats.skipped,
            dropped = stats.dropped,
            lagged = stats.lagged,
            "Bridge stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use topicbridge_core::{Error, RuleTable, TransformOptions};

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(String, Vec<u8>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> topicbridge_core::Result<()> {
            if self.fail {
                return Err(Error::Connector {
                    connector: "test".to_string(),
                    message: "broker gone".to_string(),
                });
            }
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    struct QueueSource {
        messages: VecDeque<InboundMessage>,
        dropped: u64,
    }

    impl QueueSource {
        fn new(messages: &[(&str, &str)]) -> Self {
            Self {
                messages: messages
                    .iter()
                    .map(|(topic, payload)| InboundMessage::new(*topic, *payload))
                    .collect(),
                dropped: 0,
            }
        }
    }

    #[async_trait]
    impl MessageSource for QueueSource {
        async fn recv(&mut self) -> topicbridge_core::Result<Option<InboundMessage>> {
            Ok(self.messages.pop_front())
        }

        fn dropped(&self) -> u64 {
            self.dropped
        }
    }

    /// Never yields a message; only cancellation ends a run over it.
    struct PendingSource;

    #[async_trait]
    impl MessageSource for PendingSource {
        async fn recv(&mut self) -> topicbridge_core::Result<Option<InboundMessage>> {
            std::future::pending().await
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl MessageSource for BrokenSource {
        async fn recv(&mut self) -> topicbridge_core::Result<Option<InboundMessage>> {
            Err(Error::Connector {
                connector: "test".to_string(),
                message: "connection reset".to_string(),
            })
        }
    }

    fn bridge(dry_run: bool, publisher: RecordingPublisher) -> Bridge<RecordingPublisher> {
        let rules = RuleTable::from_json_str(
            r#"{"temp": "climate/temp", "rh": "climate/rh->humidity", "power": "energy:0.001"}"#,
        )
        .unwrap();
        let transformer = Transformer::new(
            Arc::new(rules),
            TransformOptions {
                destination_base: "home".to_string(),
                add_timestamp: false,
            },
        );
        Bridge::new(transformer, publisher, dry_run)
    }

    #[tokio::test]
    async fn test_handle_publishes_transformed_message() {
        let bridge = bridge(false, RecordingPublisher::default());
        let dispatch = bridge
            .handle(&InboundMessage::new("sensors/rh", r#"{"humidity": 55}"#))
            .await;
        assert_eq!(dispatch, Dispatch::Published);
        assert_eq!(
            bridge.publisher().sent(),
            vec![("home/climate/rh".to_string(), b"55".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_handle_skips_unknown_topic() {
        let bridge = bridge(false, RecordingPublisher::default());
        let dispatch = bridge
            .handle(&InboundMessage::new("sensors/pressure", "1013"))
            .await;
        assert_eq!(dispatch, Dispatch::Skipped);
        assert!(bridge.publisher().sent().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_never_publishes() {
        let bridge = bridge(true, RecordingPublisher::default());
        for message in [
            InboundMessage::new("a/temp", "20"),
            InboundMessage::new("a/rh", r#"{"humidity": 40}"#),
            InboundMessage::new("a/power", "1200"),
        ] {
            assert_eq!(bridge.handle(&message).await, Dispatch::DryRun);
        }
        assert!(bridge.publisher().sent().is_empty());
    }

    #[tokio::test]
    async fn test_payload_error_drops_message() {
        let bridge = bridge(false, RecordingPublisher::default());
        let dispatch = bridge.handle(&InboundMessage::new("a/rh", "{oops")).await;
        assert_eq!(dispatch, Dispatch::Dropped);
        assert!(bridge.publisher().sent().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported() {
        let bridge = bridge(false, RecordingPublisher::failing());
        let dispatch = bridge.handle(&InboundMessage::new("a/temp", "20")).await;
        assert_eq!(dispatch, Dispatch::PublishFailed);
    }

    #[tokio::test]
    async fn test_run_continues_after_bad_messages() {
        let bridge = bridge(false, RecordingPublisher::default());
        let mut source = QueueSource::new(&[
            ("a/rh", "not json"),
            ("a/temp", "21"),
            ("a/unknown", "1"),
            ("a/power", "abc"),
            ("a/power", "2000"),
        ]);

        let stats = bridge
            .run(&mut source, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            stats,
            BridgeStats {
                received: 5,
                skipped: 1,
                published: 2,
                dry_run: 0,
                dropped: 2,
                publish_failed: 0,
                lagged: 0,
            }
        );
        assert_eq!(
            bridge.publisher().sent(),
            vec![
                ("home/climate/temp".to_string(), b"21".to_vec()),
                ("home/energy".to_string(), b"2.0".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_counts_dry_run() {
        let bridge = bridge(true, RecordingPublisher::default());
        let mut source = QueueSource::new(&[("a/temp", "21"), ("a/temp", "22")]);
        let stats = bridge
            .run(&mut source, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.dry_run, 2);
        assert_eq!(stats.published, 0);
        assert!(bridge.publisher().sent().is_empty());
    }

    #[tokio::test]
    async fn test_run_reports_transport_drops() {
        let bridge = bridge(false, RecordingPublisher::default());
        let mut source = QueueSource::new(&[("a/temp", "21")]);
        source.dropped = 3;

        let stats = bridge
            .run(&mut source, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.lagged, 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let bridge = bridge(false, RecordingPublisher::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let stats = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            bridge.run(&mut PendingSource, cancel),
        )
        .await
        .expect("run should stop once cancelled")
        .unwrap();
        assert_eq!(stats, BridgeStats::default());
    }

    #[tokio::test]
    async fn test_run_propagates_source_errors() {
        let bridge = bridge(false, RecordingPublisher::default());
        let err = bridge
            .run(&mut BrokenSource, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("connection reset"));
    }
}
