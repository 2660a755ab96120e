//! Connector traits
//!
//! The bridge only needs two capabilities from a transport: receive inbound
//! `(topic, payload)` pairs and publish outbound ones. The MQTT
//! implementation lives in `topicbridge-runtime`.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// Message delivered by the transport
#[derive(Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,

    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("topic", &self.topic)
            .field("payload", &String::from_utf8_lossy(&self.payload))
            .finish()
    }
}

/// Source of inbound messages (subscriber side of a transport)
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next message; `None` once the source is closed
    async fn recv(&mut self) -> Result<Option<InboundMessage>>;

    /// Messages the transport discarded before they could be received
    fn dropped(&self) -> u64 {
        0
    }
}

/// Sink for outbound messages (publisher side of a transport)
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a payload on a topic
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}
