//! topicbridge Core Library
//!
//! This crate provides the message transformation engine of topicbridge:
//! - Rule grammar and rule table
//! - Topic joining under a destination base
//! - The transformer (JSON extraction, scaling, timestamp injection)
//! - Connector traits and bridge settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Inbound    │────▶│ Transformer │────▶│  Publisher  │
//! │ (topic,msg) │     │ (RuleTable) │     │ (or dry-run)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use topicbridge_core::{Outcome, RuleTable, TransformOptions, Transformer};
//!
//! let rules = RuleTable::from_json_str(r#"{"power": "energy/pv->w:0.001"}"#).unwrap();
//! let transformer = Transformer::new(Arc::new(rules), TransformOptions::default());
//!
//! let outcome = transformer.transform("meters/pv/power", br#"{"w": 2500}"#).unwrap();
//! assert_eq!(
//!     outcome,
//!     Outcome::Publish { topic: "energy/pv".into(), payload: b"2.5".to_vec() }
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectors;
pub mod error;
pub mod rule;
pub mod rules;
pub mod topic;
pub mod transform;

pub use config::{MqttSettings, RulesConfig, Settings};
pub use connectors::{InboundMessage, MessageSource, Publisher};
pub use error::{Error, Result};
pub use rule::{Rule, Scaling};
pub use rules::{RuleSource, RuleTable};
pub use topic::join_topic;
pub use transform::{OutboundValue, Outcome, TransformOptions, Transformer};
