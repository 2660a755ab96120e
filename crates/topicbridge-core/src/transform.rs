//! Message transformation
//!
//! Turns an inbound `(topic, payload)` pair into an [`Outcome`]. The payload
//! passes through up to three stages, always in this order:
//!
//! 1. **extract** - pick a field out of a JSON object (`->property`)
//! 2. **scale** - `value * factor + offset` (`:factor,offset`)
//! 3. **timestamp** - set `time` on a JSON object (`add_timestamp`)
//!
//! Each stage consumes the [`OutboundValue`] left by the previous one, so a
//! stage that needs an object or a number fails with a payload error when
//! handed something else.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::rule::{Rule, Scaling};
use crate::rules::RuleTable;
use crate::topic::join_topic;

/// Field set by timestamp injection
pub const TIMESTAMP_FIELD: &str = "time";

/// Options shared by every transformation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Topic prefix under which all targets are rooted
    pub destination_base: String,

    /// Interpret the outbound value as a JSON object and add the current time
    pub add_timestamp: bool,
}

/// Result of transforming one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No rule matched the topic
    Skip,
    /// Republish `payload` on `topic`
    Publish {
        /// Outbound topic
        topic: String,
        /// Outbound payload
        payload: Vec<u8>,
    },
}

/// Value flowing through the transformation stages
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundValue {
    /// Inbound payload, untouched
    Raw(Vec<u8>),
    /// Field extracted from a JSON payload
    Extracted(Value),
    /// Result of scaling
    Numeric(f64),
    /// JSON object carrying a timestamp
    Object(Map<String, Value>),
}

impl OutboundValue {
    /// Render the value as an outbound payload
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes,
            Self::Extracted(Value::String(text)) => text.into_bytes(),
            Self::Extracted(Value::Null) => Vec::new(),
            Self::Extracted(value) => value.to_string().into_bytes(),
            Self::Numeric(number) => render_number(number).into_bytes(),
            Self::Object(map) => Value::Object(map).to_string().into_bytes(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Raw(bytes) => parse_decimal(std::str::from_utf8(bytes).ok()?),
            Self::Extracted(Value::Number(number)) => number.as_f64(),
            Self::Extracted(Value::String(text)) => parse_decimal(text),
            Self::Numeric(number) => Some(*number),
            _ => None,
        }
    }
}

/// Applies the rule table to inbound messages
///
/// Holds no mutable state; clone it or share it freely between tasks.
#[derive(Debug, Clone)]
pub struct Transformer {
    rules: Arc<RuleTable>,
    options: TransformOptions,
}

impl Transformer {
    /// Create a transformer over a rule table
    pub fn new(rules: Arc<RuleTable>, options: TransformOptions) -> Self {
        Self { rules, options }
    }

    /// The rule table in use
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Transform a message, stamping it with the current time if requested
    pub fn transform(&self, topic: &str, payload: &[u8]) -> Result<Outcome> {
        self.transform_at(topic, payload, chrono::Utc::now().timestamp())
    }

    /// Transform a message using `now` (Unix seconds) as the timestamp
    pub fn transform_at(&self, topic: &str, payload: &[u8], now: i64) -> Result<Outcome> {
        let Some(rule) = self.rules.resolve(topic) else {
            tracing::debug!(topic, "No rule for topic");
            return Ok(Outcome::Skip);
        };

        let target = join_topic(&self.options.destination_base, &rule.target);
        let value = self.apply(rule, topic, payload, now)?;

        Ok(Outcome::Publish {
            topic: target,
            payload: value.into_bytes(),
        })
    }

    fn apply(&self, rule: &Rule, topic: &str, payload: &[u8], now: i64) -> Result<OutboundValue> {
        let mut value = match &rule.json_property {
            Some(property) => OutboundValue::Extracted(extract(topic, payload, property)?),
            None => OutboundValue::Raw(payload.to_vec()),
        };

        if let Some(scaling) = &rule.scaling {
            value = OutboundValue::Numeric(scale(topic, &value, scaling)?);
        }

        if self.options.add_timestamp {
            let mut object = into_object(topic, value)?;
            object.insert(TIMESTAMP_FIELD.to_string(), Value::from(now));
            value = OutboundValue::Object(object);
        }

        Ok(value)
    }
}

fn extract(topic: &str, payload: &[u8], property: &str) -> Result<Value> {
    let mut object = parse_object(topic, payload)?;
    object
        .remove(property)
        .ok_or_else(|| Error::payload(topic, format!("field '{property}' not found")))
}

fn scale(topic: &str, value: &OutboundValue, scaling: &Scaling) -> Result<f64> {
    value
        .as_number()
        .map(|number| scaling.apply(number))
        .ok_or_else(|| Error::payload(topic, "value is not a number"))
}

fn into_object(topic: &str, value: OutboundValue) -> Result<Map<String, Value>> {
    match value {
        OutboundValue::Raw(bytes) => parse_object(topic, &bytes),
        OutboundValue::Extracted(Value::Object(map)) | OutboundValue::Object(map) => Ok(map),
        OutboundValue::Extracted(Value::String(text)) => parse_object(topic, text.as_bytes()),
        OutboundValue::Extracted(_) | OutboundValue::Numeric(_) => Err(Error::payload(
            topic,
            "cannot add timestamp: value is not a JSON object",
        )),
    }
}

fn parse_object(topic: &str, bytes: &[u8]) -> Result<Map<String, Value>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::payload(topic, format!("payload is not UTF-8: {e}")))?;
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::payload(topic, "payload is not a JSON object")),
        Err(e) => Err(Error::payload(topic, format!("payload is not JSON: {e}"))),
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

/// Render a float with the shortest round-trip digits,
/// always with a fractional part or an exponent (`12.0`, `1e-05`, `1.5e+16`).
pub fn render_number(number: f64) -> String {
    if number.is_nan() {
        return "nan".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let debug = format!("{number:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => debug,
    }
}
