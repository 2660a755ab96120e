//! Routing rules and the rule string grammar
//!
//! A rule is written as a single string:
//!
//! ```text
//! TARGET[->PROPERTY][:FACTOR[,OFFSET]]
//! ```
//!
//! - `sensor/raw/temp` - republish the payload unchanged
//! - `rh->humidity` - publish the `humidity` field of a JSON payload
//! - `power:0.001` - publish `payload * 0.001`
//! - `power->watts:0.001,1.5` - publish `payload.watts * 0.001 + 1.5`
//!
//! The first `->` is resolved before the first `:`. A `:` in front of the
//! `->` is part of the target.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

const PROPERTY_SEPARATOR: &str = "->";
const SCALING_SEPARATOR: char = ':';
const OFFSET_SEPARATOR: char = ',';

/// Linear scaling applied to numeric values: `value * factor + offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scaling {
    /// Multiplier
    pub factor: f64,
    /// Added after multiplication
    pub offset: f64,
}

impl Scaling {
    /// Apply the scaling to a value
    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor + self.offset
    }
}

/// One routing directive from the rule table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    /// Full topic or sensor name this rule matches
    pub match_key: String,

    /// Target topic, relative to the destination base
    pub target: String,

    /// JSON field to extract from the inbound payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_property: Option<String>,

    /// Numeric scaling of the outbound value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
}

impl Rule {
    /// Parse a rule string for the given match key
    ///
    /// # Example
    ///
    /// ```rust
    /// use topicbridge_core::Rule;
    ///
    /// let rule = Rule::parse("meter", "energy/power->watts:0.001").unwrap();
    /// assert_eq!(rule.target, "energy/power");
    /// assert_eq!(rule.json_property.as_deref(), Some("watts"));
    /// assert_eq!(rule.scaling.unwrap().factor, 0.001);
    /// ```
    pub fn parse(match_key: &str, spec: &str) -> Result<Self> {
        let (target, property, scaling) = match spec.split_once(PROPERTY_SEPARATOR) {
            Some((target, rest)) => {
                let (property, scaling) = split_scaling(rest);
                if property.is_empty() {
                    return Err(invalid(match_key, "empty JSON property after '->'"));
                }
                (target, Some(property), scaling)
            }
            None => {
                let (target, scaling) = split_scaling(spec);
                (target, None, scaling)
            }
        };

        let scaling = scaling
            .map(|section| parse_scaling(match_key, section))
            .transpose()?;

        Ok(Self {
            match_key: match_key.to_string(),
            target: target.to_string(),
            json_property: property.map(str::to_string),
            scaling,
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)?;
        if let Some(property) = &self.json_property {
            write!(f, "{PROPERTY_SEPARATOR}{property}")?;
        }
        if let Some(scaling) = &self.scaling {
            write!(f, "{SCALING_SEPARATOR}{}", scaling.factor)?;
            if scaling.offset != 0.0 {
                write!(f, "{OFFSET_SEPARATOR}{}", scaling.offset)?;
            }
        }
        Ok(())
    }
}

fn split_scaling(section: &str) -> (&str, Option<&str>) {
    match section.split_once(SCALING_SEPARATOR) {
        Some((head, scaling)) => (head, Some(scaling)),
        None => (section, None),
    }
}

fn parse_scaling(match_key: &str, section: &str) -> Result<Scaling> {
    let (factor, offset) = match section.split_once(OFFSET_SEPARATOR) {
        Some((factor, offset)) => (factor, Some(offset)),
        None => (section, None),
    };

    let factor = parse_number(match_key, "factor", factor)?;
    let offset = offset
        .map(|offset| parse_number(match_key, "offset", offset))
        .transpose()?
        .unwrap_or(0.0);

    Ok(Scaling { factor, offset })
}

fn parse_number(match_key: &str, what: &str, text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(invalid(match_key, format!("empty scaling {what}")));
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(invalid(
            match_key,
            format!("scaling {what} '{text}' is not finite"),
        )),
        Err(_) => Err(invalid(
            match_key,
            format!("scaling {what} '{text}' is not a number"),
        )),
    }
}

fn invalid(match_key: &str, message: impl Into<String>) -> Error {
    Error::InvalidRule {
        key: match_key.to_string(),
        message: message.into(),
    }
}
