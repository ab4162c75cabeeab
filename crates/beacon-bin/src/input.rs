//! Parsing of command-line properties and replay input.

use anyhow::{bail, Context};
use beacon_outbox::Properties;
use serde::Deserialize;
use serde_json::Value;

/// One replay line: `{"type": "...", "properties": {...}}`.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ReplayRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Parse `key=value`; the value is JSON when it parses, a string otherwise.
pub fn parse_prop(raw: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("property '{raw}' is not in key=value form");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("property '{raw}' has an empty key");
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn parse_props(raw: &[String]) -> anyhow::Result<Properties> {
    let mut props = Properties::new();
    for item in raw {
        let (key, value) = parse_prop(item)?;
        props.insert(key, value);
    }
    Ok(props)
}

/// Parse one replay line. Blank lines yield `None`.
pub fn parse_replay_line(line: &str) -> Option<anyhow::Result<ReplayRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line).context("invalid replay line"))
}
