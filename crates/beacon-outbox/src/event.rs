//! Event records and the factory that stamps them.

use beacon_config_and_utils::generate_id;
use beacon_storage::IdentityStore;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Prefix of generated event ids.
pub const EVENT_ID_PREFIX: &str = "evt";

/// Free-form event properties (a JSON object).
pub type Properties = Map<String, Value>;

/// Environment snapshot attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Client identification, e.g. `beacon/0.1.0 (linux; x86_64)`.
    pub user_agent: String,
    /// Where the activity originated, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl EventMetadata {
    /// Capture the current process environment.
    pub fn capture(app_name: &str, referrer: Option<String>) -> Self {
        Self {
            user_agent: format!(
                "{}/{} ({}; {})",
                app_name,
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            referrer,
        }
    }
}

/// A captured telemetry event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    timestamp: String,
    #[serde(default)]
    properties: Properties,
    metadata: EventMetadata,
}

impl Event {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// ISO-8601 creation time (UTC, millisecond precision).
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Current time as an ISO-8601 string, e.g. `2024-05-01T12:00:00.123Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds events stamped with identity, time and environment.
pub struct EventFactory {
    identity: Arc<IdentityStore>,
    metadata: EventMetadata,
}

impl EventFactory {
    pub fn new(identity: Arc<IdentityStore>, metadata: EventMetadata) -> Self {
        Self { identity, metadata }
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    pub fn create(&self, event_type: &str, properties: Properties) -> Event {
        Event {
            id: generate_id(EVENT_ID_PREFIX),
            event_type: event_type.to_string(),
            session_id: self.identity.get_or_create_session_id(),
            user_id: self.identity.get_user_id(),
            timestamp: timestamp_now(),
            properties,
            metadata: self.metadata.clone(),
        }
    }
}
