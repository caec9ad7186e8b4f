use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Attributes, Value};

/// A placement fired by the host application.
///
/// Events are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    name: String,
    attributes: Attributes,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event for placement `name`, timestamped now.
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Event {
        Event::with_timestamp(name, attributes, Utc::now())
    }

    pub fn with_timestamp(
        name: impl Into<String>,
        attributes: Attributes,
        timestamp: DateTime<Utc>,
    ) -> Event {
        Event {
            name: name.into(),
            attributes,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Look up an attribute by name or dotted path.
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        Value::get_path(&self.attributes, path)
    }
}
