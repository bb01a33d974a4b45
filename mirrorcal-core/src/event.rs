//! Provider-neutral event types.
//!
//! These types represent remote calendar events in a provider-agnostic way.
//! Providers convert their API responses into these, and the engine works
//! exclusively with them for classification and reconciliation. Only the
//! fields correlation needs are carried; everything else stays on the
//! provider side.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one calendar under sync management.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(String);

impl CalendarId {
    pub fn new(id: impl Into<String>) -> Self {
        CalendarId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CalendarId {
    fn from(s: &str) -> Self {
        CalendarId(s.to_string())
    }
}

/// Identifier the provider assigned to an event on its side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteEventId(String);

impl RemoteEventId {
    pub fn new(id: impl Into<String>) -> Self {
        RemoteEventId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RemoteEventId {
    fn from(s: &str) -> Self {
        RemoteEventId(s.to_string())
    }
}

/// The opaque provider-side metadata map (e.g. Google's private extended
/// properties). Round-tripped verbatim by providers; the correlation module
/// is the only code that reads or writes keys in it.
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

/// A calendar event as fetched from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: RemoteEventId,
    /// Display label. Informational only, never used for identity.
    pub title: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub metadata: Metadata,
}
