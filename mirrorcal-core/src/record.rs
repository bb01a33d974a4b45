//! The ledger's unit: one event the engine has observed or created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::correlation::CorrelationId;
use crate::event::{CalendarId, RemoteEventId};

/// Whether a record is a user-authored event or one of our placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserEvent,
    BusyBlock,
}

impl EventKind {
    pub(crate) fn metadata_value(&self) -> &'static str {
        match self {
            EventKind::UserEvent => "user_event",
            EventKind::BusyBlock => "busy_block",
        }
    }

    pub(crate) fn from_metadata_value(value: &str) -> Option<Self> {
        match value {
            "user_event" => Some(EventKind::UserEvent),
            "busy_block" => Some(EventKind::BusyBlock),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metadata_value())
    }
}

/// Per-record state machine, mostly relevant for busy blocks:
/// `Pending` → `Materialized` → `Reconciled` → `Retired`.
///
/// A block stuck in `Pending` (remote create failed) is retried on the next
/// pass under the same correlation id, never duplicated. `Retired` marks a
/// record whose teardown is underway but not yet fully confirmed remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Record exists locally, no remote event yet.
    Pending,
    /// Remote create succeeded; remote id assigned.
    Materialized,
    /// Confirmed present on a later fetch.
    Reconciled,
    /// Being deleted; kept only until every remote cleanup has succeeded.
    Retired,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Materialized => "materialized",
            LifecycleState::Reconciled => "reconciled",
            LifecycleState::Retired => "retired",
        };
        write!(f, "{}", s)
    }
}

/// One entry in the event ledger.
///
/// Invariants (enforced by the store and constructors):
/// - `correlation_id` is unique across the whole store and never reused
/// - a `(calendar_id, remote_event_id)` pair maps to at most one record
/// - `source_correlation_id` is always set for busy blocks, never for
///   user events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub correlation_id: CorrelationId,
    pub calendar_id: CalendarId,
    /// None while the remote create is still pending.
    pub remote_event_id: Option<RemoteEventId>,
    pub kind: EventKind,
    /// True iff the engine itself created the underlying remote event.
    pub originated_by_engine: bool,
    /// For busy blocks: the user event (in another calendar) this mirrors.
    pub source_correlation_id: Option<CorrelationId>,
    pub lifecycle: LifecycleState,
    /// Last successful fetch confirming the remote event still exists.
    pub last_observed_at: Option<DateTime<Utc>>,
    /// Display label, informational only.
    pub title: String,
}

impl EventRecord {
    /// A user-authored event discovered on a remote calendar. The remote
    /// event already exists, so the record starts out reconciled.
    pub fn new_user_event(
        correlation_id: CorrelationId,
        calendar_id: CalendarId,
        remote_event_id: RemoteEventId,
        title: impl Into<String>,
    ) -> Self {
        EventRecord {
            correlation_id,
            calendar_id,
            remote_event_id: Some(remote_event_id),
            kind: EventKind::UserEvent,
            originated_by_engine: false,
            source_correlation_id: None,
            lifecycle: LifecycleState::Reconciled,
            last_observed_at: None,
            title: title.into(),
        }
    }

    /// A busy block the engine has decided to mirror into `calendar_id`.
    /// Starts pending; the remote id arrives once the create call succeeds.
    pub fn new_busy_block(
        correlation_id: CorrelationId,
        calendar_id: CalendarId,
        source_correlation_id: CorrelationId,
        title: impl Into<String>,
    ) -> Self {
        EventRecord {
            correlation_id,
            calendar_id,
            remote_event_id: None,
            kind: EventKind::BusyBlock,
            originated_by_engine: true,
            source_correlation_id: Some(source_correlation_id),
            lifecycle: LifecycleState::Pending,
            last_observed_at: None,
            title: title.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_metadata_value_roundtrip() {
        for kind in [EventKind::UserEvent, EventKind::BusyBlock] {
            assert_eq!(
                EventKind::from_metadata_value(kind.metadata_value()),
                Some(kind)
            );
        }
        assert_eq!(EventKind::from_metadata_value("other"), None);
    }

    #[test]
    fn test_constructors_uphold_source_invariant() {
        let user = EventRecord::new_user_event(
            CorrelationId::mint(),
            CalendarId::from("work"),
            RemoteEventId::from("ev-1"),
            "Team sync",
        );
        assert!(user.source_correlation_id.is_none());
        assert!(!user.originated_by_engine);
        assert_eq!(user.lifecycle, LifecycleState::Reconciled);

        let block = EventRecord::new_busy_block(
            CorrelationId::mint(),
            CalendarId::from("personal"),
            user.correlation_id.clone(),
            "Busy - Team sync",
        );
        assert_eq!(block.source_correlation_id, Some(user.correlation_id));
        assert!(block.originated_by_engine);
        assert_eq!(block.lifecycle, LifecycleState::Pending);
        assert!(block.remote_event_id.is_none());
    }
}
