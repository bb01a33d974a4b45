//! In-memory index over the record files.
//!
//! Primary key: correlation id. Secondary key: `(calendar, remote event id)`
//! so a fetched event resolves to its record in O(1) without any text
//! parsing, even when the metadata write-back hasn't stuck yet.

use std::collections::HashMap;

use crate::correlation::CorrelationId;
use crate::event::{CalendarId, RemoteEventId};
use crate::record::EventRecord;

#[derive(Default)]
pub(super) struct StoreIndex {
    by_correlation: HashMap<CorrelationId, EventRecord>,
    by_remote: HashMap<(CalendarId, RemoteEventId), CorrelationId>,
}

impl StoreIndex {
    pub(super) fn get(&self, correlation_id: &CorrelationId) -> Option<&EventRecord> {
        self.by_correlation.get(correlation_id)
    }

    pub(super) fn get_by_remote(
        &self,
        calendar_id: &CalendarId,
        remote_event_id: &RemoteEventId,
    ) -> Option<&EventRecord> {
        let correlation_id = self
            .by_remote
            .get(&(calendar_id.clone(), remote_event_id.clone()))?;
        self.by_correlation.get(correlation_id)
    }

    pub(super) fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.by_correlation.values()
    }

    /// Insert or replace a record, keeping the secondary index consistent
    /// when the remote id changes (e.g. Pending → Materialized).
    pub(super) fn insert(&mut self, record: EventRecord) {
        let stale_key = self
            .by_correlation
            .get(&record.correlation_id)
            .and_then(|previous| {
                previous
                    .remote_event_id
                    .as_ref()
                    .map(|remote_id| (previous.calendar_id.clone(), remote_id.clone()))
            });
        if let Some(key) = stale_key {
            self.by_remote.remove(&key);
        }
        if let Some(remote_id) = &record.remote_event_id {
            self.by_remote.insert(
                (record.calendar_id.clone(), remote_id.clone()),
                record.correlation_id.clone(),
            );
        }
        self.by_correlation
            .insert(record.correlation_id.clone(), record);
    }

    pub(super) fn remove(&mut self, correlation_id: &CorrelationId) -> Option<EventRecord> {
        let record = self.by_correlation.remove(correlation_id)?;
        self.unindex_remote(&record);
        Some(record)
    }

    /// Drop every record belonging to a calendar; returns how many.
    pub(super) fn remove_calendar(&mut self, calendar_id: &CalendarId) -> usize {
        let ids: Vec<CorrelationId> = self
            .by_correlation
            .values()
            .filter(|r| r.calendar_id == *calendar_id)
            .map(|r| r.correlation_id.clone())
            .collect();

        for id in &ids {
            self.remove(id);
        }
        ids.len()
    }

    fn unindex_remote(&mut self, record: &EventRecord) {
        if let Some(remote_id) = &record.remote_event_id {
            self.by_remote
                .remove(&(record.calendar_id.clone(), remote_id.clone()));
        }
    }
}
