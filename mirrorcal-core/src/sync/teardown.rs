//! Full teardown when a calendar's sync is disabled.
//!
//! Removes the calendar's entire footprint: its outbound busy blocks in
//! peer calendars, the busy blocks other calendars mirrored into it, the
//! correlation tags on its surviving user events, and every ledger record
//! it owns. Remote deletes are best-effort; local state is authoritative
//! for a disabled calendar, so records go regardless. Re-enabling starts
//! from nothing: the next pass treats every then-current remote event as
//! brand new.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::correlation::{self, CorrelationId};
use crate::error::MirrorResult;
use crate::event::CalendarId;
use crate::provider::CalendarProvider;
use crate::record::EventKind;
use crate::retry::with_retry;
use crate::sync::SyncEngine;

/// Outcome of one calendar teardown.
#[derive(Debug, Clone)]
pub struct TeardownSummary {
    pub calendar_id: CalendarId,
    pub remote_deletes: usize,
    pub records_removed: usize,
    /// Remote deletes that failed and were abandoned (logged, not fatal).
    pub failures: usize,
}

impl fmt::Display for TeardownSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} remote deletes, {} records removed, {} failures",
            self.calendar_id, self.remote_deletes, self.records_removed, self.failures
        )
    }
}

impl SyncEngine {
    /// Tear down everything the sync system knows about `calendar_id`.
    ///
    /// The caller flips `sync_enabled` in its own configuration; this only
    /// handles the footprint. Errors are returned only for ledger I/O; every
    /// provider failure is absorbed into the summary.
    pub async fn teardown_calendar(
        &self,
        provider: &dyn CalendarProvider,
        calendar_id: &CalendarId,
    ) -> MirrorResult<TeardownSummary> {
        let mut summary = TeardownSummary {
            calendar_id: calendar_id.clone(),
            remote_deletes: 0,
            records_removed: 0,
            failures: 0,
        };

        // Outbound cleanup: busy blocks in other calendars mirroring this
        // calendar's user events.
        let source_ids: HashSet<CorrelationId> = self
            .store
            .list_by_calendar(calendar_id, Some(EventKind::UserEvent))
            .into_iter()
            .map(|r| r.correlation_id)
            .collect();

        for source_id in &source_ids {
            for block in self.store.list_busy_blocks_for(source_id) {
                if let Some(remote_id) = &block.remote_event_id {
                    self.best_effort_delete(provider, &block.calendar_id, remote_id, &mut summary)
                        .await;
                }
            }
        }
        summary.records_removed += self
            .store
            .delete_busy_blocks_originating_from(&source_ids)?;

        // Inbound cleanup: busy blocks other calendars mirrored into the
        // disabled calendar still sit on its remote.
        for block in self
            .store
            .list_by_calendar(calendar_id, Some(EventKind::BusyBlock))
        {
            if let Some(remote_id) = &block.remote_event_id {
                self.best_effort_delete(provider, calendar_id, remote_id, &mut summary)
                    .await;
            }
        }

        // The calendar's surviving user events still carry correlation tags.
        // Strip them so re-enabling genuinely starts from nothing: the next
        // pass must see them as brand new, not as adoptable ids pointing at
        // mirrors that no longer exist.
        self.strip_correlation_tags(provider, calendar_id, &mut summary)
            .await;

        summary.records_removed += self.store.delete_all_for_calendar(calendar_id)?;

        info!(calendar = %calendar_id, %summary, "calendar torn down");
        Ok(summary)
    }

    /// Remove the correlation metadata from the disabled calendar's
    /// remaining tagged user events, best-effort. Busy-block tags are left
    /// alone; their remote events were just deleted above.
    async fn strip_correlation_tags(
        &self,
        provider: &dyn CalendarProvider,
        calendar_id: &CalendarId,
        summary: &mut TeardownSummary,
    ) {
        let events = match with_retry(&self.retry, || provider.list_events(calendar_id)).await {
            Ok(events) => events,
            Err(e) => {
                warn!(calendar = %calendar_id, error = %e, "could not list disabled calendar to strip correlation tags");
                summary.failures += 1;
                return;
            }
        };

        for event in &events {
            let Some(tag) = correlation::extract(&event.metadata) else {
                continue;
            };
            if tag.kind == EventKind::BusyBlock {
                continue;
            }

            let stripped = correlation::detach(&event.metadata);
            let result = with_retry(&self.retry, || {
                provider.update_event_metadata(calendar_id, &event.id, &stripped)
            })
            .await;

            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(calendar = %calendar_id, remote_id = %event.id, error = %e, "failed to strip correlation tag");
                    summary.failures += 1;
                }
            }
        }
    }

    async fn best_effort_delete(
        &self,
        provider: &dyn CalendarProvider,
        calendar_id: &CalendarId,
        remote_id: &crate::event::RemoteEventId,
        summary: &mut TeardownSummary,
    ) {
        let deleted = with_retry(&self.retry, || {
            provider.delete_event(calendar_id, remote_id)
        })
        .await;

        match deleted {
            Ok(()) => summary.remote_deletes += 1,
            Err(e) if e.is_not_found() => summary.remote_deletes += 1,
            Err(e) => {
                warn!(calendar = %calendar_id, remote_id = %remote_id, error = %e, "teardown remote delete failed");
                summary.failures += 1;
            }
        }
    }
}
