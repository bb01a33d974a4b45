//! One reconciliation pass over one calendar.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::classify::{classify, Classification};
use crate::correlation::{self, CorrelationId};
use crate::error::{MirrorError, MirrorResult};
use crate::event::{CalendarId, RemoteEvent};
use crate::provider::CalendarProvider;
use crate::record::{EventKind, EventRecord, LifecycleState};
use crate::retry::with_retry;
use crate::sync::{PassSummary, SyncEngine};

impl SyncEngine {
    /// Fetch, classify, mirror, and clean up one calendar. Never returns an
    /// error: calendar-level failures land in `aborted`, per-record failures
    /// in `errors`, and either way the other calendars' passes proceed.
    pub(super) async fn pass_for(
        &self,
        provider: &dyn CalendarProvider,
        calendar_id: &CalendarId,
    ) -> PassSummary {
        let mut summary = PassSummary::new(calendar_id.clone());

        let fetched = match with_retry(&self.retry, || provider.list_events(calendar_id)).await {
            Ok(events) => events,
            Err(e) => {
                summary.aborted = Some(e.to_string());
                return summary;
            }
        };

        let now = Utc::now();
        let mut observed: HashSet<CorrelationId> = HashSet::new();

        for event in &fetched {
            match classify(&self.store, calendar_id, event) {
                Classification::NewUserEvent {
                    correlation_id,
                    minted,
                } => {
                    debug!(calendar = %calendar_id, remote_id = %event.id, minted, "new user event");
                    observed.insert(correlation_id.clone());
                    if let Err(e) = self
                        .register_user_event(
                            provider,
                            calendar_id,
                            event,
                            correlation_id,
                            minted,
                            now,
                            &mut summary,
                        )
                        .await
                    {
                        warn!(calendar = %calendar_id, remote_id = %event.id, error = %e, "failed to register user event");
                        summary.errors += 1;
                    }
                }
                Classification::AdoptedBusyBlock { tag } => {
                    observed.insert(tag.correlation_id.clone());
                    self.adopt_busy_block(calendar_id, event, tag, now, &mut summary);
                }
                Classification::TrackedOurs { record } => {
                    observed.insert(record.correlation_id.clone());
                    self.confirm_ours(&record, event, now, &mut summary);
                }
                Classification::TrackedForeign {
                    record,
                    needs_metadata_writeback,
                } => {
                    observed.insert(record.correlation_id.clone());
                    self.refresh_user_event(
                        provider,
                        &record,
                        event,
                        needs_metadata_writeback,
                        now,
                        &mut summary,
                    )
                    .await;
                }
            }
        }

        self.demote_vanished_blocks(calendar_id, &observed, &mut summary);
        self.retire_removed_user_events(provider, calendar_id, &observed, &mut summary)
            .await;

        summary
    }

    /// Register a freshly discovered user event, tag it remotely, and mirror
    /// it into every linked calendar.
    ///
    /// When the correlation id was adopted from embedded metadata rather
    /// than minted (`minted = false`), mirroring is deferred to the next
    /// pass: the event's original mirrors are most likely about to be
    /// re-adopted from the other calendars' fetches, and creating one now
    /// would duplicate them.
    async fn register_user_event(
        &self,
        provider: &dyn CalendarProvider,
        calendar_id: &CalendarId,
        event: &RemoteEvent,
        correlation_id: CorrelationId,
        minted: bool,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) -> MirrorResult<()> {
        let mut record = EventRecord::new_user_event(
            correlation_id.clone(),
            calendar_id.clone(),
            event.id.clone(),
            event.title.clone(),
        );
        record.last_observed_at = Some(now);

        match self.store.create(record.clone()) {
            Ok(()) => {}
            Err(MirrorError::DuplicateCorrelationId(id)) => {
                // An overlapping pass (or another installation sharing the
                // ledger) got here first. The existing record is
                // authoritative; skip the conflicting write.
                warn!(calendar = %calendar_id, correlation_id = %id, "correlation id already registered, skipping");
                summary.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        summary.created += 1;

        // Persist the correlation id onto the remote event. Idempotent; if
        // it fails the secondary index resolves the event next pass and the
        // write is re-attempted then.
        let tagged = correlation::attach(&event.metadata, &correlation_id, EventKind::UserEvent, None);
        if let Err(e) = with_retry(&self.retry, || {
            provider.update_event_metadata(calendar_id, &event.id, &tagged)
        })
        .await
        {
            warn!(calendar = %calendar_id, remote_id = %event.id, error = %e, "metadata write-back failed");
            summary.errors += 1;
        }

        if minted {
            self.ensure_mirrors(provider, &record, event, summary).await;
        }
        Ok(())
    }

    /// Re-register a busy block whose tag we recognize but whose record is
    /// gone (store reset, or another installation sharing the calendars).
    /// It is ours by construction, so it gets the skip treatment.
    fn adopt_busy_block(
        &self,
        calendar_id: &CalendarId,
        event: &RemoteEvent,
        tag: correlation::CorrelationTag,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        if tag.source_correlation_id.is_none() {
            warn!(
                calendar = %calendar_id,
                correlation_id = %tag.correlation_id,
                "adopted busy block carries no source pointer"
            );
        }

        let record = EventRecord {
            correlation_id: tag.correlation_id,
            calendar_id: calendar_id.clone(),
            remote_event_id: Some(event.id.clone()),
            kind: EventKind::BusyBlock,
            originated_by_engine: true,
            source_correlation_id: tag.source_correlation_id,
            lifecycle: LifecycleState::Reconciled,
            last_observed_at: Some(now),
            title: event.title.clone(),
        };

        match self.store.create(record) {
            Ok(()) => summary.skipped += 1,
            Err(MirrorError::DuplicateCorrelationId(_)) => summary.skipped += 1,
            Err(e) => {
                warn!(calendar = %calendar_id, error = %e, "failed to adopt busy block");
                summary.errors += 1;
            }
        }
    }

    /// The cascade-prevention branch: one of our own artifacts came back
    /// from the provider. Confirm it and do nothing else.
    fn confirm_ours(
        &self,
        record: &EventRecord,
        event: &RemoteEvent,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        let result = self.store.update(&record.correlation_id, |r| {
            r.last_observed_at = Some(now);
            // Adopt the remote id if the create response was lost.
            if r.remote_event_id.is_none() {
                r.remote_event_id = Some(event.id.clone());
            }
            if matches!(
                r.lifecycle,
                LifecycleState::Pending | LifecycleState::Materialized
            ) {
                r.lifecycle = LifecycleState::Reconciled;
            }
        });
        if let Err(e) = result {
            warn!(correlation_id = %record.correlation_id, error = %e, "failed to confirm own record");
            summary.errors += 1;
            return;
        }

        if let Some(source) = &record.source_correlation_id {
            if self.store.find(source).is_none() {
                warn!(
                    correlation_id = %record.correlation_id,
                    source = %source,
                    "busy block references a missing source record"
                );
            }
        }

        summary.skipped += 1;
    }

    /// A previously registered user event came back: refresh observation,
    /// re-tag it if the metadata write never stuck, and self-heal missing
    /// mirrors.
    async fn refresh_user_event(
        &self,
        provider: &dyn CalendarProvider,
        record: &EventRecord,
        event: &RemoteEvent,
        needs_metadata_writeback: bool,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        let updated = match self.store.update(&record.correlation_id, |r| {
            r.last_observed_at = Some(now);
            r.title = event.title.clone();
            if r.remote_event_id.is_none() {
                r.remote_event_id = Some(event.id.clone());
            }
        }) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(correlation_id = %record.correlation_id, error = %e, "failed to refresh user event");
                summary.errors += 1;
                return;
            }
        };
        summary.updated += 1;

        if needs_metadata_writeback {
            let tagged = correlation::attach(
                &event.metadata,
                &record.correlation_id,
                EventKind::UserEvent,
                None,
            );
            if let Err(e) = with_retry(&self.retry, || {
                provider.update_event_metadata(&record.calendar_id, &event.id, &tagged)
            })
            .await
            {
                warn!(correlation_id = %record.correlation_id, error = %e, "metadata write-back failed");
                summary.errors += 1;
            }
        }

        self.ensure_mirrors(provider, &updated, event, summary).await;
    }

    /// Busy blocks in this calendar whose remote event vanished from the
    /// fetch were deleted out from under us. Demote them to pending; the
    /// source calendar's next pass recreates them under the same correlation
    /// id.
    ///
    /// Materialized blocks qualify as well as reconciled ones: a block
    /// deleted before any fetch ever confirmed it must still heal. If the
    /// listing was merely behind the create, recreation is harmless because
    /// creation is an upsert on the correlation id.
    fn demote_vanished_blocks(
        &self,
        calendar_id: &CalendarId,
        observed: &HashSet<CorrelationId>,
        summary: &mut PassSummary,
    ) {
        for block in self
            .store
            .list_by_calendar(calendar_id, Some(EventKind::BusyBlock))
        {
            if observed.contains(&block.correlation_id)
                || !matches!(
                    block.lifecycle,
                    LifecycleState::Materialized | LifecycleState::Reconciled
                )
            {
                continue;
            }

            warn!(
                calendar = %calendar_id,
                correlation_id = %block.correlation_id,
                "busy block vanished from remote, scheduling recreation"
            );
            match self.store.update(&block.correlation_id, |r| {
                r.remote_event_id = None;
                r.lifecycle = LifecycleState::Pending;
                r.last_observed_at = None;
            }) {
                Ok(_) => summary.updated += 1,
                Err(e) => {
                    warn!(correlation_id = %block.correlation_id, error = %e, "failed to demote vanished block");
                    summary.errors += 1;
                }
            }
        }
    }

    /// User events tracked for this calendar but absent from the fetch were
    /// deleted at the source. Retire each one along with all its mirrors.
    /// Records already in `Retired` (a previous retirement that couldn't
    /// finish) are picked up here too.
    async fn retire_removed_user_events(
        &self,
        provider: &dyn CalendarProvider,
        calendar_id: &CalendarId,
        observed: &HashSet<CorrelationId>,
        summary: &mut PassSummary,
    ) {
        for record in self
            .store
            .list_by_calendar(calendar_id, Some(EventKind::UserEvent))
        {
            if observed.contains(&record.correlation_id) {
                continue;
            }
            debug!(calendar = %calendar_id, correlation_id = %record.correlation_id, "user event removed at source");
            self.retire_user_event(provider, &record, summary).await;
        }
    }
}
