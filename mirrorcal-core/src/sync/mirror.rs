//! Busy-block creation and retirement.
//!
//! Creation follows the per-block state machine: the record is written
//! first (`Pending`, correlation id minted), then the remote create runs.
//! A failed create leaves the record pending and the next pass retries it
//! under the same correlation id, so a block is never duplicated. Retirement
//! runs the machine the other way and keeps the source record around until
//! every mirror is confirmed gone.

use tracing::warn;

use crate::correlation::{self, CorrelationId};
use crate::event::{Metadata, RemoteEvent};
use crate::provider::CalendarProvider;
use crate::record::{EventKind, EventRecord, LifecycleState};
use crate::retry::with_retry;
use crate::sync::{PassSummary, SyncEngine};

/// Fixed prefix for mirrored placeholders. Informational only; identity
/// lives in the correlation metadata, never in the title.
pub const BUSY_TITLE_PREFIX: &str = "Busy - ";

fn busy_title(source_title: &str) -> String {
    format!("{}{}", BUSY_TITLE_PREFIX, source_title)
}

impl SyncEngine {
    /// Make sure exactly one busy block exists in every calendar linked to
    /// the source event's calendar, and only there. Existing live blocks are
    /// left alone; pending ones get their remote create retried; blocks in
    /// calendars no longer linked are removed.
    pub(super) async fn ensure_mirrors(
        &self,
        provider: &dyn CalendarProvider,
        source: &EventRecord,
        source_event: &RemoteEvent,
        summary: &mut PassSummary,
    ) {
        debug_assert_eq!(source.kind, EventKind::UserEvent);

        let existing = self.store.list_busy_blocks_for(&source.correlation_id);
        let targets = self.links.mirror_targets_of(&source.calendar_id);

        // Stale mirrors first: the calendar was unlinked (or its peer
        // disabled) after the block was created.
        for block in &existing {
            if !targets.contains(&block.calendar_id) {
                self.remove_block(provider, block, summary).await;
            }
        }

        for peer in targets {
            match existing.iter().find(|b| b.calendar_id == peer) {
                // Live (or freshly materialized); nothing to do.
                Some(block) if block.remote_event_id.is_some() => {}
                // Pending from an earlier failed create: retry, same id.
                Some(block) if block.lifecycle == LifecycleState::Pending => {
                    self.materialize_block(provider, block.clone(), source_event, summary)
                        .await;
                }
                Some(_) => {}
                // No mirror yet in this calendar.
                None => {
                    let block = EventRecord::new_busy_block(
                        CorrelationId::mint(),
                        peer.clone(),
                        source.correlation_id.clone(),
                        busy_title(&source_event.title),
                    );
                    match self.store.create(block.clone()) {
                        Ok(()) => {
                            self.materialize_block(provider, block, source_event, summary)
                                .await;
                        }
                        Err(e) => {
                            warn!(
                                calendar = %peer,
                                source = %source.correlation_id,
                                error = %e,
                                "failed to record busy block"
                            );
                            summary.errors += 1;
                        }
                    }
                }
            }
        }
    }

    /// Run the remote create for a pending block and record the assigned id.
    async fn materialize_block(
        &self,
        provider: &dyn CalendarProvider,
        block: EventRecord,
        source_event: &RemoteEvent,
        summary: &mut PassSummary,
    ) {
        let metadata = correlation::attach(
            &Metadata::new(),
            &block.correlation_id,
            EventKind::BusyBlock,
            block.source_correlation_id.as_ref(),
        );

        let created = with_retry(&self.retry, || {
            provider.create_event(
                &block.calendar_id,
                &block.title,
                &source_event.start,
                &source_event.end,
                &metadata,
            )
        })
        .await;

        match created {
            Ok(remote_id) => {
                match self.store.update(&block.correlation_id, |r| {
                    r.remote_event_id = Some(remote_id.clone());
                    r.lifecycle = LifecycleState::Materialized;
                }) {
                    Ok(_) => summary.created += 1,
                    Err(e) => {
                        warn!(correlation_id = %block.correlation_id, error = %e, "failed to record materialized block");
                        summary.errors += 1;
                    }
                }
            }
            Err(e) => {
                warn!(
                    calendar = %block.calendar_id,
                    correlation_id = %block.correlation_id,
                    error = %e,
                    "busy block create failed, record stays pending"
                );
                summary.errors += 1;
            }
        }
    }

    /// Delete one busy block remotely and drop its record. Returns false
    /// when the remote delete failed; the record is then parked in `Retired`
    /// and picked up again next pass.
    async fn remove_block(
        &self,
        provider: &dyn CalendarProvider,
        block: &EventRecord,
        summary: &mut PassSummary,
    ) -> bool {
        if let Some(remote_id) = &block.remote_event_id {
            let deleted = with_retry(&self.retry, || {
                provider.delete_event(&block.calendar_id, remote_id)
            })
            .await;

            match deleted {
                Ok(()) => {}
                // Already gone remotely: that's the outcome we want.
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(
                        calendar = %block.calendar_id,
                        correlation_id = %block.correlation_id,
                        error = %e,
                        "busy block remote delete failed, will retry next pass"
                    );
                    summary.errors += 1;
                    let _ = self.store.update(&block.correlation_id, |r| {
                        r.lifecycle = LifecycleState::Retired;
                    });
                    return false;
                }
            }
        }
        self.drop_record(&block.correlation_id, summary);
        true
    }

    /// Retire a removed user event: delete each mirror remotely and drop its
    /// record, then drop the source record itself. If any remote delete
    /// fails the source record is kept in `Retired` and the whole retirement
    /// resumes next pass.
    pub(super) async fn retire_user_event(
        &self,
        provider: &dyn CalendarProvider,
        record: &EventRecord,
        summary: &mut PassSummary,
    ) {
        let mut fully_cleaned = true;

        for block in self.store.list_busy_blocks_for(&record.correlation_id) {
            if !self.remove_block(provider, &block, summary).await {
                fully_cleaned = false;
            }
        }

        if fully_cleaned {
            self.drop_record(&record.correlation_id, summary);
        } else if record.lifecycle != LifecycleState::Retired {
            let _ = self.store.update(&record.correlation_id, |r| {
                r.lifecycle = LifecycleState::Retired;
            });
        }
    }

    fn drop_record(&self, correlation_id: &CorrelationId, summary: &mut PassSummary) {
        match self.store.delete(correlation_id) {
            Ok(()) => summary.deleted += 1,
            Err(e) => {
                warn!(correlation_id = %correlation_id, error = %e, "failed to delete record");
                summary.errors += 1;
            }
        }
    }
}
