//! Event classification.
//!
//! Every fetched remote event goes through `classify` before any processing
//! decision. This is the single choke point that prevents feedback loops: a
//! busy block fetched back from the provider always resolves to
//! `TrackedOurs` and is never re-processed as a new user event, no matter
//! how many passes have elapsed.

use tracing::debug;

use crate::correlation::{self, CorrelationId, CorrelationTag};
use crate::event::{CalendarId, RemoteEvent};
use crate::record::{EventKind, EventRecord};
use crate::store::EventStore;

/// The classification outcome. Consumed by exhaustive matching in the engine
/// so the cascade-prevention branch cannot be accidentally omitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Never seen before (or seen only by a different installation):
    /// register it and mirror it into every linked calendar.
    NewUserEvent {
        /// The id to register under. Reused from embedded metadata when the
        /// event carries one we don't know, so re-discovery after a store
        /// reset doesn't duplicate mirrors; freshly minted otherwise.
        correlation_id: CorrelationId,
        minted: bool,
    },
    /// Tagged as one of our busy blocks but unknown locally (store reset).
    /// Must be re-registered as ours, never mirrored: adopting it as a user
    /// event would recreate the feedback loop the tag exists to prevent.
    AdoptedBusyBlock { tag: CorrelationTag },
    /// One of our own artifacts. Refresh observation only; any mirroring
    /// action here would cascade.
    TrackedOurs { record: EventRecord },
    /// A user event we've already registered. Refresh observation and
    /// self-heal its mirrors if any are missing.
    TrackedForeign {
        record: EventRecord,
        /// The event carries no correlation metadata even though we track
        /// it, meaning an earlier metadata write-back didn't stick. The
        /// engine should re-attempt it.
        needs_metadata_writeback: bool,
    },
}

pub fn classify(
    store: &EventStore,
    calendar_id: &CalendarId,
    remote: &RemoteEvent,
) -> Classification {
    let Some(tag) = correlation::extract(&remote.metadata) else {
        // No recognizable correlation payload. Before declaring the event
        // new, check the secondary index: the record may exist with a
        // metadata write-back that never stuck.
        if let Some(record) = store.find_by_remote(calendar_id, &remote.id) {
            return if record.originated_by_engine {
                Classification::TrackedOurs { record }
            } else {
                Classification::TrackedForeign {
                    record,
                    needs_metadata_writeback: true,
                }
            };
        }
        return Classification::NewUserEvent {
            correlation_id: CorrelationId::mint(),
            minted: true,
        };
    };

    match store.find(&tag.correlation_id) {
        Some(record) if record.originated_by_engine => Classification::TrackedOurs { record },
        Some(record) => Classification::TrackedForeign {
            record,
            needs_metadata_writeback: false,
        },
        None => {
            // Tagged, but unknown here: store reset or a different sync
            // installation. Adopt the embedded id rather than minting a new
            // one, so we don't grow a second set of mirrors, and adopt it
            // under its embedded kind.
            debug!(
                calendar = %calendar_id,
                correlation_id = %tag.correlation_id,
                kind = %tag.kind,
                "adopting unknown embedded correlation id"
            );
            match tag.kind {
                EventKind::UserEvent => Classification::NewUserEvent {
                    correlation_id: tag.correlation_id,
                    minted: false,
                },
                EventKind::BusyBlock => Classification::AdoptedBusyBlock { tag },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::attach;
    use crate::event::{EventTime, Metadata, RemoteEventId};
    use crate::record::EventKind;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn remote_event(id: &str, metadata: Metadata) -> RemoteEvent {
        RemoteEvent {
            id: RemoteEventId::from(id),
            title: "Team sync".to_string(),
            start: EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 14, 0, 0).unwrap()),
            end: EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()),
            metadata,
        }
    }

    #[test]
    fn test_untagged_unknown_event_is_new() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let got = classify(&store, &CalendarId::from("work"), &remote_event("ev-1", Metadata::new()));
        assert!(matches!(got, Classification::NewUserEvent { minted: true, .. }));
    }

    #[test]
    fn test_busy_block_fetched_back_is_ours() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let source_id = CorrelationId::mint();
        let block = EventRecord::new_busy_block(
            CorrelationId::mint(),
            CalendarId::from("personal"),
            source_id.clone(),
            "Busy - Team sync",
        );
        store.create(block.clone()).unwrap();

        let metadata = attach(
            &Metadata::new(),
            &block.correlation_id,
            EventKind::BusyBlock,
            Some(&source_id),
        );
        let got = classify(
            &store,
            &CalendarId::from("personal"),
            &remote_event("remote-9", metadata),
        );

        match got {
            Classification::TrackedOurs { record } => {
                assert_eq!(record.correlation_id, block.correlation_id)
            }
            other => panic!("expected TrackedOurs, got {:?}", other),
        }
    }

    #[test]
    fn test_registered_user_event_is_foreign() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let record = EventRecord::new_user_event(
            CorrelationId::mint(),
            CalendarId::from("work"),
            RemoteEventId::from("ev-1"),
            "Team sync",
        );
        store.create(record.clone()).unwrap();

        let metadata = attach(
            &Metadata::new(),
            &record.correlation_id,
            EventKind::UserEvent,
            None,
        );
        let got = classify(&store, &CalendarId::from("work"), &remote_event("ev-1", metadata));

        assert_eq!(
            got,
            Classification::TrackedForeign {
                record,
                needs_metadata_writeback: false
            }
        );
    }

    #[test]
    fn test_unknown_embedded_user_event_id_is_adopted() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let foreign_id = CorrelationId::mint();
        let metadata = attach(&Metadata::new(), &foreign_id, EventKind::UserEvent, None);
        let got = classify(&store, &CalendarId::from("work"), &remote_event("ev-1", metadata));

        assert_eq!(
            got,
            Classification::NewUserEvent {
                correlation_id: foreign_id,
                minted: false
            }
        );
    }

    #[test]
    fn test_unknown_embedded_busy_block_is_adopted_as_ours() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let block_id = CorrelationId::mint();
        let source_id = CorrelationId::mint();
        let metadata = attach(&Metadata::new(), &block_id, EventKind::BusyBlock, Some(&source_id));
        let got = classify(&store, &CalendarId::from("work"), &remote_event("ev-1", metadata));

        match got {
            Classification::AdoptedBusyBlock { tag } => {
                assert_eq!(tag.correlation_id, block_id);
                assert_eq!(tag.source_correlation_id, Some(source_id));
            }
            other => panic!("expected AdoptedBusyBlock, got {:?}", other),
        }
    }

    #[test]
    fn test_untagged_but_known_remote_id_falls_back_to_record() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let record = EventRecord::new_user_event(
            CorrelationId::mint(),
            CalendarId::from("work"),
            RemoteEventId::from("ev-1"),
            "Team sync",
        );
        store.create(record.clone()).unwrap();

        // Metadata write-back never stuck; the event comes back bare.
        let got = classify(&store, &CalendarId::from("work"), &remote_event("ev-1", Metadata::new()));

        assert_eq!(
            got,
            Classification::TrackedForeign {
                record,
                needs_metadata_writeback: true
            }
        );
    }

    #[test]
    fn test_malformed_metadata_reads_as_untagged() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("mirrorcal_kind".to_string(), "busy_block".to_string());
        // No id key at all.
        let got = classify(&store, &CalendarId::from("work"), &remote_event("ev-1", metadata));
        assert!(matches!(got, Classification::NewUserEvent { minted: true, .. }));
    }
}
