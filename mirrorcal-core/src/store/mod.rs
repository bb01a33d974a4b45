//! Durable event ledger.
//!
//! One directory per calendar, one JSON file per record, named by correlation
//! id. The store is consulted before any remote mutation and updated after
//! every confirmed one; it is the only state that survives across
//! invocations.
//!
//! An in-memory index (primary key: correlation id, secondary key:
//! `(calendar, remote event id)`) is rebuilt from disk on open. All mutations
//! go through a single writer lock and land on disk via tmp+rename, so a
//! read-modify-write for one correlation id can never interleave with
//! another writer for the same id, and a crashed write never leaves a
//! half-written record behind.

mod index;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

use crate::correlation::CorrelationId;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{CalendarId, RemoteEventId};
use crate::record::{EventKind, EventRecord};

use index::StoreIndex;

pub struct EventStore {
    root: PathBuf,
    index: RwLock<StoreIndex>,
}

impl EventStore {
    /// Open (or initialize) a ledger rooted at `root`, rebuilding the
    /// in-memory index from the record files found there.
    ///
    /// Unreadable or unparseable record files are skipped with a warning;
    /// a damaged ledger degrades to re-discovery, never to a crash.
    pub fn open(root: impl Into<PathBuf>) -> MirrorResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let mut index = StoreIndex::default();

        for calendar_entry in std::fs::read_dir(&root)? {
            let calendar_dir = calendar_entry?.path();
            if !calendar_dir.is_dir() {
                continue;
            }
            for record_entry in std::fs::read_dir(&calendar_dir)? {
                let path = record_entry?.path();
                if path.extension().is_none_or(|e| e != "json") {
                    continue;
                }
                match read_record(&path) {
                    Ok(record) => index.insert(record),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable ledger record");
                    }
                }
            }
        }

        Ok(EventStore {
            root,
            index: RwLock::new(index),
        })
    }

    fn record_path(&self, calendar_id: &CalendarId, correlation_id: &CorrelationId) -> PathBuf {
        self.root
            .join(calendar_id.as_str())
            .join(format!("{}.json", correlation_id))
    }

    // QUERIES:

    pub fn find(&self, correlation_id: &CorrelationId) -> Option<EventRecord> {
        self.index
            .read()
            .expect("store index lock poisoned")
            .get(correlation_id)
            .cloned()
    }

    pub fn find_by_remote(
        &self,
        calendar_id: &CalendarId,
        remote_event_id: &RemoteEventId,
    ) -> Option<EventRecord> {
        self.index
            .read()
            .expect("store index lock poisoned")
            .get_by_remote(calendar_id, remote_event_id)
            .cloned()
    }

    /// Every busy block mirroring the given user event.
    pub fn list_busy_blocks_for(&self, source_correlation_id: &CorrelationId) -> Vec<EventRecord> {
        self.index
            .read()
            .expect("store index lock poisoned")
            .records()
            .filter(|r| {
                r.kind == EventKind::BusyBlock
                    && r.source_correlation_id.as_ref() == Some(source_correlation_id)
            })
            .cloned()
            .collect()
    }

    pub fn list_by_calendar(
        &self,
        calendar_id: &CalendarId,
        kind: Option<EventKind>,
    ) -> Vec<EventRecord> {
        self.index
            .read()
            .expect("store index lock poisoned")
            .records()
            .filter(|r| r.calendar_id == *calendar_id)
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect()
    }

    // MUTATIONS:

    /// Insert a new record. Fails if the correlation id is already taken;
    /// correlation ids are never reused.
    pub fn create(&self, record: EventRecord) -> MirrorResult<()> {
        let mut index = self.index.write().expect("store index lock poisoned");

        if index.get(&record.correlation_id).is_some() {
            return Err(MirrorError::DuplicateCorrelationId(
                record.correlation_id.to_string(),
            ));
        }

        let path = self.record_path(&record.calendar_id, &record.correlation_id);
        write_record(&path, &record)?;
        index.insert(record);
        Ok(())
    }

    /// Atomic read-modify-write for one record, keyed by correlation id.
    /// Returns the updated record.
    pub fn update(
        &self,
        correlation_id: &CorrelationId,
        patch: impl FnOnce(&mut EventRecord),
    ) -> MirrorResult<EventRecord> {
        let mut index = self.index.write().expect("store index lock poisoned");

        let mut record = index
            .get(correlation_id)
            .cloned()
            .ok_or_else(|| MirrorError::RecordNotFound(correlation_id.to_string()))?;

        patch(&mut record);
        // Identity fields are immutable once assigned.
        debug_assert_eq!(&record.correlation_id, correlation_id);

        let path = self.record_path(&record.calendar_id, &record.correlation_id);
        write_record(&path, &record)?;
        index.insert(record.clone());
        Ok(record)
    }

    /// Remove one record. Missing records are fine; deletion is idempotent.
    pub fn delete(&self, correlation_id: &CorrelationId) -> MirrorResult<()> {
        let mut index = self.index.write().expect("store index lock poisoned");

        let Some(record) = index.remove(correlation_id) else {
            return Ok(());
        };

        let path = self.record_path(&record.calendar_id, &record.correlation_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every record for a calendar, unconditionally. Used only by the
    /// disable-calendar teardown.
    pub fn delete_all_for_calendar(&self, calendar_id: &CalendarId) -> MirrorResult<usize> {
        let mut index = self.index.write().expect("store index lock poisoned");

        let removed = index.remove_calendar(calendar_id);

        let dir = self.root.join(calendar_id.as_str());
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(removed)
    }

    /// Remove every busy block mirroring any of the given user events,
    /// across all calendars. Used for the cross-calendar cascade when a
    /// source calendar is disabled.
    pub fn delete_busy_blocks_originating_from(
        &self,
        source_correlation_ids: &HashSet<CorrelationId>,
    ) -> MirrorResult<usize> {
        let block_ids: Vec<CorrelationId> = {
            let index = self.index.read().expect("store index lock poisoned");
            index
                .records()
                .filter(|r| {
                    r.kind == EventKind::BusyBlock
                        && r.source_correlation_id
                            .as_ref()
                            .is_some_and(|s| source_correlation_ids.contains(s))
                })
                .map(|r| r.correlation_id.clone())
                .collect()
        };

        for id in &block_ids {
            self.delete(id)?;
        }
        Ok(block_ids.len())
    }
}

fn read_record(path: &Path) -> MirrorResult<EventRecord> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| MirrorError::Serialization(e.to_string()))
}

/// Write a record file atomically (tmp + rename), creating the calendar
/// directory on first use.
fn write_record(path: &Path, record: &EventRecord) -> MirrorResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| MirrorError::Config(format!("Bad record path: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let content = serde_json::to_string_pretty(record)
        .map_err(|e| MirrorError::Serialization(e.to_string()))?;

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LifecycleState;
    use tempfile::tempdir;

    fn user_event(calendar: &str, remote: &str) -> EventRecord {
        EventRecord::new_user_event(
            CorrelationId::mint(),
            CalendarId::from(calendar),
            RemoteEventId::from(remote),
            "Team sync",
        )
    }

    #[test]
    fn test_create_and_find() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let record = user_event("work", "ev-1");
        store.create(record.clone()).unwrap();

        assert_eq!(store.find(&record.correlation_id), Some(record.clone()));
        assert_eq!(
            store.find_by_remote(&record.calendar_id, &RemoteEventId::from("ev-1")),
            Some(record)
        );
        assert_eq!(
            store.find_by_remote(&CalendarId::from("work"), &RemoteEventId::from("nope")),
            None
        );
    }

    #[test]
    fn test_create_duplicate_correlation_id_fails() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let record = user_event("work", "ev-1");
        store.create(record.clone()).unwrap();

        let mut dup = user_event("personal", "ev-2");
        dup.correlation_id = record.correlation_id.clone();

        assert!(matches!(
            store.create(dup),
            Err(MirrorError::DuplicateCorrelationId(_))
        ));
    }

    #[test]
    fn test_update_moves_secondary_index() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let source = user_event("work", "ev-1");
        let block = EventRecord::new_busy_block(
            CorrelationId::mint(),
            CalendarId::from("personal"),
            source.correlation_id.clone(),
            "Busy - Team sync",
        );
        store.create(block.clone()).unwrap();

        let updated = store
            .update(&block.correlation_id, |r| {
                r.remote_event_id = Some(RemoteEventId::from("remote-9"));
                r.lifecycle = LifecycleState::Materialized;
            })
            .unwrap();

        assert_eq!(updated.lifecycle, LifecycleState::Materialized);
        assert_eq!(
            store.find_by_remote(&CalendarId::from("personal"), &RemoteEventId::from("remote-9")),
            Some(updated)
        );
    }

    #[test]
    fn test_update_unindexes_stale_remote_id() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let record = user_event("work", "ev-1");
        store.create(record.clone()).unwrap();

        // The provider reassigned the event id (e.g. recreate after import).
        store
            .update(&record.correlation_id, |r| {
                r.remote_event_id = Some(RemoteEventId::from("ev-2"));
            })
            .unwrap();

        assert_eq!(
            store.find_by_remote(&CalendarId::from("work"), &RemoteEventId::from("ev-1")),
            None
        );
        assert!(store
            .find_by_remote(&CalendarId::from("work"), &RemoteEventId::from("ev-2"))
            .is_some());
    }

    #[test]
    fn test_update_missing_record_fails() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.update(&CorrelationId::mint(), |_| {}),
            Err(MirrorError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempdir().unwrap();
        let record = user_event("work", "ev-1");

        {
            let store = EventStore::open(dir.path()).unwrap();
            store.create(record.clone()).unwrap();
        }

        let reopened = EventStore::open(dir.path()).unwrap();
        assert_eq!(reopened.find(&record.correlation_id), Some(record.clone()));
        assert_eq!(
            reopened.find_by_remote(&record.calendar_id, &RemoteEventId::from("ev-1")),
            Some(record)
        );
    }

    #[test]
    fn test_list_busy_blocks_for() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let source = user_event("work", "ev-1");
        store.create(source.clone()).unwrap();

        for peer in ["personal", "side"] {
            store
                .create(EventRecord::new_busy_block(
                    CorrelationId::mint(),
                    CalendarId::from(peer),
                    source.correlation_id.clone(),
                    "Busy - Team sync",
                ))
                .unwrap();
        }

        let blocks = store.list_busy_blocks_for(&source.correlation_id);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.kind == EventKind::BusyBlock));
    }

    #[test]
    fn test_delete_all_for_calendar() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        store.create(user_event("work", "ev-1")).unwrap();
        store.create(user_event("work", "ev-2")).unwrap();
        let other = user_event("personal", "ev-3");
        store.create(other.clone()).unwrap();

        let removed = store
            .delete_all_for_calendar(&CalendarId::from("work"))
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store
            .list_by_calendar(&CalendarId::from("work"), None)
            .is_empty());
        // Other calendars untouched.
        assert_eq!(store.find(&other.correlation_id), Some(other));
    }

    #[test]
    fn test_delete_busy_blocks_originating_from() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let source_a = user_event("work", "ev-1");
        let source_b = user_event("work", "ev-2");
        store.create(source_a.clone()).unwrap();
        store.create(source_b.clone()).unwrap();

        let block_a = EventRecord::new_busy_block(
            CorrelationId::mint(),
            CalendarId::from("personal"),
            source_a.correlation_id.clone(),
            "Busy - A",
        );
        let block_b = EventRecord::new_busy_block(
            CorrelationId::mint(),
            CalendarId::from("personal"),
            source_b.correlation_id.clone(),
            "Busy - B",
        );
        store.create(block_a.clone()).unwrap();
        store.create(block_b.clone()).unwrap();

        let sources: HashSet<_> = [source_a.correlation_id.clone()].into();
        let removed = store.delete_busy_blocks_originating_from(&sources).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.find(&block_a.correlation_id), None);
        assert_eq!(store.find(&block_b.correlation_id), Some(block_b));
    }

    #[test]
    fn test_open_skips_corrupt_record_files() {
        let dir = tempdir().unwrap();
        {
            let store = EventStore::open(dir.path()).unwrap();
            store.create(user_event("work", "ev-1")).unwrap();
        }
        std::fs::write(dir.path().join("work/garbage.json"), "{not json").unwrap();

        let store = EventStore::open(dir.path()).unwrap();
        assert_eq!(
            store
                .list_by_calendar(&CalendarId::from("work"), None)
                .len(),
            1
        );
    }
}
