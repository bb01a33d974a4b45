//! The link graph: which calendars mirror which others, and which are
//! enabled.
//!
//! A pure lookup structure, loaded once per invocation and mutated only by
//! explicit administrative operations. Mirroring is symmetric by
//! construction: linking A and B maintains both directions independently.
//! A↔B cycles are the normal case and cause no block-of-a-block, because
//! busy blocks are never treated as sources (the classifier routes them to
//! the skip branch).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MirrorError, MirrorResult};
use crate::event::CalendarId;

/// One calendar under sync management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarLink {
    pub calendar_id: CalendarId,
    pub sync_enabled: bool,
    #[serde(default)]
    pub peers: BTreeSet<CalendarId>,
}

impl CalendarLink {
    pub fn new(calendar_id: CalendarId) -> Self {
        CalendarLink {
            calendar_id,
            sync_enabled: true,
            peers: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkGraph {
    calendars: BTreeMap<CalendarId, CalendarLink>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link: CalendarLink) {
        self.calendars.insert(link.calendar_id.clone(), link);
    }

    pub fn get(&self, calendar_id: &CalendarId) -> Option<&CalendarLink> {
        self.calendars.get(calendar_id)
    }

    pub fn calendars(&self) -> impl Iterator<Item = &CalendarLink> {
        self.calendars.values()
    }

    pub fn is_enabled(&self, calendar_id: &CalendarId) -> bool {
        self.calendars
            .get(calendar_id)
            .is_some_and(|l| l.sync_enabled)
    }

    /// Calendars the engine should run a pass over, in stable order.
    pub fn enabled_calendars(&self) -> Vec<CalendarId> {
        self.calendars
            .values()
            .filter(|l| l.sync_enabled)
            .map(|l| l.calendar_id.clone())
            .collect()
    }

    /// Which calendars must receive a mirror of events from `calendar_id`.
    /// Disabled peers receive nothing.
    pub fn mirror_targets_of(&self, calendar_id: &CalendarId) -> Vec<CalendarId> {
        let Some(link) = self.calendars.get(calendar_id) else {
            return Vec::new();
        };
        link.peers
            .iter()
            .filter(|peer| self.is_enabled(peer))
            .cloned()
            .collect()
    }

    /// Link two calendars (both directions). Entries are created on first
    /// mention, enabled.
    pub fn link(&mut self, a: &CalendarId, b: &CalendarId) -> MirrorResult<()> {
        if a == b {
            return Err(MirrorError::Config(format!(
                "Cannot link calendar '{}' to itself",
                a
            )));
        }
        self.calendars
            .entry(a.clone())
            .or_insert_with(|| CalendarLink::new(a.clone()))
            .peers
            .insert(b.clone());
        self.calendars
            .entry(b.clone())
            .or_insert_with(|| CalendarLink::new(b.clone()))
            .peers
            .insert(a.clone());
        Ok(())
    }

    /// Remove the link in both directions. Unknown calendars are a no-op.
    pub fn unlink(&mut self, a: &CalendarId, b: &CalendarId) {
        if let Some(link) = self.calendars.get_mut(a) {
            link.peers.remove(b);
        }
        if let Some(link) = self.calendars.get_mut(b) {
            link.peers.remove(a);
        }
    }

    pub fn set_enabled(&mut self, calendar_id: &CalendarId, enabled: bool) -> MirrorResult<()> {
        let link = self
            .calendars
            .get_mut(calendar_id)
            .ok_or_else(|| MirrorError::CalendarNotFound(calendar_id.to_string()))?;
        link.sync_enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_is_symmetric() {
        let mut graph = LinkGraph::new();
        graph
            .link(&CalendarId::from("work"), &CalendarId::from("personal"))
            .unwrap();

        assert_eq!(
            graph.mirror_targets_of(&CalendarId::from("work")),
            vec![CalendarId::from("personal")]
        );
        assert_eq!(
            graph.mirror_targets_of(&CalendarId::from("personal")),
            vec![CalendarId::from("work")]
        );
    }

    #[test]
    fn test_self_link_rejected() {
        let mut graph = LinkGraph::new();
        assert!(graph
            .link(&CalendarId::from("work"), &CalendarId::from("work"))
            .is_err());
    }

    #[test]
    fn test_disabled_peer_receives_no_mirrors() {
        let mut graph = LinkGraph::new();
        graph
            .link(&CalendarId::from("work"), &CalendarId::from("personal"))
            .unwrap();
        graph
            .set_enabled(&CalendarId::from("personal"), false)
            .unwrap();

        assert!(graph.mirror_targets_of(&CalendarId::from("work")).is_empty());
        assert_eq!(
            graph.enabled_calendars(),
            vec![CalendarId::from("work")]
        );
    }

    #[test]
    fn test_unlink_both_directions() {
        let mut graph = LinkGraph::new();
        graph
            .link(&CalendarId::from("work"), &CalendarId::from("personal"))
            .unwrap();
        graph.unlink(&CalendarId::from("personal"), &CalendarId::from("work"));

        assert!(graph.mirror_targets_of(&CalendarId::from("work")).is_empty());
        assert!(graph
            .mirror_targets_of(&CalendarId::from("personal"))
            .is_empty());
    }
}
