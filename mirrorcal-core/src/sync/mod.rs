//! The reconciliation engine.
//!
//! One `run` is one invocation: a full pass over every enabled calendar.
//! Passes are independent units of work; a failure in one calendar never
//! crosses into another, and the outcome of a run is a per-calendar summary,
//! not a single verdict. Invocations may overlap (a slow pass still running
//! when the next trigger fires); every remote mutation is idempotent under
//! the correlation id, so a partially completed pass is always safely
//! resumable by the next one.

mod mirror;
mod pass;
mod teardown;

pub use mirror::BUSY_TITLE_PREFIX;
pub use teardown::TeardownSummary;

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::event::CalendarId;
use crate::link::LinkGraph;
use crate::provider::CalendarProvider;
use crate::retry::RetryPolicy;
use crate::store::EventStore;

pub struct SyncEngine {
    store: Arc<EventStore>,
    links: LinkGraph,
    retry: RetryPolicy,
}

impl SyncEngine {
    /// The link graph is a passed-in value loaded once per invocation, not a
    /// process-wide singleton; administrative changes take effect on the
    /// next run.
    pub fn new(store: Arc<EventStore>, links: LinkGraph, retry: RetryPolicy) -> Self {
        SyncEngine {
            store,
            links,
            retry,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Run one full sync pass over every enabled calendar.
    pub async fn run(&self, provider: &dyn CalendarProvider) -> RunSummary {
        let mut passes = Vec::new();

        for calendar_id in self.links.enabled_calendars() {
            let summary = self.pass_for(provider, &calendar_id).await;

            match &summary.aborted {
                Some(reason) => {
                    warn!(calendar = %calendar_id, reason, "pass aborted");
                }
                None => {
                    info!(
                        calendar = %calendar_id,
                        created = summary.created,
                        updated = summary.updated,
                        deleted = summary.deleted,
                        skipped = summary.skipped,
                        errors = summary.errors,
                        "pass complete"
                    );
                }
            }
            passes.push(summary);
        }

        RunSummary(passes)
    }
}

/// Outcome of one calendar's pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub calendar_id: CalendarId,
    /// Records registered + busy blocks created remotely.
    pub created: usize,
    /// Observation refreshes, promotions, and self-heal demotions.
    pub updated: usize,
    /// Records retired and removed (with their remote mirrors).
    pub deleted: usize,
    /// Our own artifacts fetched back and left alone.
    pub skipped: usize,
    /// Failures isolated to one record and retried next pass.
    pub errors: usize,
    /// Set when the whole pass aborted (provider down, credential revoked).
    pub aborted: Option<String>,
}

impl PassSummary {
    fn new(calendar_id: CalendarId) -> Self {
        PassSummary {
            calendar_id,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            errors: 0,
            aborted: None,
        }
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.aborted {
            Some(reason) => write!(f, "{}: aborted ({})", self.calendar_id, reason),
            None => write!(
                f,
                "{}: {} created, {} updated, {} deleted, {} skipped, {} errors",
                self.calendar_id,
                self.created,
                self.updated,
                self.deleted,
                self.skipped,
                self.errors
            ),
        }
    }
}

/// Per-calendar summaries for one invocation.
#[derive(Debug, Clone, Default)]
pub struct RunSummary(pub Vec<PassSummary>);

impl RunSummary {
    /// (created, updated, deleted, skipped, errors) across all calendars.
    pub fn totals(&self) -> (usize, usize, usize, usize, usize) {
        self.0.iter().fold((0, 0, 0, 0, 0), |acc, p| {
            (
                acc.0 + p.created,
                acc.1 + p.updated,
                acc.2 + p.deleted,
                acc.3 + p.skipped,
                acc.4 + p.errors,
            )
        })
    }

    pub fn aborted_calendars(&self) -> Vec<&PassSummary> {
        self.0.iter().filter(|p| p.aborted.is_some()).collect()
    }
}
