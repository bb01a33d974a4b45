//! The provider adapter boundary.
//!
//! Everything the engine needs from a calendar service, and nothing else.
//! The subprocess-backed implementation lives in `remote`; tests drive the
//! engine with an in-memory implementation.

use async_trait::async_trait;

use crate::error::MirrorResult;
use crate::event::{CalendarId, EventTime, Metadata, RemoteEvent, RemoteEventId};

/// Remote calendar operations, one implementation per provider.
///
/// Error contract: failures carry a [`ProviderErrorKind`]
/// (`RateLimited` / `Unauthorized` / `NotFound` / `Transient`) via
/// [`MirrorError::Provider`]. The engine retries rate limits and transients
/// on the next pass, aborts the calendar's pass on unauthorized, and treats
/// not-found on delete as already satisfied.
///
/// Idempotency contract: the correlation metadata travels with every create,
/// so a provider can (and should) treat creation as an upsert on the
/// embedded correlation id; a retried create after a lost response must not
/// produce a second event.
///
/// [`ProviderErrorKind`]: crate::error::ProviderErrorKind
/// [`MirrorError::Provider`]: crate::error::MirrorError::Provider
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Full listing of the calendar's current events. Always a full fetch,
    /// never a delta feed: the embedded correlation metadata is
    /// authoritative over any local cursor.
    async fn list_events(&self, calendar_id: &CalendarId) -> MirrorResult<Vec<RemoteEvent>>;

    async fn create_event(
        &self,
        calendar_id: &CalendarId,
        title: &str,
        start: &EventTime,
        end: &EventTime,
        metadata: &Metadata,
    ) -> MirrorResult<RemoteEventId>;

    /// Replace the opaque metadata on an existing event. Visible fields are
    /// untouched.
    async fn update_event_metadata(
        &self,
        calendar_id: &CalendarId,
        remote_event_id: &RemoteEventId,
        metadata: &Metadata,
    ) -> MirrorResult<()>;

    async fn delete_event(
        &self,
        calendar_id: &CalendarId,
        remote_event_id: &RemoteEventId,
    ) -> MirrorResult<()>;
}
