//! Core engine for the mirrorcal ecosystem.
//!
//! This crate decides, for every event observed on a remote calendar, whether
//! it is user-authored or one of our own busy blocks, and keeps exactly one
//! "busy" placeholder per user event in every linked calendar:
//! - `correlation` mints and recognizes the opaque identity attached to
//!   provider-side metadata
//! - `store` is the durable ledger of everything the engine has ever seen
//! - `classify` is the choke point that prevents mirror-of-a-mirror loops
//! - `sync` runs the per-calendar reconciliation passes
//! - `remote` talks to external provider binaries over a JSON protocol

pub mod auth;
pub mod classify;
pub mod correlation;
pub mod error;
pub mod event;
pub mod link;
pub mod provider;
pub mod record;
pub mod remote;
pub mod retry;
pub mod store;
pub mod sync;

pub use correlation::CorrelationId;
pub use error::{MirrorError, MirrorResult, ProviderErrorKind};
pub use event::{CalendarId, EventTime, Metadata, RemoteEvent, RemoteEventId};
pub use record::{EventKind, EventRecord, LifecycleState};
