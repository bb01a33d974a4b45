//! Correlation identity: minting opaque ids and embedding them in
//! provider-side metadata.
//!
//! The correlation id is the sole basis for ownership decisions. It lives in
//! the opaque metadata channel the provider round-trips for us, never in any
//! human-visible field, so retitling or editing an event can never break
//! identity. Everything here is pure; no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::event::Metadata;
use crate::record::EventKind;

const KEY_ID: &str = "mirrorcal_id";
const KEY_KIND: &str = "mirrorcal_kind";
const KEY_SOURCE_ID: &str = "mirrorcal_source_id";

/// Globally unique opaque identifier for one event the engine knows about.
/// Immutable once assigned, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a fresh id.
    pub fn mint() -> Self {
        CorrelationId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        CorrelationId(s.to_string())
    }
}

/// The correlation fields recognized in a metadata payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationTag {
    pub correlation_id: CorrelationId,
    pub kind: EventKind,
    pub source_correlation_id: Option<CorrelationId>,
}

/// Return a copy of `metadata` carrying the correlation fields.
///
/// Unrelated keys are preserved untouched; calling this twice with the same
/// arguments is a no-op on the result.
pub fn attach(
    metadata: &Metadata,
    correlation_id: &CorrelationId,
    kind: EventKind,
    source_correlation_id: Option<&CorrelationId>,
) -> Metadata {
    let mut out = metadata.clone();
    out.insert(KEY_ID.to_string(), correlation_id.as_str().to_string());
    out.insert(KEY_KIND.to_string(), kind.metadata_value().to_string());
    match source_correlation_id {
        Some(source) => {
            out.insert(KEY_SOURCE_ID.to_string(), source.as_str().to_string());
        }
        None => {
            out.remove(KEY_SOURCE_ID);
        }
    }
    out
}

/// Return a copy of `metadata` with the correlation fields removed.
/// Unrelated keys are preserved untouched; the result reads as untagged.
pub fn detach(metadata: &Metadata) -> Metadata {
    let mut out = metadata.clone();
    out.remove(KEY_ID);
    out.remove(KEY_KIND);
    out.remove(KEY_SOURCE_ID);
    out
}

/// Extract the correlation tag from a metadata payload, if one is present.
///
/// Returns `None` for foreign/untracked events and for any malformed payload
/// (missing id, empty id, unrecognized kind). Malformed input is never an
/// error; it reads the same as absent.
pub fn extract(metadata: &Metadata) -> Option<CorrelationTag> {
    let id = metadata.get(KEY_ID).filter(|v| !v.is_empty())?;
    let kind = EventKind::from_metadata_value(metadata.get(KEY_KIND)?)?;
    let source = metadata
        .get(KEY_SOURCE_ID)
        .filter(|v| !v.is_empty())
        .map(|v| CorrelationId::from(v.as_str()));

    Some(CorrelationTag {
        correlation_id: CorrelationId::from(id.as_str()),
        kind,
        source_correlation_id: source,
    })
}
