//! Defines the JSON protocol used for communication between the engine and
//! provider binaries over stdin/stdout.
//!
//! The protocol is language-agnostic: any executable that speaks it can be a
//! provider. Providers translate their service's API into the
//! provider-neutral types and are expected to honor two contracts:
//! - errors carry a structured `kind` so the engine can tell a rate limit
//!   from a revoked credential
//! - event creation is an upsert on the correlation id embedded in the
//!   metadata payload, so retried creates never duplicate

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ProviderErrorKind;
use crate::event::{EventTime, Metadata, RemoteEvent, RemoteEventId};

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ListEvents,
    CreateEvent,
    UpdateEventMetadata,
    DeleteEvent,
}

/// Request sent from the engine to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider to the engine.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: ProviderError },
}

/// Structured provider failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> String {
        serde_json::to_string(&Response::Success { data }).unwrap()
    }
}

impl Response<()> {
    pub fn error(kind: ProviderErrorKind, message: &str) -> String {
        serde_json::to_string(&Response::<()>::Error {
            error: ProviderError {
                kind,
                message: message.to_string(),
            },
        })
        .unwrap()
    }
}

/// Fields common to every command: which calendar on the provider side,
/// provider-specific settings from the calendar config, and the credential
/// supplied by the token source.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallContext {
    pub calendar_id: String,
    #[serde(default)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub access_token: String,
}

/// Full listing of the calendar's current events, including each event's
/// opaque metadata map.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    #[serde(flatten)]
    pub context: CallContext,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<RemoteEvent>;
    fn command() -> Command {
        Command::ListEvents
    }
}

/// Create a new event carrying the given metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    #[serde(flatten)]
    pub context: CallContext,
    pub title: String,
    pub start: EventTime,
    pub end: EventTime,
    pub metadata: Metadata,
}

impl ProviderCommand for CreateEvent {
    type Response = RemoteEventId;
    fn command() -> Command {
        Command::CreateEvent
    }
}

/// Replace the opaque metadata on an existing event, leaving visible fields
/// untouched.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEventMetadata {
    #[serde(flatten)]
    pub context: CallContext,
    pub event_id: RemoteEventId,
    pub metadata: Metadata,
}

impl ProviderCommand for UpdateEventMetadata {
    type Response = ();
    fn command() -> Command {
        Command::UpdateEventMetadata
    }
}

/// Delete an event by ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    #[serde(flatten)]
    pub context: CallContext,
    pub event_id: RemoteEventId,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_roundtrip() {
        let wire = Response::<()>::error(ProviderErrorKind::RateLimited, "quota exceeded");
        let parsed: Response<()> = serde_json::from_str(&wire).unwrap();

        match parsed {
            Response::Error { error } => {
                assert_eq!(error.kind, ProviderErrorKind::RateLimited);
                assert_eq!(error.message, "quota exceeded");
            }
            Response::Success { .. } => panic!("expected error response"),
        }
    }

    #[test]
    fn test_success_response_roundtrip() {
        let wire = Response::success(RemoteEventId::from("ev-42"));
        let parsed: Response<RemoteEventId> = serde_json::from_str(&wire).unwrap();

        match parsed {
            Response::Success { data } => assert_eq!(data, RemoteEventId::from("ev-42")),
            Response::Error { .. } => panic!("expected success response"),
        }
    }
}
