//! Remote calendar operations via external provider binaries.

pub mod protocol;
pub mod provider;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::TokenSource;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{CalendarId, EventTime, Metadata, RemoteEvent, RemoteEventId};
use crate::provider::CalendarProvider;
use crate::remote::protocol::{
    CallContext, CreateEvent, DeleteEvent, ListEvents, UpdateEventMetadata,
};
use crate::remote::provider::Provider;

/// Provider-specific settings for one calendar (e.g. the provider-side
/// calendar id, account hints). Passed through to the provider binary
/// verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RemoteConfig(pub HashMap<String, toml::Value>);

impl From<&RemoteConfig> for serde_json::Map<String, serde_json::Value> {
    fn from(config: &RemoteConfig) -> Self {
        config
            .0
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }
}

/// One calendar's remote endpoint: which provider binary to speak to and
/// with what settings.
#[derive(Clone)]
pub struct Remote {
    pub provider: Provider,
    pub config: RemoteConfig,
}

impl Remote {
    pub fn new(provider: Provider, config: RemoteConfig) -> Self {
        Remote { provider, config }
    }
}

/// [`CalendarProvider`] over a set of configured remotes, one per calendar.
/// Tokens come from the credential supplier on every call, so a refresh
/// between passes is picked up automatically.
pub struct RemoteCalendars {
    remotes: HashMap<CalendarId, Remote>,
    tokens: Arc<dyn TokenSource>,
}

impl RemoteCalendars {
    pub fn new(remotes: HashMap<CalendarId, Remote>, tokens: Arc<dyn TokenSource>) -> Self {
        RemoteCalendars { remotes, tokens }
    }

    async fn context(&self, calendar_id: &CalendarId) -> MirrorResult<(&Remote, CallContext)> {
        let remote = self
            .remotes
            .get(calendar_id)
            .ok_or_else(|| MirrorError::CalendarNotFound(calendar_id.to_string()))?;
        let token = self.tokens.get_valid_token(calendar_id).await?;

        Ok((
            remote,
            CallContext {
                calendar_id: calendar_id.as_str().to_string(),
                remote_config: serde_json::Map::from(&remote.config),
                access_token: token.secret().to_string(),
            },
        ))
    }
}

#[async_trait]
impl CalendarProvider for RemoteCalendars {
    async fn list_events(&self, calendar_id: &CalendarId) -> MirrorResult<Vec<RemoteEvent>> {
        let (remote, context) = self.context(calendar_id).await?;
        remote.provider.call(ListEvents { context }).await
    }

    async fn create_event(
        &self,
        calendar_id: &CalendarId,
        title: &str,
        start: &EventTime,
        end: &EventTime,
        metadata: &Metadata,
    ) -> MirrorResult<RemoteEventId> {
        let (remote, context) = self.context(calendar_id).await?;
        remote
            .provider
            .call(CreateEvent {
                context,
                title: title.to_string(),
                start: start.clone(),
                end: end.clone(),
                metadata: metadata.clone(),
            })
            .await
    }

    async fn update_event_metadata(
        &self,
        calendar_id: &CalendarId,
        remote_event_id: &RemoteEventId,
        metadata: &Metadata,
    ) -> MirrorResult<()> {
        let (remote, context) = self.context(calendar_id).await?;
        remote
            .provider
            .call(UpdateEventMetadata {
                context,
                event_id: remote_event_id.clone(),
                metadata: metadata.clone(),
            })
            .await
    }

    async fn delete_event(
        &self,
        calendar_id: &CalendarId,
        remote_event_id: &RemoteEventId,
    ) -> MirrorResult<()> {
        let (remote, context) = self.context(calendar_id).await?;
        remote
            .provider
            .call(DeleteEvent {
                context,
                event_id: remote_event_id.clone(),
            })
            .await
    }
}
