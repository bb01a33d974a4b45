pub mod enable;
pub mod link;
pub mod status;
pub mod sync;

use std::sync::Arc;

use anyhow::{bail, Result};

use mirrorcal_core::remote::RemoteCalendars;
use mirrorcal_core::retry::RetryPolicy;
use mirrorcal_core::store::EventStore;
use mirrorcal_core::sync::SyncEngine;

use crate::config::MirrorcalConfig;

/// Wire the engine and the provider client up from the config.
fn build_engine(config: &MirrorcalConfig) -> Result<(SyncEngine, RemoteCalendars)> {
    let store = Arc::new(EventStore::open(config.ledger_path())?);
    let engine = SyncEngine::new(store, config.link_graph(), RetryPolicy::default());
    let provider = RemoteCalendars::new(config.remotes(), Arc::new(config.token_source()));
    Ok((engine, provider))
}

fn require_calendars(config: &MirrorcalConfig) -> Result<()> {
    if config.calendars.is_empty() {
        bail!(
            "No calendars configured. Add [[calendars]] entries to {}",
            MirrorcalConfig::config_path()?.display()
        );
    }
    Ok(())
}
