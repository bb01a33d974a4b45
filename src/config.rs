//! Global mirrorcal configuration.
//!
//! One TOML file at ~/.config/mirrorcal/config.toml describes every calendar
//! under management: its provider, its credential, its peers, and whether
//! sync is enabled. The link graph and the remote wiring the engine needs
//! are both derived from it at the start of each invocation, so edits take
//! effect on the next run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ::config::{Config, File};
use serde::{Deserialize, Serialize};

use mirrorcal_core::auth::StaticTokenSource;
use mirrorcal_core::event::CalendarId;
use mirrorcal_core::link::{CalendarLink, LinkGraph};
use mirrorcal_core::remote::provider::Provider;
use mirrorcal_core::remote::{Remote, RemoteConfig};

static DEFAULT_DATA_DIR: &str = "~/.local/share/mirrorcal";

fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

fn is_default_data_dir(dir: &String) -> bool {
    dir == DEFAULT_DATA_DIR
}

fn default_enabled() -> bool {
    true
}

/// One calendar under sync management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: String,
    /// Which provider binary handles this calendar ("google" means
    /// mirrorcal-provider-google on PATH).
    pub provider: String,
    /// Access token for the account, kept fresh by an external refresher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Calendars this one mirrors to and from.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Provider-specific settings, passed to the provider binary verbatim.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub remote: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MirrorcalConfig {
    #[serde(
        default = "default_data_dir",
        skip_serializing_if = "is_default_data_dir"
    )]
    pub data_dir: String,

    #[serde(default)]
    pub calendars: Vec<CalendarEntry>,
}

impl MirrorcalConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("mirrorcal");
        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        let config: MirrorcalConfig = Config::builder()
            .add_source(File::from(config_path).required(false))
            .build()
            .context("Could not read config")?
            .try_deserialize()
            .context("Could not parse config")?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Could not serialize config")?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, content)
            .with_context(|| format!("Could not write {}", config_path.display()))?;

        Ok(())
    }

    /// Create a default config file with every option commented out.
    fn create_default_config(path: &Path) -> Result<()> {
        let contents = format!(
            "\
# mirrorcal configuration

# Where the event ledger lives:
# data_dir = \"{DEFAULT_DATA_DIR}\"

# One block per calendar:
#
# [[calendars]]
# id = \"work\"
# provider = \"google\"
# token = \"...\"
# peers = [\"personal\"]
#
# [calendars.remote]
# google_calendar_id = \"primary\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Could not create config directory")?;
        }
        std::fs::write(path, contents).context("Could not write config file")?;

        Ok(())
    }

    /// The ledger directory, with ~ expanded.
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned()).join("ledger")
    }

    pub fn entry(&self, id: &str) -> Option<&CalendarEntry> {
        self.calendars.iter().find(|c| c.id == id)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut CalendarEntry> {
        self.calendars.iter_mut().find(|c| c.id == id)
    }

    /// Build the link graph the engine works from.
    pub fn link_graph(&self) -> LinkGraph {
        let mut graph = LinkGraph::new();
        for entry in &self.calendars {
            graph.insert(CalendarLink {
                calendar_id: CalendarId::new(&entry.id),
                sync_enabled: entry.enabled,
                peers: entry.peers.iter().map(CalendarId::new).collect(),
            });
        }
        graph
    }

    /// Per-calendar remote endpoints for the provider client.
    pub fn remotes(&self) -> HashMap<CalendarId, Remote> {
        self.calendars
            .iter()
            .map(|entry| {
                (
                    CalendarId::new(&entry.id),
                    Remote::new(
                        Provider::from_name(&entry.provider),
                        RemoteConfig(entry.remote.clone()),
                    ),
                )
            })
            .collect()
    }

    pub fn token_source(&self) -> StaticTokenSource {
        StaticTokenSource::new(
            self.calendars
                .iter()
                .filter_map(|entry| {
                    entry
                        .token
                        .as_ref()
                        .map(|t| (CalendarId::new(&entry.id), t.clone()))
                })
                .collect(),
        )
    }
}
