//! Provider subprocess client.
//!
//! Talks to external provider binaries (e.g. `mirrorcal-provider-google`)
//! using JSON over stdin/stdout. Every call is bounded by a timeout so a
//! stuck provider can never stall a pass indefinitely; a timeout reads as a
//! transient failure and is retried on the next pass.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::error::{MirrorError, MirrorResult};
use crate::remote::protocol::{Command, ProviderCommand, Request, Response};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Provider(String);

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn binary_path(&self) -> MirrorResult<std::path::PathBuf> {
        let binary_name = format!("mirrorcal-provider-{}", self.0);
        which::which(&binary_name)
            .map_err(|_| MirrorError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return the result.
    ///
    /// The response type is inferred from the command's associated type,
    /// ensuring compile-time type safety.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> MirrorResult<C::Response> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| MirrorError::ProviderTimeout(PROVIDER_TIMEOUT.as_secs()))?
    }

    /// Low-level call that sends a command with params and deserializes the
    /// response.
    async fn call_raw<P: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> MirrorResult<R> {
        let params = serde_json::to_value(params)
            .map_err(|e| MirrorError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| MirrorError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| {
                MirrorError::Config(format!(
                    "Failed to spawn {}: {}",
                    binary_path.display(),
                    e
                ))
            })?;

        // Write request to stdin (unwrap safe: we piped stdin above)
        let mut stdin = child.stdin.take().unwrap();
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(MirrorError::provider(
                crate::error::ProviderErrorKind::Transient,
                format!(
                    "Provider exited with status: {}",
                    output.status.code().unwrap_or(-1)
                ),
            ));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(MirrorError::provider(
                crate::error::ProviderErrorKind::Transient,
                "Provider returned no response",
            ));
        }

        let response: Response<R> = serde_json::from_str(response_str.trim()).map_err(|e| {
            MirrorError::Serialization(format!("Failed to parse provider response: {}", e))
        })?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(MirrorError::Provider {
                kind: error.kind,
                message: error.message,
            }),
        }
    }
}
