//! Manifest download into a fresh workspace.

use std::path::PathBuf;

use async_trait::async_trait;
use plv_core::{ConfigError, PackageError, ValidatorConfig};
use tracing::debug;
use url::Url;

use crate::limiter::RequestLimiter;
use crate::workspace::Workspace;

/// Fetches a manifest and materialises it in its own workspace.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, manifest_url: &Url) -> Result<Workspace, PackageError>;
}

/// Build the HTTP client shared by every network stage.
///
/// The pool only bounds idle connections; in-flight requests are capped by
/// the [`RequestLimiter`] each network stage holds.
pub fn build_http_client(config: &ValidatorConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(format!("package-list-validator/{}", plv_core::VERSION))
        .timeout(config.request_timeout())
        .pool_max_idle_per_host(config.max_connections_per_host)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// GETs the manifest over HTTP(S).
pub struct HttpManifestFetcher {
    client: reqwest::Client,
    requests: RequestLimiter,
    workspace_root: PathBuf,
    manifest_file_name: String,
}

impl HttpManifestFetcher {
    pub fn new(
        client: reqwest::Client,
        requests: RequestLimiter,
        workspace_root: impl Into<PathBuf>,
        manifest_file_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            requests,
            workspace_root: workspace_root.into(),
            manifest_file_name: manifest_file_name.into(),
        }
    }

    /// Download the manifest body while holding one request slot.
    async fn download(&self, manifest_url: &Url) -> Result<Vec<u8>, PackageError> {
        let _slot = self
            .requests
            .acquire()
            .await
            .map_err(|e| PackageError::NoResult(format!("request limiter unavailable: {e}")))?;

        let response = self
            .client
            .get(manifest_url.clone())
            .send()
            .await
            .map_err(|e| PackageError::NoResult(format!("request to {manifest_url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackageError::NoResult(format!(
                "{manifest_url} returned HTTP {status}"
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            PackageError::NoResult(format!("reading body of {manifest_url} failed: {e}"))
        })?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, manifest_url: &Url) -> Result<Workspace, PackageError> {
        let body = self.download(manifest_url).await?;

        let workspace = Workspace::create(&self.workspace_root, &self.manifest_file_name, &body)
            .await
            .map_err(|e| {
                PackageError::NoResult(format!(
                    "unable to create workspace under {}: {e}",
                    self.workspace_root.display()
                ))
            })?;

        debug!(url = %manifest_url, bytes = body.len(), workspace = %workspace.path().display(), "manifest fetched");
        Ok(workspace)
    }
}
