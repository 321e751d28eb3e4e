//! Branch resolution strategies.

use std::sync::Arc;

use async_trait::async_trait;
use plv_core::{PackageError, RepoSpecification};
use tracing::debug;

use crate::limiter::RequestLimiter;
use crate::raw_url::RawUrlBuilder;

/// Picks the branch whose manifest is validated.
#[async_trait]
pub trait BranchResolver: Send + Sync {
    async fn resolve(&self, repository: &str, owner: &str) -> Result<String, PackageError>;
}

/// Always answers with the same branch name.
#[derive(Debug, Clone)]
pub struct FixedBranch {
    branch_name: String,
}

impl FixedBranch {
    pub fn new(branch_name: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
        }
    }
}

#[async_trait]
impl BranchResolver for FixedBranch {
    async fn resolve(&self, _repository: &str, _owner: &str) -> Result<String, PackageError> {
        Ok(self.branch_name.clone())
    }
}

/// Tries each strategy in order and keeps the first branch whose manifest
/// answers a `HEAD` request with a success status.
pub struct FallbackBranchResolver {
    strategies: Vec<Arc<dyn BranchResolver>>,
    client: reqwest::Client,
    requests: RequestLimiter,
    raw_urls: Arc<dyn RawUrlBuilder>,
    manifest_file_name: String,
}

impl FallbackBranchResolver {
    pub fn new(
        strategies: Vec<Arc<dyn BranchResolver>>,
        client: reqwest::Client,
        requests: RequestLimiter,
        raw_urls: Arc<dyn RawUrlBuilder>,
        manifest_file_name: impl Into<String>,
    ) -> Self {
        Self {
            strategies,
            client,
            requests,
            raw_urls,
            manifest_file_name: manifest_file_name.into(),
        }
    }

    /// One [`FixedBranch`] strategy per name.
    pub fn from_branch_names(
        names: &[String],
        client: reqwest::Client,
        requests: RequestLimiter,
        raw_urls: Arc<dyn RawUrlBuilder>,
        manifest_file_name: impl Into<String>,
    ) -> Self {
        let strategies = names
            .iter()
            .map(|name| Arc::new(FixedBranch::new(name.clone())) as Arc<dyn BranchResolver>)
            .collect();
        Self::new(strategies, client, requests, raw_urls, manifest_file_name)
    }

    async fn verify(&self, spec: &RepoSpecification) -> bool {
        let url = self.raw_urls.url(spec, &self.manifest_file_name);
        let _slot = match self.requests.acquire().await {
            Ok(slot) => slot,
            Err(e) => {
                debug!(error = %e, "request limiter closed");
                return false;
            }
        };
        match self.client.head(url.clone()).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(%url, status = %response.status(), "branch candidate rejected");
                false
            }
            Err(e) => {
                debug!(%url, error = %e, "branch candidate unreachable");
                false
            }
        }
    }
}

#[async_trait]
impl BranchResolver for FallbackBranchResolver {
    async fn resolve(&self, repository: &str, owner: &str) -> Result<String, PackageError> {
        let mut tried = Vec::new();
        for strategy in &self.strategies {
            let branch = match strategy.resolve(repository, owner).await {
                Ok(branch) => branch,
                Err(e) => {
                    debug!(error = %e, "branch strategy failed");
                    continue;
                }
            };
            let spec = RepoSpecification::new(repository, owner, branch.clone());
            if self.verify(&spec).await {
                return Ok(branch);
            }
            tried.push(branch);
        }
        Err(PackageError::NoResult(format!(
            "no branch of {owner}/{repository} has {} (tried: {})",
            self.manifest_file_name,
            tried.join(", ")
        )))
    }
}
