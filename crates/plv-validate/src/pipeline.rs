//! Per-URL validation pipeline.

use std::sync::Arc;

use plv_core::config::DEFAULT_MANIFEST_FILE_NAME;
use plv_core::{ConfigError, PackageError, RepoDetail, RepoSpecification, ValidationOutcome, ValidatorConfig};
use tracing::{debug, info, instrument, warn};

use crate::branch::{BranchResolver, FallbackBranchResolver, FixedBranch};
use crate::dump::{DumpRunner, ManifestDumper};
use crate::fetcher::{build_http_client, HttpManifestFetcher, ManifestFetcher};
use crate::limiter::{DumpLimiter, RequestLimiter};
use crate::raw_url::{GitHubRawUrlBuilder, RawUrlBuilder};
use crate::repository::resolve_repository;
use crate::workspace::Workspace;

/// Validates one repository URL end to end.
///
/// Cheap to clone; all stages are shared behind `Arc`s.
#[derive(Clone)]
pub struct Validator {
    branches: Arc<dyn BranchResolver>,
    raw_urls: Arc<dyn RawUrlBuilder>,
    fetcher: Arc<dyn ManifestFetcher>,
    dumper: Arc<dyn ManifestDumper>,
    manifest_file_name: String,
    keep_workspaces: bool,
}

impl Validator {
    pub fn new(
        branches: Arc<dyn BranchResolver>,
        raw_urls: Arc<dyn RawUrlBuilder>,
        fetcher: Arc<dyn ManifestFetcher>,
        dumper: Arc<dyn ManifestDumper>,
    ) -> Self {
        Self {
            branches,
            raw_urls,
            fetcher,
            dumper,
            manifest_file_name: DEFAULT_MANIFEST_FILE_NAME.to_string(),
            keep_workspaces: false,
        }
    }

    /// Wire the production stages from configuration.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ConfigError> {
        Self::from_config_with_limiter(config, DumpLimiter::new(config.dump_concurrency))
    }

    pub fn from_config_with_limiter(
        config: &ValidatorConfig,
        limiter: DumpLimiter,
    ) -> Result<Self, ConfigError> {
        let requests = RequestLimiter::new(config.max_connections_per_host);
        Self::from_config_with_limiters(config, limiter, requests)
    }

    /// Wire the production stages around caller-owned limiters. `requests`
    /// is held around each HTTP exchange only, never across a dump.
    pub fn from_config_with_limiters(
        config: &ValidatorConfig,
        limiter: DumpLimiter,
        requests: RequestLimiter,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = build_http_client(config)?;
        let raw_urls: Arc<dyn RawUrlBuilder> =
            Arc::new(GitHubRawUrlBuilder::new(config.raw_base_url()?));

        let branches: Arc<dyn BranchResolver> = if config.fallback_branches.is_empty() {
            Arc::new(FixedBranch::new(config.default_branch.clone()))
        } else {
            Arc::new(FallbackBranchResolver::from_branch_names(
                &config.branch_candidates(),
                client.clone(),
                requests.clone(),
                Arc::clone(&raw_urls),
                config.manifest_file_name.clone(),
            ))
        };

        let fetcher = Arc::new(HttpManifestFetcher::new(
            client,
            requests,
            config.workspace_root.clone(),
            config.manifest_file_name.clone(),
        ));
        let dumper = Arc::new(DumpRunner::from_config(config, limiter));

        Ok(Self::new(branches, raw_urls, fetcher, dumper)
            .with_manifest_file_name(config.manifest_file_name.clone())
            .with_keep_workspaces(config.keep_workspaces))
    }

    pub fn with_manifest_file_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_file_name = name.into();
        self
    }

    pub fn with_keep_workspaces(mut self, keep: bool) -> Self {
        self.keep_workspaces = keep;
        self
    }

    /// Validate `url`. Never fails: every stage error becomes a failure outcome.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn validate(&self, url: &str) -> ValidationOutcome {
        match self.run_stages(url).await {
            Ok(detail) => {
                info!(product = %detail.first_product.name, "package verified");
                ValidationOutcome::success(url, detail)
            }
            Err(err) => {
                info!(reason = err.friendly_name(), error = %err, "package failed");
                ValidationOutcome::failure(url, err)
            }
        }
    }

    async fn run_stages(&self, url: &str) -> Result<RepoDetail, PackageError> {
        let repo = resolve_repository(url)?;
        let branch = self.branches.resolve(&repo.name, &repo.owner).await?;
        debug!(branch = %branch, "branch resolved");

        let spec = RepoSpecification::new(repo.name, repo.owner, branch);
        let manifest_url = self.raw_urls.url(&spec, &self.manifest_file_name);

        let workspace = self.fetcher.fetch(&manifest_url).await?;
        let detail = self
            .dumper
            .dump(&workspace)
            .await
            .and_then(RepoDetail::try_from);

        self.release_workspace(workspace, detail.is_ok()).await;
        detail
    }

    async fn release_workspace(&self, workspace: Workspace, succeeded: bool) {
        if !succeeded {
            info!(workspace = %workspace.path().display(), "workspace kept for inspection");
            return;
        }
        if self.keep_workspaces {
            debug!(workspace = %workspace.path().display(), "workspace kept");
            return;
        }
        let path = workspace.path().to_path_buf();
        if let Err(e) = workspace.remove().await {
            warn!(workspace = %path.display(), error = %e, "failed to remove workspace");
        }
    }
}
