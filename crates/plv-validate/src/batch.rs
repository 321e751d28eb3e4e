//! Concurrent validation of a whole URL list.

use std::sync::Arc;
use std::time::Instant;

use plv_core::{BatchReport, ProgressSink, SilentProgress, ValidationOutcome};
use tracing::info;

use crate::pipeline::Validator;

/// Runs one pipeline task per URL and collects outcomes in input order.
pub struct BatchRunner {
    validator: Validator,
    progress: Arc<dyn ProgressSink>,
}

impl BatchRunner {
    pub fn new(validator: Validator) -> Self {
        Self {
            validator,
            progress: Arc::new(SilentProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Validate every URL concurrently.
    ///
    /// Concurrency is bounded only by the dump limiter inside the pipeline.
    /// Returns exactly one outcome per input URL, in input order. A panic in
    /// a pipeline task is a bug and is propagated.
    pub async fn run_all(&self, urls: &[String]) -> Vec<ValidationOutcome> {
        let handles: Vec<_> = urls
            .iter()
            .cloned()
            .map(|url| {
                let validator = self.validator.clone();
                let progress = Arc::clone(&self.progress);
                tokio::spawn(async move {
                    let outcome = validator.validate(&url).await;
                    progress.on_outcome(&outcome);
                    outcome
                })
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    Err(err) => unreachable!("validation tasks are never aborted: {err}"),
                },
            })
            .collect()
    }

    /// [`BatchRunner::run_all`] wrapped in a timed report.
    pub async fn run_report(&self, urls: &[String]) -> BatchReport {
        let started = Instant::now();
        info!(count = urls.len(), "validating packages");
        let outcomes = self.run_all(urls).await;
        let report = BatchReport::new(outcomes, started.elapsed().as_millis() as u64);
        info!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            duration_ms = report.duration_ms,
            "validation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::FixedBranch;
    use crate::dump::ManifestDumper;
    use crate::fetcher::ManifestFetcher;
    use crate::raw_url::GitHubRawUrlBuilder;
    use crate::workspace::Workspace;
    use async_trait::async_trait;
    use plv_core::{Package, PackageError, StatusPrinter};
    use std::path::PathBuf;
    use std::time::Duration;
    use url::Url;

    /// Serves a JSON manifest named after the repository, or fails for
    /// repositories named `offline`.
    struct FakeFetcher {
        root: PathBuf,
    }

    #[async_trait]
    impl ManifestFetcher for FakeFetcher {
        async fn fetch(&self, manifest_url: &Url) -> Result<Workspace, PackageError> {
            let segments: Vec<_> = manifest_url.path_segments().unwrap().collect();
            let repo = segments[1];
            if repo == "offline" {
                return Err(PackageError::NoResult("connection refused".into()));
            }
            let products = if repo == "empty" {
                serde_json::json!([])
            } else {
                serde_json::json!([{ "name": repo }])
            };
            let body = serde_json::json!({ "name": repo, "products": products });
            Workspace::create(&self.root, "Package.swift", body.to_string().as_bytes())
                .await
                .map_err(|e| PackageError::NoResult(e.to_string()))
        }
    }

    /// Decodes the manifest directly; repositories starting with `slow` sleep
    /// so they finish after their successors.
    struct FakeDumper;

    #[async_trait]
    impl ManifestDumper for FakeDumper {
        async fn dump(&self, workspace: &Workspace) -> Result<Package, PackageError> {
            let bytes = tokio::fs::read(workspace.manifest_path())
                .await
                .map_err(|e| PackageError::BadDump(e.to_string()))?;
            let package = Package::from_dump(&bytes)?;
            if package.name.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok(package)
        }
    }

    fn runner(root: &std::path::Path) -> BatchRunner {
        let validator = Validator::new(
            Arc::new(FixedBranch::new("master")),
            Arc::new(GitHubRawUrlBuilder::default()),
            Arc::new(FakeFetcher {
                root: root.to_path_buf(),
            }),
            Arc::new(FakeDumper),
        );
        BatchRunner::new(validator)
    }

    fn urls(repos: &[&str]) -> Vec<String> {
        repos
            .iter()
            .map(|r| format!("https://github.com/owner/{r}.git"))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let root = tempfile::tempdir().unwrap();
        assert!(runner(root.path()).run_all(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_single_url() {
        let root = tempfile::tempdir().unwrap();
        let outcomes = runner(root.path()).run_all(&urls(&["Lib"])).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result.as_ref().unwrap().first_product.name, "Lib");
    }

    #[tokio::test]
    async fn test_order_matches_input_not_completion() {
        let root = tempfile::tempdir().unwrap();
        let input = urls(&["slow-a", "b", "slow-c", "d", "e"]);
        let outcomes = runner(root.path()).run_all(&input).await;
        let got: Vec<_> = outcomes.iter().map(|o| o.url.clone()).collect();
        assert_eq!(got, input);
        assert!(outcomes.iter().all(|o| o.is_success()));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let mut input = urls(&["a", "offline", "empty", "b"]);
        input.push("https://gitlab.com/owner/c.git".to_string());

        let outcomes = runner(root.path()).run_all(&input).await;
        assert!(outcomes[0].is_success());
        assert!(matches!(outcomes[1].error(), Some(PackageError::NoResult(_))));
        assert_eq!(outcomes[2].error(), Some(&PackageError::MissingProducts));
        assert!(outcomes[3].is_success());
        assert_eq!(
            outcomes[4].error(),
            Some(&PackageError::UnsupportedHost("gitlab.com".into()))
        );
    }

    #[tokio::test]
    async fn test_workspaces_removed_only_on_success() {
        let root = tempfile::tempdir().unwrap();
        runner(root.path()).run_all(&urls(&["a", "empty"])).await;
        let remaining = std::fs::read_dir(root.path()).unwrap().count();
        assert_eq!(remaining, 1, "the failed workspace stays for inspection");
    }

    #[tokio::test]
    async fn test_progress_sees_every_outcome() {
        let root = tempfile::tempdir().unwrap();
        let printer = Arc::new(StatusPrinter::new(3, Vec::new()));
        let runner = runner(root.path()).with_progress(printer.clone());
        let report = runner.run_report(&urls(&["a", "offline", "c"])).await;

        assert_eq!(printer.counts(), (3, 1));
        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.is_success());
    }
}
