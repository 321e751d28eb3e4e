//! Package List Validator CLI
//!
//! The `package-list-validator` command checks a `packages.json` registry
//! list and verifies that every listed repository has a manifest that dumps
//! cleanly and declares at least one product.
//!
//! ## Commands
//!
//! - `all`: validate every URL in the list
//! - `diff`: validate only URLs missing from the published master list
//! - `mine`: dump a local package directory

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use plv_core::{
    default_list_validators, run_list_validators, BatchReport, RepoDetail, StatusPrinter,
    ValidatorConfig,
};
use plv_validate::{
    build_http_client, BatchRunner, DumpLimiter, DumpRunner, ManifestDumper, MasterListFilter,
    NoFilter, PackageFilter, Validator, Workspace,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, Level};

const PACKAGE_LIST_FILE: &str = "packages.json";

#[derive(Parser)]
#[command(name = "package-list-validator")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate the manifests of a Swift package registry list", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags layered over the `PLV_*` environment configuration.
#[derive(Args, Debug, Default, Clone)]
struct ConfigOverrides {
    /// Branch to fetch manifests from
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Branch to try when the default has no manifest (repeatable)
    #[arg(long = "fallback-branch", global = true)]
    fallback_branches: Vec<String>,

    /// Maximum number of concurrent dump processes
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Seconds before a dump process is killed
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Base URL of the raw-content host
    #[arg(long, global = true)]
    raw_base_url: Option<String>,

    /// URL of the published master list used by `diff`
    #[arg(long, global = true)]
    master_list_url: Option<String>,

    /// Directory under which per-package workspaces are created
    #[arg(long, global = true)]
    workspace_root: Option<PathBuf>,

    /// Keep workspaces even when validation succeeds
    #[arg(long, global = true)]
    keep_workspaces: bool,

    /// Write a JSON report of all outcomes to this file
    #[arg(long, global = true, env = "PLV_REPORT")]
    report: Option<PathBuf>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ValidatorConfig) {
        if let Some(branch) = &self.branch {
            config.default_branch = branch.clone();
        }
        if !self.fallback_branches.is_empty() {
            config.fallback_branches = self.fallback_branches.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.dump_concurrency = concurrency;
        }
        if let Some(secs) = self.timeout_secs {
            config.dump_timeout_secs = secs;
        }
        if let Some(url) = &self.raw_base_url {
            config.raw_base_url = url.clone();
        }
        if let Some(url) = &self.master_list_url {
            config.master_list_url = url.clone();
        }
        if let Some(root) = &self.workspace_root {
            config.workspace_root = root.clone();
        }
        if self.keep_workspaces {
            config.keep_workspaces = true;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every package in the list
    All {
        /// Path to the package list (default: packages.json here or beside the binary)
        path: Option<PathBuf>,
    },

    /// Validate only packages not yet in the master list
    Diff {
        /// Path to the package list (default: packages.json here or beside the binary)
        path: Option<PathBuf>,
    },

    /// Dump a local package and show its first product
    Mine {
        /// Package directory containing the manifest
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    plv_core::init_tracing(cli.json, level);

    let mut config = ValidatorConfig::from_env().context("Invalid PLV_* environment")?;
    cli.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    let report_path = cli.overrides.report.as_deref();

    let passed = match cli.command {
        Commands::All { path } => {
            let list = discover_list(path.as_deref())?;
            cmd_validate(&config, &list, &NoFilter, report_path).await?
        }
        Commands::Diff { path } => {
            let list = discover_list(path.as_deref())?;
            let filter = MasterListFilter::new(build_http_client(&config)?, config.master_list_url()?);
            cmd_validate(&config, &list, &filter, report_path).await?
        }
        Commands::Mine { path } => cmd_mine(&config, &path).await?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Locate the package list: the explicit path, else `packages.json` in the
/// working directory, else beside the executable.
fn discover_list(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    find_package_list(explicit, &cwd, exe_dir.as_deref())
}

fn find_package_list(explicit: Option<&Path>, cwd: &Path, exe_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        bail!("Package list not found at {}", path.display());
    }

    let candidates = std::iter::once(cwd).chain(exe_dir);
    for dir in candidates {
        let candidate = dir.join(PACKAGE_LIST_FILE);
        debug!(path = %candidate.display(), "looking for package list");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!(
        "No {} found in {} or beside the executable; pass a path explicitly",
        PACKAGE_LIST_FILE,
        cwd.display()
    )
}

fn read_package_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read package list {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of URLs", path.display()))
}

/// Pre-flight checks, filtering, then the concurrent batch.
///
/// Returns `false` if any list check or any package failed.
async fn cmd_validate(
    config: &ValidatorConfig,
    list_path: &Path,
    filter: &dyn PackageFilter,
    report_path: Option<&Path>,
) -> Result<bool> {
    let urls = read_package_list(list_path)?;
    info!(path = %list_path.display(), count = urls.len(), "package list loaded");

    let validators = default_list_validators();
    if let Err(err) = run_list_validators(&validators, &urls) {
        for message in &err.messages {
            println!("✗ {}", message);
        }
        return Ok(false);
    }
    for validator in &validators {
        println!("✓ {}", validator.success_description());
    }

    let urls = filter
        .filter(urls)
        .await
        .context("Failed to select packages to validate")?;
    if urls.is_empty() {
        println!("No packages to validate");
        return Ok(true);
    }

    let validator = Validator::from_config(config)?;
    let printer = Arc::new(StatusPrinter::stdout(urls.len()));
    let report = BatchRunner::new(validator)
        .with_progress(printer)
        .run_report(&urls)
        .await;

    println!();
    println!("{}", report.summary());
    if let Some(path) = report_path {
        write_report(&report, path)?;
    }
    Ok(report.is_success())
}

fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    report
        .write_json(path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    println!("Report written to {}", path.display());
    Ok(())
}

/// Dump a package directory in place; the directory is never removed.
async fn cmd_mine(config: &ValidatorConfig, dir: &Path) -> Result<bool> {
    let workspace = Workspace::existing(dir, &config.manifest_file_name);
    if !workspace.manifest_path().is_file() {
        bail!(
            "No {} in {}",
            config.manifest_file_name,
            dir.display()
        );
    }

    let runner = DumpRunner::from_config(config, DumpLimiter::new(config.dump_concurrency));
    match runner.dump(&workspace).await.and_then(RepoDetail::try_from) {
        Ok(detail) => {
            println!(
                "✓ {} ({} products, first: {})",
                detail.package.name,
                detail.package.products.len(),
                detail.first_product.name
            );
            Ok(true)
        }
        Err(err) => {
            println!("✗ {}: {}", err.friendly_name(), err);
            Ok(false)
        }
    }
}
