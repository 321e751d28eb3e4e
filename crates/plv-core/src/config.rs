//! Validator configuration.
//!
//! Defaults mirror the public Swift package registry. Every field can be
//! overridden through a `PLV_*` environment variable or, in the binary,
//! through the matching command-line flag.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_RAW_BASE_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_MASTER_LIST_URL: &str =
    "https://raw.githubusercontent.com/daveverwer/SwiftPMLibrary/master/packages.json";
pub const DEFAULT_MANIFEST_FILE_NAME: &str = "Package.swift";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_DUMP_CONCURRENCY: usize = 3;
pub const DEFAULT_DUMP_TIMEOUT_SECS: u64 = 10;

/// Exit code reported by a dump process that was terminated for running
/// too long. On Unix this is the SIGTERM signal number, which is what
/// wrappers such as `timeout(1)` exit with.
#[cfg(unix)]
pub const DEFAULT_TIMEOUT_EXIT_CODE: i32 = 15;

/// `TerminateProcess` as used by the runtime sets the exit code to 1.
#[cfg(not(unix))]
pub const DEFAULT_TIMEOUT_EXIT_CODE: i32 = 1;

/// Full configuration for a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Base of raw file URLs: `<base>/<owner>/<repo>/<branch>/<file>`.
    pub raw_base_url: String,

    /// Name of the manifest fetched from each repository.
    pub manifest_file_name: String,

    /// Branch tried first for every repository.
    pub default_branch: String,

    /// Branches probed in order when the default branch has no manifest.
    /// Empty means the default branch is used without probing.
    pub fallback_branches: Vec<String>,

    /// Executable that dumps a manifest to JSON on stdout.
    pub dump_program: String,

    /// Arguments passed to `dump_program`.
    pub dump_args: Vec<String>,

    /// Maximum number of dump processes alive at once.
    pub dump_concurrency: usize,

    /// Wall-clock limit per dump process.
    pub dump_timeout_secs: u64,

    /// Exit code that marks a dump terminated by a timeout.
    pub timeout_exit_code: i32,

    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,

    /// Maximum in-flight HTTP requests to the raw-content host.
    pub max_connections_per_host: usize,

    /// Directory under which per-URL workspaces are created.
    pub workspace_root: PathBuf,

    /// Reference list used by the `diff` command.
    pub master_list_url: String,

    /// Keep workspaces even when validation succeeds.
    pub keep_workspaces: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            raw_base_url: DEFAULT_RAW_BASE_URL.to_string(),
            manifest_file_name: DEFAULT_MANIFEST_FILE_NAME.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            fallback_branches: Vec::new(),
            dump_program: "swift".to_string(),
            dump_args: vec!["package".to_string(), "dump-package".to_string()],
            dump_concurrency: DEFAULT_DUMP_CONCURRENCY,
            dump_timeout_secs: DEFAULT_DUMP_TIMEOUT_SECS,
            timeout_exit_code: DEFAULT_TIMEOUT_EXIT_CODE,
            request_timeout_secs: 30,
            max_connections_per_host: 10,
            workspace_root: std::env::temp_dir(),
            master_list_url: DEFAULT_MASTER_LIST_URL.to_string(),
            keep_workspaces: false,
        }
    }
}

impl ValidatorConfig {
    /// Build a configuration from `PLV_*` environment variables, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ValidatorConfig::from_env`] but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("PLV_RAW_BASE_URL") {
            config.raw_base_url = v;
        }
        if let Some(v) = lookup("PLV_MANIFEST_FILE") {
            config.manifest_file_name = v;
        }
        if let Some(v) = lookup("PLV_DEFAULT_BRANCH") {
            config.default_branch = v;
        }
        if let Some(v) = lookup("PLV_FALLBACK_BRANCHES") {
            config.fallback_branches = split_list(&v, ',');
        }
        if let Some(v) = lookup("PLV_DUMP_PROGRAM") {
            config.dump_program = v;
        }
        if let Some(v) = lookup("PLV_DUMP_ARGS") {
            config.dump_args = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = lookup("PLV_DUMP_CONCURRENCY") {
            config.dump_concurrency = parse_env("PLV_DUMP_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("PLV_DUMP_TIMEOUT_SECS") {
            config.dump_timeout_secs = parse_env("PLV_DUMP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("PLV_TIMEOUT_EXIT_CODE") {
            config.timeout_exit_code = parse_env("PLV_TIMEOUT_EXIT_CODE", &v)?;
        }
        if let Some(v) = lookup("PLV_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_env("PLV_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("PLV_MAX_CONNECTIONS_PER_HOST") {
            config.max_connections_per_host = parse_env("PLV_MAX_CONNECTIONS_PER_HOST", &v)?;
        }
        if let Some(v) = lookup("PLV_WORKSPACE_ROOT") {
            config.workspace_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("PLV_MASTER_LIST_URL") {
            config.master_list_url = v;
        }
        if let Some(v) = lookup("PLV_KEEP_WORKSPACES") {
            config.keep_workspaces = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.raw_base_url()?;
        self.master_list_url()?;
        if self.dump_concurrency == 0 {
            return Err(ConfigError::Zero {
                field: "dump_concurrency",
            });
        }
        if self.dump_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "dump_timeout_secs",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "request_timeout_secs",
            });
        }
        if self.max_connections_per_host == 0 {
            return Err(ConfigError::Zero {
                field: "max_connections_per_host",
            });
        }
        if self.dump_program.trim().is_empty() {
            return Err(ConfigError::EmptyDumpProgram);
        }
        Ok(())
    }

    pub fn raw_base_url(&self) -> Result<Url, ConfigError> {
        parse_url("raw_base_url", &self.raw_base_url)
    }

    pub fn master_list_url(&self) -> Result<Url, ConfigError> {
        parse_url("master_list_url", &self.master_list_url)
    }

    pub fn dump_timeout(&self) -> Duration {
        Duration::from_secs(self.dump_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Default branch followed by the fallbacks, without duplicates.
    pub fn branch_candidates(&self) -> Vec<String> {
        let mut candidates = vec![self.default_branch.clone()];
        for branch in &self.fallback_branches {
            if !candidates.contains(branch) {
                candidates.push(branch.clone());
            }
        }
        candidates
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: format!("{value}: {e}"),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: format!("{value}: not a base URL"),
        });
    }
    Ok(url)
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

fn split_list(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ValidatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dump_concurrency, 3);
        assert_eq!(config.dump_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_branch, "master");
        assert_eq!(config.dump_args, vec!["package", "dump-package"]);
    }

    #[test]
    fn test_env_overrides() {
        let config = ValidatorConfig::from_lookup(lookup_from(&[
            ("PLV_DUMP_CONCURRENCY", "8"),
            ("PLV_FALLBACK_BRANCHES", "main, develop,,"),
            ("PLV_DUMP_ARGS", "package  describe --type json"),
            ("PLV_KEEP_WORKSPACES", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.dump_concurrency, 8);
        assert_eq!(config.fallback_branches, vec!["main", "develop"]);
        assert_eq!(config.dump_args, vec!["package", "describe", "--type", "json"]);
        assert!(config.keep_workspaces);
    }

    #[test]
    fn test_env_rejects_garbage_numbers() {
        let err = ValidatorConfig::from_lookup(lookup_from(&[("PLV_DUMP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "PLV_DUMP_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ValidatorConfig {
            dump_concurrency: 0,
            ..ValidatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero { field: "dump_concurrency" })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_network_limits() {
        let config = ValidatorConfig {
            request_timeout_secs: 0,
            ..ValidatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero { field: "request_timeout_secs" })
        ));

        let config = ValidatorConfig {
            max_connections_per_host: 0,
            ..ValidatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero { field: "max_connections_per_host" })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_raw_base() {
        let config = ValidatorConfig {
            raw_base_url: "not a url".to_string(),
            ..ValidatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "raw_base_url", .. })
        ));
    }

    #[test]
    fn test_branch_candidates_dedup() {
        let config = ValidatorConfig {
            fallback_branches: vec!["main".into(), "master".into(), "main".into()],
            ..ValidatorConfig::default()
        };
        assert_eq!(config.branch_candidates(), vec!["master", "main"]);
    }
}
