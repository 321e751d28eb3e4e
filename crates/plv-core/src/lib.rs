//! Package List Validator Core
//!
//! Shared vocabulary for validating a package registry list:
//! - the decoded manifest model and per-URL outcome
//! - the closed [`PackageError`] taxonomy
//! - [`ValidatorConfig`] with environment overrides
//! - structural list checks run before any network traffic
//! - batch reports and progress sinks

pub mod config;
pub mod error;
pub mod list_check;
pub mod model;
pub mod report;
pub mod telemetry;

pub use config::ValidatorConfig;
pub use error::{ConfigError, ListValidationError, PackageError};
pub use list_check::{
    default_list_validators, run_list_validators, GitUrlListValidator, ListValidator,
    SortedListValidator, UniqueListValidator,
};
pub use model::{Package, Product, RepoDetail, RepoSpecification, Target, ValidationOutcome};
pub use report::{BatchReport, ProgressSink, SilentProgress, StatusPrinter};
pub use telemetry::init_tracing;

/// Validator version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
