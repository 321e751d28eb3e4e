//! Package List Validator - manifest validation pipeline
//!
//! For every repository URL:
//! - resolve the branch and build the raw manifest URL
//! - download the manifest into its own workspace
//! - dump it with the external toolchain under a shared concurrency limit
//!   and a hard timeout
//! - decode the dump and require at least one product
//!
//! Failures are recorded per URL; one broken repository never affects
//! another.

pub mod batch;
pub mod branch;
pub mod dump;
pub mod fetcher;
pub mod filter;
pub mod limiter;
pub mod pipeline;
pub mod raw_url;
pub mod repository;
pub mod workspace;

// Re-export key types
pub use batch::BatchRunner;
pub use branch::{BranchResolver, FallbackBranchResolver, FixedBranch};
pub use dump::{classify_output, is_timeout_exit, DumpCommand, DumpOutput, DumpRunner, ManifestDumper};
pub use fetcher::{build_http_client, HttpManifestFetcher, ManifestFetcher};
pub use filter::{FilterError, MasterListFilter, NoFilter, PackageFilter};
pub use limiter::{DumpLimiter, DumpSlot, Limiter, RequestLimiter, Slot};
pub use pipeline::Validator;
pub use raw_url::{GitHubRawUrlBuilder, RawUrlBuilder};
pub use repository::{resolve_repository, GitHost, RepositoryRef};
pub use workspace::Workspace;
