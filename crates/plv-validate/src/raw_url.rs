//! Raw content URL construction.

use plv_core::config::DEFAULT_RAW_BASE_URL;
use plv_core::RepoSpecification;
use url::Url;

/// Builds the direct-download URL of a file on a given branch.
pub trait RawUrlBuilder: Send + Sync {
    /// Pure and deterministic. Panics if the base cannot carry a path,
    /// which a validated configuration rules out.
    fn url(&self, spec: &RepoSpecification, file_name: &str) -> Url;
}

/// `<base>/<owner>/<repo>/<branch>/<file>` as served by raw.githubusercontent.com.
///
/// Each component is appended as one percent-encoded path segment, so a
/// branch such as `fix#1` never leaks into the query or fragment.
#[derive(Debug, Clone)]
pub struct GitHubRawUrlBuilder {
    base: Url,
}

impl GitHubRawUrlBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl Default for GitHubRawUrlBuilder {
    fn default() -> Self {
        let base = Url::parse(DEFAULT_RAW_BASE_URL).expect("default raw base URL is valid");
        Self::new(base)
    }
}

impl RawUrlBuilder for GitHubRawUrlBuilder {
    fn url(&self, spec: &RepoSpecification, file_name: &str) -> Url {
        let mut url = self.base.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().extend([
                    spec.owner.as_str(),
                    spec.repository_name.as_str(),
                    spec.branch_name.as_str(),
                    file_name,
                ]);
            }
            Err(()) => panic!("raw base URL {} cannot carry a path", self.base),
        }
        url
    }
}
