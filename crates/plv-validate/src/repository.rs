//! Repository URL parsing.

use plv_core::PackageError;
use url::Url;

/// Hosts whose repositories can be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHost {
    GitHub,
}

impl GitHost {
    pub fn from_host(host: &str) -> Option<Self> {
        match host.to_ascii_lowercase().as_str() {
            "github.com" => Some(GitHost::GitHub),
            _ => None,
        }
    }
}

/// Owner and name of a repository on a supported host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Host serving the repository.
    pub host: GitHost,
    /// User or organisation owning the repository.
    pub owner: String,
    /// Repository name with any `.git` suffix removed.
    pub name: String,
}

/// Split `https://github.com/<owner>/<repo>[.git]` into its parts.
pub fn resolve_repository(raw: &str) -> Result<RepositoryRef, PackageError> {
    let invalid = || PackageError::InvalidUrl(raw.to_string());

    let url = Url::parse(raw).map_err(|_| invalid())?;
    let host_str = url.host_str().ok_or_else(invalid)?;
    let host =
        GitHost::from_host(host_str).ok_or_else(|| PackageError::UnsupportedHost(host_str.to_string()))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(invalid());
    }

    let last = segments[segments.len() - 1];
    let name = last.strip_suffix(".git").unwrap_or(last);
    let owner = segments[segments.len() - 2];
    if name.is_empty() {
        return Err(invalid());
    }

    Ok(RepositoryRef {
        host,
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_git_suffix() {
        let repo = resolve_repository("https://github.com/Alamofire/Alamofire.git").unwrap();
        assert_eq!(repo.owner, "Alamofire");
        assert_eq!(repo.name, "Alamofire");
        assert_eq!(repo.host, GitHost::GitHub);
    }

    #[test]
    fn test_resolves_without_suffix_and_trailing_slash() {
        let repo = resolve_repository("https://github.com/owner/repo/").unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.name, "repo");
    }

    #[test]
    fn test_unsupported_host() {
        let err = resolve_repository("https://gitlab.com/owner/repo.git").unwrap_err();
        assert_eq!(err, PackageError::UnsupportedHost("gitlab.com".to_string()));
    }

    #[test]
    fn test_url_without_host_is_invalid() {
        let err = resolve_repository("file:///tmp/repo.git").unwrap_err();
        assert!(matches!(err, PackageError::InvalidUrl(_)));
    }

    #[test]
    fn test_unparseable_and_short_paths_are_invalid() {
        assert!(matches!(
            resolve_repository("github.com/owner/repo"),
            Err(PackageError::InvalidUrl(_))
        ));
        assert!(matches!(
            resolve_repository("https://github.com/owner"),
            Err(PackageError::InvalidUrl(_))
        ));
        assert!(matches!(
            resolve_repository("https://github.com/owner/.git"),
            Err(PackageError::InvalidUrl(_))
        ));
    }
}
