//! Error taxonomy for package list validation.

use serde::{Deserialize, Serialize};

/// Classified failure for a single repository URL.
///
/// Every stage of the validation pipeline maps its failures onto exactly
/// one of these tags. The set is closed: a failure that does not fit here
/// is a bug, not a per-URL outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PackageError {
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported host: {0}")]
    UnsupportedHost(String),

    #[error("no manifest retrieved: {0}")]
    NoResult(String),

    #[error("package declares no products")]
    MissingProducts,

    #[error("package dump timed out")]
    DumpTimeout,

    #[error("package dump failed: {0}")]
    BadDump(String),

    #[error("unable to decode package dump: {0}")]
    DecodingError(String),
}

impl PackageError {
    /// Short human-readable label for the tag, used in progress output.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            PackageError::InvalidUrl(_) => "Invalid URL",
            PackageError::UnsupportedHost(_) => "Unsupported Host",
            PackageError::NoResult(_) => "No Result",
            PackageError::MissingProducts => "Missing Products",
            PackageError::DumpTimeout => "Dump Timeout",
            PackageError::BadDump(_) => "Bad Dump",
            PackageError::DecodingError(_) => "Decoding Error",
        }
    }
}

impl From<serde_json::Error> for PackageError {
    fn from(err: serde_json::Error) -> Self {
        PackageError::DecodingError(err.to_string())
    }
}

/// Malformed configuration. Always fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("dump program must not be empty")]
    EmptyDumpProgram,

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Aggregated failures from the structural list checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("package list failed {} structural check(s): {}", .messages.len(), .messages.join("; "))]
pub struct ListValidationError {
    pub messages: Vec<String>,
}

impl ListValidationError {
    /// Returns `None` when there is nothing to report.
    pub fn from_messages(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            None
        } else {
            Some(Self { messages })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_names_are_distinct() {
        let errors = [
            PackageError::InvalidUrl("x".to_string()),
            PackageError::UnsupportedHost("gitlab.com".to_string()),
            PackageError::NoResult("404".to_string()),
            PackageError::MissingProducts,
            PackageError::DumpTimeout,
            PackageError::BadDump("boom".to_string()),
            PackageError::DecodingError("eof".to_string()),
        ];
        let mut names: Vec<_> = errors.iter().map(|e| e.friendly_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), errors.len());
    }

    #[test]
    fn test_bad_dump_display_carries_stderr() {
        let err = PackageError::BadDump("error: manifest parse error".to_string());
        assert!(err.to_string().contains("manifest parse error"));
    }

    #[test]
    fn test_json_error_becomes_decoding_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PackageError = json_err.into();
        assert!(matches!(err, PackageError::DecodingError(_)));
    }

    #[test]
    fn test_package_error_serializes_with_tag() {
        let value = serde_json::to_value(PackageError::UnsupportedHost("gitlab.com".into())).unwrap();
        assert_eq!(value["kind"], "unsupported_host");
        assert_eq!(value["detail"], "gitlab.com");
    }

    #[test]
    fn test_list_validation_error_empty_is_none() {
        assert!(ListValidationError::from_messages(vec![]).is_none());
        let err = ListValidationError::from_messages(vec!["unsorted".into()]).unwrap();
        assert!(err.to_string().contains("1 structural check"));
    }
}
