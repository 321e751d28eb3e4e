//! Structural checks over the package list.
//!
//! These run before any network traffic. Each check is a pure predicate
//! over the raw list; a failure aborts the run with a non-zero exit.

use std::collections::HashSet;

use url::Url;

use crate::error::ListValidationError;

/// A synchronous check over the full URL list.
pub trait ListValidator: Send + Sync {
    /// Line printed when the check passes.
    fn success_description(&self) -> &'static str;

    /// Returns a description of the problem, or `None` when the list passes.
    fn validate_urls(&self, urls: &[String]) -> Option<String>;
}

/// Every entry must be an `https` git URL with a host.
pub struct GitUrlListValidator;

impl ListValidator for GitUrlListValidator {
    fn success_description(&self) -> &'static str {
        "All URLs are git URLs"
    }

    fn validate_urls(&self, urls: &[String]) -> Option<String> {
        let invalid: Vec<&str> = urls
            .iter()
            .filter(|raw| !is_git_url(raw))
            .map(String::as_str)
            .collect();
        if invalid.is_empty() {
            None
        } else {
            Some(format!("invalid git URLs: {}", invalid.join(", ")))
        }
    }
}

fn is_git_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => url.scheme() == "https" && url.host_str().is_some() && url.path().ends_with(".git"),
        Err(_) => false,
    }
}

/// Entries must be sorted, ignoring case.
pub struct SortedListValidator;

impl ListValidator for SortedListValidator {
    fn success_description(&self) -> &'static str {
        "List is sorted"
    }

    fn validate_urls(&self, urls: &[String]) -> Option<String> {
        urls.windows(2)
            .find(|pair| pair[0].to_lowercase() > pair[1].to_lowercase())
            .map(|pair| format!("list is not sorted: {} should come after {}", pair[0], pair[1]))
    }
}

/// No entry may appear twice, ignoring case.
pub struct UniqueListValidator;

impl ListValidator for UniqueListValidator {
    fn success_description(&self) -> &'static str {
        "List has no duplicates"
    }

    fn validate_urls(&self, urls: &[String]) -> Option<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for url in urls {
            let key = url.to_lowercase();
            if !seen.insert(key) && !duplicates.contains(url) {
                duplicates.push(url.clone());
            }
        }
        if duplicates.is_empty() {
            None
        } else {
            Some(format!("duplicate URLs: {}", duplicates.join(", ")))
        }
    }
}

/// The checks run by the `all` and `diff` commands.
pub fn default_list_validators() -> Vec<Box<dyn ListValidator>> {
    vec![
        Box::new(GitUrlListValidator),
        Box::new(SortedListValidator),
        Box::new(UniqueListValidator),
    ]
}

/// Run every validator; all failures are collected, not just the first.
pub fn run_list_validators(
    validators: &[Box<dyn ListValidator>],
    urls: &[String],
) -> Result<(), ListValidationError> {
    let messages = validators
        .iter()
        .filter_map(|v| v.validate_urls(urls))
        .collect();
    match ListValidationError::from_messages(messages) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
