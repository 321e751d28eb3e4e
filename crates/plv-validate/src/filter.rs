//! Narrowing the candidate list against the registry's master list.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::info;
use url::Url;

/// Failure to obtain the reference list. Fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("unable to fetch master list {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("unable to decode master list: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Selects which URLs of a list need validation.
#[async_trait]
pub trait PackageFilter: Send + Sync {
    async fn filter(&self, urls: Vec<String>) -> Result<Vec<String>, FilterError>;
}

/// Keeps every URL.
pub struct NoFilter;

#[async_trait]
impl PackageFilter for NoFilter {
    async fn filter(&self, urls: Vec<String>) -> Result<Vec<String>, FilterError> {
        Ok(urls)
    }
}

/// Keeps only URLs absent from the master list.
pub struct MasterListFilter {
    client: reqwest::Client,
    master_list_url: Url,
}

impl MasterListFilter {
    pub fn new(client: reqwest::Client, master_list_url: Url) -> Self {
        Self {
            client,
            master_list_url,
        }
    }

    async fn fetch_master_list(&self) -> Result<Vec<String>, FilterError> {
        let fetch_err = |reason: String| FilterError::Fetch {
            url: self.master_list_url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.master_list_url.clone())
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }
        let body = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

#[async_trait]
impl PackageFilter for MasterListFilter {
    async fn filter(&self, urls: Vec<String>) -> Result<Vec<String>, FilterError> {
        let master: HashSet<String> = self
            .fetch_master_list()
            .await?
            .iter()
            .map(|u| normalize(u))
            .collect();

        let total = urls.len();
        let remaining: Vec<String> = urls
            .into_iter()
            .filter(|u| !master.contains(&normalize(u)))
            .collect();
        info!(total, new = remaining.len(), master = master.len(), "filtered against master list");
        Ok(remaining)
    }
}
