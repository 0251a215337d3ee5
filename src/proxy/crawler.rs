//! Proxy crawler module for fetching proxy lists from remote sources
//!
//! Each source is fetched exactly once. A failing source is logged and
//! contributes nothing; it never aborts the run.

use crate::error::HarvestError;
use crate::proxy::models::{Candidate, ProxySource};
use crate::proxy::parser::ProxyParser;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error};

/// Default timeout for list requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default user agent for list requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Anything able to turn a list source into candidates
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch one source. Failures yield an empty set.
    async fn fetch(&self, source: &ProxySource) -> HashSet<Candidate>;
}

/// Configuration for proxy crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for list requests
    pub timeout: Duration,
    /// User agent for list requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Proxy crawler for fetching candidates from list sources
#[derive(Debug, Clone)]
pub struct ProxyCrawler {
    client: Client,
}

impl ProxyCrawler {
    /// Create a new proxy crawler with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new proxy crawler with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(HarvestError::Client)?;

        Ok(Self { client })
    }

    /// Fetch a source, reporting why it failed
    pub async fn try_fetch(&self, source: &ProxySource) -> Result<HashSet<Candidate>> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| HarvestError::SourceFetch {
                url: source.url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::SourceStatus {
                url: source.url.clone(),
                status,
            });
        }

        let content = response
            .text()
            .await
            .map_err(|e| HarvestError::SourceFetch {
                url: source.url.clone(),
                source: e,
            })?;

        Ok(ProxyParser::parse_string(&content, source.protocol))
    }
}

#[async_trait]
impl Fetch for ProxyCrawler {
    async fn fetch(&self, source: &ProxySource) -> HashSet<Candidate> {
        match self.try_fetch(source).await {
            Ok(candidates) => {
                debug!(
                    url = %source.url,
                    protocol = %source.protocol,
                    "found {} candidates",
                    candidates.len()
                );
                candidates
            }
            Err(e) => {
                error!("{}", e);
                HashSet::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawler_config_default() {
        let config = CrawlerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_crawler_config_builder() {
        let config = CrawlerConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("Custom Agent".to_string());

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "Custom Agent");
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_nothing() {
        let crawler = ProxyCrawler::with_config(
            CrawlerConfig::new().with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        // Port 9 on localhost is closed in any sane test environment.
        let source = ProxySource::new("http://127.0.0.1:9/list.txt", crate::Protocol::Http);

        let err = crawler.try_fetch(&source).await.unwrap_err();
        assert!(matches!(err, HarvestError::SourceFetch { .. }));
        assert!(crawler.fetch(&source).await.is_empty());
    }
}
