//! Proxy checker module for confirming candidates and recording exit IPs

use crate::error::HarvestError;
use crate::proxy::address::is_ipv4;
use crate::proxy::models::Candidate;
use crate::Result;
use async_trait::async_trait;
use native_tls::TlsConnector;
use once_cell::sync::Lazy;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for proxy checks in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default service answering with the caller's IP as plain text
pub const DEFAULT_IP_SERVICE: &str = "https://ident.me";

/// TLS connector shared by every check client. Loading the system root
/// store is slow synchronous work, so it happens once per process instead
/// of once per candidate.
static TLS: Lazy<Option<TlsConnector>> = Lazy::new(|| {
    TlsConnector::new()
        .map_err(|e| warn!("shared TLS setup failed, building per client: {}", e))
        .ok()
});

/// Anything able to tell whether a candidate proxies traffic
#[async_trait]
pub trait Verify: Send + Sync {
    /// Exit IP observed through the candidate, or `None` if it did not work
    async fn verify(&self, candidate: &Candidate) -> Option<String>;
}

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each proxy check
    pub timeout: Duration,
    /// Service queried through every proxy
    pub ip_service: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ip_service: DEFAULT_IP_SERVICE.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ip_service(mut self, url: String) -> Self {
        self.ip_service = url.trim().to_string();
        self
    }
}

/// Proxy checker routing a single request through each candidate
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new proxy checker with custom configuration.
    ///
    /// Also sets up the shared TLS connector, keeping that work out of the
    /// check tasks.
    pub fn with_config(config: CheckerConfig) -> Self {
        Lazy::force(&TLS);
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a single candidate, keeping the failure reason
    pub async fn check(&self, candidate: &Candidate) -> std::result::Result<String, String> {
        let client =
            create_client(&candidate.url(), self.config.timeout).map_err(|e| e.to_string())?;

        let response = match tokio::time::timeout(
            self.config.timeout,
            client.get(&self.config.ip_service).send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err("timed out".to_string()),
        };

        let body = match tokio::time::timeout(self.config.timeout, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err("timed out reading response".to_string()),
        };

        let exit_ip = body.trim();
        if is_ipv4(exit_ip) {
            Ok(exit_ip.to_string())
        } else {
            Err(format!("unexpected response: {:.32}", exit_ip))
        }
    }
}

/// Create a reqwest client sending both http and https through `proxy_url`
fn create_client(proxy_url: &str, timeout: Duration) -> Result<Client> {
    let proxy = ReqwestProxy::all(proxy_url).map_err(HarvestError::Client)?;

    let mut builder = Client::builder().proxy(proxy).timeout(timeout);
    if let Some(tls) = TLS.as_ref() {
        builder = builder.use_preconfigured_tls(tls.clone());
    }
    builder.build().map_err(HarvestError::Client)
}

#[async_trait]
impl Verify for ProxyChecker {
    async fn verify(&self, candidate: &Candidate) -> Option<String> {
        match self.check(candidate).await {
            Ok(exit_ip) => Some(exit_ip),
            Err(reason) => {
                debug!(proxy = %candidate, "check failed: {}", reason);
                None
            }
        }
    }
}
