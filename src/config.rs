//! Run configuration
//!
//! Everything is static for the duration of a run. Values come from the
//! built-in defaults, an optional TOML file, then command line overrides.

use crate::error::HarvestError;
use crate::proxy::checker::{self, CheckerConfig};
use crate::proxy::crawler::{self, CrawlerConfig};
use crate::proxy::driver;
use crate::proxy::models::{Protocol, ProxySource};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http",
    "https://raw.githubusercontent.com/chipsed/proxies/main/proxies.txt",
    "https://raw.githubusercontent.com/clarketm/proxy-list/master/proxy-list-raw.txt",
    "https://raw.githubusercontent.com/hendrikbgr/Free-Proxy-Repo/master/proxy_list.txt",
    "https://raw.githubusercontent.com/KUTlime/ProxyList/main/ProxyList.txt",
    "https://raw.githubusercontent.com/mmpx12/proxy-list/master/http.txt",
    "https://raw.githubusercontent.com/mmpx12/proxy-list/master/https.txt",
    "https://raw.githubusercontent.com/proxiesmaster/Free-Proxy-List/main/proxies.txt",
    "https://raw.githubusercontent.com/roosterkid/openproxylist/main/HTTPS_RAW.txt",
    "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/http.txt",
    "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/https.txt",
    "https://raw.githubusercontent.com/sunny9577/proxy-scraper/master/proxies.txt",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
    "https://raw.githubusercontent.com/Volodichev/proxy-list/main/http.txt",
    "https://www.proxy-list.download/api/v1/get?type=http",
    "https://www.proxy-list.download/api/v1/get?type=https",
];

const DEFAULT_SOCKS4_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks4",
    "https://raw.githubusercontent.com/mmpx12/proxy-list/master/socks4.txt",
    "https://raw.githubusercontent.com/roosterkid/openproxylist/main/SOCKS4_RAW.txt",
    "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/socks4.txt",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks4.txt",
    "https://www.proxy-list.download/api/v1/get?type=socks4",
];

const DEFAULT_SOCKS5_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks5",
    "https://raw.githubusercontent.com/hookzof/socks5_list/master/proxy.txt",
    "https://raw.githubusercontent.com/mmpx12/proxy-list/master/socks5.txt",
    "https://raw.githubusercontent.com/roosterkid/openproxylist/main/SOCKS5_RAW.txt",
    "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/socks5.txt",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks5.txt",
    "https://www.proxy-list.download/api/v1/get?type=socks5",
];

/// Whether a protocol is harvested, and from where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub enabled: bool,
    pub sources: Vec<String>,
}

impl ProtocolConfig {
    fn with_sources(sources: &[&str]) -> Self {
        Self {
            enabled: true,
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: Vec::new(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds to wait for a proxy to answer
    pub timeout_secs: u64,
    /// Seconds to wait for a list source
    pub fetch_timeout_secs: u64,
    /// Plain-text "what is my IP" service queried through every proxy
    pub ip_service: String,
    /// GeoLite2-City database; geolocation output is skipped without it
    pub geolocation_db: Option<PathBuf>,
    /// Directory receiving the output folders
    pub output_dir: PathBuf,
    /// Cap on in-flight tasks per phase; 0 lifts the cap
    pub max_concurrency: usize,
    /// User agent sent to list sources
    pub user_agent: String,
    pub http: ProtocolConfig,
    pub socks4: ProtocolConfig,
    pub socks5: ProtocolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: checker::DEFAULT_TIMEOUT_SECS,
            fetch_timeout_secs: crawler::DEFAULT_TIMEOUT_SECS,
            ip_service: checker::DEFAULT_IP_SERVICE.to_string(),
            geolocation_db: None,
            output_dir: PathBuf::from("."),
            max_concurrency: driver::DEFAULT_CONCURRENCY,
            user_agent: crawler::DEFAULT_USER_AGENT.to_string(),
            http: ProtocolConfig::with_sources(DEFAULT_HTTP_SOURCES),
            socks4: ProtocolConfig::with_sources(DEFAULT_SOCKS4_SOURCES),
            socks5: ProtocolConfig::with_sources(DEFAULT_SOCKS5_SOURCES),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| HarvestError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| HarvestError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize the configuration back to TOML
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject values the run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(HarvestError::Config("timeout_secs must be positive".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(HarvestError::Config(
                "fetch_timeout_secs must be positive".into(),
            ));
        }
        let ip_service = self.ip_service.trim();
        if !(ip_service.starts_with("http://") || ip_service.starts_with("https://")) {
            return Err(HarvestError::Config(format!(
                "ip_service must be an http(s) URL, got {:?}",
                self.ip_service
            )));
        }
        Ok(())
    }

    pub fn protocol(&self, protocol: Protocol) -> &ProtocolConfig {
        match protocol {
            Protocol::Http => &self.http,
            Protocol::Socks4 => &self.socks4,
            Protocol::Socks5 => &self.socks5,
        }
    }

    pub fn protocol_mut(&mut self, protocol: Protocol) -> &mut ProtocolConfig {
        match protocol {
            Protocol::Http => &mut self.http,
            Protocol::Socks4 => &mut self.socks4,
            Protocol::Socks5 => &mut self.socks5,
        }
    }

    /// Protocols switched on, in output order
    pub fn enabled_protocols(&self) -> Vec<Protocol> {
        Protocol::ALL
            .into_iter()
            .filter(|p| self.protocol(*p).enabled)
            .collect()
    }

    /// Keep only the given protocols enabled
    pub fn restrict_to(&mut self, protocols: &[Protocol]) {
        for protocol in Protocol::ALL {
            if !protocols.contains(&protocol) {
                self.protocol_mut(protocol).enabled = false;
            }
        }
    }

    /// Sources of the enabled protocols, duplicates removed
    pub fn sources(&self) -> Vec<ProxySource> {
        let mut seen = HashSet::new();
        self.enabled_protocols()
            .into_iter()
            .flat_map(|protocol| {
                self.protocol(protocol)
                    .sources
                    .iter()
                    .map(move |url| ProxySource::new(url, protocol))
            })
            .filter(|source| !source.url.is_empty() && seen.insert(source.clone()))
            .collect()
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig::new()
            .with_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_user_agent(self.user_agent.clone())
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig::new()
            .with_timeout(self.check_timeout())
            .with_ip_service(self.ip_service.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.fetch_timeout_secs, 15);
        assert_eq!(config.ip_service, "https://ident.me");
        assert!(config.geolocation_db.is_none());
        assert_eq!(config.max_concurrency, driver::DEFAULT_CONCURRENCY);
        assert_eq!(config.enabled_protocols(), Protocol::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
timeout_secs = 8
geolocation_db = "GeoLite2-City.mmdb"

[socks4]
enabled = false

[http]
sources = ["https://example.com/http.txt"]
"#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 8);
        assert_eq!(config.fetch_timeout_secs, 15);
        assert_eq!(
            config.geolocation_db,
            Some(PathBuf::from("GeoLite2-City.mmdb"))
        );
        assert_eq!(
            config.enabled_protocols(),
            vec![Protocol::Http, Protocol::Socks5]
        );
        assert_eq!(config.http.sources, vec!["https://example.com/http.txt"]);
        assert!(!config.socks5.sources.is_empty());
    }

    #[test]
    fn test_sources_deduplicated_per_protocol() {
        let mut config = Config::default();
        config.http.sources = vec![
            "https://a.example/list".to_string(),
            " https://a.example/list ".to_string(),
            "https://b.example/list".to_string(),
        ];
        config.socks4.sources = vec!["https://a.example/list".to_string()];
        config.socks5.enabled = false;

        let sources = config.sources();
        assert_eq!(
            sources,
            vec![
                ProxySource::new("https://a.example/list", Protocol::Http),
                ProxySource::new("https://b.example/list", Protocol::Http),
                ProxySource::new("https://a.example/list", Protocol::Socks4),
            ]
        );
    }

    #[test]
    fn test_restrict_to() {
        let mut config = Config::default();
        config.restrict_to(&[Protocol::Socks5]);
        assert_eq!(config.enabled_protocols(), vec![Protocol::Socks5]);
        assert!(config.sources().iter().all(|s| s.protocol == Protocol::Socks5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ip_service = "ident.me".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.max_concurrency = 0;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ip_service = \"http://127.0.0.1:1/ip\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.ip_service, "http://127.0.0.1:1/ip");

        let missing = Config::from_file("/definitely/not/config.toml");
        assert!(matches!(missing, Err(HarvestError::ConfigFile { .. })));
    }
}
