//! Error types for the harvester

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the harvester library
#[derive(Error, Debug)]
pub enum HarvestError {
    // Source errors, recovered inside the fetcher and only logged
    #[error("{url}: {source}")]
    SourceFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} status code: {status}")]
    SourceStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    // Output errors abort the run
    #[error("Failed to write output at {}: {}", .path.display(), .source)]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open geolocation database {}: {}", .path.display(), .source)]
    GeoDatabase {
        path: PathBuf,
        #[source]
        source: maxminddb::MaxMindDbError,
    },

    // Configuration and input errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read config file {}: {}", .path.display(), .source)]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {}", .path.display(), .source)]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read proxy list {}: {}", .path.display(), .source)]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl HarvestError {
    /// Whether the run can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::SourceFetch { .. } | HarvestError::SourceStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = HarvestError::SourceStatus {
            url: "https://example.com/list".to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        };
        assert_eq!(
            err.to_string(),
            "https://example.com/list status code: 404 Not Found"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_persistence_is_fatal() {
        let err = HarvestError::Persistence {
            path: PathBuf::from("proxies"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("proxies"));
    }
}
