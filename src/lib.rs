//! Proxy Harvester - free proxy list scraper and checker
//!
//! Fetches proxy lists from remote sources, checks every proxy by asking an
//! IP echo service through it, and saves the working ones sorted by address,
//! split into all/anonymous and optionally annotated with geolocation.

pub mod config;
pub mod error;
pub mod harvester;
pub mod output;
pub mod proxy;

pub use config::Config;
pub use error::HarvestError;
pub use harvester::{Harvester, ProtocolSummary, RunSummary};
pub use proxy::*;

/// Library result type
pub type Result<T> = std::result::Result<T, HarvestError>;
