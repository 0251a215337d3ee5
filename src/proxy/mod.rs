//! Proxy module for harvesting and checking proxies
//!
//! This module provides functionality for:
//! - Extracting candidates from proxy list text
//! - Fetching proxy lists from remote sources
//! - Checking candidates and recording their exit IP
//! - Running each phase concurrently behind a barrier
//! - Sorting and partitioning the working proxies
//! - Looking up the location of exit IPs

pub mod address;
pub mod aggregator;
pub mod checker;
pub mod crawler;
pub mod driver;
pub mod geo;
pub mod models;
pub mod parser;

pub use address::is_ipv4;
pub use aggregator::{aggregate, CandidateSets, ResultSet, Results};
pub use checker::{CheckerConfig, ProxyChecker, Verify};
pub use crawler::{CrawlerConfig, Fetch, ProxyCrawler};
pub use driver::PhaseDriver;
pub use geo::{GeoLocator, GeoLookup, GeoRecord};
pub use models::{Candidate, Protocol, ProxySource, WorkingProxy};
pub use parser::ProxyParser;
