//! Two-phase harvest pipeline
//!
//! Fetch every source, merge candidates per protocol, check every
//! candidate once, then sort, annotate and save. Each phase finishes
//! completely before the next one starts, and every run starts from empty
//! containers and empty output folders.

use crate::config::Config;
use crate::output::{Category, OutputWriter};
use crate::proxy::aggregator::{aggregate, CandidateSets, ResultSet, Results};
use crate::proxy::checker::{ProxyChecker, Verify};
use crate::proxy::crawler::{Fetch, ProxyCrawler};
use crate::proxy::driver::PhaseDriver;
use crate::proxy::geo::{GeoLocator, GeoLookup};
use crate::proxy::models::{Candidate, Protocol, ProxySource};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Counts for one protocol at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolSummary {
    pub candidates: usize,
    pub working: usize,
    pub anonymous: usize,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub protocols: BTreeMap<Protocol, ProtocolSummary>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (protocol, counts) in &self.protocols {
            writeln!(
                f,
                "{} - {} ({} anonymous, {} checked)",
                protocol, counts.working, counts.anonymous, counts.candidates
            )?;
        }
        write!(f, "finished in {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Lines destined for one output file
type Lines = BTreeMap<(Category, Protocol), Vec<String>>;

/// Pipeline wiring a fetcher and a verifier to the output folders
pub struct Harvester<F, P> {
    config: Config,
    fetcher: Arc<F>,
    verifier: Arc<P>,
    driver: PhaseDriver,
}

impl Harvester<ProxyCrawler, ProxyChecker> {
    /// Harvester talking to the real network
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = ProxyCrawler::with_config(config.crawler_config())?;
        let verifier = ProxyChecker::with_config(config.checker_config());
        Ok(Self::new(config, fetcher, verifier))
    }
}

impl<F, P> Harvester<F, P>
where
    F: Fetch + 'static,
    P: Verify + 'static,
{
    pub fn new(config: Config, fetcher: F, verifier: P) -> Self {
        let driver = PhaseDriver::new(config.max_concurrency, config.check_timeout());
        Self {
            config,
            fetcher: Arc::new(fetcher),
            verifier: Arc::new(verifier),
            driver,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch, check and save everything the configuration asks for
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let start = Instant::now();

        let candidates = self.crawl().await;
        let results = self.check(&candidates).await;
        self.save(&results)?;

        let protocols = candidates
            .iter()
            .map(|(protocol, set)| {
                let result = results.get(protocol);
                let summary = ProtocolSummary {
                    candidates: set.len(),
                    working: result.map_or(0, ResultSet::len),
                    anonymous: result.map_or(0, ResultSet::anonymous_count),
                };
                (*protocol, summary)
            })
            .collect();

        Ok(RunSummary {
            started_at,
            elapsed: start.elapsed(),
            protocols,
        })
    }

    /// Fetch phase: every source at once, merged per enabled protocol
    pub async fn crawl(&self) -> CandidateSets {
        let sources = self.config.sources();
        self.crawl_sources(sources).await
    }

    async fn crawl_sources(&self, sources: Vec<ProxySource>) -> CandidateSets {
        info!("Getting {} sources", sources.len());

        let tasks: Vec<_> = sources
            .into_iter()
            .map(|source| {
                let fetcher = Arc::clone(&self.fetcher);
                async move { fetcher.fetch(&source).await }
            })
            .collect();
        let fetched = self.driver.run("fetch", tasks).await;

        let mut candidates: CandidateSets = self
            .config
            .enabled_protocols()
            .into_iter()
            .map(|protocol| (protocol, HashSet::new()))
            .collect();
        for candidate in fetched.into_iter().flatten() {
            candidates
                .entry(candidate.protocol)
                .or_default()
                .insert(candidate);
        }
        candidates
    }

    /// Check phase: every candidate checked once, then sorted per protocol
    pub async fn check(&self, candidates: &CandidateSets) -> Results {
        for (protocol, set) in candidates {
            info!("Checking {} {} proxies", set.len(), protocol);
        }

        let tasks: Vec<_> = candidates
            .values()
            .flatten()
            .cloned()
            .map(|candidate| {
                let verifier = Arc::clone(&self.verifier);
                async move {
                    let exit_ip = verifier.verify(&candidate).await;
                    (candidate, exit_ip)
                }
            })
            .collect();
        let checked = self.driver.run("check", tasks).await;

        let exit_ips: HashMap<Candidate, String> = checked
            .into_iter()
            .filter_map(|(candidate, exit_ip)| exit_ip.map(|ip| (candidate, ip)))
            .collect();

        aggregate(candidates, &exit_ips)
    }

    /// Annotate and write the results, replacing the previous run's output
    pub fn save(&self, results: &Results) -> Result<()> {
        let mut lines = plain_lines(results);

        // The database is open only while the geolocation lines are built,
        // and before anything on disk is touched.
        let geolocation = match &self.config.geolocation_db {
            Some(path) => {
                info!("Reading geolocation from {}", path.display());
                let locator = GeoLocator::from_path(path)?;
                lines.extend(geolocation_lines(results, &locator));
                true
            }
            None => false,
        };

        let protocols: Vec<_> = results.keys().copied().collect();
        self.write(&protocols, &lines, geolocation)
    }

    fn write(&self, protocols: &[Protocol], lines: &Lines, geolocation: bool) -> Result<()> {
        let output = OutputWriter::new(self.output_dir());
        let categories = output.reset(geolocation)?;

        for category in categories {
            for &protocol in protocols {
                let entries = lines
                    .get(&(category, protocol))
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                output.write(category, protocol, entries)?;
            }
        }
        Ok(())
    }

    fn output_dir(&self) -> PathBuf {
        self.config.output_dir.clone()
    }
}

/// `host:port` lines for the plain folders
fn plain_lines(results: &Results) -> Lines {
    let mut lines = Lines::new();
    for (protocol, set) in results {
        lines.insert(
            (Category::All, *protocol),
            set.all().map(|p| p.address().to_string()).collect(),
        );
        lines.insert(
            (Category::Anonymous, *protocol),
            set.anonymous().map(|p| p.address().to_string()).collect(),
        );
    }
    lines
}

/// `host:port::country::region::city` lines, located by exit IP
pub fn geolocation_lines(results: &Results, geo: &dyn GeoLookup) -> Lines {
    let mut lines = Lines::new();
    for (protocol, set) in results {
        let mut all = Vec::with_capacity(set.len());
        let mut anonymous = Vec::new();
        for proxy in set.all() {
            let line = geo.locate(&proxy.exit_ip).annotate(proxy.address());
            if proxy.is_anonymous() {
                anonymous.push(line.clone());
            }
            all.push(line);
        }
        lines.insert((Category::Geolocation, *protocol), all);
        lines.insert((Category::GeolocationAnonymous, *protocol), anonymous);
    }
    lines
}
