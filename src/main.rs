use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxy_harvester::{
    aggregator::compare_addresses, CandidateSets, Config, Harvester, Protocol, ProxyParser,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Scrape free proxy lists and keep the proxies that work
#[derive(Parser)]
#[command(name = "proxy-harvester")]
#[command(about = "Scrape free proxy lists and keep the proxies that work")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seconds to wait for each proxy
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Service answering with the caller's IP in plain text
    #[arg(long, global = true)]
    ip_service: Option<String>,

    /// GeoLite2-City database used to annotate proxies
    #[arg(short, long, global = true)]
    geolocation_db: Option<PathBuf>,

    /// Directory receiving the output folders
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Maximum number of requests in flight, 0 for no limit
    #[arg(short = 'n', long, global = true)]
    max_concurrency: Option<usize>,

    /// Protocols to harvest (http, socks4, socks5)
    #[arg(short, long, global = true, value_delimiter = ',')]
    protocols: Vec<Protocol>,

    /// Log every failed check
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch sources, check proxies and save the working ones (default)
    Run,
    /// Only fetch sources and list the unique candidates
    Crawl {
        /// File receiving the candidates instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check proxies from a local file and save the working ones
    Check {
        /// Input file containing proxies
        input: PathBuf,
        /// Protocol spoken by the proxies in the file
        #[arg(short = 't', long, default_value = "http")]
        protocol: Protocol,
    },
    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(ip_service) = &self.ip_service {
            config.ip_service = ip_service.trim().to_string();
        }
        if let Some(path) = &self.geolocation_db {
            config.geolocation_db = Some(path.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(limit) = self.max_concurrency {
            config.max_concurrency = limit;
        }
        if !self.protocols.is_empty() {
            config.restrict_to(&self.protocols);
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "proxy_harvester=debug"
    } else {
        "proxy_harvester=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config().context("failed to load configuration")?;

    match cli.command {
        Some(Commands::Run) | None => {
            let harvester = Harvester::from_config(config)?;
            let summary = harvester.run().await.context("harvest failed")?;

            info!("Result:");
            for line in summary.to_string().lines() {
                info!("{}", line);
            }
            info!(
                "Run started at {}",
                summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Some(Commands::Crawl { output }) => {
            let harvester = Harvester::from_config(config)?;
            let candidates = harvester.crawl().await;

            let mut lines = Vec::new();
            for (protocol, set) in &candidates {
                info!("Found {} unique {} proxies", set.len(), protocol);
                let mut set: Vec<_> = set.iter().collect();
                set.sort_by(|a, b| compare_addresses(&a.address, &b.address));
                lines.extend(set.into_iter().map(|c| c.url()));
            }

            match output {
                Some(path) => {
                    let mut content = lines.join("\n");
                    content.push('\n');
                    std::fs::write(&path, content)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("Saved {} proxies to {}", lines.len(), path.display());
                }
                None => {
                    for line in &lines {
                        println!("{}", line);
                    }
                }
            }
        }
        Some(Commands::Check { input, protocol }) => {
            let proxies = ProxyParser::parse_file(&input, protocol)?;
            info!("Loaded {} proxies from {}", proxies.len(), input.display());

            let mut candidates = CandidateSets::new();
            candidates.insert(protocol, proxies);

            let harvester = Harvester::from_config(config)?;
            let results = harvester.check(&candidates).await;
            harvester.save(&results).context("failed to save proxies")?;

            for (protocol, set) in &results {
                info!(
                    "{} - {} ({} anonymous)",
                    protocol,
                    set.len(),
                    set.anonymous_count()
                );
            }
        }
        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_crawl_output_file() {
        let cli = Cli::try_parse_from(["proxy-harvester", "crawl", "--output", "candidates.txt"])
            .unwrap();
        match cli.command {
            Some(Commands::Crawl { output }) => {
                assert_eq!(output, Some(PathBuf::from("candidates.txt")));
            }
            _ => panic!("expected crawl"),
        }
        assert!(cli.output_dir.is_none());
    }

    #[test]
    fn test_crawl_output_dir_still_global() {
        let cli = Cli::try_parse_from(["proxy-harvester", "crawl", "-o", "out"]).unwrap();
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert!(matches!(cli.command, Some(Commands::Crawl { output: None })));
    }
}
