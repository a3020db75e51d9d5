use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use proxy_harvester::{
    proxy::{
        fetcher::DEFAULT_USER_AGENT, CartridgeKind, HttpFetcher, ManagerState, PipelineEvent, ProxyManager, ProxyParser,
        ProxyType,
    },
    ManagerConfig, SourceConfig, ValidationMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// A proxy scraper and validator for free proxy listing sites
#[derive(Parser)]
#[command(name = "proxy-harvester")]
#[command(about = "A proxy scraper and validator for free proxy listing sites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the selected sources and validate what they list
    Run {
        /// Built-in sources to scrape (defaults to all of them)
        #[arg(short, long)]
        source: Vec<String>,
        /// Plain-text proxy list URLs to scrape; `{PAGENO}` marks the page number
        #[arg(short, long)]
        url: Vec<String>,
        /// Proxy type assumed for plain-text lists (http, https, socks4, socks5)
        #[arg(short = 't', long, default_value = "http")]
        proxy_type: String,
        /// Number of validation workers
        #[arg(short = 'n', long, default_value = "10")]
        workers: usize,
        /// Start validating once this many proxies are pooled, while scraping continues
        #[arg(long)]
        streaming: Option<usize>,
        /// Scrape sources one after another
        #[arg(long)]
        sequential_sources: bool,
        /// Only scrape, skip validation
        #[arg(long)]
        no_validate: bool,
        /// Timeout in seconds for every fetch and probe
        #[arg(long, default_value = "10")]
        timeout: u64,
        /// Attempts per listing page
        #[arg(long, default_value = "3")]
        retries: u32,
        /// Pause between attempts in milliseconds
        #[arg(long, default_value = "2000")]
        retry_delay: u64,
        /// URL to test proxies against
        #[arg(long, default_value = "http://httpbin.org/ip")]
        test_url: String,
        /// Text the test response must contain
        #[arg(long)]
        expect: Option<String>,
        /// MaxMind city database for locating unlisted proxies
        #[arg(long)]
        mmdb: Option<String>,
        /// Output file for working proxies
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the built-in sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Sources => {
            for kind in CartridgeKind::all() {
                match kind.default_template() {
                    Some(template) => println!("{:<18} {}", kind.default_id(), template),
                    None => println!("{:<18} (requires --url)", kind.default_id()),
                }
            }
        }
        Commands::Run {
            source,
            url,
            proxy_type,
            workers,
            streaming,
            sequential_sources,
            no_validate,
            timeout,
            retries,
            retry_delay,
            test_url,
            expect,
            mmdb,
            output,
        } => {
            let ptype = ProxyType::from_label(&proxy_type)
                .ok_or_else(|| anyhow!("Invalid proxy type: {}. Use: http, https, socks4, socks5", proxy_type))?;

            let mut config = ManagerConfig::new()
                .with_workers(workers)
                .with_auto_validate(!no_validate)
                .with_concurrent_sources(!sequential_sources)
                .with_timeout(Duration::from_secs(timeout))
                .with_retry(retries, Duration::from_millis(retry_delay))
                .with_test_url(test_url);
            if let Some(threshold) = streaming {
                config = config.with_mode(ValidationMode::Streaming { threshold });
            }
            if let Some(marker) = expect {
                config = config.with_expect_body(marker);
            }
            if let Some(path) = mmdb {
                config = config.with_mmdb_path(path);
            }

            for name in builtin_sources(&source, url.is_empty())? {
                config = config.with_source(SourceConfig::builtin(name));
            }
            for (i, list_url) in url.iter().enumerate() {
                let id = format!("{}-{}", CartridgeKind::PlainText.default_id(), i + 1);
                config = config.with_source(
                    SourceConfig::new(&id, CartridgeKind::PlainText)
                        .with_url(list_url)
                        .with_proxy_type(ptype),
                );
            }

            let fetcher = HttpFetcher::with_settings(Duration::from_secs(timeout), DEFAULT_USER_AGENT)?;
            let manager = Arc::new(ProxyManager::new(config, Arc::new(fetcher))?);

            let progress = tokio::spawn(print_progress(manager.subscribe()));
            let run = Arc::clone(&manager).spawn();

            let stopper = Arc::clone(&manager);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stopper.shutdown();
                }
            });

            let summary = run.await??;
            progress.abort();

            println!(
                "\nResults: {} pages, {} working, {} removed",
                summary.total_pages, summary.checked, summary.removed
            );

            let proxies = if no_validate {
                manager.pool().snapshot(|_| true)
            } else {
                manager.checked_proxies()
            };

            if let Some(output_path) = output {
                ProxyParser::save_to_file(&proxies, &output_path, true)?;
                println!("Saved {} proxies to {:?}", proxies.len(), output_path);
            } else {
                for proxy in &proxies {
                    match proxy.latency_ms {
                        Some(time) => println!("  {} ({}ms)", proxy.to_full_string(), time),
                        None => println!("  {}", proxy.to_full_string()),
                    }
                }
            }
        }
    }

    Ok(())
}

/// Sets up the tracing subscriber; `RUST_LOG` wins over the verbosity flag
fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("proxy_harvester=info,warn"),
        1 => EnvFilter::new("proxy_harvester=debug,info"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolve source names; no names and no URLs means every HTML source
fn builtin_sources(names: &[String], default_all: bool) -> Result<Vec<CartridgeKind>> {
    if names.is_empty() {
        let all = CartridgeKind::all()
            .iter()
            .copied()
            .filter(|kind| *kind != CartridgeKind::PlainText);
        return Ok(if default_all { all.collect() } else { Vec::new() });
    }

    names
        .iter()
        .map(|name| match CartridgeKind::from_name(name) {
            Some(CartridgeKind::PlainText) => Err(anyhow!("Use --url to add plain-text lists")),
            Some(kind) => Ok(kind),
            None => Err(anyhow!("Unknown source: {}. See `proxy-harvester sources`", name)),
        })
        .collect()
}

async fn print_progress(mut events: tokio::sync::broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(PipelineEvent::PageParsed {
                url, records, inserted, ..
            }) => {
                println!("Found {} proxies ({} new) from {}", records.len(), inserted, url);
            }
            Ok(PipelineEvent::StateChanged(ManagerState::Validating)) => {
                println!("Checking proxies...");
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}
