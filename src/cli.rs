use clap::Parser;
use std::path::PathBuf;

use crate::utils::config;

/// Crawl a module registry into a file-level dependency graph.
#[derive(Clone, Parser)]
#[command(name = "modgraph")]
#[command(about = "Crawl the module registry and write file dependency graphs.")]
pub struct Cli {
    /// Graph alpha HTTP endpoint.
    #[arg(long, default_value = config::DEFAULT_ALPHA)]
    pub alpha: String,

    /// Queue service endpoint. Default: derived from AWS_REGION.
    #[arg(long)]
    pub queue_endpoint: Option<String>,

    /// URL of the crawl queue. Required unless --memory-queue is set.
    #[arg(long)]
    pub queue_url: Option<String>,

    /// Use an in-process queue instead of the durable service (single-run
    /// crawls; nothing survives a restart).
    #[arg(long)]
    pub memory_queue: bool,

    /// Path to the specifier ledger database. Default: `modgraph-ledger.db`
    /// in the working directory.
    #[arg(long, short)]
    pub ledger: Option<PathBuf>,

    /// Cap the number of modules discovered per pass (development).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Minimum interval between registry requests, in milliseconds.
    #[arg(long)]
    pub throttle_ms: Option<u64>,

    /// Port for the metrics endpoint.
    #[arg(long, default_value_t = config::METRICS_PORT)]
    pub metrics_port: u16,

    /// Verbose output.
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// Get the ledger path, defaulting to the package ledger filename.
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger
            .clone()
            .unwrap_or_else(|| PathBuf::from(config::DEFAULT_LEDGER_FILE))
    }
}
