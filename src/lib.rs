//! Modgraph: crawl a module registry and materialize file-level dependency
//! graphs.
//!
//! Dataflow: registry discovery feeds a durable work queue; the pipeline
//! dequeues module work units, writes their `Module` node, runs the external
//! analyzer over every file, and commits each module's file graph in one
//! transaction, deduplicating specifiers across crawls through a
//! specifier → identity ledger.

pub mod analyzer;
pub mod cli;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use anyhow::Context;
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Result alias used by the public API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

use crate::analyzer::ExecAnalyzer;
use crate::cli::Cli;
use crate::graph::{DgraphClient, GraphStore, SCHEMA};
use crate::ledger::SqliteLedger;
use crate::pipeline::run_pipeline;
use crate::queue::{ChanQueue, SqsQueue};
use crate::registry::{HttpRegistry, ThrottledClient};
use crate::utils::config::{QueueConsts, ThrottleConsts, default_queue_endpoint};

/// Single entry point: bring up every collaborator, then run the pipeline
/// until cancellation. Anything that fails in here is a startup failure and
/// exits the process; past this point the crawl only logs and retries.
pub fn run(cli: &Cli) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    })
    .context("set termination handler")?;

    let analyzer = Arc::new(ExecAnalyzer::new(Arc::clone(&cancel)));
    analyzer.probe().context("analyzer is not invocable")?;

    let graph = Arc::new(DgraphClient::new(&cli.alpha));
    graph.alter(SCHEMA).context("initialize graph schema")?;
    info!("graph schema initialized");

    let ledger = Arc::new(
        SqliteLedger::open(&cli.ledger_path()).context("open specifier ledger")?,
    );

    metrics::spawn_metrics_server(cli.metrics_port);

    let interval = Duration::from_millis(cli.throttle_ms.unwrap_or(ThrottleConsts::INTERVAL_MS));
    let registry = Arc::new(HttpRegistry::new(ThrottledClient::new(interval)));

    if cli.memory_queue {
        let queue = Arc::new(ChanQueue::new(QueueConsts::BUFFER, Arc::clone(&cancel)));
        run_pipeline(registry, queue, analyzer, graph, ledger, cancel, cli.limit);
    } else {
        let queue_url = cli
            .queue_url
            .clone()
            .context("--queue-url is required without --memory-queue")?;
        let endpoint = cli
            .queue_endpoint
            .clone()
            .unwrap_or_else(default_queue_endpoint);
        let queue = Arc::new(SqsQueue::connect(endpoint, queue_url, Arc::clone(&cancel)));
        run_pipeline(registry, queue, analyzer, graph, ledger, cancel, cli.limit);
    }

    info!("done");
    Ok(())
}
