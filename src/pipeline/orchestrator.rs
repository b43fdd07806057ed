//! Orchestrator: spawn the stages, link them, and shepherd the shutdown.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::analyzer::DepAnalyzer;
use crate::error::{CrawlError, error_chain};
use crate::graph::GraphStore;
use crate::graph::writer::{insert_module, insert_module_files};
use crate::ledger::SpecifierLedger;
use crate::pipeline::analysis::spawn_analyzer_workers;
use crate::pipeline::context::{PipelineHandles, create_pipeline_channels};
use crate::pipeline::discovery::watch_queue;
use crate::pipeline::error_handler::spawn_error_logger;
use crate::queue::WorkQueue;
use crate::registry::ModuleRegistry;
use crate::types::{AnalyzedModule, ModuleWork};
use crate::utils::config::PipelineConsts;

/// Run the crawl until cancellation (or until the queue closes): watcher and
/// discovery feed the queue, the module stage dequeues and writes `Module`
/// nodes, analyzers extract file graphs, writers commit them and acknowledge
/// the queue. Returns the number of errors the funnel logged.
pub fn run_pipeline<R, Q, A, G, L>(
    registry: Arc<R>,
    queue: Arc<Q>,
    analyzer: Arc<A>,
    graph: Arc<G>,
    ledger: Arc<L>,
    cancel: Arc<AtomicBool>,
    limit: Option<usize>,
) -> u64
where
    R: ModuleRegistry + 'static,
    Q: WorkQueue + 'static,
    A: DepAnalyzer + 'static,
    G: GraphStore + 'static,
    L: SpecifierLedger + 'static,
{
    let channels = create_pipeline_channels();

    let watcher = thread::spawn({
        let registry = Arc::clone(&registry);
        let queue = Arc::clone(&queue);
        let cancel = Arc::clone(&cancel);
        let err_tx = channels.err_tx.clone();
        move || watch_queue(registry, queue, cancel, err_tx, limit)
    });

    let module_stage = thread::spawn({
        let queue = Arc::clone(&queue);
        let graph = Arc::clone(&graph);
        let ledger = Arc::clone(&ledger);
        let cancel = Arc::clone(&cancel);
        let work_tx = channels.work_tx;
        let err_tx = channels.err_tx.clone();
        move || module_stage_loop(&*queue, &*graph, &*ledger, &cancel, work_tx, err_tx)
    });

    let analyzers = spawn_analyzer_workers(
        analyzer,
        channels.work_rx,
        channels.analyzed_tx,
        channels.err_tx.clone(),
        Arc::clone(&cancel),
    );

    let writers: Vec<_> = (0..PipelineConsts::WRITER_POOL_SIZE)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let graph = Arc::clone(&graph);
            let ledger = Arc::clone(&ledger);
            let cancel = Arc::clone(&cancel);
            let analyzed_rx = channels.analyzed_rx.clone();
            let err_tx = channels.err_tx.clone();
            thread::spawn(move || {
                writer_loop(&*queue, &*graph, &*ledger, &cancel, analyzed_rx, err_tx)
            })
        })
        .collect();

    // The stages hold their own clones; dropping these lets the channels
    // close once the stages exit.
    drop(channels.err_tx);
    drop(channels.analyzed_rx);

    let error_logger = spawn_error_logger(channels.err_rx);

    let handles = PipelineHandles {
        watcher,
        module_stage,
        analyzers,
        writers,
        error_logger,
    };
    join_pipeline(handles)
}

fn join_pipeline(handles: PipelineHandles) -> u64 {
    let _ = handles.watcher.join();
    let _ = handles.module_stage.join();
    for handle in handles.analyzers {
        let _ = handle.join();
    }
    for handle in handles.writers {
        let _ = handle.join();
    }
    let errors = handles.error_logger.join().unwrap_or(0);
    info!("pipeline drained ({} errors logged)", errors);
    errors
}

/// First writer stage: dequeue work units, write their `Module` node, and
/// pass the unit to the analyzers unchanged.
fn module_stage_loop<Q: WorkQueue, G: GraphStore, L: SpecifierLedger>(
    queue: &Q,
    graph: &G,
    ledger: &L,
    cancel: &AtomicBool,
    work_tx: Sender<ModuleWork>,
    err_tx: Sender<CrawlError>,
) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let work = match queue.get() {
            Ok(Some(work)) => work,
            Ok(None) => break,
            Err(err) => {
                let _ = err_tx.send(err.into());
                continue;
            }
        };
        if let Err(err) = insert_module(graph, ledger, &work) {
            let _ = err_tx.send(err);
        }
        if work_tx.send(work).is_err() {
            break;
        }
    }
    debug!("module stage exiting");
}

/// Final stage: commit each analyzed module's file graph and acknowledge its
/// queue message. A failed commit leaves the message in the queue.
fn writer_loop<Q: WorkQueue, G: GraphStore, L: SpecifierLedger>(
    queue: &Q,
    graph: &G,
    ledger: &L,
    cancel: &AtomicBool,
    analyzed_rx: Receiver<AnalyzedModule>,
    err_tx: Sender<CrawlError>,
) {
    let tick = Duration::from_millis(PipelineConsts::CANCEL_POLL_MS);
    loop {
        let module = match analyzed_rx.recv_timeout(tick) {
            Ok(module) => module,
            Err(RecvTimeoutError::Timeout) => {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        match insert_module_files(graph, ledger, &module) {
            Ok(()) => {
                if let Some(receipt) = &module.receipt
                    && let Err(err) = queue.delete(receipt)
                {
                    warn!(
                        "failed to acknowledge message for {}: {}",
                        module.name,
                        error_chain(&err)
                    );
                }
            }
            Err(err) => {
                let _ = err_tx.send(err);
            }
        }
    }
}
