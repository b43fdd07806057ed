//! Discovery: walk the registry into work units, and keep the queue fed.

use crossbeam_channel::{Sender, bounded};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::CrawlError;
use crate::metrics::QUEUE_DEPTH;
use crate::queue::WorkQueue;
use crate::registry::ModuleRegistry;
use crate::types::ModuleWork;
use crate::utils::config::{PipelineConsts, QueueConsts};
use crate::utils::sleep_with_cancel;

/// One full discovery pass: list every module name (optionally capped), then
/// fan the names over a bounded worker pool that lists versions and filtered
/// files and enqueues one work unit per module. Returns once every worker
/// has drained, which doubles as the completion signal for the watcher.
pub fn crawl_registry<R, Q>(
    registry: &Arc<R>,
    queue: &Arc<Q>,
    cancel: &Arc<AtomicBool>,
    err_tx: &Sender<CrawlError>,
    limit: Option<usize>,
) where
    R: ModuleRegistry + 'static,
    Q: WorkQueue + 'static,
{
    let mut names = match registry.list_modules() {
        Ok(names) => names,
        Err(err) => {
            let _ = err_tx.send(err.into());
            return;
        }
    };
    if let Some(cap) = limit {
        names.truncate(cap);
    }
    info!("discovery pass over {} modules", names.len());

    let (name_tx, name_rx) = bounded::<String>(PipelineConsts::DISCOVERY_WORKERS);
    let workers: Vec<_> = (0..PipelineConsts::DISCOVERY_WORKERS)
        .map(|_| {
            let name_rx = name_rx.clone();
            let registry = Arc::clone(registry);
            let queue = Arc::clone(queue);
            let cancel = Arc::clone(cancel);
            let err_tx = err_tx.clone();
            thread::spawn(move || {
                while let Ok(name) = name_rx.recv() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    discover_module(&*registry, &*queue, &cancel, &err_tx, &name);
                }
            })
        })
        .collect();

    for name in names {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if name_tx.send(name).is_err() {
            break;
        }
    }
    drop(name_tx);
    for handle in workers {
        let _ = handle.join();
    }
}

/// List one module's versions and files and enqueue its work unit. Registry
/// failures skip the affected version (or the whole module when the version
/// listing itself fails); a cancelled module is never half-enqueued.
fn discover_module<R: ModuleRegistry, Q: WorkQueue>(
    registry: &R,
    queue: &Q,
    cancel: &AtomicBool,
    err_tx: &Sender<CrawlError>,
    name: &str,
) {
    let listed = match registry.list_versions(name) {
        Ok(listed) => listed,
        Err(err) => {
            let _ = err_tx.send(err.into());
            return;
        }
    };

    let mut versions = BTreeMap::new();
    for version in &listed.versions {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        match registry.list_files(name, version) {
            Ok(files) => {
                versions.insert(version.clone(), files);
            }
            Err(err) => {
                let _ = err_tx.send(err.into());
            }
        }
    }
    if cancel.load(Ordering::Relaxed) {
        return;
    }

    let work = ModuleWork {
        name: name.to_string(),
        versions,
        receipt: None,
    };
    if let Err(err) = queue.put(&work) {
        let _ = err_tx.send(err.into());
    } else {
        debug!("enqueued {}", name);
    }
}

/// Watch the queue depth and re-run discovery whenever it falls below the
/// refill threshold. Runs until cancellation or until the queue closes.
pub fn watch_queue<R, Q>(
    registry: Arc<R>,
    queue: Arc<Q>,
    cancel: Arc<AtomicBool>,
    err_tx: Sender<CrawlError>,
    limit: Option<usize>,
) where
    R: ModuleRegistry + 'static,
    Q: WorkQueue + 'static,
{
    while !cancel.load(Ordering::Relaxed) && queue.is_open() {
        match queue.approx_depth() {
            Ok(depth) => {
                QUEUE_DEPTH.set(depth as i64);
                if depth < QueueConsts::REFILL_THRESHOLD {
                    info!("queue depth {} below threshold, running discovery", depth);
                    crawl_registry(&registry, &queue, &cancel, &err_tx, limit);
                }
            }
            Err(err) => {
                let _ = err_tx.send(err.into());
            }
        }
        sleep_with_cancel(Duration::from_secs(QueueConsts::WATCH_TICK_SECS), &cancel);
    }
    debug!("queue watcher exiting");
}
