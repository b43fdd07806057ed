//! Analyzer stage: turn dequeued work units into per-module file graphs.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::analyzer::DepAnalyzer;
use crate::error::CrawlError;
use crate::types::{AnalyzedModule, ModuleWork, VersionAnalysis, file_specifier};
use crate::utils::config::PipelineConsts;

/// Spawn the analyzer worker pool: each worker drains the work channel,
/// invokes the analyzer once per `(version, file)` pair, and forwards the
/// assembled module downstream.
pub fn spawn_analyzer_workers<A>(
    analyzer: Arc<A>,
    work_rx: Receiver<ModuleWork>,
    analyzed_tx: Sender<AnalyzedModule>,
    err_tx: Sender<CrawlError>,
    cancel: Arc<AtomicBool>,
) -> Vec<JoinHandle<()>>
where
    A: DepAnalyzer + 'static,
{
    (0..PipelineConsts::ANALYZER_WORKERS)
        .map(|_| {
            let analyzer = Arc::clone(&analyzer);
            let work_rx = work_rx.clone();
            let analyzed_tx = analyzed_tx.clone();
            let err_tx = err_tx.clone();
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || {
                analyzer_loop(&*analyzer, work_rx, analyzed_tx, err_tx, cancel)
            })
        })
        .collect()
}

fn analyzer_loop<A: DepAnalyzer>(
    analyzer: &A,
    work_rx: Receiver<ModuleWork>,
    analyzed_tx: Sender<AnalyzedModule>,
    err_tx: Sender<CrawlError>,
    cancel: Arc<AtomicBool>,
) {
    let tick = Duration::from_millis(PipelineConsts::CANCEL_POLL_MS);
    loop {
        let work = match work_rx.recv_timeout(tick) {
            Ok(work) => work,
            Err(RecvTimeoutError::Timeout) => {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        let Some(analyzed) = analyze_module(analyzer, &err_tx, &cancel, work) else {
            // Cancelled mid-module: the message stays unacknowledged and is
            // redelivered on the next run.
            return;
        };
        if analyzed_tx.send(analyzed).is_err() {
            return;
        }
    }
}

/// Run the analyzer over every file of every version. Per-file failures are
/// surfaced and skipped; the remaining files proceed. Returns `None` when
/// cancellation was observed mid-module.
fn analyze_module<A: DepAnalyzer>(
    analyzer: &A,
    err_tx: &Sender<CrawlError>,
    cancel: &AtomicBool,
    work: ModuleWork,
) -> Option<AnalyzedModule> {
    let mut versions = Vec::with_capacity(work.versions.len());
    for (version, files) in &work.versions {
        let mut infos = Vec::new();
        for entry in files {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let specifier = file_specifier(&work.name, version, &entry.path);
            match analyzer.analyze(&specifier) {
                Ok(Some(info)) => infos.push(info),
                Ok(None) => return None,
                Err(err) => {
                    let _ = err_tx.send(err.into());
                }
            }
        }
        versions.push(VersionAnalysis {
            version: version.clone(),
            infos,
        });
    }
    debug!("analyzed {} ({} versions)", work.name, versions.len());
    Some(AnalyzedModule {
        name: work.name,
        receipt: work.receipt,
        versions,
    })
}
