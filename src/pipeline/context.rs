//! Channel wiring and worker handles for the crawl pipeline.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::JoinHandle;

use crate::error::CrawlError;
use crate::types::{AnalyzedModule, ModuleWork};
use crate::utils::config::PipelineConsts;

/// Bounded channels linking the stages. The work channel sits between the
/// module-node stage and the analyzers; the analyzed channel between the
/// analyzers and the writers; every stage holds a clone of the error sender.
pub struct PipelineChannels {
    pub work_tx: Sender<ModuleWork>,
    pub work_rx: Receiver<ModuleWork>,
    pub analyzed_tx: Sender<AnalyzedModule>,
    pub analyzed_rx: Receiver<AnalyzedModule>,
    pub err_tx: Sender<CrawlError>,
    pub err_rx: Receiver<CrawlError>,
}

pub fn create_pipeline_channels() -> PipelineChannels {
    let (work_tx, work_rx) = bounded(PipelineConsts::STAGE_CHANNEL_CAP);
    let (analyzed_tx, analyzed_rx) = bounded(PipelineConsts::STAGE_CHANNEL_CAP);
    let (err_tx, err_rx) = bounded(PipelineConsts::STAGE_CHANNEL_CAP);
    PipelineChannels {
        work_tx,
        work_rx,
        analyzed_tx,
        analyzed_rx,
        err_tx,
        err_rx,
    }
}

/// Handles for every worker the orchestrator spawned; joined on shutdown.
pub struct PipelineHandles {
    pub watcher: JoinHandle<()>,
    pub module_stage: JoinHandle<()>,
    pub analyzers: Vec<JoinHandle<()>>,
    pub writers: Vec<JoinHandle<()>>,
    pub error_logger: JoinHandle<u64>,
}
