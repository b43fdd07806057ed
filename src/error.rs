//! Crate-wide error funnel.
//!
//! Each subsystem defines its own error enum next to its code; this module
//! wraps them into the single type carried on the pipeline's error channel.

use thiserror::Error;

use crate::analyzer::AnalyzerError;
use crate::graph::GraphError;
use crate::ledger::LedgerError;
use crate::queue::QueueError;
use crate::registry::RegistryError;

/// Any recoverable failure surfaced by a pipeline stage. None of these abort
/// the crawl; they are logged and the affected name, file, or module is
/// skipped and retried through queue redelivery.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Render an error with its full source chain on one line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
