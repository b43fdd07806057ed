//! Durable work queue of module work units, plus an in-memory stand-in.

pub mod durable;
pub mod memory;

pub use durable::SqsQueue;
pub use memory::ChanQueue;

use thiserror::Error;

use crate::types::ModuleWork;

/// Failures talking to the queue service. Logged and retried at the next
/// tick; the pipeline continues.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue request {action} failed")]
    Request {
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("queue call {action} returned status {status}: {message}")]
    Api {
        action: &'static str,
        status: u16,
        message: String,
    },

    #[error("failed to encode work unit")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode queue response for {action}")]
    Decode {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("queue is closed")]
    Closed,
}

/// The queue every stage sees. Implementations do not guarantee ordering
/// across producers; duplicate delivery is tolerated because the writer
/// dedups through the ledger.
pub trait WorkQueue: Send + Sync {
    /// Enqueue one work unit. Blocks under back-pressure.
    fn put(&self, work: &ModuleWork) -> Result<(), QueueError>;

    /// Blocking dequeue. `Ok(None)` once the queue is closed or the crawl
    /// is cancelled.
    fn get(&self) -> Result<Option<ModuleWork>, QueueError>;

    /// Acknowledge a delivered message so it is not redelivered.
    fn delete(&self, receipt: &str) -> Result<(), QueueError>;

    /// Approximate number of work units the queue still holds.
    fn approx_depth(&self) -> Result<u64, QueueError>;

    fn is_open(&self) -> bool;
}
