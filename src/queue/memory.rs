//! In-memory queue over a bounded channel, for tests and single-run crawls.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::types::ModuleWork;
use crate::utils::config::PipelineConsts;

use super::{QueueError, WorkQueue};

/// Channel-backed queue. `delete` is a no-op (nothing is redelivered) and
/// `approx_depth` is the channel length.
pub struct ChanQueue {
    tx: Sender<ModuleWork>,
    rx: Receiver<ModuleWork>,
    cancel: Arc<AtomicBool>,
}

impl ChanQueue {
    pub fn new(cap: usize, cancel: Arc<AtomicBool>) -> Self {
        let (tx, rx) = bounded(cap);
        ChanQueue { tx, rx, cancel }
    }
}

impl WorkQueue for ChanQueue {
    fn put(&self, work: &ModuleWork) -> Result<(), QueueError> {
        let tick = Duration::from_millis(PipelineConsts::CANCEL_POLL_MS);
        let mut pending = work.clone();
        loop {
            match self.tx.send_timeout(pending, tick) {
                Ok(()) => return Ok(()),
                Err(crossbeam_channel::SendTimeoutError::Timeout(back)) => {
                    if self.cancel.load(Ordering::Relaxed) {
                        return Err(QueueError::Closed);
                    }
                    pending = back;
                }
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                    return Err(QueueError::Closed);
                }
            }
        }
    }

    fn get(&self) -> Result<Option<ModuleWork>, QueueError> {
        let tick = Duration::from_millis(PipelineConsts::CANCEL_POLL_MS);
        loop {
            match self.rx.recv_timeout(tick) {
                Ok(work) => return Ok(Some(work)),
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }

    fn delete(&self, _receipt: &str) -> Result<(), QueueError> {
        Ok(())
    }

    fn approx_depth(&self) -> Result<u64, QueueError> {
        Ok(self.rx.len() as u64)
    }

    fn is_open(&self) -> bool {
        !self.cancel.load(Ordering::Relaxed)
    }
}
