//! Error funnel: every stage's failures end up logged in one place.

use crossbeam_channel::Receiver;
use log::error;
use std::thread::{self, JoinHandle};

use crate::error::{CrawlError, error_chain};

/// Drain the merged error channel until every sender is gone. Returns the
/// number of errors seen, for the shutdown summary.
pub fn spawn_error_logger(err_rx: Receiver<CrawlError>) -> JoinHandle<u64> {
    thread::spawn(move || {
        let mut count = 0_u64;
        for err in err_rx.iter() {
            count += 1;
            error!("{}", error_chain(&err));
        }
        count
    })
}
