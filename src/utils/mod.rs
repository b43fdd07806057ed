pub mod config;
pub mod logger;

pub use logger::setup_logging;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Sleep up to `duration`, returning early once the cancel flag is set.
pub fn sleep_with_cancel(duration: Duration, cancel: &AtomicBool) {
    let tick = Duration::from_millis(config::PipelineConsts::CANCEL_POLL_MS);
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        std::thread::sleep(tick.min(deadline.saturating_duration_since(Instant::now())));
    }
}
