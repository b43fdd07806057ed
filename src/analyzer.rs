//! Per-file dependency extraction through the external analyzer subprocess.

use log::debug;
use std::io::BufReader;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::types::FileInfo;
use crate::utils::config::{ANALYZER_TERM_GRACE_MS, ANALYZER_WAIT_POLL_MS, analyzer_bin};

/// Failures of one analyzer invocation. The affected file is skipped; the
/// rest of the module proceeds.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("failed to spawn analyzer `{bin}`")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analyzer stdout was not captured")]
    Pipe,

    #[error("failed to decode analyzer output for {specifier}")]
    Decode {
        specifier: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("analyzer exited with status {code:?} for {specifier}")]
    Exit { specifier: String, code: Option<i32> },

    #[error("analyzer `{bin}` probe exited with status {code:?}")]
    Probe { bin: String, code: Option<i32> },

    #[error("failed to wait on analyzer")]
    Wait(#[source] std::io::Error),
}

/// Extracts the dependency closure of one file specifier. The subprocess
/// implementation is [`ExecAnalyzer`]; tests substitute a canned one.
pub trait DepAnalyzer: Send + Sync {
    /// `Ok(None)` means the call observed cancellation; it is not an error.
    fn analyze(&self, specifier: &str) -> Result<Option<FileInfo>, AnalyzerError>;
}

/// Runs `<bin> info --unstable --json <specifier>` and decodes its stdout.
pub struct ExecAnalyzer {
    bin: String,
    cancel: Arc<AtomicBool>,
}

impl ExecAnalyzer {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        ExecAnalyzer::with_bin(analyzer_bin(), cancel)
    }

    /// Analyzer with an explicit binary, bypassing env and PATH resolution.
    pub fn with_bin(bin: String, cancel: Arc<AtomicBool>) -> Self {
        ExecAnalyzer { bin, cancel }
    }

    /// Startup probe: the analyzer must be invocable before the pipeline is
    /// allowed to run.
    pub fn probe(&self) -> Result<(), AnalyzerError> {
        let status = Command::new(&self.bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| AnalyzerError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;
        if !status.success() {
            return Err(AnalyzerError::Probe {
                bin: self.bin.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

impl DepAnalyzer for ExecAnalyzer {
    fn analyze(&self, specifier: &str) -> Result<Option<FileInfo>, AnalyzerError> {
        let mut child = Command::new(&self.bin)
            .args(["info", "--unstable", "--json"])
            .arg(specifier)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AnalyzerError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(AnalyzerError::Pipe)?;
        let decoded: Result<FileInfo, serde_json::Error> =
            serde_json::from_reader(BufReader::new(stdout));

        let status = loop {
            if self.cancel.load(Ordering::Relaxed) {
                debug!("cancel observed, stopping analyzer for {}", specifier);
                terminate(&mut child);
                return Ok(None);
            }
            match child.try_wait().map_err(AnalyzerError::Wait)? {
                Some(status) => break status,
                None => thread::sleep(Duration::from_millis(ANALYZER_WAIT_POLL_MS)),
            }
        };

        let info = decoded.map_err(|source| AnalyzerError::Decode {
            specifier: specifier.to_string(),
            source,
        })?;
        if !status.success() {
            return Err(AnalyzerError::Exit {
                specifier: specifier.to_string(),
                code: status.code(),
            });
        }
        Ok(Some(info))
    }
}

/// Send the subprocess a termination signal and reap it. Escalates to a
/// hard kill when the process ignores SIGTERM past the grace period.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        let deadline = Instant::now() + Duration::from_millis(ANALYZER_TERM_GRACE_MS);
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(Duration::from_millis(ANALYZER_WAIT_POLL_MS)),
                Err(_) => break,
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
