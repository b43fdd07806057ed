//! Application configuration constants.
//! Tuning and thresholds in one place.

// ---- Registry endpoints ----

/// Host serving the registry API (module name listing).
pub const API_HOST: &str = "api.deno.land";
/// Host serving version and directory metadata.
pub const CDN_HOST: &str = "cdn.deno.land";
/// Host under which module source files are addressed; specifiers are built
/// as `https://<SOURCE_HOST>/x/<name>@<version>/<path>`.
pub const SOURCE_HOST: &str = "deno.land";

/// User-Agent sent on every registry request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// ---- Throttled client ----

/// Outbound request pacing and timeout.
pub struct ThrottleConsts;

impl ThrottleConsts {
    /// Minimum interval between the start of two outbound requests (ms).
    pub const INTERVAL_MS: u64 = 1_000;
    /// Per-request timeout (ms).
    pub const REQUEST_TIMEOUT_MS: u64 = 1_000;
}

// ---- Analyzer ----

/// Analyzer binary looked up on PATH when no override is set.
pub const ANALYZER_BIN: &str = "deno";
/// Environment variable overriding the analyzer binary path.
pub const ANALYZER_PATH_ENV: &str = "DENO_PATH";
/// Poll interval while waiting on the analyzer subprocess (ms).
pub const ANALYZER_WAIT_POLL_MS: u64 = 50;
/// How long a cancelled analyzer subprocess gets to exit on SIGTERM before
/// it is killed outright (ms).
pub const ANALYZER_TERM_GRACE_MS: u64 = 2_000;

/// Resolve the analyzer binary: env override first, PATH lookup otherwise.
pub fn analyzer_bin() -> String {
    std::env::var(ANALYZER_PATH_ENV).unwrap_or_else(|_| ANALYZER_BIN.to_string())
}

// ---- Work queue ----

/// Durable queue tuning. The long visibility timeout gives the writer ample
/// time to commit before a message becomes visible again.
pub struct QueueConsts;

impl QueueConsts {
    /// Visibility timeout for received messages (seconds). 3 hours.
    pub const VISIBILITY_TIMEOUT_SECS: u64 = 10_800;
    /// Long-poll wait per receive call (seconds).
    pub const WAIT_TIME_SECS: u64 = 20;
    /// Messages requested per receive call.
    pub const RECEIVE_BATCH: u64 = 10;
    /// Capacity of the poller's internal channel; a full channel exerts
    /// back-pressure on the poller, not on the queue service.
    pub const BUFFER: usize = 64;
    /// Queue depth below which the watcher re-runs discovery.
    pub const REFILL_THRESHOLD: u64 = 50;
    /// Watcher poll interval (seconds).
    pub const WATCH_TICK_SECS: u64 = 30;
    /// Back-off after a failed receive call (seconds).
    pub const RECEIVE_BACKOFF_SECS: u64 = 5;
}

/// Environment variable selecting the queue service region.
pub const REGION_ENV: &str = "AWS_REGION";
const DEFAULT_REGION: &str = "us-east-1";

/// Queue service endpoint for the configured region.
pub fn default_queue_endpoint() -> String {
    let region = std::env::var(REGION_ENV).unwrap_or_else(|_| DEFAULT_REGION.to_string());
    format!("https://sqs.{region}.amazonaws.com")
}

// ---- Pipeline ----

/// Stage wiring: channel depths and worker counts.
pub struct PipelineConsts;

impl PipelineConsts {
    /// Capacity of the channels linking stages; slow writers exert
    /// back-pressure on fast discoverers through these.
    pub const STAGE_CHANNEL_CAP: usize = 32;
    /// Workers listing versions and files during discovery.
    pub const DISCOVERY_WORKERS: usize = 8;
    /// Workers running the analyzer subprocess.
    pub const ANALYZER_WORKERS: usize = 2;
    /// Workers committing module transactions.
    pub const WRITER_POOL_SIZE: usize = 2;
    /// How often blocked workers wake up to check the cancel flag (ms).
    pub const CANCEL_POLL_MS: u64 = 250;
}

// ---- Graph / ledger ----

/// Graph alpha HTTP endpoint when none is given on the command line.
pub const DEFAULT_ALPHA: &str = "http://localhost:9080";
/// Per-request timeout against the graph endpoint (ms). Mutations on large
/// modules are slower than registry calls.
pub const GRAPH_TIMEOUT_MS: u64 = 10_000;
/// Ledger database filename when none is given on the command line.
pub const DEFAULT_LEDGER_FILE: &str = "modgraph-ledger.db";

// ---- Metrics ----

/// Port of the `/metrics` endpoint.
pub const METRICS_PORT: u16 = 9093;
