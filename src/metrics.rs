//! Prometheus collectors for every stage, plus the `/metrics` endpoint.

use axum::{Router, routing::get};
use log::{info, warn};
use once_cell::sync::Lazy;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

// ---- Throttled client ----

pub static IN_FLIGHT_REQUESTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "client_in_flight_requests",
        "Outbound registry requests currently in flight"
    )
    .unwrap()
});

pub static API_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "client_api_requests_total",
        "Completed registry requests by method and status code",
        &["code", "method"]
    )
    .unwrap()
});

pub static REQUEST_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "request_duration_seconds",
        "Registry request latencies in seconds"
    )
    .unwrap()
});

// ---- Specifier ledger ----

pub static LEDGER_PUT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("ledger_put_total", "Conditional inserts attempted").unwrap()
});

pub static LEDGER_PUT_CONDITION_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "ledger_put_condition_failed_total",
        "Conditional inserts that found the key already present"
    )
    .unwrap()
});

pub static LEDGER_GET_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("ledger_get_total", "Ledger point reads").unwrap());

pub static LEDGER_LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ledger_latency_seconds",
        "Ledger call latencies in seconds"
    )
    .unwrap()
});

// ---- Graph writer ----

pub static TXN_COMMIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "graph_txn_commit_seconds",
        "Graph transaction commit latencies in seconds"
    )
    .unwrap()
});

// ---- Work queue ----

pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "queue_depth",
        "Approximate number of work units in the queue, as last observed"
    )
    .unwrap()
});

async fn render_metrics() -> String {
    match TextEncoder::new().encode_to_string(&prometheus::gather()) {
        Ok(text) => text,
        Err(err) => {
            warn!("failed to encode metrics: {}", err);
            String::new()
        }
    }
}

/// Serve `GET /metrics` on the given port from a dedicated thread. Bind or
/// serve failures are logged, not fatal; the crawl runs without metrics.
pub fn spawn_metrics_server(port: u16) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                warn!("failed to start metrics runtime: {}", err);
                return;
            }
        };
        rt.block_on(async move {
            let app = Router::new().route("/metrics", get(render_metrics));
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    info!("metrics endpoint listening on {}", addr);
                    if let Err(err) = axum::serve(listener, app).await {
                        warn!("metrics endpoint stopped: {}", err);
                    }
                }
                Err(err) => warn!("failed to bind metrics endpoint on {}: {}", addr, err),
            }
        });
    })
}
