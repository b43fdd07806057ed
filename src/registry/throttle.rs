//! Outbound HTTP client throttled to a minimum inter-request interval.

use log::debug;
use reqwest::blocking::{Client, Response};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::metrics::{API_REQUESTS_TOTAL, IN_FLIGHT_REQUESTS, REQUEST_DURATION_SECONDS};
use crate::utils::config::{ThrottleConsts, USER_AGENT};

use super::RegistryError;

/// Blocking GET client that paces request starts: a process-wide lock and a
/// last-start timestamp guarantee at least `interval` between any two
/// requests, regardless of which worker issues them.
pub struct ThrottledClient {
    client: Client,
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl ThrottledClient {
    pub fn new(interval: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(ThrottleConsts::REQUEST_TIMEOUT_MS))
            .build()
            .unwrap_or_default();
        ThrottledClient {
            client,
            interval,
            last: Mutex::new(None),
        }
    }

    /// Issue a GET, sleeping first if the previous request started less than
    /// the configured interval ago. Connection and timeout failures are
    /// errors; 4xx/5xx responses are returned intact for the caller to
    /// classify.
    pub fn get(&self, url: &str) -> Result<Response, RegistryError> {
        {
            let mut last = self.last.lock().unwrap();
            if let Some(prev) = *last {
                let next = prev + self.interval;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                }
            }
            *last = Some(Instant::now());
        }

        debug!("request {}", url);
        IN_FLIGHT_REQUESTS.inc();
        let start = Instant::now();
        let result = self.client.get(url).send();
        REQUEST_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());
        IN_FLIGHT_REQUESTS.dec();

        match result {
            Ok(resp) => {
                API_REQUESTS_TOTAL
                    .with_label_values(&[resp.status().as_str(), "get"])
                    .inc();
                Ok(resp)
            }
            Err(source) => Err(RegistryError::Request {
                url: url.to_string(),
                source,
            }),
        }
    }
}

impl Default for ThrottledClient {
    fn default() -> Self {
        ThrottledClient::new(Duration::from_millis(ThrottleConsts::INTERVAL_MS))
    }
}
