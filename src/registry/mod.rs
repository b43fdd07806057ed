//! Registry access: throttled HTTP client and the module/version/file API.

pub mod http;
pub mod throttle;

pub use http::{HttpRegistry, ModuleRegistry, VersionList, strip_listing};
pub use throttle::ThrottledClient;

use thiserror::Error;

/// Failures talking to the registry or CDN. Surfaced on the error channel;
/// the affected module or version is skipped, never the crawl.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("request for {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
