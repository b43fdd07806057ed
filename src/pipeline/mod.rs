//! Pipeline components: channel wiring, discovery, analysis, error funnel.

pub mod analysis;
pub mod context;
pub mod discovery;
pub mod error_handler;
pub mod orchestrator;

pub use context::{PipelineChannels, PipelineHandles, create_pipeline_channels};
pub use discovery::{crawl_registry, watch_queue};
pub use error_handler::spawn_error_logger;
pub use orchestrator::run_pipeline;
