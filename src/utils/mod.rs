//! Configuration and progress reporting.

/// Progress sink threaded through the pipeline.
pub mod progress;
/// `deepdive.toml` configuration.
pub mod toml_config;

pub use progress::{MemorySink, NullSink, ProgressEvent, ProgressSink, SharedSink, TracingSink};
pub use toml_config::{ConfigError, DeepdiveConfig};
