pub mod archive;
pub mod config;
pub mod constants;
pub mod error;
pub mod log_reader;
pub mod logging;
pub mod metrics;
pub mod metrics_push;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod structured;
