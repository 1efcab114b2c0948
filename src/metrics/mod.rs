//! Run metrics for the ETL.
//!
//! Each stage (reader, archive, structured) owns its metric names in a
//! dedicated submodule. A Prometheus recorder is installed without an HTTP
//! listener: the job is short-lived, so the snapshot is rendered in-process
//! and pushed to a Pushgateway at the end of the run (see `metrics_push`).

/// Build a metric name following `etl_{phase}_{name}[_total]`.
/// Visible to the stage submodules declared below.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name, "_total")
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name)
    };
}

pub mod archive;
pub mod reader;
pub mod registry;
pub mod structured;

pub use archive::ArchiveMetrics;
pub use reader::ReaderMetrics;
pub use structured::StructuredMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global recorder and pre-register every stage's metrics.
///
/// Idempotent; a second call is a no-op.
pub fn init_metrics() {
    HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = ::metrics::set_global_recorder(recorder) {
            warn!("Failed to install metrics recorder: {}", e);
        } else {
            registry::register_all_metrics();
            debug!("Metrics recorder installed");
        }
        handle
    });
}

/// Handle for rendering the current snapshot, once `init_metrics` has run.
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    HANDLE.get()
}

/// Record the wall-clock duration of a full run.
pub fn record_run_duration(seconds: f64) {
    ::metrics::gauge!(phase_metric!(gauge, "run", "duration_seconds")).set(seconds);
    ::metrics::gauge!(phase_metric!(gauge, "run", "last_timestamp_seconds"))
        .set(chrono::Utc::now().timestamp() as f64);
}

/// Implemented by each stage's metrics collection.
pub trait PhaseMetrics {
    /// Pre-register every metric so it appears in the snapshot even at zero.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
}
