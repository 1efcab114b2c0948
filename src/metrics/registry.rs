//! Registers every stage's metrics and checks names do not collide.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, warn};

pub fn register_all_metrics() {
    let all = collect_documentation(true);
    debug!("Registered {} metrics across all stages", all.len());
}

/// Gather documentation from every stage, optionally registering as we go.
fn collect_documentation(register: bool) -> HashMap<&'static str, MetricDoc> {
    let mut all_metrics = HashMap::new();
    add_phase::<super::reader::ReaderMetrics>(&mut all_metrics, register);
    add_phase::<super::archive::ArchiveMetrics>(&mut all_metrics, register);
    add_phase::<super::structured::StructuredMetrics>(&mut all_metrics, register);
    all_metrics
}

fn add_phase<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>, register: bool) {
    if register {
        T::register_metrics();
    }
    for doc in T::metrics_documentation() {
        if phase_of(doc.name) != T::phase_name() {
            warn!(
                "Metric '{}' is not prefixed by its stage '{}'",
                doc.name,
                T::phase_name()
            );
        }
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict: '{}' is defined again by stage '{}'",
                doc.name,
                T::phase_name()
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Extract the stage from a metric name (`etl_archive_duplicates_total` -> `archive`).
fn phase_of(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("etl_")
        .and_then(|rest| rest.split('_').next())
        .filter(|phase| !phase.is_empty())
        .unwrap_or("unknown")
}
