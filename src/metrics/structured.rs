//! Structured (relational) stage metrics.

use crate::metrics::{MetricDoc, MetricType, PhaseMetrics};
use crate::structured::WriteSummary;

pub struct StructuredMetrics;

impl StructuredMetrics {
    pub fn record_row_failed() {
        ::metrics::counter!(phase_metric!(counter, "structured", "rows_failed")).increment(1);
    }

    pub fn record_commit(summary: &WriteSummary) {
        ::metrics::counter!(phase_metric!(counter, "structured", "rows_inserted"))
            .increment(summary.inserted as u64);
        ::metrics::counter!(phase_metric!(counter, "structured", "commits")).increment(1);
    }

    pub fn record_rollback() {
        ::metrics::counter!(phase_metric!(counter, "structured", "rollbacks")).increment(1);
    }
}

impl PhaseMetrics for StructuredMetrics {
    fn register_metrics() {
        use ::metrics::counter;

        let _ = counter!(phase_metric!(counter, "structured", "rows_inserted"));
        let _ = counter!(phase_metric!(counter, "structured", "rows_failed"));
        let _ = counter!(phase_metric!(counter, "structured", "commits"));
        let _ = counter!(phase_metric!(counter, "structured", "rollbacks"));
    }

    fn phase_name() -> &'static str {
        "structured"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "structured", "rows_inserted"),
                metric_type: MetricType::Counter,
                help: "Rows committed to raw_transaction_logs",
            },
            MetricDoc {
                name: phase_metric!(counter, "structured", "rows_failed"),
                metric_type: MetricType::Counter,
                help: "Rows skipped for a projection or insert failure",
            },
            MetricDoc {
                name: phase_metric!(counter, "structured", "commits"),
                metric_type: MetricType::Counter,
                help: "Structured batches committed",
            },
            MetricDoc {
                name: phase_metric!(counter, "structured", "rollbacks"),
                metric_type: MetricType::Counter,
                help: "Structured batches rolled back after a batch-level failure",
            },
        ]
    }
}
