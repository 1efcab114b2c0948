//! Reader stage metrics: lines consumed, records kept, dropped and coerced.

use crate::log_reader::ReadOutcome;
use crate::metrics::{MetricDoc, MetricType, PhaseMetrics};

pub struct ReaderMetrics;

impl ReaderMetrics {
    pub fn record_outcome(outcome: &ReadOutcome) {
        ::metrics::counter!(phase_metric!(counter, "reader", "lines_read"))
            .increment(outcome.lines as u64);
        ::metrics::counter!(phase_metric!(counter, "reader", "records_accepted"))
            .increment(outcome.accepted_count() as u64);
        ::metrics::counter!(phase_metric!(counter, "reader", "records_skipped"))
            .increment(outcome.skipped as u64);
        ::metrics::counter!(phase_metric!(counter, "reader", "amounts_coerced"))
            .increment(outcome.coerced as u64);
    }
}

impl PhaseMetrics for ReaderMetrics {
    fn register_metrics() {
        use ::metrics::counter;

        let _ = counter!(phase_metric!(counter, "reader", "lines_read"));
        let _ = counter!(phase_metric!(counter, "reader", "records_accepted"));
        let _ = counter!(phase_metric!(counter, "reader", "records_skipped"));
        let _ = counter!(phase_metric!(counter, "reader", "amounts_coerced"));
    }

    fn phase_name() -> &'static str {
        "reader"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "reader", "lines_read"),
                metric_type: MetricType::Counter,
                help: "Lines read from the transaction log, blank lines included",
            },
            MetricDoc {
                name: phase_metric!(counter, "reader", "records_accepted"),
                metric_type: MetricType::Counter,
                help: "Records kept for archival and structured load",
            },
            MetricDoc {
                name: phase_metric!(counter, "reader", "records_skipped"),
                metric_type: MetricType::Counter,
                help: "Lines dropped for malformed JSON or a missing amount",
            },
            MetricDoc {
                name: phase_metric!(counter, "reader", "amounts_coerced"),
                metric_type: MetricType::Counter,
                help: "Kept records whose unparseable amount was forced to 0.0",
            },
        ]
    }
}
