//! Archive stage metrics.

use crate::archive::ArchiveSummary;
use crate::metrics::{MetricDoc, MetricType, PhaseMetrics};

pub struct ArchiveMetrics;

impl ArchiveMetrics {
    pub fn record_skipped_run() {
        ::metrics::counter!(phase_metric!(counter, "archive", "skipped_runs")).increment(1);
    }

    pub fn record_summary(summary: &ArchiveSummary) {
        if summary.used_fallback {
            ::metrics::counter!(phase_metric!(counter, "archive", "fallback_runs")).increment(1);
        } else {
            ::metrics::counter!(phase_metric!(counter, "archive", "bulk_inserts")).increment(1);
        }
        ::metrics::counter!(phase_metric!(counter, "archive", "documents_inserted"))
            .increment(summary.inserted as u64);
        ::metrics::counter!(phase_metric!(counter, "archive", "duplicates"))
            .increment(summary.duplicates as u64);
        ::metrics::counter!(phase_metric!(counter, "archive", "failures"))
            .increment(summary.failed as u64);
    }
}

impl PhaseMetrics for ArchiveMetrics {
    fn register_metrics() {
        use ::metrics::counter;

        let _ = counter!(phase_metric!(counter, "archive", "skipped_runs"));
        let _ = counter!(phase_metric!(counter, "archive", "bulk_inserts"));
        let _ = counter!(phase_metric!(counter, "archive", "fallback_runs"));
        let _ = counter!(phase_metric!(counter, "archive", "documents_inserted"));
        let _ = counter!(phase_metric!(counter, "archive", "duplicates"));
        let _ = counter!(phase_metric!(counter, "archive", "failures"));
    }

    fn phase_name() -> &'static str {
        "archive"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "archive", "skipped_runs"),
                metric_type: MetricType::Counter,
                help: "Runs where archival was skipped (store unavailable or nothing to archive)",
            },
            MetricDoc {
                name: phase_metric!(counter, "archive", "bulk_inserts"),
                metric_type: MetricType::Counter,
                help: "Runs archived by a single unordered bulk insert",
            },
            MetricDoc {
                name: phase_metric!(counter, "archive", "fallback_runs"),
                metric_type: MetricType::Counter,
                help: "Runs that fell back to per-document upsert or insert",
            },
            MetricDoc {
                name: phase_metric!(counter, "archive", "documents_inserted"),
                metric_type: MetricType::Counter,
                help: "Documents inserted or upserted into the archive",
            },
            MetricDoc {
                name: phase_metric!(counter, "archive", "duplicates"),
                metric_type: MetricType::Counter,
                help: "Documents rejected with a duplicate key during fallback",
            },
            MetricDoc {
                name: phase_metric!(counter, "archive", "failures"),
                metric_type: MetricType::Counter,
                help: "Documents that failed to archive for any other reason",
            },
        ]
    }
}
