//! Archival of accepted records into a schemaless document store.
//!
//! The primary path is one unordered bulk insert. If that call fails, every
//! record is written again individually: records with an event id are
//! upserted on it (re-running is safe), records without one are inserted
//! plainly. Per-document failures never stop the loop.

pub mod sqlite;

pub use sqlite::{ArchivedDocument, SqliteArchive};

use crate::metrics::ArchiveMetrics;
use crate::record::archive_key;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArchiveError {
    #[error("archive store unavailable: {0}")]
    Unavailable(String),

    /// The store already holds a document with this key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("bulk write failed: {inserted} inserted, {failed} rejected (first error: {first_error})")]
    BulkWrite {
        inserted: usize,
        failed: usize,
        first_error: String,
    },

    #[error("archive store error: {0}")]
    Store(String),
}

/// Operations the archival writer needs from a document store.
pub trait ArchiveStore {
    /// Insert all documents without stopping at the first failure.
    /// Any rejected document makes the whole call an error.
    fn insert_many_unordered(&mut self, docs: &[Value]) -> Result<usize, ArchiveError>;

    /// Update the first document archived under `event_id`, inserting when none exists.
    fn upsert_by_event_id(&mut self, event_id: &str, doc: &Value) -> Result<(), ArchiveError>;

    fn insert_one(&mut self, doc: &Value) -> Result<(), ArchiveError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub used_fallback: bool,
}

/// Archive `records`. A missing store or an empty batch is a logged no-op.
pub fn archive_records<S>(store: Option<&mut S>, records: &[Value]) -> ArchiveSummary
where
    S: ArchiveStore + ?Sized,
{
    let Some(store) = store else {
        warn!("Archive store not available, skipping archival");
        ArchiveMetrics::record_skipped_run();
        return ArchiveSummary::default();
    };
    if records.is_empty() {
        warn!("No logs to archive");
        ArchiveMetrics::record_skipped_run();
        return ArchiveSummary::default();
    }

    info!("Archiving {} logs", records.len());

    let summary = match store.insert_many_unordered(records) {
        Ok(inserted) => {
            info!("Successfully archived {} logs", inserted);
            ArchiveSummary {
                inserted,
                ..ArchiveSummary::default()
            }
        }
        Err(e) => {
            warn!("Bulk insert failed: {}. Attempting individual inserts...", e);
            archive_individually(store, records)
        }
    };

    ArchiveMetrics::record_summary(&summary);
    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        failed = summary.failed,
        "Archival complete: {} inserted, {} duplicates, {} failed",
        summary.inserted,
        summary.duplicates,
        summary.failed
    );
    summary
}

fn archive_individually<S>(store: &mut S, records: &[Value]) -> ArchiveSummary
where
    S: ArchiveStore + ?Sized,
{
    let mut summary = ArchiveSummary {
        used_fallback: true,
        ..ArchiveSummary::default()
    };

    for (idx, record) in records.iter().enumerate() {
        let result = match archive_key(record) {
            Some(event_id) => store.upsert_by_event_id(&event_id, record),
            None => store.insert_one(record),
        };
        match result {
            Ok(()) => summary.inserted += 1,
            Err(ArchiveError::DuplicateKey(key)) => {
                summary.duplicates += 1;
                debug!("Log {}: duplicate key {}, already archived", idx, key);
            }
            Err(e) => {
                summary.failed += 1;
                warn!("Log {}: Failed to archive - {}", idx, e);
            }
        }
    }

    summary
}
