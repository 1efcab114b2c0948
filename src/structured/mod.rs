//! Loading normalized records into the relational store.
//!
//! Every record is projected to a [`StructuredRow`] and inserted inside one
//! transaction. A row that cannot be projected or is rejected by the store
//! is counted and skipped; anything that breaks the session itself rolls the
//! whole batch back.

pub mod sqlite;

pub use sqlite::{SqliteSession, StructuredStore};

use crate::metrics::StructuredMetrics;
use crate::record::{FieldError, StructuredRow};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

/// Failure of a single insert statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The row was refused (constraint violation, type mismatch). The session stays usable.
    #[error("row rejected: {0}")]
    Rejected(String),

    /// The session can no longer be trusted (connection lost, I/O error, busy database).
    #[error("session failed: {0}")]
    Fatal(String),
}

/// Why one row was skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error(transparent)]
    Projection(#[from] FieldError),

    #[error("{0}")]
    Rejected(String),
}

/// A failure that aborted the whole batch. Nothing from it was committed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("structured batch aborted at row {row}: {reason}")]
    Aborted { row: usize, reason: String },

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("could not open transaction: {0}")]
    Begin(String),
}

/// A transactional insert session against the relational store.
pub trait RelationalSession: Sized {
    fn insert_row(&mut self, row: &StructuredRow) -> Result<(), SessionError>;

    fn commit(self) -> Result<(), SessionError>;

    fn rollback(self) -> Result<(), SessionError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub inserted: usize,
    pub failed: usize,
}

/// Insert every record through `session`, then commit once.
///
/// Nothing is committed when no row made it in; the session is rolled back
/// instead, which leaves the store unchanged either way.
pub fn write_records<S: RelationalSession>(
    mut session: S,
    records: &[Value],
) -> Result<WriteSummary, BatchError> {
    info!("Inserting {} standardized records", records.len());
    let mut summary = WriteSummary::default();

    for (idx, record) in records.iter().enumerate() {
        match insert_record(&mut session, record) {
            Ok(()) => summary.inserted += 1,
            Err(RowOutcome::Skip(e)) => {
                summary.failed += 1;
                StructuredMetrics::record_row_failed();
                warn!(row = idx, "Row {}: Failed to insert - {}", idx, e);
            }
            Err(RowOutcome::Abort(reason)) => {
                error!("Structured batch failed at row {}: {}", idx, reason);
                roll_back(session);
                return Err(BatchError::Aborted { row: idx, reason });
            }
        }
    }

    if summary.inserted == 0 {
        warn!("No rows inserted; nothing to commit");
        if let Err(e) = session.rollback() {
            error!("Rollback failed: {}", e);
        }
    } else if let Err(e) = session.commit() {
        // The transaction is discarded when the session drops
        error!("Commit failed: {}", e);
        StructuredMetrics::record_rollback();
        return Err(BatchError::Commit(e.to_string()));
    } else {
        StructuredMetrics::record_commit(&summary);
    }

    info!(
        inserted = summary.inserted,
        failed = summary.failed,
        "Structured insertion complete: {} inserted, {} failed",
        summary.inserted,
        summary.failed
    );
    Ok(summary)
}

enum RowOutcome {
    Skip(RowError),
    Abort(String),
}

fn insert_record<S: RelationalSession>(session: &mut S, record: &Value) -> Result<(), RowOutcome> {
    let row = StructuredRow::project(record).map_err(|e| RowOutcome::Skip(e.into()))?;
    session.insert_row(&row).map_err(|e| match e {
        SessionError::Rejected(reason) => RowOutcome::Skip(RowError::Rejected(reason)),
        SessionError::Fatal(reason) => RowOutcome::Abort(reason),
    })
}

fn roll_back<S: RelationalSession>(session: S) {
    StructuredMetrics::record_rollback();
    if let Err(e) = session.rollback() {
        error!("Rollback failed: {}", e);
    }
}
