use crate::archive::{archive_records, ArchiveStore, ArchiveSummary, SqliteArchive};
use crate::config::{ArchiveConfig, EtlConfig, StructuredConfig};
use crate::error::{EtlError, Result};
use crate::log_reader::TransactionLogReader;
use crate::structured::{write_records, StructuredStore, WriteSummary};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// What happened to the archival leg of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArchiveStatus {
    Skipped { reason: String },
    Completed(ArchiveSummary),
}

/// What happened to the structured leg of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StructuredStatus {
    Committed(WriteSummary),
    /// Every row failed, so the transaction was rolled back with nothing in it.
    NothingCommitted(WriteSummary),
    RolledBack { reason: String },
}

/// Summary of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: String,
    pub lines: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub coerced: usize,
    pub archive: ArchiveStatus,
    pub structured: StructuredStatus,
    pub duration_secs: f64,
}

/// Run the whole ETL for `config`: read, archive, load, close.
///
/// Returns [`EtlError::NoAcceptedRecords`] without touching either store
/// when the input yields nothing to load.
#[instrument(skip(config), fields(input = %config.input_path.display()))]
pub fn run(config: &EtlConfig) -> Result<RunReport> {
    let started = Instant::now();

    let read = TransactionLogReader::new(&config.input_path).read()?;
    if read.accepted.is_empty() {
        error!("No valid logs to process");
        return Err(EtlError::NoAcceptedRecords {
            skipped: read.skipped,
        });
    }

    let mut structured = open_structured(&config.structured)?;
    let mut archive = open_archive(&config.archive);

    let (archive_status, structured_status) = match archive.as_mut() {
        Ok(store) => load(&read.accepted, Some(store), &mut structured),
        Err(reason) => {
            let (_, structured_status) =
                load::<SqliteArchive>(&read.accepted, None, &mut structured);
            let status = ArchiveStatus::Skipped {
                reason: reason.clone(),
            };
            (status, structured_status)
        }
    };

    close_connections(archive.ok(), structured);

    let duration_secs = started.elapsed().as_secs_f64();
    crate::metrics::record_run_duration(duration_secs);

    Ok(RunReport {
        input: config.input_path.display().to_string(),
        lines: read.lines,
        accepted: read.accepted.len(),
        skipped: read.skipped,
        coerced: read.coerced,
        archive: archive_status,
        structured: structured_status,
        duration_secs,
    })
}

/// Archive then load `records`. The archive leg can never stop the
/// structured leg, and a structured rollback leaves archived documents alone.
pub fn load<A>(
    records: &[Value],
    archive: Option<&mut A>,
    structured: &mut StructuredStore,
) -> (ArchiveStatus, StructuredStatus)
where
    A: ArchiveStore + ?Sized,
{
    let archive_status = match archive {
        Some(store) => ArchiveStatus::Completed(archive_records(Some(store), records)),
        None => {
            archive_records::<A>(None, records);
            ArchiveStatus::Skipped {
                reason: "archive store unavailable".to_string(),
            }
        }
    };

    let structured_status = match structured.begin() {
        Ok(session) => match write_records(session, records) {
            Ok(summary) if summary.inserted == 0 => StructuredStatus::NothingCommitted(summary),
            Ok(summary) => StructuredStatus::Committed(summary),
            Err(e) => {
                error!("Structured load rolled back: {}", e);
                StructuredStatus::RolledBack {
                    reason: e.to_string(),
                }
            }
        },
        Err(e) => {
            error!("Structured load failed to start: {}", e);
            StructuredStatus::RolledBack {
                reason: e.to_string(),
            }
        }
    };

    (archive_status, structured_status)
}

fn open_structured(config: &StructuredConfig) -> Result<StructuredStore> {
    if config.create_table_if_missing {
        StructuredStore::open_or_create(&config.path)
    } else {
        StructuredStore::open(&config.path)
    }
}

/// The archive is optional: any failure here only disables archival.
fn open_archive(config: &ArchiveConfig) -> std::result::Result<SqliteArchive, String> {
    if !config.enabled {
        info!("Archival disabled by configuration");
        return Err("archival disabled".to_string());
    }
    SqliteArchive::connect(&config.path).map_err(|e| {
        warn!("{}. Continuing without archival.", e);
        e.to_string()
    })
}

fn close_connections(archive: Option<SqliteArchive>, structured: StructuredStore) {
    if let Some(archive) = archive {
        if let Err(e) = archive.close() {
            warn!("Failed to close archive store: {}", e);
        }
    }
    if let Err(e) = structured.close() {
        warn!("Failed to close structured store: {}", e);
    }
    info!("Database connections closed");
}
