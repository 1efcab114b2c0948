use crate::archive::{ArchiveError, ArchiveStore};
use crate::constants::{ARCHIVE_COLLECTION, DOCUMENT_ID_FIELD};
use crate::record::archive_key;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Document archive kept in a SQLite file.
///
/// Each document is stored verbatim as JSON text next to its key and the
/// event id it was archived under. The event id column is indexed but not
/// unique; only the document key is.
pub struct SqliteArchive {
    conn: Connection,
    location: PathBuf,
}

/// A document read back from the archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedDocument {
    pub doc_id: String,
    pub event_id: Option<String>,
    pub archived_at: String,
    pub body: Value,
}

impl SqliteArchive {
    /// Open the archive at `path`, creating the file if needed.
    ///
    /// Fails with [`ArchiveError::Unavailable`] when the file cannot be opened
    /// or does not answer a ping; callers treat that as "archive skipped".
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| ArchiveError::Unavailable(format!("{}: {e}", path.display())))?;
        let archive = Self::init(conn, path.to_path_buf())?;
        info!("Connected to archive store at {}", path.display());
        Ok(archive)
    }

    pub fn in_memory() -> Result<Self, ArchiveError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ArchiveError::Unavailable(e.to_string()))?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, location: PathBuf) -> Result<Self, ArchiveError> {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| ArchiveError::Unavailable(format!("ping failed: {e}")))?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ARCHIVE_COLLECTION} (
                doc_id      TEXT PRIMARY KEY,
                event_id    TEXT,
                body        TEXT NOT NULL,
                archived_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{ARCHIVE_COLLECTION}_event_id
                ON {ARCHIVE_COLLECTION} (event_id);
            "#
        ))
        .map_err(|e| ArchiveError::Unavailable(format!("schema setup failed: {e}")))?;
        Ok(Self { conn, location })
    }

    pub fn count(&self) -> Result<usize, ArchiveError> {
        let n: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {ARCHIVE_COLLECTION}"),
                [],
                |row| row.get(0),
            )
            .map_err(store_error)?;
        Ok(n as usize)
    }

    /// All documents archived under `event_id`, oldest first.
    pub fn find_by_event_id(&self, event_id: &str) -> Result<Vec<ArchivedDocument>, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT doc_id, event_id, body, archived_at FROM {ARCHIVE_COLLECTION}
                 WHERE event_id = ?1 ORDER BY rowid"
            ))
            .map_err(store_error)?;
        let rows = stmt
            .query_map(params![event_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(store_error)?;

        let mut docs = Vec::new();
        for row in rows {
            let (doc_id, event_id, body, archived_at) = row.map_err(store_error)?;
            let body = serde_json::from_str(&body)
                .map_err(|e| ArchiveError::Store(format!("corrupt document {doc_id}: {e}")))?;
            docs.push(ArchivedDocument {
                doc_id,
                event_id,
                archived_at,
                body,
            });
        }
        Ok(docs)
    }

    /// Close the connection, surfacing any error instead of swallowing it in `Drop`.
    pub fn close(self) -> Result<(), ArchiveError> {
        let location = self.location.clone();
        self.conn.close().map_err(|(_, e)| store_error(e))?;
        debug!("Closed archive store at {}", location.display());
        Ok(())
    }
}

impl ArchiveStore for SqliteArchive {
    fn insert_many_unordered(&mut self, docs: &[Value]) -> Result<usize, ArchiveError> {
        let tx = self.conn.transaction().map_err(store_error)?;
        let mut inserted = 0;
        let mut failed = 0;
        let mut first_error = None;

        for doc in docs {
            match insert_document(&tx, archive_key(doc).as_deref(), doc) {
                Ok(()) => inserted += 1,
                Err(e) => {
                    failed += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
        tx.commit().map_err(store_error)?;

        match first_error {
            None => Ok(inserted),
            Some(first_error) => Err(ArchiveError::BulkWrite {
                inserted,
                failed,
                first_error,
            }),
        }
    }

    fn upsert_by_event_id(&mut self, event_id: &str, doc: &Value) -> Result<(), ArchiveError> {
        let tx = self.conn.transaction().map_err(store_error)?;

        let existing: Option<(String, String)> = tx
            .query_row(
                &format!(
                    "SELECT doc_id, body FROM {ARCHIVE_COLLECTION}
                     WHERE event_id = ?1 ORDER BY rowid LIMIT 1"
                ),
                params![event_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(store_error)?;

        match existing {
            Some((doc_id, body)) => {
                let mut current: Value = serde_json::from_str(&body)
                    .map_err(|e| ArchiveError::Store(format!("corrupt document {doc_id}: {e}")))?;
                set_fields(&mut current, doc);
                tx.execute(
                    &format!(
                        "UPDATE {ARCHIVE_COLLECTION} SET body = ?1, archived_at = ?2 WHERE doc_id = ?3"
                    ),
                    params![current.to_string(), Utc::now().to_rfc3339(), doc_id],
                )
                .map_err(store_error)?;
            }
            None => insert_document(&tx, Some(event_id), doc)?,
        }

        tx.commit().map_err(store_error)
    }

    fn insert_one(&mut self, doc: &Value) -> Result<(), ArchiveError> {
        insert_document(&self.conn, archive_key(doc).as_deref(), doc)
    }
}

fn insert_document(
    conn: &Connection,
    event_id: Option<&str>,
    doc: &Value,
) -> Result<(), ArchiveError> {
    let doc_id = document_id(doc);
    conn.execute(
        &format!(
            "INSERT INTO {ARCHIVE_COLLECTION} (doc_id, event_id, body, archived_at)
             VALUES (?1, ?2, ?3, ?4)"
        ),
        params![doc_id, event_id, doc.to_string(), Utc::now().to_rfc3339()],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            ArchiveError::DuplicateKey(doc_id.clone())
        }
        other => store_error(other),
    })?;
    Ok(())
}

/// The record's own `_id` string when it has one, otherwise a fresh key.
fn document_id(doc: &Value) -> String {
    match doc.get(DOCUMENT_ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Overwrite top-level fields of `target` with those of `update`, leaving
/// the stored document key untouched.
fn set_fields(target: &mut Value, update: &Value) {
    match (target.as_object_mut(), update.as_object()) {
        (Some(target), Some(update)) => {
            for (key, value) in update {
                if key != DOCUMENT_ID_FIELD {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        _ => *target = update.clone(),
    }
}

fn store_error(err: rusqlite::Error) -> ArchiveError {
    ArchiveError::Store(err.to_string())
}
