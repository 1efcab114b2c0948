use crate::constants::STRUCTURED_TABLE;
use crate::error::{EtlError, Result};
use crate::record::{Scalar, StructuredRow};
use crate::structured::{BatchError, RelationalSession, SessionError};
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, ToSql, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INSERT_ROW_SQL: &str = "INSERT INTO raw_transaction_logs \
     (event_id, order_id, payment_id, amount_usd, status, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// Bootstrap DDL for `raw_transaction_logs`. Only applied when asked to;
/// the table is normally provisioned outside this tool.
pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS raw_transaction_logs (
    event_id    TEXT NOT NULL PRIMARY KEY,
    order_id    TEXT NOT NULL,
    payment_id  TEXT NOT NULL,
    amount_usd  REAL NOT NULL CHECK (amount_usd >= 0),
    status      TEXT,
    created_at  TEXT NOT NULL
);
"#;

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(SqlValue::Null),
            Scalar::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Scalar::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Scalar::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Scalar::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Handle on the relational database. The connection closes when the
/// handle is dropped or [`StructuredStore::close`] is called.
pub struct StructuredStore {
    conn: Connection,
    location: PathBuf,
}

impl StructuredStore {
    /// Open an existing database file. The file is not created: a missing
    /// database is a setup error, not something to paper over.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| EtlError::Database {
                message: format!("Failed to open {}: {e}", path.display()),
            })?;
        info!("Connected to structured store at {}", path.display());
        Ok(Self {
            conn,
            location: path.to_path_buf(),
        })
    }

    /// Open `path`, creating the file and the table when missing.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            location: path.to_path_buf(),
        };
        store.ensure_table()?;
        info!("Connected to structured store at {}", path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            location: PathBuf::from(":memory:"),
        };
        store.ensure_table()?;
        Ok(store)
    }

    pub fn ensure_table(&self) -> Result<()> {
        self.conn.execute_batch(CREATE_TABLE_SQL)?;
        Ok(())
    }

    /// Start the single transaction a batch is written in.
    pub fn begin(&mut self) -> std::result::Result<SqliteSession<'_>, BatchError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| BatchError::Begin(e.to_string()))?;
        Ok(SqliteSession { tx })
    }

    pub fn count_rows(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {STRUCTURED_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Amount stored for `event_id`, if the row exists.
    pub fn amount_for(&self, event_id: &str) -> Result<Option<f64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT amount_usd FROM {STRUCTURED_TABLE} WHERE event_id = ?1"
        ))?;
        let mut rows = stmt.query(params![event_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn close(self) -> Result<()> {
        let location = self.location.clone();
        self.conn.close().map_err(|(_, e)| EtlError::from(e))?;
        debug!("Closed structured store at {}", location.display());
        Ok(())
    }
}

/// One open transaction on the structured store.
pub struct SqliteSession<'conn> {
    tx: Transaction<'conn>,
}

impl RelationalSession for SqliteSession<'_> {
    fn insert_row(&mut self, row: &StructuredRow) -> std::result::Result<(), SessionError> {
        let mut stmt = self.tx.prepare_cached(INSERT_ROW_SQL).map_err(classify)?;
        stmt.execute(params![
            row.event_id,
            row.order_id,
            row.payment_id,
            row.amount_usd,
            row.status,
            row.created_at
        ])
        .map_err(classify)?;
        Ok(())
    }

    fn commit(self) -> std::result::Result<(), SessionError> {
        self.tx
            .commit()
            .map_err(|e| SessionError::Fatal(e.to_string()))
    }

    fn rollback(self) -> std::result::Result<(), SessionError> {
        self.tx
            .rollback()
            .map_err(|e| SessionError::Fatal(e.to_string()))
    }
}

/// Row-level problems skip the row; everything else ends the batch.
fn classify(err: rusqlite::Error) -> SessionError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch | ErrorCode::TooBig
            ) =>
        {
            SessionError::Rejected(err.to_string())
        }
        rusqlite::Error::ToSqlConversionFailure(_) => SessionError::Rejected(err.to_string()),
        _ => SessionError::Fatal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::write_records;
    use serde_json::json;

    fn record(event_id: &str, amount: f64) -> serde_json::Value {
        json!({
            "event": {"id": event_id, "ts": "2024-05-01T12:00:00Z"},
            "entity": {"order": {"id": "ord"}, "payment": {"id": "pay"}},
            "payload": {"Amount": amount, "status": "settled"}
        })
    }

    #[test]
    fn rows_are_committed() {
        let mut store = StructuredStore::in_memory().unwrap();
        let session = store.begin().unwrap();
        let summary = write_records(session, &[record("a", 1.5), record("b", 2.0)]).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(store.count_rows().unwrap(), 2);
        assert_eq!(store.amount_for("a").unwrap(), Some(1.5));
    }

    #[test]
    fn constraint_violation_skips_the_row() {
        let mut store = StructuredStore::in_memory().unwrap();
        let session = store.begin().unwrap();
        let summary = write_records(
            session,
            &[record("a", 1.0), record("a", 3.0), record("c", 2.0)],
        )
        .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.amount_for("a").unwrap(), Some(1.0));
    }

    #[test]
    fn null_required_column_is_rejected_not_fatal() {
        let mut store = StructuredStore::in_memory().unwrap();
        let mut bad = record("x", 1.0);
        bad["entity"]["payment"]["id"] = serde_json::Value::Null;
        let session = store.begin().unwrap();
        let summary = write_records(session, &[bad, record("y", 1.0)]).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(store.count_rows().unwrap(), 1);
    }

    #[test]
    fn classify_separates_row_and_session_failures() {
        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed".into()),
        );
        assert!(matches!(classify(constraint), SessionError::Rejected(_)));

        let io = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
            None,
        );
        assert!(matches!(classify(io), SessionError::Fatal(_)));
    }

    #[test]
    fn open_requires_an_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StructuredStore::open(dir.path().join("missing.db")).is_err());
    }
}
