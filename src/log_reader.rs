use crate::constants::AMOUNT_PATH;
use crate::error::Result;
use crate::metrics::ReaderMetrics;
use crate::normalize::{normalize_value, Unparseable};
use crate::record::{lookup, lookup_mut};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Why a line was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InvalidJson(String),
    NotAnObject,
    InvalidUtf8,
    MissingAmount,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidJson(e) => write!(f, "JSON decode error - {e}"),
            SkipReason::NotAnObject => write!(f, "record is not a JSON object"),
            SkipReason::InvalidUtf8 => write!(f, "line is not valid UTF-8"),
            SkipReason::MissingAmount => write!(f, "Missing Amount field"),
        }
    }
}

/// Classification of one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Blank,
    /// Kept. `coerced` carries the normalizer failure when the amount was
    /// present but malformed and has been forced to `0.0`.
    Accepted {
        record: Value,
        coerced: Option<Unparseable>,
    },
    Skipped(SkipReason),
}

/// Parse and normalize a single line.
pub fn classify_line(line: &str) -> LineOutcome {
    if line.trim().is_empty() {
        return LineOutcome::Blank;
    }

    let mut record: Value = match serde_json::from_str(line.trim()) {
        Ok(v) => v,
        Err(e) => return LineOutcome::Skipped(SkipReason::InvalidJson(e.to_string())),
    };
    if !record.is_object() {
        return LineOutcome::Skipped(SkipReason::NotAnObject);
    }

    // An explicit null counts as missing
    let normalized = match lookup(&record, AMOUNT_PATH) {
        Ok(Value::Null) | Err(_) => return LineOutcome::Skipped(SkipReason::MissingAmount),
        Ok(raw) => normalize_value(raw),
    };

    let (amount, coerced) = match normalized {
        Ok(amount) => (amount, None),
        Err(unparseable) => (0.0, Some(unparseable)),
    };
    if let Ok(slot) = lookup_mut(&mut record, AMOUNT_PATH) {
        *slot = Value::from(amount);
    }

    LineOutcome::Accepted { record, coerced }
}

/// Lazy, line-numbered iterator over a transaction log.
pub struct LogLines<R> {
    reader: R,
    line_number: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LogLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LogLines<R> {
    type Item = io::Result<(usize, LineOutcome)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                let outcome = match std::str::from_utf8(&self.buf) {
                    Ok(line) => classify_line(line),
                    Err(_) => LineOutcome::Skipped(SkipReason::InvalidUtf8),
                };
                Some(Ok((self.line_number, outcome)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Everything the reader kept, plus counters.
#[derive(Debug, Default, Serialize)]
pub struct ReadOutcome {
    #[serde(skip)]
    pub accepted: Vec<Value>,
    pub lines: usize,
    pub skipped: usize,
    pub coerced: usize,
}

impl ReadOutcome {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// Consume every line of `reader`, keeping accepted records in order.
pub fn read_records<R: BufRead>(reader: R) -> io::Result<ReadOutcome> {
    let mut outcome = ReadOutcome::default();

    for item in LogLines::new(reader) {
        let (line_number, line) = item?;
        outcome.lines = line_number;
        match line {
            LineOutcome::Blank => {}
            LineOutcome::Accepted { record, coerced } => {
                if let Some(unparseable) = coerced {
                    warn!(
                        line = line_number,
                        "Line {}: {}, setting to 0.0", line_number, unparseable
                    );
                    outcome.coerced += 1;
                }
                outcome.accepted.push(record);
            }
            LineOutcome::Skipped(reason) => {
                warn!(line = line_number, "Line {}: {}", line_number, reason);
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

/// Reads a newline-delimited JSON transaction log from disk.
pub struct TransactionLogReader {
    path: PathBuf,
}

impl TransactionLogReader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole log. A missing file yields an empty outcome; the caller
    /// decides whether that halts the run.
    pub fn read(&self) -> Result<ReadOutcome> {
        info!("Processing raw logs from {}", self.path.display());

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!("File not found: {}", self.path.display());
                return Ok(ReadOutcome::default());
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = read_records(BufReader::new(file))?;
        ReaderMetrics::record_outcome(&outcome);
        info!(
            accepted = outcome.accepted_count(),
            skipped = outcome.skipped,
            coerced = outcome.coerced,
            "Processed {} valid logs, skipped {} records",
            outcome.accepted_count(),
            outcome.skipped
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn line(amount: Value) -> String {
        json!({
            "event": {"id": "e", "ts": "t"},
            "entity": {"order": {"id": "o"}, "payment": {"id": "p"}},
            "payload": {"Amount": amount, "status": "ok"}
        })
        .to_string()
    }

    #[test]
    fn blank_lines_are_not_skips() {
        assert_eq!(classify_line(""), LineOutcome::Blank);
        assert_eq!(classify_line("   \r\n"), LineOutcome::Blank);
    }

    #[test]
    fn amount_is_normalized_in_place() {
        match classify_line(&line(json!("USD 1,250.00"))) {
            LineOutcome::Accepted { record, coerced } => {
                assert_eq!(record["payload"]["Amount"], json!(1250.0));
                assert!(coerced.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn malformed_amount_is_kept_at_zero() {
        match classify_line(&line(json!("twelve"))) {
            LineOutcome::Accepted { record, coerced } => {
                assert_eq!(record["payload"]["Amount"], json!(0.0));
                assert!(coerced.is_some());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn missing_or_null_amount_is_skipped() {
        let missing = json!({"event": {"id": "e"}, "payload": {"status": "ok"}}).to_string();
        assert_eq!(
            classify_line(&missing),
            LineOutcome::Skipped(SkipReason::MissingAmount)
        );
        assert_eq!(
            classify_line(&line(Value::Null)),
            LineOutcome::Skipped(SkipReason::MissingAmount)
        );
        assert_eq!(
            classify_line(r#"{"payload": "flat"}"#),
            LineOutcome::Skipped(SkipReason::MissingAmount)
        );
    }

    #[test]
    fn non_objects_are_skipped() {
        assert_eq!(
            classify_line("[1, 2, 3]"),
            LineOutcome::Skipped(SkipReason::NotAnObject)
        );
        assert!(matches!(
            classify_line("{not json"),
            LineOutcome::Skipped(SkipReason::InvalidJson(_))
        ));
    }

    #[test]
    fn ten_lines_with_two_bad_ones() {
        let mut input = String::new();
        for n in 1..=10 {
            let l = match n {
                3 => "{\"event\": ".to_string(),
                7 => json!({"event": {"id": "e7"}, "payload": {"status": "ok"}}).to_string(),
                _ => line(json!(n)),
            };
            input.push_str(&l);
            input.push('\n');
        }

        let outcome = read_records(Cursor::new(input)).unwrap();
        assert_eq!(outcome.accepted_count(), 8);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.lines, 10);
    }

    #[test]
    fn invalid_utf8_line_is_skipped_and_reading_continues() {
        let mut input: Vec<u8> = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(line(json!(5)).as_bytes());

        let outcome = read_records(Cursor::new(input)).unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.accepted_count(), 1);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let reader = TransactionLogReader::new("/definitely/not/here.jsonl");
        let outcome = reader.read().unwrap();
        assert_eq!(outcome.accepted_count(), 0);
        assert_eq!(outcome.skipped, 0);
    }
}
