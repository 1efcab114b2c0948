use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use txn_etl::config::EtlConfig;
use txn_etl::error::EtlError;
use txn_etl::pipeline::{self, ArchiveStatus, StructuredStatus};
use txn_etl::structured::{StructuredStore, WriteSummary};

fn event(i: usize, amount: Value) -> Value {
    json!({
        "event": {"id": format!("evt-{i}"), "ts": format!("2024-06-01T10:{:02}:00Z", i)},
        "entity": {"order": {"id": format!("ord-{i}")}, "payment": {"id": format!("pay-{i}")}},
        "payload": {"Amount": amount, "status": "captured"}
    })
}

fn write_lines(path: &Path, lines: &[String]) {
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).unwrap();
}

fn config_in(dir: &Path) -> EtlConfig {
    let mut config = EtlConfig::default();
    config.input_path = dir.join("raw_data.jsonl");
    config.archive.path = dir.join("archive.db");
    config.structured.path = dir.join("quickcart.db");
    config.structured.create_table_if_missing = true;
    config
}

#[test]
fn full_run_loads_both_stores() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    let mut lines = Vec::new();
    for i in 1..=10 {
        lines.push(match i {
            3 => "{\"event\": {\"id\": ".to_string(),
            7 => json!({"event": {"id": "evt-7"}, "payload": {"status": "captured"}}).to_string(),
            5 => event(i, json!("USD 1,234.50")).to_string(),
            _ => event(i, json!(i * 10)).to_string(),
        });
    }
    lines.insert(4, String::new());
    write_lines(&config.input_path, &lines);

    let report = pipeline::run(&config).unwrap();

    assert_eq!(report.accepted, 8);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.lines, 11);
    match report.archive {
        ArchiveStatus::Completed(summary) => {
            assert_eq!(summary.inserted, 8);
            assert!(!summary.used_fallback);
        }
        other => panic!("archive should have run: {other:?}"),
    }
    assert_eq!(
        report.structured,
        StructuredStatus::Committed(WriteSummary {
            inserted: 8,
            failed: 0
        })
    );

    let store = StructuredStore::open(&config.structured.path).unwrap();
    assert_eq!(store.count_rows().unwrap(), 8);
    assert_eq!(store.amount_for("evt-5").unwrap(), Some(1234.5));
    assert_eq!(store.amount_for("evt-7").unwrap(), None);
}

#[test]
fn unparseable_amount_is_loaded_as_zero() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    write_lines(
        &config.input_path,
        &[
            event(1, json!("ten dollars")).to_string(),
            event(2, json!(-40)).to_string(),
            event(3, json!("")).to_string(),
        ],
    );

    let report = pipeline::run(&config).unwrap();
    assert_eq!(report.accepted, 3);
    assert_eq!(report.coerced, 1);

    let store = StructuredStore::open(&config.structured.path).unwrap();
    for id in ["evt-1", "evt-2", "evt-3"] {
        assert_eq!(store.amount_for(id).unwrap(), Some(0.0));
    }
}

#[test]
fn one_bad_record_does_not_block_the_rest() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    let mut records: Vec<Value> = (1..=6).map(|i| event(i, json!(5))).collect();
    records[3]["entity"]["order"]
        .as_object_mut()
        .unwrap()
        .remove("id");
    let lines: Vec<String> = records.iter().map(Value::to_string).collect();
    write_lines(&config.input_path, &lines);

    let report = pipeline::run(&config).unwrap();
    assert_eq!(
        report.structured,
        StructuredStatus::Committed(WriteSummary {
            inserted: 5,
            failed: 1
        })
    );
    let store = StructuredStore::open(&config.structured.path).unwrap();
    assert_eq!(store.count_rows().unwrap(), 5);
}

#[test]
fn zero_accepted_records_writes_nothing() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    write_lines(
        &config.input_path,
        &["not json".to_string(), "{\"payload\": {}}".to_string()],
    );

    let result = pipeline::run(&config);

    assert!(matches!(
        result,
        Err(EtlError::NoAcceptedRecords { skipped: 2 })
    ));
    assert!(!config.archive.path.exists());
    assert!(!config.structured.path.exists());
}

#[test]
fn missing_input_is_zero_accepted() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    assert!(matches!(
        pipeline::run(&config),
        Err(EtlError::NoAcceptedRecords { skipped: 0 })
    ));
}

#[test]
fn unavailable_archive_is_skipped() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.archive.path = dir.path().join("no-such-dir").join("archive.db");
    write_lines(&config.input_path, &[event(1, json!(3.5)).to_string()]);

    let report = pipeline::run(&config).unwrap();

    assert!(matches!(report.archive, ArchiveStatus::Skipped { .. }));
    assert_eq!(
        report.structured,
        StructuredStatus::Committed(WriteSummary {
            inserted: 1,
            failed: 0
        })
    );
}

#[test]
fn structured_failure_does_not_undo_archival() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.structured.create_table_if_missing = false;
    // A database without the target table: every insert fails at the session level
    rusqlite::Connection::open(&config.structured.path)
        .unwrap()
        .execute_batch("CREATE TABLE unrelated (x INTEGER);")
        .unwrap();
    write_lines(
        &config.input_path,
        &[event(1, json!(1)).to_string(), event(2, json!(2)).to_string()],
    );

    let report = pipeline::run(&config).unwrap();

    assert!(matches!(report.structured, StructuredStatus::RolledBack { .. }));
    match report.archive {
        ArchiveStatus::Completed(summary) => assert_eq!(summary.inserted, 2),
        other => panic!("archive should have run: {other:?}"),
    }
}

#[test]
fn missing_database_is_a_setup_error() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.structured.create_table_if_missing = false;
    write_lines(&config.input_path, &[event(1, json!(1)).to_string()]);

    assert!(matches!(
        pipeline::run(&config),
        Err(EtlError::Database { .. })
    ));
}
