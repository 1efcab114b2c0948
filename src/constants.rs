/// Names shared by the reader, both stores and the CLI.

// Record paths
pub const EVENT_ID_PATH: &[&str] = &["event", "id"];
pub const EVENT_TS_PATH: &[&str] = &["event", "ts"];
pub const ORDER_ID_PATH: &[&str] = &["entity", "order", "id"];
pub const PAYMENT_ID_PATH: &[&str] = &["entity", "payment", "id"];
pub const AMOUNT_PATH: &[&str] = &["payload", "Amount"];
pub const STATUS_PATH: &[&str] = &["payload", "status"];

/// Relational table receiving the six-column projection.
pub const STRUCTURED_TABLE: &str = "raw_transaction_logs";

/// Document collection in the archive store.
pub const ARCHIVE_COLLECTION: &str = "raw_transaction_logs";

/// Document key field honoured by the archive when a record carries one.
pub const DOCUMENT_ID_FIELD: &str = "_id";

// Defaults
pub const DEFAULT_INPUT_PATH: &str = "output_dir/raw_data.jsonl";
pub const DEFAULT_ARCHIVE_PATH: &str = "data/archive.db";
pub const DEFAULT_DATABASE_PATH: &str = "data/quickcart.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "txn_etl.toml";
pub const DEFAULT_METRICS_JOB: &str = "txn_etl";

// Process exit codes (clap reserves 2 for usage errors)
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_NO_ACCEPTED_RECORDS: u8 = 3;

/// Render a field path the way log lines and errors show it (`entity.order.id`).
pub fn dotted(path: &[&str]) -> String {
    path.join(".")
}
