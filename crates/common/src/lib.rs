
use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;
use types::{ColumnDef, Value};

/// Logical identifier for a page in a table's page file.
/// Examples:
/// - `let header_page = PageId(0);`
/// - `let data_page = PageId(7);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u64);

/// Identifier for a table, keyed by name in the current implementation but
/// kept as a distinct newtype so callers can't confuse it with a `PageId`.
/// Examples:
/// - `let users = TableId("users".to_string());`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub String);

impl TableId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Positional row representation backed by `types::Value`.
/// Examples:
/// - `let row = Row::new(1, vec![Value::Int(1)]);`
/// - `let row = Row::new(2, vec![Value::Text("alice".into()), Value::Bool(true)]);`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_id: u64,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(row_id: u64, values: Vec<Value>) -> Self {
        Self { row_id, values }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Rectangular result set carrying column labels and rows, as returned to
/// the wire session for a `SELECT`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// The bootstrap record stored as the single tuple (row_id 0) of every
/// table's header page (page 0). Rewritten in full on every `total_tuples`
/// change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    pub created_at: i64,
    pub page_format_version: u16,
    pub columns: Vec<ColumnDef>,
    pub total_tuples: u64,
}

/// The current on-disk tuple/metadata encoding version (spec §6).
pub const PAGE_FORMAT_VERSION: u16 = 1;

/// Canonical error taxonomy shared across storage, buffer, SQL, and protocol
/// layers (spec §7). `server::error` maps each variant to a SQLSTATE code.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("relation \"{0}\" does not exist")]
    TableNotFound(String),
    #[error("relation \"{0}\" already exists")]
    TableAlreadyExists(String),
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("column count mismatch: got {actual}, expected {expected}")]
    ColumnCountMismatch { actual: usize, expected: usize },
    #[error("column \"{column}\" is of type {expected} but expression is of type {actual}")]
    TypeMismatch {
        column: String,
        actual: String,
        expected: String,
    },
    #[error("value too long for type character varying({limit})")]
    ValueTooLong {
        column: String,
        actual_len: usize,
        limit: u32,
    },
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("file already exists: {0}")]
    FileAlreadyExists(String),
    #[error("page {0} not found")]
    PageNotFound(u64),
    #[error("no space on page")]
    NoSpace,
    #[error("no data pages")]
    NoDataPages,
    #[error("deserialize error: {0}")]
    Deserialize(String),
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),
    #[error("page not pinned")]
    PageNotPinned,
    #[error("page not cached")]
    PageNotCached,
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("connection failure: {0}")]
    ConnectionFailure(String),
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the server and its storage components, as
/// enumerated in spec §6. Loaded from CLI flags by the `server` binary.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder()
///     .port(5433)
///     .buffer_size(64)
///     .build();
/// assert_eq!(config.port, 5433);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Listener TCP port.
    #[builder(default = 5432)]
    pub port: u16,
    /// Buffer pool capacity, in pages.
    #[builder(default = 128)]
    pub buffer_size: usize,
    /// Per-query read deadline.
    #[builder(default = 30_000)]
    pub query_timeout_ms: u64,
    /// Per-frame deadline during startup and payload reads.
    #[builder(default = 10_000)]
    pub connection_timeout_ms: u64,
    /// Utilization fraction that triggers background eviction.
    #[builder(default = 0.80)]
    pub eviction_threshold: f64,
    /// Utilization fraction background eviction drains down to.
    #[builder(default = 0.60)]
    pub target_utilization: f64,
    /// Interval between background eviction sweeps.
    #[builder(default = 1_000)]
    pub eviction_interval_ms: u64,
    /// Directory containing the `pages/` subdirectory.
    #[builder(default = PathBuf::from("./data"))]
    pub data_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5432,
            buffer_size: 128,
            query_timeout_ms: 30_000,
            connection_timeout_ms: 10_000,
            eviction_threshold: 0.80,
            target_utilization: 0.60,
            eviction_interval_ms: 1_000,
            data_root: PathBuf::from("./data"),
        }
    }
}

impl Config {
    /// Directory holding one page file per table.
    pub fn pages_dir(&self) -> PathBuf {
        self.data_root.join("pages")
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        Config, DbError, DbResult, PageId, RecordBatch, Row, TableId, TableMetadata,
        PAGE_FORMAT_VERSION,
    };
    pub use types::{ColumnDef, ColumnType, Value};
}
