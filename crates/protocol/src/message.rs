//! PostgreSQL v3 message shapes exchanged on the wire, independent of how
//! they're framed (see [`crate::frame`]).

use types::{ColumnType, Value};

/// The protocol version this server accepts. Anything else in a startup
/// packet is a fatal mismatch (spec §4.7).
pub const PROTOCOL_VERSION: i32 = 0x0003_0000;

/// Parsed startup packet: protocol version plus the null-terminated
/// key/value pairs the client sent (`user`, `database`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupRequest {
    pub protocol_version: i32,
    pub params: Vec<(String, String)>,
}

/// A frontend message read from the main loop, after the startup handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    /// `Q`: a single SQL string, already stripped of its trailing NUL.
    Query(String),
    /// `X`: graceful termination.
    Terminate,
}

/// One field of a `RowDescription`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub type_oid: i32,
    pub type_size: i16,
}

impl FieldDescription {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        let (type_oid, type_size) = oid_for(&ty);
        Self {
            name: name.into(),
            type_oid,
            type_size,
        }
    }
}

/// OID and wire size for a column type (spec §4.7: integer→23/4, text→25/-1,
/// varchar→1043/-1, boolean→16/1).
fn oid_for(ty: &ColumnType) -> (i32, i16) {
    match ty {
        ColumnType::Integer => (23, 4),
        ColumnType::Text => (25, -1),
        ColumnType::Varchar(_) => (1043, -1),
        ColumnType::Boolean => (16, 1),
    }
}

/// Render a value as the text-format field Postgres clients expect:
/// integers base-10, booleans as `t`/`f`, `NULL` as the absence of bytes.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Int(n) => Some(n.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "t".to_string() } else { "f".to_string() }),
        Value::Null => None,
    }
}

/// Severity tag carried in `ErrorResponse`'s `S`/`V` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// A SQLSTATE error response, with the common optional fields spec §4.7
/// names (`detail`, `hint`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl ErrorInfo {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            detail: None,
            hint: None,
        }
    }
}

/// One backend message, everything the server can send after the startup
/// handshake completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    AuthenticationOk,
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: i32, secret_key: i32 },
    /// `I` = idle, the only transaction status this server ever reports.
    ReadyForQuery,
    RowDescription(Vec<FieldDescription>),
    DataRow(Vec<Option<String>>),
    CommandComplete(String),
    ErrorResponse(ErrorInfo),
}
