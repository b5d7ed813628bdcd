//! Maps the storage/SQL error taxonomy to the SQLSTATE/severity pairs the
//! wire protocol reports (spec §4.7's error table).

use common::DbError;
use protocol::{ErrorInfo, Severity};

pub fn map_error(err: &DbError) -> ErrorInfo {
    let message = err.to_string();
    let (code, severity) = match err {
        DbError::TableNotFound(_) => ("42P01", Severity::Error),
        DbError::TableAlreadyExists(_) => ("42P07", Severity::Error),
        DbError::Syntax(_) => ("42601", Severity::Error),
        DbError::UnsupportedFeature(_) => ("0A000", Severity::Error),
        DbError::TypeMismatch { .. } => ("22P02", Severity::Error),
        DbError::ColumnCountMismatch { .. } | DbError::ValueTooLong { .. } => {
            ("22026", Severity::Error)
        }
        DbError::ProtocolViolation(_) => ("08P01", Severity::Fatal),
        _ => ("XX000", Severity::Error),
    };
    ErrorInfo::new(severity, code, message)
}
