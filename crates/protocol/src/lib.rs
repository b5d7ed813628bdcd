//! PostgreSQL v3 simple-query wire protocol: message shapes ([`message`])
//! and their on-the-wire framing ([`frame`]).

pub mod frame;
pub mod message;

pub use message::{
    BackendMessage, ErrorInfo, FieldDescription, FrontendMessage, Severity, StartupRequest,
    PROTOCOL_VERSION, value_to_text,
};
