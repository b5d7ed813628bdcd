//! Per-connection handshake and query loop (spec §4.7).
//!
//! Runs cooperatively on its own socket: parsing, execution, and response
//! streaming are strictly sequential within a connection, while distinct
//! connections run on independent tasks.

use common::DbError;
use executor::{ExecOutcome, Executor};
use protocol::{
    BackendMessage, ErrorInfo, FieldDescription, FrontendMessage, PROTOCOL_VERSION, Severity,
    frame, value_to_text,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

/// Drive one connection end to end. Never returns an error: all I/O
/// failures are logged and simply end the loop, matching "connection loss
/// terminates the task" (spec §5).
pub async fn handle_connection<S>(
    mut stream: S,
    executor: Arc<Executor>,
    query_timeout: Duration,
    connection_timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(connection_timeout, frame::read_startup(&mut stream)).await {
        Ok(Ok(startup)) => {
            if startup.protocol_version != PROTOCOL_VERSION {
                tracing::warn!(
                    version = format!("{:#010x}", startup.protocol_version as u32),
                    "rejecting unsupported frontend protocol"
                );
                let _ = frame::write_backend_message(
                    &mut stream,
                    &BackendMessage::ErrorResponse(ErrorInfo::new(
                        Severity::Fatal,
                        "08P01",
                        "unsupported frontend protocol",
                    )),
                )
                .await;
                return;
            }
            tracing::info!(params = ?startup.params, "startup handshake accepted");
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "malformed startup packet, closing without reply");
            return;
        }
        Err(_) => {
            tracing::warn!("timed out waiting for startup packet");
            return;
        }
    }

    if let Err(err) = send_startup_reply(&mut stream).await {
        tracing::warn!(error = %err, "failed to send startup reply");
        return;
    }

    loop {
        let message = match timeout(query_timeout, frame::read_frontend_message(&mut stream)).await
        {
            Ok(Ok(message)) => message,
            Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::info!("connection closed by peer");
                return;
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "closing connection after a protocol error");
                return;
            }
            Err(_) => continue, // idle read timeout: benign, reloop
        };

        match message {
            FrontendMessage::Terminate => {
                tracing::info!("connection terminated by client");
                return;
            }
            FrontendMessage::Query(sql) => {
                tracing::debug!(sql = %sql, "executing query");
                if let Err(err) = execute_and_respond(&mut stream, &executor, &sql).await {
                    tracing::warn!(error = %err, "failed to write query response");
                    return;
                }
            }
        }
    }
}

async fn send_startup_reply<S: AsyncWrite + Unpin>(stream: &mut S) -> io::Result<()> {
    frame::write_backend_message(stream, &BackendMessage::AuthenticationOk).await?;
    for (name, value) in [
        ("server_version", "14.0 (teachdb)"),
        ("server_encoding", "UTF8"),
        ("client_encoding", "UTF8"),
        ("DateStyle", "ISO, MDY"),
        ("TimeZone", "UTC"),
        ("integer_datetimes", "on"),
        ("standard_conforming_strings", "on"),
    ] {
        frame::write_backend_message(
            stream,
            &BackendMessage::ParameterStatus {
                name: name.to_string(),
                value: value.to_string(),
            },
        )
        .await?;
    }
    frame::write_backend_message(
        stream,
        &BackendMessage::BackendKeyData {
            process_id: std::process::id() as i32,
            secret_key: 0,
        },
    )
    .await?;
    frame::write_backend_message(stream, &BackendMessage::ReadyForQuery).await
}

async fn execute_and_respond<S: AsyncWrite + Unpin>(
    stream: &mut S,
    executor: &Executor,
    sql: &str,
) -> io::Result<()> {
    let stmt = match parser::parse_sql(sql) {
        Ok(stmt) => stmt,
        Err(err) => return send_error(stream, &err).await,
    };

    match executor.execute(stmt) {
        Ok(ExecOutcome::Select(result)) => {
            let fields = result
                .columns
                .iter()
                .map(|c| FieldDescription::new(c.name.clone(), c.ty))
                .collect();
            frame::write_backend_message(stream, &BackendMessage::RowDescription(fields)).await?;

            let row_count = result.rows.len();
            for row in &result.rows {
                let values = row.iter().map(value_to_text).collect();
                frame::write_backend_message(stream, &BackendMessage::DataRow(values)).await?;
            }
            frame::write_backend_message(
                stream,
                &BackendMessage::CommandComplete(format!("SELECT {row_count}")),
            )
            .await?;
        }
        Ok(ExecOutcome::Insert) => {
            frame::write_backend_message(
                stream,
                &BackendMessage::CommandComplete("INSERT 0 1".to_string()),
            )
            .await?;
        }
        Ok(ExecOutcome::CreateTable) => {
            frame::write_backend_message(
                stream,
                &BackendMessage::CommandComplete("CREATE TABLE".to_string()),
            )
            .await?;
        }
        Ok(ExecOutcome::Update { count }) => {
            frame::write_backend_message(
                stream,
                &BackendMessage::CommandComplete(format!("UPDATE {count}")),
            )
            .await?;
        }
        Err(err) => return send_error(stream, &err).await,
    }

    frame::write_backend_message(stream, &BackendMessage::ReadyForQuery).await
}

async fn send_error<S: AsyncWrite + Unpin>(stream: &mut S, err: &DbError) -> io::Result<()> {
    let info = crate::error::map_error(err);
    frame::write_backend_message(stream, &BackendMessage::ErrorResponse(info)).await?;
    frame::write_backend_message(stream, &BackendMessage::ReadyForQuery).await
}
