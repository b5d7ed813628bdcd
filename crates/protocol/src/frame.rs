//! Reading and writing PostgreSQL v3 frames over an async stream.
//!
//! Every frame after the startup packet is `byte type || int32 length ||
//! payload`, length counting itself but not the type byte. The startup
//! packet omits the type byte entirely.

use crate::message::{BackendMessage, ErrorInfo, FrontendMessage, StartupRequest};
use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read a null-terminated string from `buf`, advancing past the NUL.
/// Returns an error if no NUL is found before the buffer is exhausted.
fn read_cstr(buf: &mut &[u8]) -> io::Result<String> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unterminated string"))?;
    let s = String::from_utf8_lossy(&buf[..nul]).into_owned();
    *buf = &buf[nul + 1..];
    Ok(s)
}

fn write_cstr(out: &mut BytesMut, s: &str) {
    out.put_slice(s.as_bytes());
    out.put_u8(0);
}

/// Read and parse the startup packet: `int32 length` then `length - 4`
/// bytes holding the protocol version and key/value pairs.
pub async fn read_startup<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<StartupRequest> {
    let len = reader.read_i32().await?;
    if len < 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "startup packet shorter than the minimum 8 bytes",
        ));
    }
    let mut payload = vec![0u8; (len - 4) as usize];
    reader.read_exact(&mut payload).await?;

    let mut cursor = &payload[..];
    let protocol_version = cursor.get_i32();

    let mut params = Vec::new();
    while !cursor.is_empty() && cursor[0] != 0 {
        let key = read_cstr(&mut cursor)?;
        let value = read_cstr(&mut cursor)?;
        params.push((key, value));
    }

    Ok(StartupRequest {
        protocol_version,
        params,
    })
}

/// Read one typed frontend frame. Only `Q` (simple query) and `X`
/// (terminate) are supported; anything else is a protocol violation.
pub async fn read_frontend_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> io::Result<FrontendMessage> {
    let tag = reader.read_u8().await?;
    let len = reader.read_i32().await?;
    if len < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame length shorter than its own length prefix",
        ));
    }
    let mut payload = vec![0u8; (len - 4) as usize];
    reader.read_exact(&mut payload).await?;

    match tag {
        b'Q' => {
            if payload.last() == Some(&0) {
                payload.pop();
            }
            let sql = String::from_utf8_lossy(&payload).into_owned();
            Ok(FrontendMessage::Query(sql))
        }
        b'X' => Ok(FrontendMessage::Terminate),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported frontend message type {:?}", other as char),
        )),
    }
}

/// Encode one backend message into `type_byte || int32 length || payload`
/// (the startup-reply messages all carry a type byte; there is no
/// untyped backend frame).
fn encode(msg: &BackendMessage) -> BytesMut {
    let (tag, mut payload) = match msg {
        BackendMessage::AuthenticationOk => {
            let mut p = BytesMut::new();
            p.put_i32(0);
            (b'R', p)
        }
        BackendMessage::ParameterStatus { name, value } => {
            let mut p = BytesMut::new();
            write_cstr(&mut p, name);
            write_cstr(&mut p, value);
            (b'S', p)
        }
        BackendMessage::BackendKeyData {
            process_id,
            secret_key,
        } => {
            let mut p = BytesMut::new();
            p.put_i32(*process_id);
            p.put_i32(*secret_key);
            (b'K', p)
        }
        BackendMessage::ReadyForQuery => {
            let mut p = BytesMut::new();
            p.put_u8(b'I');
            (b'Z', p)
        }
        BackendMessage::RowDescription(fields) => {
            let mut p = BytesMut::new();
            p.put_i16(fields.len() as i16);
            for field in fields {
                write_cstr(&mut p, &field.name);
                p.put_i32(0); // table OID: not tracked
                p.put_i16(0); // column attribute number: not tracked
                p.put_i32(field.type_oid);
                p.put_i16(field.type_size);
                p.put_i32(-1); // type modifier
                p.put_i16(0); // format code: text
            }
            (b'T', p)
        }
        BackendMessage::DataRow(values) => {
            let mut p = BytesMut::new();
            p.put_i16(values.len() as i16);
            for value in values {
                match value {
                    Some(text) => {
                        p.put_i32(text.len() as i32);
                        p.put_slice(text.as_bytes());
                    }
                    None => p.put_i32(-1),
                }
            }
            (b'D', p)
        }
        BackendMessage::CommandComplete(tag_str) => {
            let mut p = BytesMut::new();
            write_cstr(&mut p, tag_str);
            (b'C', p)
        }
        BackendMessage::ErrorResponse(info) => (b'E', encode_error_fields(info)),
    };

    let mut out = BytesMut::with_capacity(payload.len() + 5);
    out.put_u8(tag);
    out.put_i32(payload.len() as i32 + 4);
    out.append(&mut payload);
    out
}

fn encode_error_fields(info: &ErrorInfo) -> BytesMut {
    let mut p = BytesMut::new();
    p.put_u8(b'S');
    write_cstr(&mut p, info.severity.as_str());
    p.put_u8(b'V');
    write_cstr(&mut p, info.severity.as_str());
    p.put_u8(b'C');
    write_cstr(&mut p, info.code);
    p.put_u8(b'M');
    write_cstr(&mut p, &info.message);
    if let Some(detail) = &info.detail {
        p.put_u8(b'D');
        write_cstr(&mut p, detail);
    }
    if let Some(hint) = &info.hint {
        p.put_u8(b'H');
        write_cstr(&mut p, hint);
    }
    p.put_u8(0);
    p
}

/// Write one backend message.
pub async fn write_backend_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &BackendMessage,
) -> io::Result<()> {
    let buf = encode(msg);
    writer.write_all(&buf).await
}
