//! End-to-end tests driving the wire protocol directly over a loopback
//! `TcpStream`, covering scenarios S1-S6 from spec §8.

use bytes::{BufMut, BytesMut};
use common::Config;
use std::collections::HashMap;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const PROTOCOL_VERSION: i32 = 0x0003_0000;

async fn start_test_server() -> (SocketAddr, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::builder()
        .port(0)
        .buffer_size(64)
        .data_root(dir.path().to_path_buf())
        .build();
    let server = server::Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, dir)
}

async fn send_startup(stream: &mut TcpStream, protocol_version: i32) {
    let mut body = BytesMut::new();
    body.put_i32(protocol_version);
    body.put_slice(b"user\0tester\0database\0teach\0");
    body.put_u8(0);
    let mut packet = BytesMut::new();
    packet.put_i32(body.len() as i32 + 4);
    packet.extend_from_slice(&body);
    stream.write_all(&packet).await.unwrap();
}

async fn send_query(stream: &mut TcpStream, sql: &str) {
    let mut payload = BytesMut::new();
    payload.put_slice(sql.as_bytes());
    payload.put_u8(0);
    let mut frame = BytesMut::new();
    frame.put_u8(b'Q');
    frame.put_i32(payload.len() as i32 + 4);
    frame.extend_from_slice(&payload);
    stream.write_all(&frame).await.unwrap();
}

struct BackendFrame {
    tag: u8,
    payload: Vec<u8>,
}

async fn read_backend_frame(stream: &mut TcpStream) -> std::io::Result<BackendFrame> {
    let tag = stream.read_u8().await?;
    let len = stream.read_i32().await?;
    let mut payload = vec![0u8; (len - 4) as usize];
    stream.read_exact(&mut payload).await?;
    Ok(BackendFrame { tag, payload })
}

/// Connect, complete the startup handshake, and drain until `ReadyForQuery`.
async fn connect_ready(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_startup(&mut stream, PROTOCOL_VERSION).await;
    loop {
        let frame = read_backend_frame(&mut stream).await.unwrap();
        if frame.tag == b'Z' {
            break;
        }
    }
    stream
}

/// Read frames until (and including) the next `ReadyForQuery`, returning
/// everything read in order.
async fn read_until_ready(stream: &mut TcpStream) -> Vec<BackendFrame> {
    let mut frames = Vec::new();
    loop {
        let frame = read_backend_frame(stream).await.unwrap();
        let done = frame.tag == b'Z';
        frames.push(frame);
        if done {
            return frames;
        }
    }
}

fn parse_row_description(payload: &[u8]) -> Vec<(String, i32, i16)> {
    let mut cur = payload;
    let count = i16::from_be_bytes([cur[0], cur[1]]) as usize;
    cur = &cur[2..];
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let nul = cur.iter().position(|&b| b == 0).unwrap();
        let name = String::from_utf8_lossy(&cur[..nul]).to_string();
        cur = &cur[nul + 1..];
        cur = &cur[4..]; // table oid
        cur = &cur[2..]; // column attr
        let type_oid = i32::from_be_bytes(cur[0..4].try_into().unwrap());
        cur = &cur[4..];
        let type_size = i16::from_be_bytes(cur[0..2].try_into().unwrap());
        cur = &cur[2..];
        cur = &cur[4..]; // type modifier
        cur = &cur[2..]; // format code
        out.push((name, type_oid, type_size));
    }
    out
}

fn parse_data_row(payload: &[u8]) -> Vec<Option<String>> {
    let mut cur = payload;
    let count = i16::from_be_bytes([cur[0], cur[1]]) as usize;
    cur = &cur[2..];
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len = i32::from_be_bytes(cur[0..4].try_into().unwrap());
        cur = &cur[4..];
        if len < 0 {
            out.push(None);
        } else {
            let s = String::from_utf8_lossy(&cur[..len as usize]).to_string();
            cur = &cur[len as usize..];
            out.push(Some(s));
        }
    }
    out
}

fn parse_command_complete(payload: &[u8]) -> String {
    let nul = payload.iter().position(|&b| b == 0).unwrap();
    String::from_utf8_lossy(&payload[..nul]).to_string()
}

fn parse_error_fields(payload: &[u8]) -> HashMap<u8, String> {
    let mut cur = payload;
    let mut map = HashMap::new();
    while !cur.is_empty() && cur[0] != 0 {
        let code = cur[0];
        cur = &cur[1..];
        let nul = cur.iter().position(|&b| b == 0).unwrap();
        let value = String::from_utf8_lossy(&cur[..nul]).to_string();
        cur = &cur[nul + 1..];
        map.insert(code, value);
    }
    map
}

#[tokio::test]
async fn s1_literal_select() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;
    send_query(&mut stream, "SELECT 1").await;

    let frames = read_until_ready(&mut stream).await;
    assert_eq!(frames[0].tag, b'T');
    let fields = parse_row_description(&frames[0].payload);
    assert_eq!(fields, vec![("?column?".to_string(), 23, 4)]);

    assert_eq!(frames[1].tag, b'D');
    assert_eq!(parse_data_row(&frames[1].payload), vec![Some("1".to_string())]);

    assert_eq!(frames[2].tag, b'C');
    assert_eq!(parse_command_complete(&frames[2].payload), "SELECT 1");

    assert_eq!(frames[3].tag, b'Z');
}

#[tokio::test]
async fn s2_create_insert_select() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;

    send_query(&mut stream, "CREATE TABLE users (id INTEGER, name VARCHAR(255))").await;
    let frames = read_until_ready(&mut stream).await;
    assert_eq!(parse_command_complete(&frames[0].payload), "CREATE TABLE");

    send_query(&mut stream, "INSERT INTO users VALUES (1, 'John')").await;
    let frames = read_until_ready(&mut stream).await;
    assert_eq!(parse_command_complete(&frames[0].payload), "INSERT 0 1");

    send_query(&mut stream, "SELECT * FROM users").await;
    let frames = read_until_ready(&mut stream).await;
    assert_eq!(frames[0].tag, b'T');
    assert_eq!(
        parse_data_row(&frames[1].payload),
        vec![Some("1".to_string()), Some("John".to_string())]
    );
    assert_eq!(parse_command_complete(&frames[2].payload), "SELECT 1");
}

#[tokio::test]
async fn s3_type_mismatch() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;

    send_query(&mut stream, "CREATE TABLE users (id INTEGER, name VARCHAR(255))").await;
    read_until_ready(&mut stream).await;

    send_query(&mut stream, "INSERT INTO users VALUES ('nope', 'John')").await;
    let frames = read_until_ready(&mut stream).await;
    assert_eq!(frames[0].tag, b'E');
    let fields = parse_error_fields(&frames[0].payload);
    assert_eq!(fields[&b'S'], "ERROR");
    assert_eq!(fields[&b'C'], "22P02");
    assert!(fields[&b'M'].contains("id"));
    assert!(fields[&b'M'].contains("integer"));
    assert_eq!(frames[1].tag, b'Z');
}

#[tokio::test]
async fn s4_unknown_relation() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;

    send_query(&mut stream, "SELECT * FROM ghost").await;
    let frames = read_until_ready(&mut stream).await;
    assert_eq!(frames[0].tag, b'E');
    let fields = parse_error_fields(&frames[0].payload);
    assert_eq!(fields[&b'C'], "42P01");
    assert_eq!(fields[&b'M'], "relation \"ghost\" does not exist");
}

#[tokio::test]
async fn s5_page_overflow() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;

    send_query(&mut stream, "CREATE TABLE logs (msg VARCHAR(600))").await;
    read_until_ready(&mut stream).await;

    let long = "x".repeat(500);
    for _ in 0..20 {
        send_query(&mut stream, &format!("INSERT INTO logs VALUES ('{long}')")).await;
        read_until_ready(&mut stream).await;
    }

    send_query(&mut stream, "SELECT * FROM logs").await;
    let frames = read_until_ready(&mut stream).await;
    let data_rows = frames.iter().filter(|f| f.tag == b'D').count();
    assert_eq!(data_rows, 20);
}

#[tokio::test]
async fn s6_bad_protocol_version() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut packet = BytesMut::new();
    packet.put_i32(8);
    packet.put_i32(0xFFFF_FFFFu32 as i32);
    stream.write_all(&packet).await.unwrap();

    let frame = read_backend_frame(&mut stream).await.unwrap();
    assert_eq!(frame.tag, b'E');
    let fields = parse_error_fields(&frame.payload);
    assert_eq!(fields[&b'S'], "FATAL");
    assert_eq!(fields[&b'C'], "08P01");
    assert!(fields[&b'M'].contains("unsupported frontend protocol"));

    // The server closes after a FATAL: the next read observes EOF.
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn update_reports_affected_row_count() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;

    send_query(&mut stream, "CREATE TABLE users (id INTEGER, name VARCHAR(255))").await;
    read_until_ready(&mut stream).await;
    send_query(&mut stream, "INSERT INTO users VALUES (1, 'Ada')").await;
    read_until_ready(&mut stream).await;
    send_query(&mut stream, "INSERT INTO users VALUES (2, 'Bob')").await;
    read_until_ready(&mut stream).await;

    send_query(&mut stream, "UPDATE users SET name = 'Robert' WHERE id = 2").await;
    let frames = read_until_ready(&mut stream).await;
    assert_eq!(parse_command_complete(&frames[0].payload), "UPDATE 1");
}

#[tokio::test]
async fn connection_survives_a_terminate_and_a_fresh_connect() {
    let (addr, _dir) = start_test_server().await;
    let mut stream = connect_ready(addr).await;
    send_query(&mut stream, "CREATE TABLE t (id INTEGER)").await;
    read_until_ready(&mut stream).await;

    // Graceful terminate ('X'): no reply expected, socket just closes.
    let mut terminate = BytesMut::new();
    terminate.put_u8(b'X');
    terminate.put_i32(4);
    stream.write_all(&terminate).await.unwrap();
    drop(stream);

    // The table persists for a new connection.
    let mut stream2 = connect_ready(addr).await;
    send_query(&mut stream2, "INSERT INTO t VALUES (1)").await;
    let frames = read_until_ready(&mut stream2).await;
    assert_eq!(parse_command_complete(&frames[0].payload), "INSERT 0 1");
}
