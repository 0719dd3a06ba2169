//! Postgres wire protocol inspector — spec §4.8.
//!
//! Frames are `<type:1 byte><length:4 bytes BE><payload>`; `length` includes
//! itself but not the type byte. The startup message has no type byte: it
//! is `<length:4 bytes BE><protocol version:4 bytes><key\0value\0...>\0`.
//! No reference implementation of this framing exists in the retrieval
//! pack; it is written directly from the byte-level description above.
//!
//! Only Simple Query (`Q`) payloads are decoded for deny-list inspection.
//! Extended-query-protocol frames (`Parse`/`Bind`/`Execute`) are forwarded
//! untouched; `Terminate` (`X`) ends the session after forwarding.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::warn;

use super::audit::{AuditKind, AuditRecord, AuditSink, RiskLevel};
use super::deny_list::DenyList;

const SIMPLE_QUERY: u8 = b'Q';
const TERMINATE: u8 = b'X';

struct ConnectionState {
    client_ip: SocketAddr,
    user: Option<String>,
    database: Option<String>,
}

pub async fn handle_connection(
    mut client: TcpStream,
    client_addr: SocketAddr,
    backend_host: &str,
    backend_port: u16,
    deny_list: Arc<DenyList>,
    audit: Arc<dyn AuditSink>,
) -> std::io::Result<()> {
    let mut backend = match TcpStream::connect((backend_host, backend_port)).await {
        Ok(stream) => stream,
        Err(e) => {
            let response = build_error_response("backend connection unavailable");
            let _ = client.write_all(&response).await;
            audit
                .record(AuditRecord {
                    family: None,
                    client_ip: client_addr,
                    user: None,
                    database: None,
                    kind: AuditKind::ConnectionError,
                    risk: RiskLevel::Medium,
                    target: Some(format!("{backend_host}:{backend_port}")),
                    sql_snippet: None,
                    duration_ms: None,
                    result: format!("backend connect failed: {e}"),
                    timestamp: chrono::Utc::now(),
                })
                .await;
            return Ok(());
        }
    };

    let mut state = ConnectionState {
        client_ip: client_addr,
        user: None,
        database: None,
    };

    // Startup message: forward verbatim, but parse out user/database first.
    let startup = match read_startup_message(&mut client).await {
        Ok(bytes) => bytes,
        Err(_) => return Ok(()),
    };
    parse_startup_params(&startup, &mut state);
    if backend.write_all(&startup).await.is_err() {
        return Ok(());
    }

    let (mut backend_read, mut backend_write) = backend.into_split();
    let (mut client_read, mut client_write) = client.into_split();
    let mut backend_buf = vec![0u8; 8192];

    loop {
        tokio::select! {
            frame = read_message(&mut client_read) => {
                match frame {
                    Ok(Some(frame)) => {
                        let started = Instant::now();
                        let sql = if frame.msg_type == SIMPLE_QUERY {
                            extract_nul_terminated_string(&frame.payload)
                        } else {
                            None
                        };

                        if let Some(query) = &sql {
                            if let Some(pattern) = deny_list.check(query) {
                                let response = build_error_response("operation not permitted");
                                let _ = client_write.write_all(&response).await;
                                audit
                                    .record(AuditRecord {
                                        family: None,
                                        client_ip: state.client_ip,
                                        user: state.user.clone(),
                                        database: state.database.clone(),
                                        kind: AuditKind::DangerousOperationBlocked,
                                        risk: RiskLevel::High,
                                        target: Some(pattern.to_string()),
                                        sql_snippet: Some(query.clone()),
                                        duration_ms: Some(started.elapsed().as_millis() as u64),
                                        result: "blocked".to_string(),
                                        timestamp: chrono::Utc::now(),
                                    })
                                    .await;
                                return Ok(());
                            }
                        }

                        if backend_write.write_all(&frame.raw).await.is_err() {
                            return Ok(());
                        }

                        audit
                            .record(AuditRecord {
                                family: None,
                                client_ip: state.client_ip,
                                user: state.user.clone(),
                                database: state.database.clone(),
                                kind: AuditKind::Query,
                                risk: RiskLevel::Low,
                                target: None,
                                sql_snippet: sql,
                                duration_ms: Some(started.elapsed().as_millis() as u64),
                                result: "forwarded".to_string(),
                                timestamp: chrono::Utc::now(),
                            })
                            .await;

                        if frame.msg_type == TERMINATE {
                            return Ok(());
                        }
                    }
                    Ok(None) => return Ok(()),
                    Err(e) => {
                        warn!(error = %e, client = %state.client_ip, "proxy: client read failed");
                        audit
                            .record(AuditRecord {
                                family: None,
                                client_ip: state.client_ip,
                                user: state.user.clone(),
                                database: state.database.clone(),
                                kind: AuditKind::ConnectionError,
                                risk: RiskLevel::Medium,
                                target: None,
                                sql_snippet: None,
                                duration_ms: None,
                                result: format!("mid-stream error: {e}"),
                                timestamp: chrono::Utc::now(),
                            })
                            .await;
                        return Ok(());
                    }
                }
            }
            n = backend_read.read(&mut backend_buf) => {
                match n {
                    Ok(0) => return Ok(()),
                    Ok(n) => {
                        if client_write.write_all(&backend_buf[..n]).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

struct Frame {
    msg_type: u8,
    payload: Vec<u8>,
    raw: Vec<u8>,
}

async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> std::io::Result<Option<Frame>> {
    let mut type_byte = [0u8; 1];
    match reader.read_exact(&mut type_byte).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = i32::from_be_bytes(len_bytes) as usize;
    let payload_len = len.saturating_sub(4);

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;

    let mut raw = Vec::with_capacity(1 + 4 + payload_len);
    raw.push(type_byte[0]);
    raw.extend_from_slice(&len_bytes);
    raw.extend_from_slice(&payload);

    Ok(Some(Frame {
        msg_type: type_byte[0],
        payload,
        raw,
    }))
}

async fn read_startup_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = i32::from_be_bytes(len_bytes) as usize;
    let rest_len = len.saturating_sub(4);
    let mut rest = vec![0u8; rest_len];
    reader.read_exact(&mut rest).await?;

    let mut raw = Vec::with_capacity(len);
    raw.extend_from_slice(&len_bytes);
    raw.extend_from_slice(&rest);
    Ok(raw)
}

fn parse_startup_params(raw: &[u8], state: &mut ConnectionState) {
    if raw.len() < 8 {
        return;
    }
    // raw is `length_bytes ++ rest`; skip the length field and the
    // 4-byte protocol version that follows it.
    let params = &raw[8..];
    let strings: Vec<&[u8]> = params.split(|b| *b == 0).filter(|s| !s.is_empty()).collect();
    let mut iter = strings.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let key = String::from_utf8_lossy(key);
        let value = String::from_utf8_lossy(value).into_owned();
        match key.as_ref() {
            "user" => state.user = Some(value),
            "database" => state.database = Some(value),
            _ => {}
        }
    }
}

fn extract_nul_terminated_string(payload: &[u8]) -> Option<String> {
    let end = payload.iter().position(|b| *b == 0)?;
    Some(String::from_utf8_lossy(&payload[..end]).into_owned())
}

/// Synthesizes a minimal Postgres `ErrorResponse` wire message, field tag
/// `S`(everity)/`C`(ode)/`M`(essage) followed by the null terminators the
/// protocol requires.
fn build_error_response(message: &str) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.push(b'S');
    fields.extend_from_slice(b"ERROR\0");
    fields.push(b'C');
    fields.extend_from_slice(b"42501\0"); // insufficient_privilege
    fields.push(b'M');
    fields.extend_from_slice(message.as_bytes());
    fields.push(0);
    fields.push(0); // message-list terminator

    let len = (fields.len() + 4) as i32;
    let mut out = Vec::with_capacity(1 + fields.len() + 4);
    out.push(b'E');
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&fields);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_has_correct_framing() {
        let msg = build_error_response("nope");
        assert_eq!(msg[0], b'E');
        let len = i32::from_be_bytes([msg[1], msg[2], msg[3], msg[4]]) as usize;
        assert_eq!(len + 1, msg.len());
    }

    #[test]
    fn extracts_sql_from_simple_query_payload() {
        let mut payload = b"SELECT 1".to_vec();
        payload.push(0);
        assert_eq!(extract_nul_terminated_string(&payload).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn parses_user_and_database_from_startup_params() {
        let mut raw = vec![0u8; 4]; // length field, unused by the parser itself
        raw.extend_from_slice(&[0, 3, 0, 0]); // protocol version 3.0
        raw.extend_from_slice(b"user\0alice\0database\0family_db\0\0");
        let mut state = ConnectionState {
            client_ip: "127.0.0.1:1".parse().unwrap(),
            user: None,
            database: None,
        };
        parse_startup_params(&raw, &mut state);
        assert_eq!(state.user.as_deref(), Some("alice"));
        assert_eq!(state.database.as_deref(), Some("family_db"));
    }
}
