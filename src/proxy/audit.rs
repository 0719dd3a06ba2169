//! Audit records emitted by the TCP Protocol Proxy — spec §4.8.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditKind {
    Query,
    DangerousOperationBlocked,
    ConnectionError,
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub family: Option<String>,
    pub client_ip: SocketAddr,
    pub user: Option<String>,
    pub database: Option<String>,
    pub kind: AuditKind,
    pub risk: RiskLevel,
    pub target: Option<String>,
    pub sql_snippet: Option<String>,
    pub duration_ms: Option<u64>,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// Sink for audit records. A structured-logging sink is the only
/// implementation needed here; the trait exists so a future sink (e.g. a
/// database table) can be swapped in without touching the proxy.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) {
        info!(
            client_ip = %record.client_ip,
            user = ?record.user,
            database = ?record.database,
            kind = ?record.kind,
            risk = ?record.risk,
            target = ?record.target,
            sql = ?record.sql_snippet,
            duration_ms = ?record.duration_ms,
            result = %record.result,
            "proxy audit"
        );
    }
}
