use async_trait::async_trait;
use rusqlite::Connection;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Mutex;

use crate::errors::{OpsError, OpsResult};

/// One structured record per notified device event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub device: String,
    pub event: String,
    pub description: String,
    pub logdate: String,
    pub logtime: String,
    /// Source address, numerically encoded for range queries.
    pub source: u32,
    /// Correlation id of the chat message this record accompanies.
    pub message: String,
}

/// External log sink capability: persist one record into a named table.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn write(&self, table: &str, record: &EventRecord) -> OpsResult<()>;
}

/// Encode an address the way the reporting tables expect: IPv4 as its
/// big-endian integer value. IPv6 sources are recorded as zero - the device
/// fleet is managed over IPv4.
pub fn encode_source_address(addr: IpAddr) -> u32 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4),
        IpAddr::V6(_) => 0,
    }
}

/// Table names come from config and are spliced into the SQL text, so only
/// bare identifiers are accepted.
fn valid_table_name(table: &str) -> bool {
    !table.is_empty() && table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// SQLite-backed event log.
#[derive(Debug)]
pub struct SqliteEventLog {
    conn: Mutex<Connection>,
}

impl SqliteEventLog {
    pub fn open(path: &Path, table: &str) -> OpsResult<Self> {
        if !valid_table_name(table) {
            return Err(OpsError::LogSink(format!("invalid table name: {}", table)));
        }
        let conn = Connection::open(path).map_err(|e| OpsError::LogSink(e.to_string()))?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    device TEXT NOT NULL,
                    event TEXT NOT NULL,
                    description TEXT NOT NULL,
                    logdate TEXT NOT NULL,
                    logtime TEXT NOT NULL,
                    source INTEGER NOT NULL,
                    message TEXT NOT NULL
                )",
                table
            ),
            [],
        )
        .map_err(|e| OpsError::LogSink(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl EventLog for SqliteEventLog {
    async fn write(&self, table: &str, record: &EventRecord) -> OpsResult<()> {
        if !valid_table_name(table) {
            return Err(OpsError::LogSink(format!("invalid table name: {}", table)));
        }
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute(
            &format!(
                "INSERT INTO {} (device, event, description, logdate, logtime, source, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                table
            ),
            rusqlite::params![
                record.device,
                record.event,
                record.description,
                record.logdate,
                record.logtime,
                record.source,
                record.message,
            ],
        )
        .map_err(|e| OpsError::LogSink(e.to_string()))?;
        Ok(())
    }
}
