//! Trade persistence over sqlite.
//!
//! One table, append-only from the pipeline's perspective: each attempted
//! execution becomes a `TradeRecord` row. Rows are immutable once written.

use chrono::{ DateTime, Utc };
use rusqlite::{ params, Connection, Row };
use std::path::Path;
use std::sync::Mutex;

use crate::errors::{ BotError, BotResult };
use crate::logger::{ self, LogTag };
use crate::types::{ ExecutionStatus, TradeAction, TradeRecord };

pub struct TradeStore {
    conn: Mutex<Connection>,
}

impl TradeStore {
    /// Open (or create) the trade database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> BotResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> BotResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> BotResult<()> {
        let conn = self.conn.lock().map_err(|_| {
            BotError::Config("trade store mutex poisoned".to_string())
        })?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT UNIQUE NOT NULL,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                price REAL NOT NULL,
                execution_price REAL NOT NULL,
                status TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            []
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades (timestamp DESC)",
            []
        )?;
        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
        let action_str: String = row.get(3)?;
        let status_str: String = row.get(6)?;
        let timestamp_str: String = row.get(7)?;

        Ok(TradeRecord {
            id: row.get(0)?,
            order_id: row.get(1)?,
            symbol: row.get(2)?,
            action: TradeAction::from_str(&action_str).unwrap_or(TradeAction::Hold),
            price: row.get(4)?,
            execution_price: row.get(5)?,
            status: ExecutionStatus::from_str(&status_str).unwrap_or(ExecutionStatus::Error),
            timestamp: timestamp_str
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Append one execution record inside a transaction and return the stored
    /// row with its assigned id. A failure rolls the transaction back.
    pub fn append(
        &self,
        order_id: &str,
        symbol: &str,
        action: TradeAction,
        price: f64,
        execution_price: f64,
        status: ExecutionStatus,
        timestamp: DateTime<Utc>
    ) -> BotResult<TradeRecord> {
        let mut conn = self.conn.lock().map_err(|_| {
            BotError::Config("trade store mutex poisoned".to_string())
        })?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO trades (order_id, symbol, action, price, execution_price, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                order_id,
                symbol,
                action.as_str(),
                price,
                execution_price,
                status.as_str(),
                timestamp.to_rfc3339()
            ]
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        logger::debug(
            LogTag::Database,
            &format!("Stored trade {} ({} {})", order_id, action, status)
        );

        Ok(TradeRecord {
            id,
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            action,
            price,
            execution_price,
            status,
            timestamp,
        })
    }

    /// Most recent trades, newest first.
    pub fn list_recent(&self, limit: u32) -> BotResult<Vec<TradeRecord>> {
        let conn = self.conn.lock().map_err(|_| {
            BotError::Config("trade store mutex poisoned".to_string())
        })?;

        let mut stmt = conn.prepare(
            "SELECT id, order_id, symbol, action, price, execution_price, status, timestamp
             FROM trades
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1"
        )?;

        let rows = stmt.query_map(params![limit], |row| Self::row_to_record(row))?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}
