/// Sample store: append-only persistence of hourly weather samples.
///
/// `PgStore` writes to the `clima` table (see `sql/001_clima.sql`) and
/// reconnects on its own after the server drops the connection.
/// `MemoryStore` keeps rows in process and backs the tests and `--memory`
/// runs. Both are shared as `Arc<dyn SampleStore>` between the daemon
/// thread and the endpoint workers.

use crate::condition::Condition;
use crate::db::{self, DbConfigError};
use crate::model::{NewSample, StoreError, WeatherSample};
use chrono::{DateTime, Utc};
use postgres::{Client, Row};
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub trait SampleStore: Send + Sync {
    /// Inserts one row and returns the id the store assigned.
    fn append(&self, sample: &NewSample) -> Result<i64, StoreError>;

    /// The row with the greatest timestamp. Ties go to the greater id.
    fn latest(&self) -> Result<WeatherSample, StoreError>;

    /// Rows with `from <= timestamp <= to`, oldest first.
    fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WeatherSample>, StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

const INSERT_SAMPLE: &str = "INSERT INTO clima (timestamp, temperatura, humedad, estado_clima)
     VALUES ($1, $2, $3, $4)
     RETURNING id";

const SELECT_LATEST: &str = "SELECT id, timestamp, temperatura, humedad, estado_clima
     FROM clima
     ORDER BY timestamp DESC, id DESC
     LIMIT 1";

const SELECT_BETWEEN: &str = "SELECT id, timestamp, temperatura, humedad, estado_clima
     FROM clima
     WHERE timestamp >= $1 AND timestamp <= $2
     ORDER BY timestamp ASC, id ASC";

/// Postgres-backed store. One connection, serialized behind a mutex and
/// reopened from the stored URL when the server drops it.
pub struct PgStore {
    conn: Reconnecting<Client>,
}

impl PgStore {
    /// Connects to `db_url`, checks the `clima` table, and keeps the URL
    /// for later reconnects.
    pub fn open(db_url: String) -> Result<Self, DbConfigError> {
        let client = db::connect_and_verify(&db_url)?;
        Ok(Self::new(client, db_url))
    }

    pub fn new(client: Client, db_url: String) -> Self {
        let connect = move || db::connect_with_validation(&db_url).map_err(|e| match e {
            DbConfigError::ConnectionFailed(inner) => inner.to_string(),
            other => other.to_string(),
        });
        Self {
            conn: Reconnecting::new(Some(client), Box::new(connect)),
        }
    }
}

impl SampleStore for PgStore {
    fn append(&self, sample: &NewSample) -> Result<i64, StoreError> {
        let id = self.conn.with(StoreError::Write, |client| {
            let row = client
                .query_one(
                    INSERT_SAMPLE,
                    &[
                        &sample.timestamp,
                        &sample.temperature,
                        &sample.humidity,
                        &sample.condition.label(),
                    ],
                )
                .map_err(|e| StoreError::Write(e.to_string()))?;

            let id: i64 = row
                .try_get(0)
                .map_err(|e| StoreError::Write(format!("missing returned id: {}", e)))?;
            Ok(id)
        })?;

        debug!(id, timestamp = %sample.timestamp, "inserted clima row");
        Ok(id)
    }

    fn latest(&self) -> Result<WeatherSample, StoreError> {
        self.conn.with(StoreError::Read, |client| {
            let row = client
                .query_opt(SELECT_LATEST, &[])
                .map_err(|e| StoreError::Read(e.to_string()))?
                .ok_or(StoreError::NotFound)?;
            sample_from_row(&row)
        })
    }

    fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WeatherSample>, StoreError> {
        self.conn.with(StoreError::Read, |client| {
            let rows = client
                .query(SELECT_BETWEEN, &[&from, &to])
                .map_err(|e| StoreError::Read(e.to_string()))?;
            rows.iter().map(sample_from_row).collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Reconnecting connection slot
// ---------------------------------------------------------------------------

/// A connection that can report it has been closed by the other side.
pub(crate) trait Connection: Send {
    fn is_closed(&self) -> bool;
}

impl Connection for Client {
    fn is_closed(&self) -> bool {
        Client::is_closed(self)
    }
}

type Connector<C> = Box<dyn Fn() -> Result<C, String> + Send + Sync>;

/// Holds at most one open connection and reopens it on demand.
///
/// A closed connection is replaced before use. If an operation fails and
/// leaves the connection closed, it is run once more on a fresh one.
pub(crate) struct Reconnecting<C> {
    slot: Mutex<Option<C>>,
    connect: Connector<C>,
}

impl<C: Connection> Reconnecting<C> {
    pub(crate) fn new(initial: Option<C>, connect: Connector<C>) -> Self {
        Self {
            slot: Mutex::new(initial),
            connect,
        }
    }

    /// Runs `op` on an open connection. `kind` wraps lock and reconnect
    /// failures so they surface as the caller's read or write error.
    pub(crate) fn with<T>(
        &self,
        kind: fn(String) -> StoreError,
        mut op: impl FnMut(&mut C) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| kind(format!("Lock error: {}", e)))?;

        let conn = self.open(&mut slot, kind)?;
        let result = op(&mut *conn);
        if result.is_ok() || !conn.is_closed() {
            return result;
        }

        warn!("database connection closed during query, retrying once on a new connection");
        *slot = None;
        let conn = self.open(&mut slot, kind)?;
        op(conn)
    }

    fn open<'a>(&self, slot: &'a mut Option<C>, kind: fn(String) -> StoreError) -> Result<&'a mut C, StoreError> {
        match slot.take() {
            Some(conn) if !conn.is_closed() => Ok(slot.insert(conn)),
            stale => {
                if stale.is_some() {
                    warn!("database connection lost, reconnecting");
                }
                let conn = (self.connect)().map_err(|e| kind(format!("reconnect failed: {}", e)))?;
                info!("database connection re-established");
                Ok(slot.insert(conn))
            }
        }
    }
}

/// Converts a `clima` row (column order as in the SELECTs above).
fn sample_from_row(row: &Row) -> Result<WeatherSample, StoreError> {
    let read = |e: postgres::Error| StoreError::Read(format!("unexpected column type: {}", e));

    let label: String = row.try_get(4).map_err(read)?;
    let condition: Condition = label
        .parse()
        .map_err(|e: crate::condition::UnknownLabel| StoreError::Read(e.to_string()))?;

    Ok(WeatherSample {
        id: row.try_get(0).map_err(read)?,
        timestamp: row.try_get(1).map_err(read)?,
        temperature: row.try_get(2).map_err(read)?,
        humidity: row.try_get(3).map_err(read)?,
        condition,
    })
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Store kept entirely in process memory. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<WeatherSample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every row in insertion order.
    pub fn all(&self) -> Vec<WeatherSample> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SampleStore for MemoryStore {
    fn append(&self, sample: &NewSample) -> Result<i64, StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| StoreError::Write(format!("Lock error: {}", e)))?;

        let id = rows.last().map_or(1, |r| r.id + 1);
        rows.push(WeatherSample::from_new(id, sample));
        Ok(id)
    }

    fn latest(&self) -> Result<WeatherSample, StoreError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| StoreError::Read(format!("Lock error: {}", e)))?;

        rows.iter()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WeatherSample>, StoreError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| StoreError::Read(format!("Lock error: {}", e)))?;

        let mut selected: Vec<WeatherSample> = rows
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp <= to)
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(selected)
    }
}
