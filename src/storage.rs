//! SQLite persistence for cached generations and the usage log.
//!
//! One database file holds two tables:
//!
//! - `generations`: insert-only response cache, keyed by fingerprint
//! - `llm_usage`: append-only accounting records
//!
//! rusqlite is synchronous, so every call hops onto the blocking pool and
//! takes the connection mutex there.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::debug;

use crate::cache::CacheBackend;
use crate::fingerprint::CacheKey;
use crate::types::GenerationOutput;
use crate::usage::{UsageRecord, UsageSink};
use crate::{RepurposeError, Result};

/// Create tables and indexes if they do not exist yet.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS generations (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS llm_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at INTEGER NOT NULL,
            route TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            model TEXT NOT NULL,
            input_chars INTEGER NOT NULL DEFAULT 0,
            cost_usd REAL NOT NULL DEFAULT 0.0,
            meta TEXT NOT NULL DEFAULT '{}'
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_llm_usage_created_at
         ON llm_usage(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_llm_usage_cache_key
         ON llm_usage(cache_key)",
        [],
    )?;

    Ok(())
}

/// SQLite-backed cache backend and usage sink.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&guard)
        })
        .await
        .map_err(|e| RepurposeError::Storage(format!("blocking task failed: {e}")))?
    }

    /// Usage records for one fingerprint, oldest first.
    pub async fn usage_for(&self, key: &CacheKey) -> Result<Vec<UsageRecord>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT route, cache_key, model, input_chars, cost_usd, meta
                 FROM llm_usage WHERE cache_key = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (route, cache_key, model, input_chars, cost_usd, meta) = row?;
                records.push(UsageRecord {
                    route,
                    cache_key,
                    model,
                    input_chars: usize::try_from(input_chars).unwrap_or_default(),
                    cost_usd,
                    meta: serde_json::from_str(&meta)?,
                });
            }
            Ok(records)
        })
        .await
    }

    /// Total recorded spend in USD.
    pub async fn total_cost(&self) -> Result<f64> {
        self.with_conn(|conn| {
            let total = conn.query_row(
                "SELECT COALESCE(SUM(cost_usd), 0.0) FROM llm_usage",
                [],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
    }
}

#[async_trait]
impl CacheBackend for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<GenerationOutput>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM generations WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            match payload {
                Some(p) => Ok(Some(serde_json::from_str(&p)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, key: &CacheKey, output: &GenerationOutput) -> Result<()> {
        let key = key.to_string();
        let payload = serde_json::to_string(output)?;
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO generations (key, payload, created_at) VALUES (?1, ?2, ?3)",
                params![key, payload, unix_now()],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    debug!(%key, "generation already cached by a concurrent request");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

#[async_trait]
impl UsageSink for SqliteStore {
    async fn append(&self, record: &UsageRecord) -> Result<()> {
        let meta = serde_json::to_string(&record.meta)?;
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO llm_usage (created_at, route, cache_key, model, input_chars, cost_usd, meta)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    unix_now(),
                    record.route,
                    record.cache_key,
                    record.model,
                    i64::try_from(record.input_chars).unwrap_or(i64::MAX),
                    record.cost_usd,
                    meta,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
