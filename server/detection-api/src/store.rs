//! Async event log: PostgreSQL in production, in-memory for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use detection_engine::{DetectionEvent, EngineError, EventStore, MemoryStore};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, Postgres};

/// Async counterpart of `detection_engine::EventStore`.
#[async_trait]
pub trait EventLog: Send + Sync {
  async fn append(&mut self, event: &DetectionEvent) -> Result<(), EngineError>;

  /// Every appended event ordered by timestamp, ties in append order.
  async fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError>;

  async fn clear(&mut self) -> Result<(), EngineError>;
}

fn db_err(op: &str, e: sqlx_core::Error) -> EngineError {
  EngineError::store(format!("{}: {}", op, e))
}

pub struct PgEventStore {
  pool: PgPool,
}

impl PgEventStore {
  /// Wrap `pool`, creating the detections table if it does not exist.
  pub async fn connect(pool: PgPool) -> Result<Self, EngineError> {
    query::<Postgres>(
      r#"
      CREATE TABLE IF NOT EXISTS detections (
        id BIGSERIAL PRIMARY KEY,
        time TIMESTAMPTZ NOT NULL,
        type VARCHAR NOT NULL
      )
      "#,
    )
    .execute(&pool)
    .await
    .map_err(|e| db_err("create table", e))?;
    Ok(Self { pool })
  }
}

#[async_trait]
impl EventLog for PgEventStore {
  async fn append(&mut self, event: &DetectionEvent) -> Result<(), EngineError> {
    query::<Postgres>("INSERT INTO detections (time, type) VALUES ($1, $2)")
      .bind(event.timestamp)
      .bind(event.detection_type.clone())
      .execute(&self.pool)
      .await
      .map_err(|e| db_err("insert", e))?;
    Ok(())
  }

  async fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError> {
    let rows = query::<Postgres>("SELECT time, type FROM detections ORDER BY time, id")
      .fetch_all(&self.pool)
      .await
      .map_err(|e| db_err("scan", e))?;

    rows
      .iter()
      .map(|row| -> Result<DetectionEvent, EngineError> {
        let time: DateTime<Utc> = row.try_get("time").map_err(|e| db_err("decode time", e))?;
        let kind: String = row.try_get("type").map_err(|e| db_err("decode type", e))?;
        Ok(DetectionEvent::new(time, kind))
      })
      .collect()
  }

  async fn clear(&mut self) -> Result<(), EngineError> {
    query::<Postgres>("DELETE FROM detections")
      .execute(&self.pool)
      .await
      .map_err(|e| db_err("clear", e))?;
    Ok(())
  }
}

/// Adapts the engine's synchronous `MemoryStore`.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
  store: MemoryStore,
}

impl MemoryEventLog {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl EventLog for MemoryEventLog {
  async fn append(&mut self, event: &DetectionEvent) -> Result<(), EngineError> {
    self.store.append(event)
  }

  async fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError> {
    self.store.scan_ordered()
  }

  async fn clear(&mut self) -> Result<(), EngineError> {
    self.store.clear()
  }
}
