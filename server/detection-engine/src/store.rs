//! Event store boundary: append-only log of detections, scanned in timestamp order.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::EngineError;
use crate::types::DetectionEvent;

/// Durable log consumed by the pipeline. Failures surface as
/// `EngineError::StoreUnavailable`; callers own any retry policy.
pub trait EventStore {
  fn append(&mut self, event: &DetectionEvent) -> Result<(), EngineError>;

  /// All appended events, ordered by timestamp; ties keep append order.
  fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError>;

  fn clear(&mut self) -> Result<(), EngineError>;
}

/// Volatile store for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  events: Vec<DetectionEvent>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }
}

impl EventStore for MemoryStore {
  fn append(&mut self, event: &DetectionEvent) -> Result<(), EngineError> {
    self.events.push(event.clone());
    Ok(())
  }

  fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError> {
    let mut events = self.events.clone();
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
  }

  fn clear(&mut self) -> Result<(), EngineError> {
    self.events.clear();
    Ok(())
  }
}

/// One JSON object per line, appended and synced per event.
#[derive(Debug)]
pub struct JsonlStore {
  path: PathBuf,
  file: File,
}

impl JsonlStore {
  /// Open (or create) the log at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let path = path.as_ref().to_path_buf();
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(|e| EngineError::store(format!("open {}: {}", path.display(), e)))?;
    Ok(Self { path, file })
  }
}

/// Append target that can report and restore its length.
trait LogFile: Write {
  fn byte_len(&self) -> io::Result<u64>;
  fn truncate(&mut self, len: u64) -> io::Result<()>;
  fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
  fn byte_len(&self) -> io::Result<u64> {
    Ok(self.metadata()?.len())
  }

  fn truncate(&mut self, len: u64) -> io::Result<()> {
    self.set_len(len)
  }

  fn sync(&mut self) -> io::Result<()> {
    self.sync_data()
  }
}

/// Write and sync one record. On failure the file is cut back to its prior
/// length so no torn or unapplied line survives.
fn append_record<F: LogFile>(file: &mut F, record: &[u8]) -> io::Result<()> {
  let len = file.byte_len()?;
  if let Err(e) = file.write_all(record).and_then(|_| file.sync()) {
    if let Err(undo) = file.truncate(len) {
      warn!(error = %undo, len, "rollback of failed append failed");
    }
    return Err(e);
  }
  Ok(())
}

impl EventStore for JsonlStore {
  fn append(&mut self, event: &DetectionEvent) -> Result<(), EngineError> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    append_record(&mut self.file, line.as_bytes())
      .map_err(|e| EngineError::store(format!("append {}: {}", self.path.display(), e)))
  }

  fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError> {
    let raw = std::fs::read_to_string(&self.path)
      .map_err(|e| EngineError::store(format!("read {}: {}", self.path.display(), e)))?;

    let mut events = raw
      .lines()
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty())
      .map(|(n, line)| {
        serde_json::from_str::<DetectionEvent>(line).map_err(|e| {
          EngineError::store(format!("{}:{}: corrupt record: {}", self.path.display(), n + 1, e))
        })
      })
      .collect::<Result<Vec<_>, EngineError>>()?;
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
  }

  fn clear(&mut self) -> Result<(), EngineError> {
    self
      .file
      .set_len(0)
      .map_err(|e| EngineError::store(format!("truncate {}: {}", self.path.display(), e)))?;
    info!(path = %self.path.display(), "cleared event log");
    Ok(())
  }
}
