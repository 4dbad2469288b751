//! Binary entrypoint: read JSON lines from stdin, write JSON lines to stdout.
//!
//! Each input line is an InboundDetection (`{"timestamp": "...", "type": "..."}`).
//! Output lines are either:
//! - An AlertNotice (every event while the watched run is at/above threshold)
//! - An ErrorOutput (when a line is rejected)
//! - A final `{"aggregate": {...}}` once input is exhausted
//!
//! Flags: --config <path>  --store <path>  --clear  --demo

use std::io::{self, BufRead, Write};

use detection_engine::types::ErrorOutput;
use detection_engine::{Config, EventStore, InboundDetection, JsonlStore, MemoryStore, Pipeline};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Simulated feed, one detection every ~30 seconds.
const DEMO_DETECTIONS: &[(&str, &str)] = &[
  ("2023-08-10T18:30:30", "pedestrian"),
  ("2023-08-10T18:31:00", "pedestrian"),
  ("2023-08-10T18:31:00", "car"),
  ("2023-08-10T18:31:30", "pedestrian"),
  ("2023-08-10T18:35:00", "pedestrian"),
  ("2023-08-10T18:35:30", "pedestrian"),
  ("2023-08-10T18:36:00", "pedestrian"),
  ("2023-08-10T18:37:00", "pedestrian"),
  ("2023-08-10T18:37:30", "pedestrian"),
];

struct Args {
  config: Option<String>,
  store: Option<String>,
  clear: bool,
  demo: bool,
}

fn parse_args() -> Result<Args, String> {
  let mut args = Args {
    config: None,
    store: None,
    clear: false,
    demo: false,
  };
  let mut it = std::env::args().skip(1);
  while let Some(arg) = it.next() {
    match arg.as_str() {
      "--config" => args.config = Some(it.next().ok_or("--config needs a path")?),
      "--store" => args.store = Some(it.next().ok_or("--store needs a path")?),
      "--clear" => args.clear = true,
      "--demo" => args.demo = true,
      other => return Err(format!("unknown argument {:?}", other)),
    }
  }
  Ok(args)
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  if let Err(e) = run_binary() {
    let _ = writeln!(io::stderr(), "detection-engine error: {}", e);
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), Box<dyn std::error::Error>> {
  let args = parse_args()?;
  let config = match &args.config {
    Some(path) => Config::from_path(path)?,
    None => Config::default(),
  };

  match &args.store {
    Some(path) => {
      tracing::info!(%path, "using durable event log");
      run(Pipeline::open(config, JsonlStore::open(path)?)?, &args)
    }
    None => run(Pipeline::open(config, MemoryStore::new())?, &args),
  }
}

fn run<S: EventStore>(mut pipeline: Pipeline<S>, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  if args.clear {
    pipeline.clear()?;
  }

  if args.demo {
    for (timestamp, detection_type) in DEMO_DETECTIONS {
      handle(&mut pipeline, &mut out, &InboundDetection::new(*timestamp, *detection_type))?;
    }
  } else {
    for line in io::stdin().lock().lines() {
      let line = line?;

      // Skip blank lines.
      let trimmed = line.trim();
      if trimmed.is_empty() {
        continue;
      }

      match serde_json::from_str::<InboundDetection>(trimmed) {
        Ok(raw) => handle(&mut pipeline, &mut out, &raw)?,
        Err(e) => {
          let err = ErrorOutput::new("json", format!("json parse: {}", e));
          serde_json::to_writer(&mut out, &err)?;
          writeln!(out)?;
        }
      }
    }
  }

  let report = pipeline.aggregate()?;
  serde_json::to_writer(&mut out, &json!({ "aggregate": report }))?;
  writeln!(out)?;
  out.flush()?;
  Ok(())
}

fn handle<S: EventStore, W: Write>(
  pipeline: &mut Pipeline<S>,
  out: &mut W,
  raw: &InboundDetection,
) -> io::Result<()> {
  match pipeline.ingest_raw(raw) {
    Ok(outcome) => {
      if let Some(alert) = outcome.alert {
        serde_json::to_writer(&mut *out, &alert)?;
        writeln!(out)?;
      }
    }
    Err(e) => {
      serde_json::to_writer(&mut *out, &ErrorOutput::from(&e))?;
      writeln!(out)?;
    }
  }
  Ok(())
}
