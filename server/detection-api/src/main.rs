//! Binary entrypoint for the detection API.

use std::net::SocketAddr;
use std::sync::Arc;

use detection_api::{AppState, PgEventStore};
use detection_engine::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "5005".into())
    .parse()
    .map_err(|_| "PORT must be a valid u16")?;
  let config = match std::env::var("DETECTION_CONFIG") {
    Ok(path) => Config::from_path(path)?,
    Err(_) => Config::default(),
  };

  let pool = sqlx_postgres::PgPool::connect(&database_url).await?;
  let log = PgEventStore::connect(pool).await?;
  let state = Arc::new(AppState::open(config, Box::new(log)).await?);

  let app = detection_api::router(state);

  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  tracing::info!(%addr, "detection-api listening");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
