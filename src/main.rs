//! VOP Item-Player Core
//!
//! - Axum HTTP + WebSocket API; one player session per WS connection
//! - Host-window messaging protocol (vopStartCommand in, vop*Notification out)
//! - Static presentation fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT          : u16 (default 3000)
//!   PLAYER_CONFIG_PATH : path to TOML config (metadata + timing overrides)
//!   LOG_LEVEL    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod telemetry;
mod util;
mod config;
mod unit;
mod coding;
mod responses;
mod audio;
mod gates;
mod continuation;
mod feedback;
mod timer;
mod session;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::load_player_config_from_env;
use crate::routes::build_router;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Load player configuration (ready metadata, timing knobs).
  let config = Arc::new(load_player_config_from_env());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(config.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "player_core", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
