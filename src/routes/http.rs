//! HTTP endpoint handlers. The player itself speaks WebSocket; HTTP only
//! carries health checks and the player metadata for host discovery.

use std::sync::Arc;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use tracing::instrument;

use crate::config::{PlayerConfig, PlayerMetadata};

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(config))]
pub async fn http_metadata(State(config): State<Arc<PlayerConfig>>) -> Json<PlayerMetadata> {
  Json(config.metadata.clone())
}
