//! Loading player configuration (ready-notification metadata + timing knobs)
//! from TOML.
//!
//! See `PlayerConfig` for the expected schema.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PlayerConfig {
  #[serde(default)]
  pub metadata: PlayerMetadata,
  #[serde(default)]
  pub timing: Timing,
}

/// Metadata announced in the ready notification at connect.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PlayerMetadata {
  pub id: String,
  pub name: String,
  pub version: String,
  #[serde(rename = "apiVersion")]
  pub api_version: String,
}

impl Default for PlayerMetadata {
  fn default() -> Self {
    Self {
      id: "vop-player-core".into(),
      name: "VOP Item Player".into(),
      version: env!("CARGO_PKG_VERSION").into(),
      api_version: "vop-1.0".into(),
    }
  }
}

/// Fixed session delays. Overridable in TOML when a deployment needs longer
/// or shorter windows (e.g. slow devices in test centers).
#[derive(Clone, Debug, Deserialize)]
pub struct Timing {
  /// Idle delay before the "start moving" audio-button cue.
  #[serde(default = "default_animate_idle_ms")]
  pub animate_idle_delay_ms: u64,
  /// Continue-button clicked-flash duration.
  #[serde(default = "default_click_flash_ms")]
  pub click_flash_ms: u64,
}

fn default_animate_idle_ms() -> u64 {
  10_000
}

fn default_click_flash_ms() -> u64 {
  200
}

impl Default for Timing {
  fn default() -> Self {
    Self {
      animate_idle_delay_ms: default_animate_idle_ms(),
      click_flash_ms: default_click_flash_ms(),
    }
  }
}

/// Attempt to load `PlayerConfig` from PLAYER_CONFIG_PATH. On any parsing/IO
/// error, falls back to defaults; configuration is never fatal.
pub fn load_player_config_from_env() -> PlayerConfig {
  let Some(path) = std::env::var("PLAYER_CONFIG_PATH").ok() else {
    return PlayerConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PlayerConfig>(&s) {
      Ok(cfg) => {
        info!(target: "player_core", %path, "Loaded player config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "player_core", %path, error = %e, "Failed to parse TOML config; using defaults");
        PlayerConfig::default()
      }
    },
    Err(e) => {
      error!(target: "player_core", %path, error = %e, "Failed to read TOML config file; using defaults");
      PlayerConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_the_documented_delays() {
    let cfg = PlayerConfig::default();
    assert_eq!(cfg.timing.animate_idle_delay_ms, 10_000);
    assert_eq!(cfg.timing.click_flash_ms, 200);
    assert_eq!(cfg.metadata.api_version, "vop-1.0");
  }

  #[test]
  fn partial_toml_keeps_defaults_for_the_rest() {
    let cfg: PlayerConfig = toml::from_str(
      r#"
        [timing]
        click_flash_ms = 150
      "#,
    )
    .expect("toml");
    assert_eq!(cfg.timing.click_flash_ms, 150);
    assert_eq!(cfg.timing.animate_idle_delay_ms, 10_000);
    assert_eq!(cfg.metadata.id, "vop-player-core");
  }
}
