//! First-interaction gate: the click layer, the animate-button idle cue, and
//! the audio-driven interaction lock. A pure gate, read by the session on
//! every recompute; widgets never mutate it directly.

use crate::unit::MainAudio;

#[derive(Debug, Default)]
pub struct FirstInteractionGate {
  first_interaction_done: bool,
  first_click_layer: bool,
  animate_button: bool,
  disable_interaction_until_complete: bool,
}

impl FirstInteractionGate {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reconfigure from the unit's main audio options; resets the
  /// first-interaction latch for the new session.
  pub fn configure(&mut self, main_audio: Option<&MainAudio>) {
    self.first_interaction_done = false;
    self.first_click_layer = main_audio.map_or(false, |a| a.first_click_layer);
    self.animate_button = main_audio.map_or(false, |a| a.animate_button);
    self.disable_interaction_until_complete =
      main_audio.map_or(false, |a| a.disable_interaction_until_complete);
  }

  /// Idempotent. Returns true only on the transition, so the caller can
  /// remove the click layer and cancel the idle-animate timer exactly once.
  pub fn record_first_interaction(&mut self) -> bool {
    if self.first_interaction_done {
      return false;
    }
    self.first_interaction_done = true;
    true
  }

  pub fn first_interaction_done(&self) -> bool {
    self.first_interaction_done
  }

  /// The full-viewport transparent layer is shown until the first gesture.
  pub fn click_layer_active(&self) -> bool {
    self.first_click_layer && !self.first_interaction_done
  }

  pub fn first_click_layer_configured(&self) -> bool {
    self.first_click_layer
  }

  /// Should the "start moving" idle timer be armed right now? Never once the
  /// first interaction happened.
  pub fn wants_animate_timer(&self) -> bool {
    self.animate_button && !self.first_interaction_done
  }

  /// Widgets render disabled until the main audio has ended at least once.
  pub fn interaction_locked(&self, main_audio_ended_once: bool) -> bool {
    self.disable_interaction_until_complete && !main_audio_ended_once
  }
}
