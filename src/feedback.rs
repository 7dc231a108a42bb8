//! Feedback selection on continue-click: match the current response value
//! against the configured feedback rules, gate navigation on the feedback
//! clip, and de-duplicate against the previously played clip.

use tracing::debug;

use crate::coding;
use crate::responses::ResponseStore;
use crate::unit::{AudioFeedback, FeedbackRule, UnitDefinition};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackPhase {
  Idle,
  /// The 200ms clicked flash is running.
  Flashing,
  /// Feedback audio is playing; navigation fires when it finishes.
  AwaitingAudio,
}

/// What to do once the click flash has elapsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlashOutcome {
  Navigate,
  PlayFeedback { source: String },
}

#[derive(Debug)]
pub struct FeedbackSelector {
  phase: FeedbackPhase,
  last_played_source: Option<String>,
}

impl Default for FeedbackSelector {
  fn default() -> Self {
    Self { phase: FeedbackPhase::Idle, last_played_source: None }
  }
}

impl FeedbackSelector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  pub fn phase(&self) -> FeedbackPhase {
    self.phase
  }

  /// A continue click is accepted only when idle and no audio is playing;
  /// otherwise it is dropped so feedback can never double-trigger.
  pub fn accept_click(&mut self, audio_playing: bool) -> bool {
    if audio_playing || self.phase != FeedbackPhase::Idle {
      debug!(target: "player_core", phase = ?self.phase, audio_playing, "continue click ignored");
      return false;
    }
    self.phase = FeedbackPhase::Flashing;
    true
  }

  /// Flash elapsed: decide between feedback playback and direct navigation.
  /// `selected` is the matched feedback source, if any. A source identical to
  /// the previously played one is skipped entirely.
  pub fn flash_done(&mut self, selected: Option<String>) -> FlashOutcome {
    match selected {
      Some(source) if !source.trim().is_empty() => {
        if self.last_played_source.as_deref() == Some(source.as_str()) {
          debug!(target: "player_core", %source, "feedback unchanged, skipping replay");
          self.phase = FeedbackPhase::Idle;
          return FlashOutcome::Navigate;
        }
        self.last_played_source = Some(source.clone());
        self.phase = FeedbackPhase::AwaitingAudio;
        FlashOutcome::PlayFeedback { source }
      }
      _ => {
        self.phase = FeedbackPhase::Idle;
        FlashOutcome::Navigate
      }
    }
  }

  /// Feedback clip finished (or its playback was rejected): navigation may
  /// fire now.
  pub fn feedback_finished(&mut self) -> bool {
    if self.phase != FeedbackPhase::AwaitingAudio {
      return false;
    }
    self.phase = FeedbackPhase::Idle;
    true
  }
}

/// First feedback rule (list order) matching its variable's current value.
/// A rule without a variable id targets the unit's primary variable.
pub fn select_feedback<'a>(
  feedback: &'a AudioFeedback,
  unit: &UnitDefinition,
  store: &ResponseStore,
) -> Option<&'a FeedbackRule> {
  feedback.feedback.iter().find(|rule| {
    let variable_id = if rule.variable_id.is_empty() {
      match unit.primary_variable_id() {
        Some(id) => id,
        None => return false,
      }
    } else {
      rule.variable_id.as_str()
    };
    let Some(value) = store.value_of(variable_id) else {
      return false;
    };
    let coded = coding::apply_source(rule.source, value);
    coding::matches(rule.method, &rule.parameter, &coded)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::responses::ResponseEvent;
  use crate::unit::{CodeMethod, CodingSource, UnitDefinition};
  use serde_json::json;

  fn rule(variable_id: &str, parameter: &str, audio_source: &str) -> FeedbackRule {
    FeedbackRule {
      variable_id: variable_id.into(),
      source: CodingSource::Value,
      method: CodeMethod::Equals,
      parameter: parameter.into(),
      audio_source: audio_source.into(),
    }
  }

  #[test]
  fn click_is_ignored_while_audio_plays_or_mid_flow() {
    let mut sel = FeedbackSelector::new();
    assert!(!sel.accept_click(true), "audio playing");
    assert!(sel.accept_click(false));
    assert!(!sel.accept_click(false), "already flashing");
  }

  #[test]
  fn no_matching_feedback_navigates_after_the_flash() {
    let mut sel = FeedbackSelector::new();
    sel.accept_click(false);
    assert_eq!(sel.flash_done(None), FlashOutcome::Navigate);
    assert_eq!(sel.phase(), FeedbackPhase::Idle);
  }

  #[test]
  fn identical_feedback_source_is_played_only_once() {
    // P6: second click with the same selected clip navigates without audio.
    let mut sel = FeedbackSelector::new();
    sel.accept_click(false);
    assert_eq!(
      sel.flash_done(Some("correct.mp3".into())),
      FlashOutcome::PlayFeedback { source: "correct.mp3".into() }
    );
    assert!(sel.feedback_finished());

    sel.accept_click(false);
    assert_eq!(sel.flash_done(Some("correct.mp3".into())), FlashOutcome::Navigate);

    // A different clip plays again.
    sel.accept_click(false);
    assert_eq!(
      sel.flash_done(Some("incorrect.mp3".into())),
      FlashOutcome::PlayFeedback { source: "incorrect.mp3".into() }
    );
  }

  #[test]
  fn empty_audio_source_in_matched_rule_navigates_directly() {
    let mut sel = FeedbackSelector::new();
    sel.accept_click(false);
    assert_eq!(sel.flash_done(Some("  ".into())), FlashOutcome::Navigate);
  }

  #[test]
  fn selection_matches_rules_in_order_against_current_values() {
    let unit = UnitDefinition::from_json(r#"{"variableInfo": [{"variableId": "v1"}]}"#).expect("unit");
    let feedback = AudioFeedback {
      trigger: "onContinue".into(),
      feedback: vec![rule("v1", "right", "correct.mp3"), rule("", "wrong", "incorrect.mp3")],
    };
    let mut store = ResponseStore::new();
    store.append(vec![ResponseEvent::value_changed("v1", json!("wrong"))]);
    let hit = select_feedback(&feedback, &unit, &store).expect("rule");
    assert_eq!(hit.audio_source, "incorrect.mp3");

    store.append(vec![ResponseEvent::value_changed("v1", json!("right"))]);
    let hit = select_feedback(&feedback, &unit, &store).expect("rule");
    assert_eq!(hit.audio_source, "correct.mp3");
  }

  #[test]
  fn selection_without_any_value_matches_nothing() {
    let unit = UnitDefinition::from_json("{}").expect("unit");
    let feedback =
      AudioFeedback { trigger: String::new(), feedback: vec![rule("v1", "x", "a.mp3")] };
    let store = ResponseStore::new();
    assert!(select_feedback(&feedback, &unit, &store).is_none());
  }
}
