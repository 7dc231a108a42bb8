//! Continue-button visibility: a pure function of the unit's rule and the
//! current gate/store state, recomputed after every mutation. The only
//! latched inputs are the ones the caller latches (main-audio-ended,
//! any-response-seen, video-ended); nothing in here counts or remembers.

use crate::responses::ResponseStore;
use crate::unit::{ContinueButtonShow, VariableInfo};

/// Everything the visibility decision depends on.
pub struct CompletionInputs<'a> {
  pub rule: ContinueButtonShow,
  pub store: &'a ResponseStore,
  pub variable_info: &'a [VariableInfo],
  /// Latched by the session: true once the main audio reached ENDED, or
  /// trivially true when the unit has no playable main audio.
  pub main_audio_complete: bool,
  /// Latched by the session once the video widget reports ended.
  pub video_ended: bool,
  /// Latched by the session after the first progress-relevant response.
  pub any_response_seen: bool,
}

/// Is the continue affordance visible right now?
pub fn continue_visible(inputs: &CompletionInputs<'_>) -> bool {
  match inputs.rule.effective() {
    ContinueButtonShow::Always => true,
    ContinueButtonShow::No => false,
    ContinueButtonShow::OnAnyResponse => inputs.any_response_seen,
    // Recomputed, never latched: answers can toggle back to incomplete.
    ContinueButtonShow::OnResponsesComplete => inputs.store.all_complete(inputs.variable_info),
    ContinueButtonShow::OnMainAudioComplete => inputs.main_audio_complete,
    ContinueButtonShow::OnAudioAndResponse => {
      inputs.main_audio_complete && inputs.store.all_complete(inputs.variable_info)
    }
    ContinueButtonShow::OnVideoComplete => inputs.video_ended,
    ContinueButtonShow::Unknown => unreachable!("effective() collapses Unknown"),
  }
}
