//! The per-connection player session: one synchronous state machine that
//! coordinates the response store, the audio gate, the first-interaction
//! gate, the feedback selector and the opening flow.
//!
//! `handle` consumes one event (an inbound message or a fired timer) and
//! returns the effects to apply: outbound messages plus timer scheduling.
//! Continue visibility is recomputed after every event and emitted only on
//! change; nothing here polls.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::audio::{
  AudioGate, AudioStatus, FinishKind, FinishWaiter, LoadOutcome, PlayOutcome, FEEDBACK_AUDIO_ID,
  MAIN_AUDIO_ID, OPENING_AUDIO_ID,
};
use crate::coding;
use crate::config::PlayerConfig;
use crate::continuation::{continue_visible, CompletionInputs};
use crate::feedback::{select_feedback, FeedbackSelector, FlashOutcome};
use crate::gates::FirstInteractionGate;
use crate::protocol::{ClientWsMessage, ServerWsMessage, UnitState};
use crate::responses::{ResponseEvent, ResponseStore};
use crate::timer::TimerPurpose;
use crate::unit::{InteractionParameters, UnitDefinition};

/// One step of session input: a client message or a fired timer.
#[derive(Debug)]
pub enum PlayerEvent {
  Message(ClientWsMessage),
  Timer(TimerPurpose),
}

/// What the session wants done after handling an event. The WS task applies
/// these in order; tests assert on them directly.
#[derive(Debug, PartialEq)]
pub enum Effect {
  Send(ServerWsMessage),
  Schedule(TimerPurpose, Duration),
  Cancel(TimerPurpose),
}

/// Opening-flow sub-state-machine: audio to completion, image for a
/// duration, then normal flow. Must fully pass (including the zero-duration
/// fast path) before widgets and the completion evaluator go live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpeningFlow {
  AwaitingAudio,
  ShowingImage,
  Done,
}

pub struct PlayerSession {
  session_id: String,
  unit: Option<UnitDefinition>,
  store: ResponseStore,
  audio: AudioGate,
  gate: FirstInteractionGate,
  feedback: FeedbackSelector,
  opening: OpeningFlow,
  video_ended: bool,
  /// Last emitted continue visibility; directives go out only on change.
  continue_emitted: bool,
  /// Last emitted interaction-lock state.
  lock_emitted: bool,
  /// Audio id to start as soon as its media element reports ready.
  autoplay_when_ready: Option<String>,
  animate_idle_delay: Duration,
  click_flash: Duration,
}

impl PlayerSession {
  pub fn new(config: &PlayerConfig) -> Self {
    Self {
      session_id: String::new(),
      unit: None,
      store: ResponseStore::new(),
      audio: AudioGate::new(),
      gate: FirstInteractionGate::new(),
      feedback: FeedbackSelector::new(),
      opening: OpeningFlow::Done,
      video_ended: false,
      continue_emitted: false,
      lock_emitted: false,
      autoplay_when_ready: None,
      animate_idle_delay: Duration::from_millis(config.timing.animate_idle_delay_ms),
      click_flash: Duration::from_millis(config.timing.click_flash_ms),
    }
  }

  pub fn session_id(&self) -> &str {
    &self.session_id
  }

  /// Handle one event and return the effects to apply.
  #[instrument(level = "debug", skip(self, event), fields(session = %self.session_id))]
  pub fn handle(&mut self, event: PlayerEvent) -> Vec<Effect> {
    let mut effects = Vec::new();
    match event {
      PlayerEvent::Message(msg) => self.handle_message(msg, &mut effects),
      PlayerEvent::Timer(purpose) => self.handle_timer(purpose, &mut effects),
    }
    effects
  }

  fn handle_message(&mut self, msg: ClientWsMessage, effects: &mut Vec<Effect>) {
    match msg {
      ClientWsMessage::VopStartCommand { session_id, unit_definition } => {
        self.start(session_id, &unit_definition, effects);
      }
      ClientWsMessage::Response { responses } => self.on_responses(responses, effects),
      ClientWsMessage::AudioReady { id } => self.on_audio_ready(&id, effects),
      ClientWsMessage::AudioEnded { id } => self.on_audio_finished(&id, FinishKind::Ended, effects),
      ClientWsMessage::AudioPaused { id, percent } => {
        self.on_audio_finished(&id, FinishKind::Paused { percent }, effects)
      }
      ClientWsMessage::PlayRequest { id } => {
        if self.live() {
          self.note_interaction(effects);
          self.try_play(&id, effects);
        }
      }
      ClientWsMessage::ContinueClick => self.on_continue_click(effects),
      ClientWsMessage::FirstInteraction => {
        if self.live() {
          self.note_interaction(effects);
        }
        self.recompute(effects);
      }
      ClientWsMessage::VideoEnded => {
        self.video_ended = true;
        self.recompute(effects);
      }
      ClientWsMessage::WindowFocus { focused } => {
        effects.push(Effect::Send(ServerWsMessage::VopWindowFocusChangedNotification {
          has_focus: focused,
        }));
      }
    }
  }

  fn handle_timer(&mut self, purpose: TimerPurpose, effects: &mut Vec<Effect>) {
    match purpose {
      TimerPurpose::AnimateIdle => {
        // A gesture may have raced the firing; never animate after one.
        if self.live() && self.gate.wants_animate_timer() {
          effects.push(Effect::Send(ServerWsMessage::AnimateAudioButton));
        }
      }
      TimerPurpose::ClickFlash => self.on_flash_done(effects),
      TimerPurpose::OpeningImage => {
        if self.opening == OpeningFlow::ShowingImage {
          effects.push(Effect::Send(ServerWsMessage::HideOpeningImage));
          self.activate(effects);
        }
      }
    }
  }

  /// Normal interaction and gating are live only once the opening flow has
  /// fully completed.
  fn live(&self) -> bool {
    self.unit.is_some() && self.opening == OpeningFlow::Done
  }

  // ----- session start / reset -----

  fn start(&mut self, session_id: String, raw_unit: &str, effects: &mut Vec<Effect>) {
    // Reset everything from any previous start on this socket.
    self.store.clear();
    self.audio.reset();
    self.feedback.reset();
    self.video_ended = false;
    self.continue_emitted = false;
    self.lock_emitted = false;
    self.autoplay_when_ready = None;
    effects.push(Effect::Cancel(TimerPurpose::AnimateIdle));
    effects.push(Effect::Cancel(TimerPurpose::ClickFlash));
    effects.push(Effect::Cancel(TimerPurpose::OpeningImage));

    let unit = match UnitDefinition::from_json(raw_unit) {
      Ok(u) => u,
      Err(e) => {
        // Startup precondition violation: surfaced to the host, not swallowed.
        error!(target: "session", %session_id, error = %e, "unit definition failed to parse");
        self.unit = None;
        self.opening = OpeningFlow::Done;
        effects.push(Effect::Send(ServerWsMessage::Error {
          message: format!("Invalid unit definition: {e}"),
        }));
        return;
      }
    };

    info!(target: "session", %session_id, interaction = ?unit.interaction_type, rule = ?unit.continue_button_show, "session started");
    self.session_id = session_id;
    self.gate.configure(unit.main_audio.as_ref());

    let opening = unit
      .opening_image
      .as_ref()
      .filter(|o| !o.image_source.trim().is_empty())
      .cloned();
    self.unit = Some(unit);

    match opening {
      Some(o) if !o.audio_source.trim().is_empty() => {
        self.opening = OpeningFlow::AwaitingAudio;
        self.load_and_autoplay(OPENING_AUDIO_ID, &o.audio_source, 1, effects);
      }
      Some(_) => {
        // No opening audio: go directly to the image step.
        self.opening = OpeningFlow::AwaitingAudio;
        self.opening_audio_done(effects);
      }
      None => self.activate(effects),
    }
  }

  /// Opening flow finished (or absent): wire up the main audio, the click
  /// layer, the idle-animate timer and the interaction lock, then compute
  /// the initial continue visibility.
  fn activate(&mut self, effects: &mut Vec<Effect>) {
    self.opening = OpeningFlow::Done;
    let main = match self.unit.as_ref() {
      Some(unit) => unit.main_audio.clone(),
      None => return,
    };

    if let Some(main) = main {
      let previous = self.audio.current_id().map(str::to_string);
      let (_, was_playing, outcome) =
        self.audio.load(MAIN_AUDIO_ID, &main.audio_source, main.max_play);
      if was_playing {
        let id = previous.unwrap_or_else(|| OPENING_AUDIO_ID.into());
        effects.push(Effect::Send(ServerWsMessage::PauseAudio { id }));
      }
      if outcome == LoadOutcome::Loading {
        effects.push(Effect::Send(ServerWsMessage::LoadAudio {
          id: MAIN_AUDIO_ID.into(),
          source: main.audio_source.clone(),
        }));
      }
    }

    if self.gate.click_layer_active() {
      effects.push(Effect::Send(ServerWsMessage::ClickLayer { visible: true }));
    }
    if self.gate.wants_animate_timer() {
      effects.push(Effect::Schedule(TimerPurpose::AnimateIdle, self.animate_idle_delay));
    }
    if self.gate.interaction_locked(self.main_audio_complete()) {
      self.lock_emitted = true;
      effects.push(Effect::Send(ServerWsMessage::InteractionLock { locked: true }));
    }
    self.recompute(effects);
  }

  fn opening_audio_done(&mut self, effects: &mut Vec<Effect>) {
    let opening = self
      .unit
      .as_ref()
      .and_then(|u| u.opening_image.clone())
      .unwrap_or_default();
    if opening.presentation_duration_ms == 0 {
      // Zero-duration fast path: the image never appears and normal flow is
      // live within the same handling step.
      self.activate(effects);
      return;
    }
    self.opening = OpeningFlow::ShowingImage;
    effects.push(Effect::Send(ServerWsMessage::ShowOpeningImage { source: opening.image_source }));
    effects.push(Effect::Schedule(
      TimerPurpose::OpeningImage,
      Duration::from_millis(opening.presentation_duration_ms),
    ));
  }

  // ----- responses -----

  fn on_responses(&mut self, responses: Vec<ResponseEvent>, effects: &mut Vec<Effect>) {
    if !self.live() {
      warn!(target: "session", session = %self.session_id, "responses dropped, session not live");
      return;
    }
    let admitted = self.admit(responses);
    if admitted.is_empty() {
      return;
    }
    self.note_interaction(effects);
    self.append_and_publish(admitted, effects);
  }

  /// Interaction-type-aware admission: WRITE values clamp to the configured
  /// maximum length, FIND_ON_IMAGE values must parse as "x,y". Everything
  /// else passes through untouched.
  fn admit(&self, responses: Vec<ResponseEvent>) -> Vec<ResponseEvent> {
    let Some(unit) = self.unit.as_ref() else {
      return Vec::new();
    };
    match unit.parameters() {
      InteractionParameters::Write(p) if p.max_input_length > 0 => responses
        .into_iter()
        .map(|mut e| {
          if e.id == p.variable_id {
            if let Value::String(s) = &e.value {
              if s.chars().count() > p.max_input_length {
                let clamped: String = s.chars().take(p.max_input_length).collect();
                e.value = Value::String(clamped);
              }
            }
          }
          e
        })
        .collect(),
      InteractionParameters::FindOnImage(p) => responses
        .into_iter()
        .filter(|e| {
          if e.id != p.variable_id {
            return true;
          }
          let ok = match &e.value {
            Value::String(s) => coding::parse_point(s).is_some(),
            _ => false,
          };
          if !ok {
            warn!(target: "session", session = %self.session_id, value = %e.value, "find-on-image click ignored");
          }
          ok
        })
        .collect(),
      _ => responses,
    }
  }

  fn append_and_publish(&mut self, events: Vec<ResponseEvent>, effects: &mut Vec<Effect>) {
    self.store.append(events);
    effects.push(Effect::Send(ServerWsMessage::VopStateChangedNotification {
      unit_state: UnitState::from_log(self.store.log()),
    }));
    self.recompute(effects);
  }

  // ----- audio -----

  fn load_and_autoplay(&mut self, id: &str, source: &str, max_play: u32, effects: &mut Vec<Effect>) {
    let previous = self.audio.current_id().map(str::to_string);
    let (stranded, was_playing, outcome) = self.audio.load(id, source, max_play);
    if was_playing {
      if let Some(previous) = previous {
        effects.push(Effect::Send(ServerWsMessage::PauseAudio { id: previous }));
      }
    }
    for waiter in stranded {
      self.resolve_waiter(waiter, false, effects);
    }
    match outcome {
      LoadOutcome::Loading => {
        effects.push(Effect::Send(ServerWsMessage::LoadAudio {
          id: id.to_string(),
          source: source.to_string(),
        }));
        self.autoplay_when_ready = Some(id.to_string());
      }
      LoadOutcome::NoSource => {
        // awaitFinished would resolve false immediately; run the same path.
        match id {
          OPENING_AUDIO_ID => self.opening_audio_done(effects),
          FEEDBACK_AUDIO_ID => {
            if self.feedback.feedback_finished() {
              effects.push(Effect::Send(ServerWsMessage::Navigate));
            }
          }
          _ => {}
        }
      }
    }
  }

  fn on_audio_ready(&mut self, id: &str, effects: &mut Vec<Effect>) {
    if !self.audio.mark_ready(id) {
      return;
    }
    if self.autoplay_when_ready.as_deref() == Some(id) {
      self.autoplay_when_ready = None;
      self.try_play(id, effects);
    }
  }

  fn try_play(&mut self, id: &str, effects: &mut Vec<Effect>) {
    match self.audio.play(id) {
      PlayOutcome::Started { seek_to_start } => {
        effects.push(Effect::Send(ServerWsMessage::PlayAudio { id: id.to_string(), seek_to_start }));
        let waiter = match id {
          OPENING_AUDIO_ID => Some(FinishWaiter::OpeningAudio),
          FEEDBACK_AUDIO_ID => Some(FinishWaiter::FeedbackAudio),
          _ => None,
        };
        if let Some(w) = waiter {
          self.audio.await_finished(w, id);
        }
      }
      PlayOutcome::Rejected => {
        // Rejections are silent (maxPlay ceiling, not ready, id mismatch).
        // A clip that is still playing rejects re-entrant requests with no
        // side effects at all; only a rejected autoplay with nothing
        // playing may unwedge the opening/feedback flow.
        if self.audio.is_playing() {
          return;
        }
        match id {
          OPENING_AUDIO_ID if self.opening == OpeningFlow::AwaitingAudio => {
            self.opening_audio_done(effects)
          }
          FEEDBACK_AUDIO_ID => {
            if self.feedback.feedback_finished() {
              effects.push(Effect::Send(ServerWsMessage::Navigate));
            }
          }
          _ => {}
        }
      }
    }
  }

  fn on_audio_finished(&mut self, id: &str, kind: FinishKind, effects: &mut Vec<Effect>) {
    let Some((progress, resolved)) = self.audio.finish(id, kind) else {
      return;
    };
    let finished_ok = true;
    for waiter in resolved {
      self.resolve_waiter(waiter, finished_ok, effects);
    }

    // Playback progress rides the state-changed channel as non-authoritative
    // telemetry; it can never satisfy a completion rule.
    let telemetry = ResponseEvent::displayed(
      &progress.id,
      json!(format!("{},{}", progress.play_count, progress.percent)),
    );
    if self.unit.is_some() {
      self.append_and_publish(vec![telemetry], effects);
    }

    if id == MAIN_AUDIO_ID && kind == FinishKind::Ended {
      self.emit_lock_update(effects);
      self.recompute(effects);
    }
  }

  fn resolve_waiter(&mut self, waiter: FinishWaiter, finished: bool, effects: &mut Vec<Effect>) {
    match waiter {
      FinishWaiter::OpeningAudio => {
        if self.opening == OpeningFlow::AwaitingAudio {
          self.opening_audio_done(effects);
        }
      }
      FinishWaiter::FeedbackAudio => {
        // Finished or stranded: either way navigation may proceed.
        let _ = finished;
        if self.feedback.feedback_finished() {
          effects.push(Effect::Send(ServerWsMessage::Navigate));
        }
      }
    }
  }

  /// Main-audio completion for gating purposes. A unit without a playable
  /// main audio counts as trivially complete; see DESIGN.md.
  fn main_audio_complete(&self) -> bool {
    match self.unit.as_ref().and_then(|u| u.main_audio.as_ref()) {
      Some(main) if !main.audio_source.trim().is_empty() => {
        self.audio.has_ended_once(MAIN_AUDIO_ID)
      }
      _ => true,
    }
  }

  fn emit_lock_update(&mut self, effects: &mut Vec<Effect>) {
    let locked = self.gate.interaction_locked(self.main_audio_complete());
    if locked != self.lock_emitted {
      self.lock_emitted = locked;
      effects.push(Effect::Send(ServerWsMessage::InteractionLock { locked }));
    }
  }

  // ----- first interaction -----

  fn note_interaction(&mut self, effects: &mut Vec<Effect>) {
    if !self.gate.record_first_interaction() {
      return;
    }
    effects.push(Effect::Cancel(TimerPurpose::AnimateIdle));
    if self.gate.first_click_layer_configured() {
      effects.push(Effect::Send(ServerWsMessage::ClickLayer { visible: false }));
      // The layer exists to capture the autoplay gesture: start the main
      // audio with it.
      match self.audio.status(MAIN_AUDIO_ID) {
        // EMPTY also covers "a different id is loaded"; only an actual
        // pending main-audio load gets a deferred autoplay.
        AudioStatus::Empty if self.audio.is_loading(MAIN_AUDIO_ID) => {
          self.autoplay_when_ready = Some(MAIN_AUDIO_ID.into())
        }
        AudioStatus::Empty | AudioStatus::NoSource => {}
        _ => self.try_play(MAIN_AUDIO_ID, effects),
      }
    }
  }

  // ----- continue / feedback -----

  fn on_continue_click(&mut self, effects: &mut Vec<Effect>) {
    if !self.live() || !self.continue_emitted {
      return;
    }
    self.note_interaction(effects);
    if self.feedback.accept_click(self.audio.is_playing()) {
      effects.push(Effect::Send(ServerWsMessage::ContinueFlash));
      effects.push(Effect::Schedule(TimerPurpose::ClickFlash, self.click_flash));
    }
  }

  fn on_flash_done(&mut self, effects: &mut Vec<Effect>) {
    let selected = self.unit.as_ref().and_then(|unit| {
      unit
        .audio_feedback
        .as_ref()
        .and_then(|fb| select_feedback(fb, unit, &self.store))
        .map(|rule| rule.audio_source.clone())
    });
    match self.feedback.flash_done(selected) {
      FlashOutcome::Navigate => effects.push(Effect::Send(ServerWsMessage::Navigate)),
      FlashOutcome::PlayFeedback { source } => {
        self.load_and_autoplay(FEEDBACK_AUDIO_ID, &source, 0, effects);
      }
    }
  }

  // ----- continue visibility -----

  fn recompute(&mut self, effects: &mut Vec<Effect>) {
    if !self.live() {
      return;
    }
    let Some(unit) = self.unit.as_ref() else {
      return;
    };
    let inputs = CompletionInputs {
      rule: unit.continue_button_show,
      store: &self.store,
      variable_info: &unit.variable_info,
      main_audio_complete: self.main_audio_complete(),
      video_ended: self.video_ended,
      any_response_seen: self.store.has_any_relevant(),
    };
    let visible = continue_visible(&inputs);
    if visible != self.continue_emitted {
      self.continue_emitted = visible;
      effects.push(Effect::Send(ServerWsMessage::ContinueVisibility { visible }));
    }
  }

  #[cfg(test)]
  pub(crate) fn response_log(&self) -> &[ResponseEvent] {
    self.store.log()
  }
}
