//! Audio gate: the single logical audio element of a session.
//!
//! At most one audio id is loaded at a time. The gate tracks play counts
//! against the `maxPlay` ceiling, latches "ended at least once" per id, and
//! holds explicit finish waiters that the session resolves into flow
//! continuations (opening flow, feedback-then-navigate). Actual media
//! playback happens on the presentation side; its ready/paused/ended
//! callbacks re-enter here as media events.

use std::collections::{HashMap, HashSet};

use tracing::debug;

/// Reserved audio ids used by the core itself.
pub const MAIN_AUDIO_ID: &str = "MainAudio";
pub const FEEDBACK_AUDIO_ID: &str = "AudioFeedback";
pub const OPENING_AUDIO_ID: &str = "OpeningAudio";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioStatus {
  Empty,
  NoSource,
  Ready,
  Playing,
  Paused,
  Ended,
}

/// Who is waiting for the current playback to finish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishWaiter {
  OpeningAudio,
  FeedbackAudio,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
  /// Source was empty/whitespace; the gate holds no playable media.
  NoSource,
  /// Presentation should load the source; readiness arrives as a media event.
  Loading,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
  Started { seek_to_start: bool },
  Rejected,
}

/// How the presentation reported the end of a playback stretch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishKind {
  Ended,
  /// Paused mid-clip at the given percent elapsed.
  Paused { percent: u32 },
}

/// Telemetry emitted on every pause/ended transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackProgress {
  pub id: String,
  pub play_count: u32,
  pub percent: u32,
}

#[derive(Debug)]
struct LoadedAudio {
  id: String,
  source: String,
  max_play: u32,
  play_count: u32,
  status: AudioStatus,
}

#[derive(Debug, Default)]
pub struct AudioGate {
  current: Option<LoadedAudio>,
  /// Play counts survive reloads of the same id within a session.
  progress_by_id: HashMap<String, u32>,
  ended_once: HashSet<String>,
  waiters: Vec<FinishWaiter>,
}

impl AudioGate {
  pub fn new() -> Self {
    Self::default()
  }

  /// Full reset for a new session.
  pub fn reset(&mut self) {
    self.current = None;
    self.progress_by_id.clear();
    self.ended_once.clear();
    self.waiters.clear();
  }

  /// Load a new source under `id`, replacing whatever was loaded before.
  /// Returns waiters stranded on the previous source (to be resolved false),
  /// whether the previous source was still playing (so the presentation can
  /// be told to stop it first), and the load outcome.
  pub fn load(&mut self, id: &str, source: &str, max_play: u32) -> (Vec<FinishWaiter>, bool, LoadOutcome) {
    let previous_playing = self.is_playing();
    let stranded = std::mem::take(&mut self.waiters);

    if source.trim().is_empty() {
      self.current = Some(LoadedAudio {
        id: id.to_string(),
        source: String::new(),
        max_play,
        play_count: 0,
        status: AudioStatus::NoSource,
      });
      debug!(target: "audio", %id, "load with empty source, gate is NO_SOURCE");
      return (stranded, previous_playing, LoadOutcome::NoSource);
    }

    let play_count = self.progress_by_id.get(id).copied().unwrap_or(0);
    self.current = Some(LoadedAudio {
      id: id.to_string(),
      source: source.to_string(),
      max_play,
      play_count,
      status: AudioStatus::Empty,
    });
    debug!(target: "audio", %id, %source, max_play, restored_play_count = play_count, "audio loading");
    (stranded, previous_playing, LoadOutcome::Loading)
  }

  /// Presentation reports the media element is ready to play.
  pub fn mark_ready(&mut self, id: &str) -> bool {
    match self.current.as_mut() {
      Some(a) if a.id == id && a.status == AudioStatus::Empty => {
        a.status = AudioStatus::Ready;
        true
      }
      _ => false,
    }
  }

  /// Attempt to start playback of `id`. Rejected when the id is not loaded,
  /// has no source, is already playing, or the `maxPlay` ceiling is reached.
  /// The play count increments at play start; that is what the ceiling
  /// guards.
  pub fn play(&mut self, id: &str) -> PlayOutcome {
    let Some(a) = self.current.as_mut() else {
      return PlayOutcome::Rejected;
    };
    if a.id != id {
      return PlayOutcome::Rejected;
    }
    match a.status {
      AudioStatus::NoSource | AudioStatus::Empty | AudioStatus::Playing => {
        return PlayOutcome::Rejected;
      }
      _ => {}
    }
    if a.max_play != 0 && a.play_count >= a.max_play {
      debug!(target: "audio", %id, play_count = a.play_count, max_play = a.max_play, "play rejected at maxPlay ceiling");
      return PlayOutcome::Rejected;
    }
    let seek_to_start = a.status == AudioStatus::Ended;
    a.play_count += 1;
    a.status = AudioStatus::Playing;
    self.progress_by_id.insert(a.id.clone(), a.play_count);
    debug!(target: "audio", %id, play_count = a.play_count, "playback started");
    PlayOutcome::Started { seek_to_start }
  }

  /// Register a finish waiter for `id`. Returns false immediately (no
  /// registration) when `id` is not the playing source.
  pub fn await_finished(&mut self, waiter: FinishWaiter, id: &str) -> bool {
    match self.current.as_ref() {
      Some(a) if a.id == id && a.status == AudioStatus::Playing => {
        self.waiters.push(waiter);
        true
      }
      _ => false,
    }
  }

  /// Presentation reports ended/paused. Returns progress telemetry plus all
  /// waiters resolved by this transition. Transitions from anything but
  /// PLAYING are ignored.
  pub fn finish(&mut self, id: &str, kind: FinishKind) -> Option<(PlaybackProgress, Vec<FinishWaiter>)> {
    let a = self.current.as_mut()?;
    if a.id != id || a.status != AudioStatus::Playing {
      return None;
    }
    let percent = match kind {
      FinishKind::Ended => {
        a.status = AudioStatus::Ended;
        self.ended_once.insert(a.id.clone());
        100
      }
      FinishKind::Paused { percent } => {
        a.status = AudioStatus::Paused;
        percent.min(100)
      }
    };
    let progress = PlaybackProgress { id: a.id.clone(), play_count: a.play_count, percent };
    let resolved = std::mem::take(&mut self.waiters);
    debug!(target: "audio", %id, ?kind, play_count = progress.play_count, percent, "playback finished");
    Some((progress, resolved))
  }

  pub fn is_playing(&self) -> bool {
    matches!(self.current.as_ref(), Some(a) if a.status == AudioStatus::Playing)
  }

  /// Is `id` the loaded source that has not reported ready yet? False when a
  /// different id is loaded, even though `status` reports EMPTY for both.
  pub fn is_loading(&self, id: &str) -> bool {
    matches!(self.current.as_ref(), Some(a) if a.id == id && a.status == AudioStatus::Empty)
  }

  pub fn status(&self, id: &str) -> AudioStatus {
    match self.current.as_ref() {
      Some(a) if a.id == id => a.status,
      _ => AudioStatus::Empty,
    }
  }

  pub fn play_count(&self, id: &str) -> u32 {
    match self.current.as_ref() {
      Some(a) if a.id == id => a.play_count,
      _ => self.progress_by_id.get(id).copied().unwrap_or(0),
    }
  }

  /// Has `id` reached ENDED at least once this session? Latches across
  /// replays and reloads of the same id.
  pub fn has_ended_once(&self, id: &str) -> bool {
    self.ended_once.contains(id)
  }

  /// The currently loaded audio id, if any.
  pub fn current_id(&self) -> Option<&str> {
    self.current.as_ref().map(|a| a.id.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ready_gate(id: &str, max_play: u32) -> AudioGate {
    let mut gate = AudioGate::new();
    let (_, _, outcome) = gate.load(id, "clip.mp3", max_play);
    assert_eq!(outcome, LoadOutcome::Loading);
    assert!(gate.mark_ready(id));
    gate
  }

  #[test]
  fn max_play_ceiling_rejects_extra_plays() {
    // P1: after N completed plays, the (N+1)th play leaves the gate stopped.
    let mut gate = ready_gate(MAIN_AUDIO_ID, 2);
    for _ in 0..2 {
      assert!(matches!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Started { .. }));
      gate.finish(MAIN_AUDIO_ID, FinishKind::Ended).expect("finish");
    }
    assert_eq!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Rejected);
    assert!(!gate.is_playing());
    assert_eq!(gate.play_count(MAIN_AUDIO_ID), 2);
  }

  #[test]
  fn unlimited_max_play_allows_many_cycles() {
    // P2: maxPlay = 0 never caps.
    let mut gate = ready_gate(MAIN_AUDIO_ID, 0);
    for i in 1..=5 {
      assert!(matches!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Started { .. }));
      gate.finish(MAIN_AUDIO_ID, FinishKind::Ended).expect("finish");
      assert_eq!(gate.play_count(MAIN_AUDIO_ID), i);
    }
  }

  #[test]
  fn replay_after_ended_seeks_to_start() {
    let mut gate = ready_gate(MAIN_AUDIO_ID, 0);
    assert_eq!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Started { seek_to_start: false });
    gate.finish(MAIN_AUDIO_ID, FinishKind::Ended).expect("finish");
    assert_eq!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Started { seek_to_start: true });
  }

  #[test]
  fn empty_source_becomes_no_source_and_rejects_play() {
    let mut gate = AudioGate::new();
    let (_, _, outcome) = gate.load(MAIN_AUDIO_ID, "   ", 0);
    assert_eq!(outcome, LoadOutcome::NoSource);
    assert_eq!(gate.status(MAIN_AUDIO_ID), AudioStatus::NoSource);
    assert_eq!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Rejected);
  }

  #[test]
  fn play_while_playing_is_rejected() {
    let mut gate = ready_gate(MAIN_AUDIO_ID, 0);
    assert!(matches!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Started { .. }));
    assert_eq!(gate.play(MAIN_AUDIO_ID), PlayOutcome::Rejected);
  }

  #[test]
  fn play_count_survives_reload_of_same_id_only() {
    let mut gate = ready_gate(MAIN_AUDIO_ID, 3);
    gate.play(MAIN_AUDIO_ID);
    gate.finish(MAIN_AUDIO_ID, FinishKind::Ended).expect("finish");

    // Same id again: count restored.
    gate.load(MAIN_AUDIO_ID, "clip.mp3", 3);
    gate.mark_ready(MAIN_AUDIO_ID);
    assert_eq!(gate.play_count(MAIN_AUDIO_ID), 1);

    // Different id: fresh count.
    gate.load(FEEDBACK_AUDIO_ID, "fb.mp3", 3);
    gate.mark_ready(FEEDBACK_AUDIO_ID);
    assert_eq!(gate.play_count(FEEDBACK_AUDIO_ID), 0);
  }

  #[test]
  fn finish_resolves_registered_waiters_and_reports_progress() {
    let mut gate = ready_gate(FEEDBACK_AUDIO_ID, 0);
    gate.play(FEEDBACK_AUDIO_ID);
    assert!(gate.await_finished(FinishWaiter::FeedbackAudio, FEEDBACK_AUDIO_ID));

    let (progress, resolved) = gate.finish(FEEDBACK_AUDIO_ID, FinishKind::Ended).expect("finish");
    assert_eq!(resolved, vec![FinishWaiter::FeedbackAudio]);
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.play_count, 1);
    assert!(gate.has_ended_once(FEEDBACK_AUDIO_ID));
  }

  #[test]
  fn pause_after_playing_resolves_waiters_with_partial_progress() {
    let mut gate = ready_gate(MAIN_AUDIO_ID, 0);
    gate.play(MAIN_AUDIO_ID);
    assert!(gate.await_finished(FinishWaiter::OpeningAudio, MAIN_AUDIO_ID));
    let (progress, resolved) = gate
      .finish(MAIN_AUDIO_ID, FinishKind::Paused { percent: 40 })
      .expect("finish");
    assert_eq!(progress.percent, 40);
    assert_eq!(resolved.len(), 1);
    assert!(!gate.has_ended_once(MAIN_AUDIO_ID), "pause is not an end");
  }

  #[test]
  fn is_loading_tracks_only_the_loaded_id() {
    let mut gate = AudioGate::new();
    gate.load(MAIN_AUDIO_ID, "m.mp3", 0);
    assert!(gate.is_loading(MAIN_AUDIO_ID));
    assert!(!gate.is_loading(OPENING_AUDIO_ID), "another id is not a pending load");

    gate.mark_ready(MAIN_AUDIO_ID);
    assert!(!gate.is_loading(MAIN_AUDIO_ID));

    gate.load(OPENING_AUDIO_ID, "op.mp3", 1);
    assert!(!gate.is_loading(MAIN_AUDIO_ID), "replaced id never reads as loading");
  }

  #[test]
  fn await_on_mismatched_or_idle_id_does_not_register() {
    let mut gate = ready_gate(MAIN_AUDIO_ID, 0);
    assert!(!gate.await_finished(FinishWaiter::OpeningAudio, "SomethingElse"));
    assert!(!gate.await_finished(FinishWaiter::OpeningAudio, MAIN_AUDIO_ID), "not playing yet");
  }

  #[test]
  fn loading_over_a_playing_source_strands_its_waiters() {
    let mut gate = ready_gate(MAIN_AUDIO_ID, 0);
    gate.play(MAIN_AUDIO_ID);
    gate.await_finished(FinishWaiter::OpeningAudio, MAIN_AUDIO_ID);
    let (stranded, was_playing, _) = gate.load(FEEDBACK_AUDIO_ID, "fb.mp3", 0);
    assert!(was_playing);
    assert_eq!(stranded, vec![FinishWaiter::OpeningAudio]);
    // Events for the replaced id are now ignored.
    assert!(gate.finish(MAIN_AUDIO_ID, FinishKind::Ended).is_none());
  }
}
