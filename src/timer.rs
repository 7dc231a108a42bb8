//! Cancellable timer table. Every delayed action of a session (idle-animate
//! cue, click flash, opening-image presentation) lives here keyed by purpose;
//! scheduling a purpose aborts any prior timer for it, so a superseded
//! parameter can never leave a stale timer behind.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
  AnimateIdle,
  ClickFlash,
  OpeningImage,
}

#[derive(Debug, Default)]
pub struct TimerTable {
  handles: HashMap<TimerPurpose, JoinHandle<()>>,
}

impl TimerTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Arm `purpose` to fire after `delay`, replacing any pending timer with
  /// the same purpose. The firing re-enters the session loop through `tx`.
  pub fn schedule(&mut self, purpose: TimerPurpose, delay: Duration, tx: mpsc::Sender<TimerPurpose>) {
    self.cancel(purpose);
    debug!(target: "session", ?purpose, delay_ms = delay.as_millis() as u64, "timer armed");
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(purpose).await;
    });
    self.handles.insert(purpose, handle);
  }

  pub fn cancel(&mut self, purpose: TimerPurpose) {
    if let Some(handle) = self.handles.remove(&purpose) {
      handle.abort();
      debug!(target: "session", ?purpose, "timer cancelled");
    }
  }

  pub fn cancel_all(&mut self) {
    for (_, handle) in self.handles.drain() {
      handle.abort();
    }
  }
}

impl Drop for TimerTable {
  fn drop(&mut self) {
    self.cancel_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::timeout;

  #[tokio::test]
  async fn armed_timer_fires_with_its_purpose() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timers = TimerTable::new();
    timers.schedule(TimerPurpose::ClickFlash, Duration::from_millis(5), tx);
    let fired = timeout(Duration::from_secs(1), rx.recv()).await.expect("no timeout");
    assert_eq!(fired, Some(TimerPurpose::ClickFlash));
  }

  #[tokio::test]
  async fn rescheduling_supersedes_the_pending_timer() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timers = TimerTable::new();
    // The first, long timer must never fire once superseded.
    timers.schedule(TimerPurpose::AnimateIdle, Duration::from_secs(30), tx.clone());
    timers.schedule(TimerPurpose::AnimateIdle, Duration::from_millis(5), tx);
    let fired = timeout(Duration::from_secs(1), rx.recv()).await.expect("no timeout");
    assert_eq!(fired, Some(TimerPurpose::AnimateIdle));
    // Nothing else pending.
    drop(timers);
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.unwrap_or(None).is_none());
  }

  #[tokio::test]
  async fn cancel_prevents_firing() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timers = TimerTable::new();
    timers.schedule(TimerPurpose::OpeningImage, Duration::from_millis(5), tx);
    timers.cancel(TimerPurpose::OpeningImage);
    let res = timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(matches!(res, Err(_) | Ok(None)), "cancelled timer must not fire");
  }
}
