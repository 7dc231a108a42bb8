//! Response events and the append-only per-session response store.
//!
//! The store is the single source of truth for "what has the user answered":
//! the current value of a variable is the value of the latest event carrying
//! that id, and completion is evaluated against the unit's `variableInfo`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coding;
use crate::unit::{ResponseCompleteRule, VariableInfo};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
  #[default]
  Displayed,
  ValueChanged,
}

/// One entry in the response log, as produced by a widget (or by the audio
/// progress side channel, which always sets `relevantForResponsesProgress`
/// to false).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
  pub id: String,
  #[serde(default)]
  pub status: ResponseStatus,
  #[serde(default)]
  pub value: Value,
  #[serde(default = "relevant_default")]
  pub relevant_for_responses_progress: bool,
}

fn relevant_default() -> bool {
  true
}

impl ResponseEvent {
  pub fn value_changed(id: &str, value: Value) -> Self {
    Self {
      id: id.to_string(),
      status: ResponseStatus::ValueChanged,
      value,
      relevant_for_responses_progress: true,
    }
  }

  pub fn displayed(id: &str, value: Value) -> Self {
    Self {
      id: id.to_string(),
      status: ResponseStatus::Displayed,
      value,
      relevant_for_responses_progress: false,
    }
  }

  /// Only value changes flagged as progress-relevant can satisfy completion
  /// rules; DISPLAYED events and telemetry never do.
  pub fn is_relevant(&self) -> bool {
    self.relevant_for_responses_progress && self.status == ResponseStatus::ValueChanged
  }
}

/// Append-only ordered log of response events for one session.
#[derive(Debug, Default)]
pub struct ResponseStore {
  log: Vec<ResponseEvent>,
}

impl ResponseStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn clear(&mut self) {
    self.log.clear();
  }

  pub fn append(&mut self, events: Vec<ResponseEvent>) {
    self.log.extend(events);
  }

  pub fn log(&self) -> &[ResponseEvent] {
    &self.log
  }

  pub fn is_empty(&self) -> bool {
    self.log.is_empty()
  }

  /// Latest value recorded for a variable, regardless of event status.
  pub fn value_of(&self, variable_id: &str) -> Option<&Value> {
    self.log.iter().rev().find(|e| e.id == variable_id).map(|e| &e.value)
  }

  pub fn has_relevant_for(&self, variable_id: &str) -> bool {
    self.log.iter().any(|e| e.id == variable_id && e.is_relevant())
  }

  pub fn has_any_relevant(&self) -> bool {
    self.log.iter().any(|e| e.is_relevant())
  }

  /// Completion of a single variable per its `responseComplete` rule.
  pub fn is_complete(&self, info: &VariableInfo) -> bool {
    match info.response_complete {
      ResponseCompleteRule::Always => self.has_relevant_for(&info.variable_id),
      ResponseCompleteRule::OnAnyResponse => self.has_any_relevant(),
      ResponseCompleteRule::OnFullCredit => match self.value_of(&info.variable_id) {
        Some(value) => coding::is_full_credit(info, value),
        None => false,
      },
    }
  }

  /// All declared variables complete. Recomputed from scratch on every call:
  /// widgets may toggle an answer back to incomplete, so nothing latches here.
  pub fn all_complete(&self, infos: &[VariableInfo]) -> bool {
    infos.iter().all(|info| self.is_complete(info))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::unit::{Code, CodeMethod, CodingSource};
  use serde_json::json;

  fn full_credit_info(variable_id: &str, expected: &str) -> VariableInfo {
    VariableInfo {
      variable_id: variable_id.into(),
      response_complete: ResponseCompleteRule::OnFullCredit,
      coding_source: CodingSource::Value,
      codes: vec![
        Code {
          method: CodeMethod::Equals,
          parameter: expected.into(),
          code: 1,
          score: 1,
        },
        Code { method: CodeMethod::GreaterThan, parameter: "-999999".into(), code: 0, score: 0 },
      ],
    }
  }

  #[test]
  fn latest_event_wins_for_value_of() {
    let mut store = ResponseStore::new();
    store.append(vec![ResponseEvent::value_changed("v1", json!("a"))]);
    store.append(vec![ResponseEvent::value_changed("v1", json!("b"))]);
    assert_eq!(store.value_of("v1"), Some(&json!("b")));
    assert_eq!(store.log().len(), 2, "log is append-only");
  }

  #[test]
  fn displayed_events_never_count_as_relevant() {
    let mut store = ResponseStore::new();
    store.append(vec![ResponseEvent::displayed("v1", json!(""))]);
    assert!(!store.has_any_relevant());
    let info = VariableInfo { variable_id: "v1".into(), ..Default::default() };
    assert!(!store.is_complete(&info), "ALWAYS needs a relevant event");
  }

  #[test]
  fn always_rule_completes_on_first_relevant_event() {
    let mut store = ResponseStore::new();
    let info = VariableInfo { variable_id: "v1".into(), ..Default::default() };
    store.append(vec![ResponseEvent::value_changed("v1", json!(0))]);
    assert!(store.is_complete(&info));
  }

  #[test]
  fn on_any_response_completes_via_other_variable() {
    let mut store = ResponseStore::new();
    let info = VariableInfo {
      variable_id: "v1".into(),
      response_complete: ResponseCompleteRule::OnAnyResponse,
      ..Default::default()
    };
    store.append(vec![ResponseEvent::value_changed("other", json!("x"))]);
    assert!(store.is_complete(&info));
  }

  #[test]
  fn full_credit_follows_the_latest_value() {
    let mut store = ResponseStore::new();
    let info = full_credit_info("v1", "right");
    store.append(vec![ResponseEvent::value_changed("v1", json!("right"))]);
    assert!(store.is_complete(&info));
    store.append(vec![ResponseEvent::value_changed("v1", json!("0"))]);
    assert!(!store.is_complete(&info), "toggling back must drop completion");
    store.append(vec![ResponseEvent::value_changed("v1", json!("right"))]);
    assert!(store.is_complete(&info));
  }

  #[test]
  fn response_event_serializes_with_camel_case_flag() {
    let e = ResponseEvent::value_changed("v1", json!(3));
    let s = serde_json::to_string(&e).expect("json");
    assert!(s.contains("relevantForResponsesProgress"));
    assert!(s.contains("VALUE_CHANGED"));
  }
}
