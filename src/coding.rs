//! Deterministic response coding: source transforms, code matching, and the
//! full-credit check used by ON_FULL_CREDIT completion and audio feedback.
//!
//! Matching is first-match-wins over the code list, in list order; later
//! entries are never consulted once one matches.

use serde_json::Value;

use crate::unit::{Code, CodeMethod, CodingSource, VariableInfo};

/// Raw response value as a plain string (numbers rendered without quotes).
fn value_as_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

fn value_as_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  }
}

/// Numeric sum of a multi-select state. Accepts `"1,0,1"` (comma-separated
/// components), a plain bit-string like `"101"`, a JSON array of numbers, or
/// a single number.
fn sum_of(value: &Value) -> f64 {
  match value {
    Value::Array(items) => items.iter().filter_map(value_as_number).sum(),
    Value::Number(n) => n.as_f64().unwrap_or(0.0),
    Value::String(s) => {
      if s.contains(',') {
        s.split(',').filter_map(|p| p.trim().parse::<f64>().ok()).sum()
      } else {
        s.chars().filter_map(|c| c.to_digit(10)).map(f64::from).sum()
      }
    }
    _ => 0.0,
  }
}

/// Apply the variable's coding source to the raw value before matching.
pub fn apply_source(source: CodingSource, value: &Value) -> Value {
  match source {
    CodingSource::Value => value.clone(),
    CodingSource::ValueToUpper => Value::String(value_as_string(value).to_uppercase()),
    CodingSource::Sum => serde_json::json!(sum_of(value)),
  }
}

/// Parse `"x,y"` into a coordinate pair.
pub(crate) fn parse_point(s: &str) -> Option<(f64, f64)> {
  let (x, y) = s.split_once(',')?;
  Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Parse `"x1,y1-x2,y2"` into two corners.
fn parse_range(s: &str) -> Option<((f64, f64), (f64, f64))> {
  let (a, b) = s.split_once('-')?;
  Some((parse_point(a)?, parse_point(b)?))
}

/// Does `value` (already source-transformed) satisfy one code entry?
pub fn matches(method: CodeMethod, parameter: &str, value: &Value) -> bool {
  match method {
    CodeMethod::Equals => {
      match (value_as_number(value), parameter.trim().parse::<f64>().ok()) {
        (Some(v), Some(p)) => v == p,
        _ => value_as_string(value).trim() == parameter.trim(),
      }
    }
    CodeMethod::GreaterThan => match (value_as_number(value), parameter.trim().parse::<f64>()) {
      (Some(v), Ok(p)) => v > p,
      _ => false,
    },
    CodeMethod::LessThan => match (value_as_number(value), parameter.trim().parse::<f64>()) {
      (Some(v), Ok(p)) => v < p,
      _ => false,
    },
    CodeMethod::InPositionRange => {
      let Some((x, y)) = parse_point(&value_as_string(value)) else {
        return false;
      };
      let Some(((x1, y1), (x2, y2))) = parse_range(parameter) else {
        return false;
      };
      x1 <= x && x <= x2 && y1 <= y && y <= y2
    }
  }
}

/// First code entry (list order) matching the source-transformed value.
pub fn first_matching_code<'a>(
  codes: &'a [Code],
  source: CodingSource,
  value: &Value,
) -> Option<&'a Code> {
  let coded = apply_source(source, value);
  codes.iter().find(|c| matches(c.method, &c.parameter, &coded))
}

/// Full credit: the first matching code carries the maximum achievable score.
/// An empty code list offers no achievable maximum, so it never completes.
pub fn is_full_credit(info: &VariableInfo, value: &Value) -> bool {
  let Some(max_score) = info.codes.iter().map(|c| c.score).max() else {
    return false;
  };
  match first_matching_code(&info.codes, info.coding_source, value) {
    Some(code) => code.score == max_score,
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::unit::{Code, CodeMethod, CodingSource, VariableInfo};
  use serde_json::json;

  fn code(method: CodeMethod, parameter: &str, score: i32) -> Code {
    Code { method, parameter: parameter.into(), code: score, score }
  }

  #[test]
  fn equals_compares_numerically_when_both_sides_are_numbers() {
    assert!(matches(CodeMethod::Equals, "2", &json!("2.0")));
    assert!(matches(CodeMethod::Equals, "abc", &json!("abc")));
    assert!(!matches(CodeMethod::Equals, "abc", &json!("abd")));
  }

  #[test]
  fn greater_and_less_than_are_numeric_only() {
    assert!(matches(CodeMethod::GreaterThan, "3", &json!(4)));
    assert!(!matches(CodeMethod::GreaterThan, "3", &json!("three")));
    assert!(matches(CodeMethod::LessThan, "3", &json!("2.5")));
  }

  #[test]
  fn position_range_is_inclusive_on_both_corners() {
    // Scenario: click target at 40,40-60,60.
    assert!(matches(CodeMethod::InPositionRange, "40,40-60,60", &json!("50,50")));
    assert!(matches(CodeMethod::InPositionRange, "40,40-60,60", &json!("40,60")));
    assert!(!matches(CodeMethod::InPositionRange, "40,40-60,60", &json!("10,10")));
    assert!(!matches(CodeMethod::InPositionRange, "garbage", &json!("50,50")));
  }

  #[test]
  fn value_to_upper_uppercases_before_matching() {
    let coded = apply_source(CodingSource::ValueToUpper, &json!("paris"));
    assert!(matches(CodeMethod::Equals, "PARIS", &coded));
  }

  #[test]
  fn sum_counts_components_and_bit_strings() {
    assert_eq!(apply_source(CodingSource::Sum, &json!("1,0,1")), json!(2.0));
    assert_eq!(apply_source(CodingSource::Sum, &json!("0110")), json!(2.0));
    assert_eq!(apply_source(CodingSource::Sum, &json!([1, 0, 1, 1])), json!(3.0));
  }

  #[test]
  fn first_matching_code_wins_over_later_entries() {
    let codes = vec![
      code(CodeMethod::GreaterThan, "0", 0),
      code(CodeMethod::Equals, "5", 2),
    ];
    let hit = first_matching_code(&codes, CodingSource::Value, &json!(5)).expect("match");
    assert_eq!(hit.score, 0, "earlier entry must shadow the later exact match");
  }

  #[test]
  fn full_credit_requires_first_match_to_carry_max_score() {
    let info = VariableInfo {
      variable_id: "v1".into(),
      coding_source: CodingSource::Value,
      codes: vec![code(CodeMethod::Equals, "right", 1), code(CodeMethod::Equals, "wrong", 0)],
      ..Default::default()
    };
    assert!(is_full_credit(&info, &json!("right")));
    assert!(!is_full_credit(&info, &json!("wrong")));
    assert!(!is_full_credit(&info, &json!("unmatched")));
  }

  #[test]
  fn empty_code_list_never_reaches_full_credit() {
    let info = VariableInfo { variable_id: "v1".into(), ..Default::default() };
    assert!(!is_full_credit(&info, &json!("anything")));
  }
}
