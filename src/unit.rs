//! Unit definition: the JSON document describing one test item.
//!
//! Parsed once per session from the `unitDefinition` field of the start
//! command. Every field carries a serde default so that a sparse or partially
//! malformed document still yields a usable unit; only a top-level JSON parse
//! failure is fatal to the session.

use serde::Deserialize;
use serde_json::Value;

/// Which interaction widget the item presents.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
  Buttons,
  Drop,
  Write,
  FindOnImage,
  Video,
  ImageOnly,
  PolygonButtons,
  PlaceValue,
  #[default]
  #[serde(other)]
  None,
}

/// Rule deciding when the continue affordance becomes visible.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContinueButtonShow {
  #[default]
  Always,
  No,
  OnAnyResponse,
  OnResponsesComplete,
  OnMainAudioComplete,
  OnAudioAndResponse,
  OnVideoComplete,
  // Unrecognized rules fall back to ALWAYS (see `effective`).
  #[serde(other)]
  Unknown,
}

impl ContinueButtonShow {
  /// Collapse unrecognized rules to the documented default.
  pub fn effective(self) -> Self {
    match self {
      ContinueButtonShow::Unknown => ContinueButtonShow::Always,
      other => other,
    }
  }
}

/// When a single variable counts as answered.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCompleteRule {
  #[default]
  Always,
  OnAnyResponse,
  OnFullCredit,
}

/// Transform applied to a raw value before code matching.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodingSource {
  #[default]
  Value,
  ValueToUpper,
  Sum,
}

/// Comparison method of a single code entry.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeMethod {
  #[default]
  Equals,
  GreaterThan,
  LessThan,
  InPositionRange,
}

/// One scoring rule: value matched via `method`/`parameter` yields `score`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Code {
  pub method: CodeMethod,
  pub parameter: String,
  pub code: i32,
  pub score: i32,
}

/// Scoring description of one response variable.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableInfo {
  pub variable_id: String,
  pub response_complete: ResponseCompleteRule,
  pub coding_source: CodingSource,
  pub codes: Vec<Code>,
}

/// Main instruction audio and its gating options.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MainAudio {
  pub audio_source: String,
  pub first_click_layer: bool,
  pub animate_button: bool,
  /// 0 = unlimited replays.
  pub max_play: u32,
  pub disable_interaction_until_complete: bool,
}

/// One feedback rule: if the variable's value matches, play `audioSource`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackRule {
  pub variable_id: String,
  pub source: CodingSource,
  pub method: CodeMethod,
  pub parameter: String,
  pub audio_source: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioFeedback {
  pub trigger: String,
  pub feedback: Vec<FeedbackRule>,
}

/// Optional intro sequence: audio to completion, then image for a duration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpeningImage {
  pub image_source: String,
  #[serde(rename = "presentationDurationMS")]
  pub presentation_duration_ms: u64,
  pub audio_source: String,
}

/// The parsed unit definition. Presentational fields (`ribbonBars`,
/// `backgroundColor`) are carried through untouched for the widget layer.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitDefinition {
  pub interaction_type: InteractionType,
  interaction_parameters: Value,
  pub main_audio: Option<MainAudio>,
  pub continue_button_show: ContinueButtonShow,
  pub variable_info: Vec<VariableInfo>,
  pub audio_feedback: Option<AudioFeedback>,
  pub opening_image: Option<OpeningImage>,
  pub ribbon_bars: Value,
  pub background_color: String,
}

/// Widget-specific parameters, tagged by the unit's interaction type.
/// The core only reads the fields below; everything else about a widget
/// (geometry, layout, assets) stays on the presentation side.
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionParameters {
  Buttons(ButtonsParams),
  Drop(DropParams),
  Write(WriteParams),
  FindOnImage(FindOnImageParams),
  Video(VideoParams),
  ImageOnly(ImageOnlyParams),
  PolygonButtons(PolygonButtonsParams),
  PlaceValue(PlaceValueParams),
  None,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonsParams {
  pub variable_id: String,
  pub multi_select: bool,
  pub options: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DropParams {
  pub variable_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteParams {
  pub variable_id: String,
  /// 0 = unlimited.
  pub max_input_length: usize,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FindOnImageParams {
  pub variable_id: String,
  pub image_source: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoParams {
  pub variable_id: String,
  pub video_source: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOnlyParams {
  pub image_source: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PolygonButtonsParams {
  pub variable_id: String,
  pub multi_select: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceValueParams {
  pub variable_id: String,
}

impl UnitDefinition {
  /// Parse a unit definition from its JSON-encoded form in the start command.
  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }

  /// Resolve the raw parameter object against the declared interaction type.
  /// A parameter object that does not fit its type degrades to defaults
  /// rather than failing the session.
  pub fn parameters(&self) -> InteractionParameters {
    fn parse<T: serde::de::DeserializeOwned + Default>(v: &Value) -> T {
      serde_json::from_value(v.clone()).unwrap_or_default()
    }
    let v = &self.interaction_parameters;
    match self.interaction_type {
      InteractionType::Buttons => InteractionParameters::Buttons(parse(v)),
      InteractionType::Drop => InteractionParameters::Drop(parse(v)),
      InteractionType::Write => InteractionParameters::Write(parse(v)),
      InteractionType::FindOnImage => InteractionParameters::FindOnImage(parse(v)),
      InteractionType::Video => InteractionParameters::Video(parse(v)),
      InteractionType::ImageOnly => InteractionParameters::ImageOnly(parse(v)),
      InteractionType::PolygonButtons => InteractionParameters::PolygonButtons(parse(v)),
      InteractionType::PlaceValue => InteractionParameters::PlaceValue(parse(v)),
      InteractionType::None => InteractionParameters::None,
    }
  }

  /// The first declared variable, used as the primary feedback target when a
  /// feedback rule leaves `variableId` empty.
  pub fn primary_variable_id(&self) -> Option<&str> {
    self
      .variable_info
      .first()
      .map(|v| v.variable_id.as_str())
      .filter(|id| !id.is_empty())
  }

  pub fn variable_info_for(&self, variable_id: &str) -> Option<&VariableInfo> {
    self.variable_info.iter().find(|v| v.variable_id == variable_id)
  }
}
