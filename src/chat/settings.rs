//! Typed snapshot of a chat node's settings.
//!
//! The host keeps settings as an untyped dictionary edited through its GUI.
//! [`CompletionSettings::from_settings`] reads it once per invocation and
//! reports anything it cannot use instead of guessing.

use serde_json::json;

use crate::core::error::{SettingsError, ValidationError};
use crate::core::{NodeValue, Settings, is_truthy};
use crate::llm::{ChatMessage, CompletionRequest, Credential, FunctionTool, ToolDefinition};

pub const MODEL: &str = "model";
pub const MAX_TOKENS: &str = "max_tokens";
pub const TEMPERATURE: &str = "temperature";
pub const FREQUENCY_PENALTY: &str = "frequency_penalty";
pub const PRESENCE_PENALTY: &str = "presence_penalty";
pub const TOP_P: &str = "top_p";
pub const STOP: &str = "stop";
pub const STREAM: &str = "stream";
pub const COMPLETIONS: &str = "n";
pub const AUTHORIZATION: &str = "authorization";
pub const TARGET_WPM: &str = "target_wpm";

/// Shown next to the stop-sequence field when its text does not parse.
pub const STOP_SEQUENCES_ERROR: &str = "Stop sequences must be valid json";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Models offered in the model selector.
pub const MODELS: [&str; 7] = [
    "gpt-3.5-turbo-0125",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-1106",
    "gpt-3.5-turbo-instruct",
    "gpt-3.5-turbo-16k",
    "gpt-3.5-turbo-0613",
    "gpt-3.5-turbo-16k-0613",
];

/// The settings a fresh chat node starts with.
pub fn default_settings() -> Settings {
    let defaults = json!({
        AUTHORIZATION: "",
        MODEL: DEFAULT_MODEL,
        COMPLETIONS: 1,
        TEMPERATURE: 1,
        FREQUENCY_PENALTY: 0,
        PRESENCE_PENALTY: 0,
        STOP: null,
        STREAM: true,
        TARGET_WPM: 600,
    });
    match defaults {
        NodeValue::Object(map) => map,
        _ => Settings::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub top_p: Option<f64>,
    pub stop: Vec<String>,
    pub stream: bool,
    pub n: u8,
    pub credential: Credential,
    pub target_wpm: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            top_p: None,
            stop: Vec::new(),
            stream: true,
            n: 1,
            credential: Credential::default(),
            target_wpm: 600,
        }
    }
}

impl CompletionSettings {
    /// Read and validate a settings dictionary.
    ///
    /// Missing or empty fields take their defaults. Numbers may be given as
    /// JSON numbers or numeric text; anything else is an error. Integer
    /// fields are rounded. Unparsable stop sequences fall back to none.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let defaults = Self::default();

        let stop = parse_stop_sequences(settings.get(STOP)).unwrap_or_else(|e| {
            log::warn!("{}, sending no stop sequences", e);
            Vec::new()
        });

        Ok(Self {
            model: text(settings, MODEL).unwrap_or(defaults.model),
            max_tokens: ranged(settings, MAX_TOKENS, 0.0, 100_000.0)?.map(|v| v.round() as u32),
            temperature: ranged(settings, TEMPERATURE, 0.0, 2.0)?.unwrap_or(defaults.temperature),
            frequency_penalty: ranged(settings, FREQUENCY_PENALTY, -2.0, 2.0)?
                .unwrap_or(defaults.frequency_penalty),
            presence_penalty: ranged(settings, PRESENCE_PENALTY, -2.0, 2.0)?
                .unwrap_or(defaults.presence_penalty),
            top_p: ranged(settings, TOP_P, 0.0, 1.0)?,
            stop,
            stream: settings.get(STREAM).map_or(defaults.stream, is_truthy),
            n: ranged(settings, COMPLETIONS, 1.0, 16.0)?.map_or(defaults.n, |v| v.round() as u8),
            credential: text(settings, AUTHORIZATION)
                .map(Credential::new)
                .unwrap_or_default(),
            target_wpm: ranged(settings, TARGET_WPM, 1.0, 9001.0)?
                .map_or(defaults.target_wpm, |v| v.round() as u32),
        })
    }

    /// Combine this snapshot with a conversation and optional tools.
    pub fn into_request(
        self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model,
            messages,
            tools: tools.map(|tools| tools.into_iter().map(FunctionTool::from).collect()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            top_p: self.top_p,
            stop: self.stop,
            stream: self.stream,
            n: self.n,
            target_wpm: self.target_wpm,
            credential: self.credential,
        }
    }
}

/// Parse the stop-sequence field: JSON text holding an array of strings.
///
/// Absent, `null` or blank text means no stop sequences.
pub fn parse_stop_sequences(raw: Option<&NodeValue>) -> Result<Vec<String>, ValidationError> {
    let parsed = match raw {
        None | Some(NodeValue::Null) => return Ok(Vec::new()),
        Some(NodeValue::String(text)) if text.trim().is_empty() => return Ok(Vec::new()),
        Some(NodeValue::String(text)) => serde_json::from_str::<NodeValue>(text)
            .map_err(|e| ValidationError::InvalidStopSequences(e.to_string()))?,
        Some(other) => other.clone(),
    };

    let NodeValue::Array(items) = parsed else {
        return Err(ValidationError::InvalidStopSequences(
            "expected an array".to_string(),
        ));
    };

    items
        .into_iter()
        .map(|item| match item {
            NodeValue::String(s) => Ok(s),
            other => Err(ValidationError::InvalidStopSequences(format!(
                "expected strings, found {}",
                other
            ))),
        })
        .collect()
}

fn text(settings: &Settings, field: &'static str) -> Option<String> {
    match settings.get(field)? {
        NodeValue::String(s) if s.is_empty() => None,
        NodeValue::String(s) => Some(s.clone()),
        NodeValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn number(settings: &Settings, field: &'static str) -> Result<Option<f64>, SettingsError> {
    let Some(value) = settings.get(field) else {
        return Ok(None);
    };
    match value {
        NodeValue::Null => Ok(None),
        NodeValue::Number(n) => n.as_f64().map(Some).ok_or_else(|| SettingsError::InvalidNumber {
            field,
            raw: n.to_string(),
        }),
        NodeValue::String(s) if s.trim().is_empty() => Ok(None),
        NodeValue::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(SettingsError::InvalidNumber {
                field,
                raw: s.clone(),
            }),
        },
        other => Err(SettingsError::InvalidType {
            field,
            found: other.to_string(),
        }),
    }
}

fn ranged(
    settings: &Settings,
    field: &'static str,
    min: f64,
    max: f64,
) -> Result<Option<f64>, SettingsError> {
    match number(settings, field)? {
        Some(value) if value < min || value > max => Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        }),
        other => Ok(other),
    }
}
