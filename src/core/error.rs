use thiserror::Error;

use crate::llm::error::LLMError;

/// Rejected node input or settings text.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Input name '{0}' is reserved: tools are coming soon but are not allowed just yet")]
    ReservedInputName(String),

    #[error("Stop sequences must be valid json: {0}")]
    InvalidStopSequences(String),
}

/// A node setting that could not be turned into a typed value.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Setting '{field}' is not a valid number: {raw}")]
    InvalidNumber { field: &'static str, raw: String },

    #[error("Setting '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Setting '{field}' has an unsupported type: {found}")]
    InvalidType { field: &'static str, found: String },
}

#[derive(Debug, Error)]
pub enum PortError {
    #[error("No port named '{0}'")]
    NotFound(String),

    #[error("Port '{0}' is closed")]
    Closed(String),
}

/// Arguments of a single tool call that could not be routed.
#[derive(Debug, Error)]
pub enum ToolArgumentError {
    #[error("Tool call '{name}' has malformed arguments: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tool call '{name}' arguments must be a JSON object")]
    NotAnObject { name: String },
}

/// Everything a node reports on its error channel.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    ToolArguments(#[from] ToolArgumentError),

    #[error("Completion failed: {0}")]
    Transport(#[from] LLMError),

    #[error("Completion aborted")]
    Aborted,
}
