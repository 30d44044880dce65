//! Completion transports for toolwire
//!
//! A transport takes a [`CompletionRequest`], streams partial messages back
//! through a callback, and ends with either the finished assistant turn(s) or
//! an abort. The node never talks HTTP itself; it only sees [`ChatTransport`].

pub mod error;
pub mod mock;
pub mod pacing;
pub mod types;

#[cfg(feature = "llm")]
pub mod openai;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use error::LLMError;
pub use mock::{ScriptEnd, ScriptedTransport};
pub use pacing::WordPacer;
pub use types::{
    ChatMessage, CompletionRequest, Credential, FunctionCall, FunctionTool, ParamType,
    PropertySchema, Role, ToolCall, ToolDefinition, ToolParameters,
};

#[cfg(feature = "llm")]
pub use openai::{OpenAiConfig, OpenAiTransport};

/// Receives every streamed message, in transport order.
pub type MessageSink<'a> = &'a (dyn Fn(ChatMessage) + Send + Sync);

/// How a completion ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The full assistant turn, one message per requested completion.
    Finished(Vec<ChatMessage>),
    /// The cancellation token fired before the completion finished.
    Aborted,
}

/// Something that can run a chat completion.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Run `request` to completion.
    ///
    /// Implementations must call `on_message` for each partial or complete
    /// message as it arrives, stop promptly once `cancel` fires and report
    /// that as [`CompletionOutcome::Aborted`] rather than as an error.
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_message: MessageSink<'_>,
    ) -> Result<CompletionOutcome, LLMError>;
}
