//! # toolwire
//!
//! A chat-completion node for dataflow graphs. Named inputs become the
//! conversation, the graph wired to the node's outputs becomes the tools the
//! model may call, and tool calls in the answer travel back onto the graph.
//!
//! ## Features
//!
//! - **Conversation from ports**: inputs named `user`, `assistant` or `system`
//!   speak with that role, any other input speaks as a named user
//! - **Tools from topology**: every output except `reply` is a function whose
//!   parameters are declared by the nodes connected to it
//! - **Streaming & abort**: partial messages go out as they arrive; `halt()`
//!   cancels the request in flight
//! - **Optional OpenAI transport**: server-sent events with words-per-minute
//!   pacing (feature-gated behind `llm`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolwire::prelude::*;
//!
//! # async fn run() -> Result<(), NodeError> {
//! let host = Arc::new(MemoryHost::new());
//! let transport = Arc::new(ScriptedTransport::finishing(vec![ChatMessage::assistant("Hi!")]));
//! let chat = ChatNode::with_defaults(host.clone(), transport);
//!
//! let city = Arc::new(ParameterNode::new(
//!     ParameterDeclaration::new("city", ParamType::String).required(),
//! ));
//! chat.outputs().add(Port::output("getWeather"));
//! chat.outputs().connect("getWeather", Connection::to(city))?;
//!
//! chat.deliver("user", "What's the weather in Paris?".into()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`chat`]: the chat node, message assembly, tool schemas and routing
//! - [`nodes`]: parameter nodes that declare tool arguments
//! - [`llm`]: request/response types and completion transports
//! - [`prelude`]: Commonly used types and traits (import with `use toolwire::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Public Modules
// ============================================================================

pub mod chat;
pub mod llm;
pub mod nodes;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Graph and host
pub use crate::core::debounce::Debouncer;
pub use crate::core::error::{
    NodeError, PortError, SettingsError, ToolArgumentError, ValidationError,
};
pub use crate::core::graph::{CollectingTarget, Connection, InputTarget, Port, PortDirection, PortSet};
pub use crate::core::host::{LogEntry, LogLevel, MemoryHost, NodeHost, NodeState};
pub use crate::core::node::{ExecuteOnce, GraphNode, OnceGuard};
pub use crate::core::validation::{ValidationIssue, ValidationResult};
pub use crate::core::{NodeValue, Settings, is_truthy};

// Chat node
pub use chat::{ChatNode, CompletionSettings, Routed};
pub use nodes::{ParameterDeclaration, ParameterNode};

// Transports
pub use llm::{
    ChatMessage, ChatTransport, CompletionOutcome, CompletionRequest, Credential, LLMError,
    ParamType, Role, ScriptedTransport, ToolCall, ToolDefinition,
};

#[cfg(feature = "llm")]
pub use llm::{OpenAiConfig, OpenAiTransport};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: everything needed to wire and run a chat node.
///
/// # Example
/// ```rust
/// use toolwire::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        // Chat
        ChatMessage,
        ChatNode,
        ChatTransport,
        CompletionOutcome,
        // Graph
        Connection,
        GraphNode,
        InputTarget,
        MemoryHost,
        NodeError,
        NodeHost,
        NodeState,
        NodeValue,
        ParamType,
        ParameterDeclaration,
        ParameterNode,
        Port,
        PortSet,
        Routed,
        ScriptedTransport,
        Settings,
        ToolCall,
    };

    #[cfg(feature = "llm")]
    pub use super::{OpenAiConfig, OpenAiTransport};
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;
pub use tokio_util::sync::CancellationToken;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
