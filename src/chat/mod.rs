//! The chat completion node and the pieces it is built from.
//!
//! - [`messages`]: inputs to conversation
//! - [`tools`]: outputs and their connections to tool definitions
//! - [`settings`]: the node's settings as a typed snapshot
//! - [`controller`]: the node itself
//! - [`router`]: tool calls back onto the graph

pub mod controller;
pub mod messages;
pub mod router;
pub mod settings;
pub mod tools;

pub use controller::ChatNode;
pub use router::Routed;
pub use settings::CompletionSettings;
