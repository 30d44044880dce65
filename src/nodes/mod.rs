//! Small graph nodes that sit around a chat node.

pub mod parameter;

pub use parameter::{ParameterDeclaration, ParameterNode};
