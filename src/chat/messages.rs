use crate::core::error::ValidationError;
use crate::core::graph::Port;
use crate::core::{NodeValue, is_truthy};
use crate::llm::{ChatMessage, Role};

/// Input name kept free for passing tools in directly.
pub const RESERVED_TOOLS_INPUT: &str = "tools";

/// Turn the node's inputs into the conversation sent to the model.
///
/// Ports are read in declaration order and each port's value is read in its
/// own order. A port named after a role (`user`, `assistant`, `system`)
/// speaks with that role; any other port speaks as `user` under its own name.
/// Falsy entries are skipped.
pub fn assemble(inputs: &[Port]) -> Result<Vec<ChatMessage>, ValidationError> {
    if let Some(port) = inputs.iter().find(|p| p.name() == RESERVED_TOOLS_INPUT) {
        return Err(ValidationError::ReservedInputName(port.name().to_string()));
    }

    let mut messages = Vec::new();
    for port in inputs {
        let (role, name) = match Role::from_reserved(port.name()) {
            Some(role) => (role, None),
            None => (Role::User, Some(port.name().to_string())),
        };

        for item in entries(port.value()) {
            if !is_truthy(item) {
                continue;
            }
            let mut message = ChatMessage::new(role, item.clone());
            message.name = name.clone();
            messages.push(message);
        }
    }
    Ok(messages)
}

/// A port's value as a sequence: arrays as-is, anything else as one entry.
fn entries(value: Option<&NodeValue>) -> &[NodeValue] {
    match value {
        Some(NodeValue::Array(items)) => items,
        Some(single) => std::slice::from_ref(single),
        None => &[],
    }
}
