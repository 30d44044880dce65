use crate::core::graph::Port;
use crate::llm::{PropertySchema, ToolDefinition};
use crate::nodes::parameter::ParameterDeclaration;

/// The output that carries the streamed reply.
pub const REPLY_PORT: &str = "reply";

/// Older graphs name the reply output `msg`.
pub const LEGACY_REPLY_PORT: &str = "msg";

pub fn is_reply_port(name: &str) -> bool {
    name == REPLY_PORT || name == LEGACY_REPLY_PORT
}

/// Derive the tools the model may call from the node's outputs.
///
/// Every output other than the reply becomes a function named after the port.
/// Its parameters are whatever the nodes connected to it declare. Returns
/// `None` when no function ends up with a single parameter, so the request
/// can leave `tools` out entirely.
pub fn build(outputs: &[Port]) -> Option<Vec<ToolDefinition>> {
    let mut tools = Vec::new();

    for output in outputs.iter().filter(|p| !is_reply_port(p.name())) {
        let mut tool = ToolDefinition::new(output.name());

        for connection in output.connections() {
            let Some(param) = ParameterDeclaration::from_settings(&connection.settings()) else {
                log::debug!(
                    "Connection on tool '{}' declares no parameter name, skipping",
                    output.name()
                );
                continue;
            };

            tool.parameters.properties.insert(
                param.name.clone(),
                PropertySchema {
                    kind: param.kind,
                    description: param.description.clone(),
                },
            );
            if param.required {
                tool.parameters.require(&param.name);
            }
        }

        tools.push(tool);
    }

    if tools.iter().any(ToolDefinition::has_properties) {
        Some(tools)
    } else {
        None
    }
}
