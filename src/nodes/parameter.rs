use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::error::{NodeError, PortError};
use crate::core::graph::{Connection, InputTarget, PortSet};
use crate::core::node::GraphNode;
use crate::core::{NodeValue, Settings, is_truthy};
use crate::llm::ParamType;

/// The single input and the single output of a parameter node.
pub const VALUE_PORT: &str = "value";

/// A typed, named argument a tool accepts.
///
/// Any node whose settings carry this shape can stand at the end of a chat
/// node's tool output; the chat node reads it to describe the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            kind,
            name: name.into(),
            description: String::new(),
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Read a declaration out of arbitrary node settings.
    ///
    /// Returns `None` without a non-empty `name`. Everything else has a
    /// fallback: unknown types become strings, `required` goes by truthiness.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let name = settings
            .get("name")
            .and_then(NodeValue::as_str)
            .filter(|n| !n.is_empty())?;

        let kind = match settings.get("type").and_then(NodeValue::as_str) {
            Some("number") => ParamType::Number,
            Some("string") | None => ParamType::String,
            Some(other) => {
                log::debug!("Parameter '{}' has unknown type '{}', using string", name, other);
                ParamType::String
            }
        };

        let description = match settings.get("description") {
            Some(NodeValue::String(s)) => s.clone(),
            Some(NodeValue::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Some(Self {
            kind,
            name: name.to_string(),
            description,
            required: settings.get("required").is_some_and(is_truthy),
        })
    }

    pub fn to_settings(&self) -> Settings {
        match serde_json::to_value(self) {
            Ok(NodeValue::Object(map)) => map,
            _ => Settings::new(),
        }
    }
}

/// Declares one tool parameter and passes through whatever value the model
/// supplies for it.
pub struct ParameterNode {
    settings: RwLock<Settings>,
    inputs: PortSet,
    outputs: PortSet,
}

impl ParameterNode {
    pub fn new(declaration: ParameterDeclaration) -> Self {
        Self {
            settings: RwLock::new(declaration.to_settings()),
            inputs: PortSet::inputs([VALUE_PORT]),
            outputs: PortSet::outputs([VALUE_PORT]),
        }
    }

    pub fn declaration(&self) -> Option<ParameterDeclaration> {
        ParameterDeclaration::from_settings(&self.settings.read())
    }

    pub fn set_setting(&self, key: &str, value: NodeValue) {
        self.settings.write().insert(key.to_string(), value);
    }

    /// Wire the output to another node's input.
    pub fn connect(&self, connection: Connection) -> Result<(), PortError> {
        self.outputs.connect(VALUE_PORT, connection)
    }

    fn relay(&self, value: NodeValue) {
        self.inputs.clear();
        for port in self.outputs.snapshot() {
            for connection in port.connections() {
                connection.send(value.clone());
            }
        }
    }
}

impl InputTarget for ParameterNode {
    fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    fn receive(&self, value: NodeValue) {
        if let Err(e) = self.inputs.write(VALUE_PORT, value.clone()) {
            log::warn!("Parameter node dropped a value: {}", e);
            return;
        }
        self.relay(value);
    }
}

#[async_trait]
impl GraphNode for ParameterNode {
    fn inputs(&self) -> &PortSet {
        &self.inputs
    }

    fn outputs(&self) -> &PortSet {
        &self.outputs
    }

    fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    async fn main(&self, _trigger: &str, value: NodeValue) -> Result<(), NodeError> {
        self.relay(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::CollectingTarget;
    use serde_json::json;
    use std::sync::Arc;

    fn settings(value: NodeValue) -> Settings {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_from_settings_full() {
        let decl = ParameterDeclaration::from_settings(&settings(json!({
            "type": "number", "name": "level", "description": "0-10", "required": true
        })))
        .unwrap();
        assert_eq!(
            decl,
            ParameterDeclaration::new("level", ParamType::Number)
                .with_description("0-10")
                .required()
        );
    }

    #[test]
    fn test_from_settings_is_lenient() {
        let decl =
            ParameterDeclaration::from_settings(&settings(json!({"name": "city", "type": "date"})))
                .unwrap();
        assert_eq!(decl.kind, ParamType::String);
        assert_eq!(decl.description, "");
        assert!(!decl.required);

        assert!(ParameterDeclaration::from_settings(&settings(json!({"name": ""}))).is_none());
        assert!(ParameterDeclaration::from_settings(&Settings::new()).is_none());
    }

    #[test]
    fn test_to_settings_uses_type_key() {
        let settings = ParameterDeclaration::new("city", ParamType::String)
            .required()
            .to_settings();
        assert_eq!(settings.get("type"), Some(&json!("string")));
        assert_eq!(settings.get("name"), Some(&json!("city")));
        assert_eq!(settings.get("required"), Some(&json!(true)));
    }

    #[test]
    fn test_receive_relays_value_and_clears_input() {
        let node = ParameterNode::new(ParameterDeclaration::new("city", ParamType::String));
        let sink = Arc::new(CollectingTarget::default());
        node.connect(Connection::to(sink.clone())).unwrap();

        node.receive(json!({"any": ["shape"]}));

        assert_eq!(sink.received(), vec![json!({"any": ["shape"]})]);
        assert!(!node.inputs().all_ready());
    }

    #[tokio::test]
    async fn test_deliver_through_graph_node() {
        let node = ParameterNode::new(ParameterDeclaration::new("n", ParamType::Number));
        let sink = Arc::new(CollectingTarget::default());
        node.connect(Connection::to(sink.clone())).unwrap();

        node.deliver(VALUE_PORT, json!(42)).await.unwrap();
        assert_eq!(sink.received(), vec![json!(42)]);
        assert!(node.inputs().get(VALUE_PORT).unwrap().value().is_none());
    }

    #[test]
    fn test_settings_edits_change_declaration() {
        let node = ParameterNode::new(ParameterDeclaration::new("city", ParamType::String));
        node.set_setting("required", json!(1));
        assert!(node.declaration().unwrap().required);
    }
}
