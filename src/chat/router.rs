use crate::core::NodeValue;
use crate::core::error::ToolArgumentError;
use crate::core::graph::Port;
use crate::llm::ToolCall;

/// What happened to a routed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// No output carries the call's name; the call was dropped.
    NoMatchingPort,
    /// Number of connections that received an argument.
    Delivered(usize),
}

/// Send a tool call's arguments to the nodes wired to the matching output.
///
/// Each connection on an output named like the call receives the argument
/// whose key equals the `name` its target declares. Connections whose name
/// is missing from the arguments receive nothing.
pub fn route(call: &ToolCall, outputs: &[Port]) -> Result<Routed, ToolArgumentError> {
    let arguments = parse_arguments(call)?;

    let mut matched = false;
    let mut delivered = 0;
    for output in outputs.iter().filter(|p| p.name() == call.name()) {
        matched = true;
        for connection in output.connections() {
            let settings = connection.settings();
            let Some(name) = settings.get("name").and_then(NodeValue::as_str) else {
                continue;
            };
            if let Some(value) = arguments.get(name) {
                connection.send(value.clone());
                delivered += 1;
            }
        }
    }

    if !matched {
        log::debug!("Tool call '{}' matches no output, dropping it", call.name());
        return Ok(Routed::NoMatchingPort);
    }
    Ok(Routed::Delivered(delivered))
}

fn parse_arguments(call: &ToolCall) -> Result<serde_json::Map<String, NodeValue>, ToolArgumentError> {
    let parsed: NodeValue =
        serde_json::from_str(call.arguments()).map_err(|source| ToolArgumentError::Parse {
            name: call.name().to_string(),
            source,
        })?;

    match parsed {
        NodeValue::Object(map) => Ok(map),
        _ => Err(ToolArgumentError::NotAnObject {
            name: call.name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{CollectingTarget, Connection};
    use serde_json::json;
    use std::sync::Arc;

    fn declared(name: &str) -> Arc<CollectingTarget> {
        let settings = json!({"type": "string", "name": name});
        Arc::new(CollectingTarget::new(
            settings.as_object().cloned().unwrap_or_default(),
        ))
    }

    fn weather_outputs(city: &Arc<CollectingTarget>, unit: &Arc<CollectingTarget>) -> Vec<Port> {
        vec![
            Port::output("reply"),
            Port::output("getWeather")
                .with_connection(Connection::to(city.clone()))
                .with_connection(Connection::to(unit.clone())),
        ]
    }

    #[test]
    fn test_routes_argument_by_declared_name() {
        let city = declared("city");
        let unit = declared("unit");
        let outputs = weather_outputs(&city, &unit);

        let call = ToolCall::new("getWeather", r#"{"city":"Paris"}"#);
        assert_eq!(route(&call, &outputs).unwrap(), Routed::Delivered(1));

        assert_eq!(city.received(), vec![json!("Paris")]);
        assert!(unit.received().is_empty());
    }

    #[test]
    fn test_values_are_passed_through_untouched() {
        let city = declared("city");
        let unit = declared("unit");
        let outputs = weather_outputs(&city, &unit);

        let call = ToolCall::new("getWeather", r#"{"city":{"name":"Paris"},"unit":0}"#);
        assert_eq!(route(&call, &outputs).unwrap(), Routed::Delivered(2));
        assert_eq!(city.received(), vec![json!({"name": "Paris"})]);
        assert_eq!(unit.received(), vec![json!(0)]);
    }

    #[test]
    fn test_malformed_arguments() {
        let city = declared("city");
        let unit = declared("unit");
        let outputs = weather_outputs(&city, &unit);

        let call = ToolCall::new("getWeather", r#"{"city": "Par"#);
        let err = route(&call, &outputs).unwrap_err();
        assert!(matches!(err, ToolArgumentError::Parse { ref name, .. } if name == "getWeather"));
        assert!(city.received().is_empty());
    }

    #[test]
    fn test_arguments_must_be_an_object() {
        let city = declared("city");
        let unit = declared("unit");
        let outputs = weather_outputs(&city, &unit);

        let call = ToolCall::new("getWeather", r#"["Paris"]"#);
        assert!(matches!(
            route(&call, &outputs),
            Err(ToolArgumentError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_unknown_tool_is_dropped() {
        let city = declared("city");
        let unit = declared("unit");
        let outputs = weather_outputs(&city, &unit);

        let call = ToolCall::new("getTime", r#"{"city":"Paris"}"#);
        assert_eq!(route(&call, &outputs).unwrap(), Routed::NoMatchingPort);
        assert!(city.received().is_empty());
    }

    #[test]
    fn test_name_match_is_exact() {
        let city = declared("city");
        let unit = declared("unit");
        let outputs = weather_outputs(&city, &unit);

        let call = ToolCall::new("getweather", r#"{"city":"Paris"}"#);
        assert_eq!(route(&call, &outputs).unwrap(), Routed::NoMatchingPort);
    }
}
