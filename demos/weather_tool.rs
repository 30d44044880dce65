//! A chat node with one tool, talking to an OpenAI-compatible endpoint.
//!
//! This example demonstrates:
//! - Declaring a tool by wiring parameter nodes to a chat node output
//! - Streaming the reply onto the graph
//! - Receiving the model's tool call on the parameter nodes' outputs
//!
//! Run with `OPENAI_API_KEY=... cargo run --example weather_tool --features llm`.

use std::sync::Arc;

use serde_json::json;
use toolwire::prelude::*;

// ============================================================================
// A leaf that prints whatever reaches it
// ============================================================================

struct Printer {
    label: &'static str,
}

impl InputTarget for Printer {
    fn settings(&self) -> Settings {
        Settings::new()
    }

    fn receive(&self, value: NodeValue) {
        match self.label {
            "reply" => {
                if let Some(text) = value.get("content").and_then(NodeValue::as_str) {
                    println!("[reply] {}", text);
                }
            }
            label => println!("[{}] {}", label, value),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = Arc::new(MemoryHost::new());
    let transport = Arc::new(OpenAiTransport::new(OpenAiConfig::default())?);
    let chat = ChatNode::with_defaults(host.clone(), transport);

    // ========================================================================
    // Wiring
    // ========================================================================

    chat.outputs()
        .connect("reply", Connection::to(Arc::new(Printer { label: "reply" })))?;

    let city = Arc::new(ParameterNode::new(
        ParameterDeclaration::new("city", ParamType::String)
            .with_description("The city to look up")
            .required(),
    ));
    let unit = Arc::new(ParameterNode::new(
        ParameterDeclaration::new("unit", ParamType::String)
            .with_description("Either C or F"),
    ));
    city.connect(Connection::to(Arc::new(Printer { label: "city" })))?;
    unit.connect(Connection::to(Arc::new(Printer { label: "unit" })))?;

    chat.outputs().add(Port::output("getWeather"));
    chat.outputs().connect("getWeather", Connection::to(city))?;
    chat.outputs().connect("getWeather", Connection::to(unit))?;

    chat.set_setting("authorization", json!(std::env::var("OPENAI_API_KEY")?));
    chat.set_setting("stream", json!(false));

    // ========================================================================
    // Run
    // ========================================================================

    chat.deliver("user", json!("What's the weather like in Paris today?"))
        .await?;

    println!("\n--- node log ({:?}) ---", chat.state());
    for line in host.messages() {
        println!("{}", line);
    }

    Ok(())
}
