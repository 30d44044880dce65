//! Integration tests for the chat node lifecycle
//!
//! These drive a `ChatNode` the way the graph host does, with a scripted
//! transport standing in for the completion service.

use std::sync::Arc;

use serde_json::json;
use toolwire::prelude::*;
use toolwire::{CollectingTarget, PortError};

fn chat(transport: Arc<ScriptedTransport>) -> (Arc<ChatNode>, Arc<MemoryHost>, Arc<CollectingTarget>) {
    let host = Arc::new(MemoryHost::new());
    let node = Arc::new(ChatNode::with_defaults(host.clone(), transport));
    let reply = Arc::new(CollectingTarget::default());
    node.outputs()
        .connect("reply", Connection::to(reply.clone()))
        .unwrap();
    (node, host, reply)
}

fn declared(name: &str, required: bool) -> Arc<CollectingTarget> {
    let settings = json!({"type": "string", "name": name, "required": required});
    Arc::new(CollectingTarget::new(
        settings.as_object().cloned().unwrap_or_default(),
    ))
}

#[tokio::test]
async fn test_single_user_message_without_tools() {
    let transport = Arc::new(ScriptedTransport::finishing(vec![ChatMessage::assistant(
        "hello",
    )]));
    let (node, host, _reply) = chat(transport.clone());

    node.deliver("user", json!("hi")).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages, vec![ChatMessage::user("hi")]);
    assert!(requests[0].tools.is_none());

    let body = serde_json::to_value(&requests[0]).unwrap();
    assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    assert!(body.get("tools").is_none());
    assert!(body.get("target_wpm").is_none());

    assert_eq!(node.state(), NodeState::Done);
    assert_eq!(
        host.states(),
        vec![NodeState::Processing, NodeState::Done]
    );
    assert!(node.inputs().all_open());
    assert!(node.inputs().get("user").unwrap().value().is_none());

    let log = host.messages();
    assert_eq!(log[0], "Creating chat completion...");
    assert!(log.contains(&"Getting tools...".to_string()));
    assert!(log.iter().any(|m| m.starts_with("Completed: ")));
}

#[tokio::test]
async fn test_settings_flow_into_request() {
    let transport = Arc::new(ScriptedTransport::finishing(Vec::new()));
    let (node, _host, _reply) = chat(transport.clone());

    node.set_setting("model", json!("gpt-3.5-turbo-16k"));
    node.set_setting("max_tokens", json!("512"));
    node.set_setting("stream", json!(false));
    node.set_setting("stop", json!(r#"["a","b"]"#));
    node.set_setting("authorization", json!("sk-test"));

    node.deliver("user", json!("hi")).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.model, "gpt-3.5-turbo-16k");
    assert_eq!(request.max_tokens, Some(512));
    assert!(!request.stream);
    assert_eq!(request.stop, vec!["a", "b"]);
    assert_eq!(request.credential.expose(), "sk-test");
}

#[tokio::test]
async fn test_bad_stop_sequences_do_not_block_the_completion() {
    let transport = Arc::new(ScriptedTransport::finishing(Vec::new()));
    let (node, _host, _reply) = chat(transport.clone());

    node.set_setting("stop", json!("not json"));
    node.deliver("user", json!("hi")).await.unwrap();

    assert!(transport.requests()[0].stop.is_empty());
    assert_eq!(node.state(), NodeState::Done);
}

#[tokio::test]
async fn test_streamed_messages_are_forwarded_in_order() {
    let chunks = vec![
        ChatMessage::assistant("Hel"),
        ChatMessage::assistant("Hello"),
        ChatMessage::assistant("Hello!"),
    ];
    let transport = Arc::new(
        ScriptedTransport::finishing(vec![ChatMessage::assistant("Hello!")])
            .with_chunks(chunks.clone()),
    );
    let (node, _host, reply) = chat(transport);

    node.deliver("user", json!("hi")).await.unwrap();

    let expected: Vec<NodeValue> = chunks
        .iter()
        .map(|m| serde_json::to_value(m).unwrap())
        .collect();
    assert_eq!(reply.received(), expected);
}

#[tokio::test]
async fn test_missing_inputs_reach_back() {
    let transport = Arc::new(ScriptedTransport::finishing(Vec::new()));
    let (node, host, _reply) = chat(transport.clone());
    node.inputs().add(Port::input("system"));

    node.deliver("user", json!("hi")).await.unwrap();

    assert_eq!(host.reach_backs(), 1);
    assert_eq!(host.messages(), vec!["Reaching back..."]);
    assert!(transport.requests().is_empty());
    assert!(host.states().is_empty());

    node.deliver("system", json!("be brief")).await.unwrap();
    let request = &transport.requests()[0];
    assert_eq!(
        request.messages,
        vec![ChatMessage::user("hi"), ChatMessage::system("be brief")]
    );
}

#[tokio::test]
async fn test_malformed_tool_call_does_not_stop_the_next() {
    let finish = vec![ChatMessage::assistant(json!(null)).with_tool_calls(vec![
        ToolCall::new("getWeather", r#"{"city": "Par"#),
        ToolCall::new("getWeather", r#"{"city":"Paris"}"#),
    ])];
    let transport = Arc::new(ScriptedTransport::finishing(finish));
    let (node, host, _reply) = chat(transport);

    let city = declared("city", true);
    let unit = declared("unit", false);
    node.outputs().add(Port::output("getWeather"));
    node.outputs()
        .connect("getWeather", Connection::to(city.clone()))
        .unwrap();
    node.outputs()
        .connect("getWeather", Connection::to(unit.clone()))
        .unwrap();

    node.deliver("user", json!("weather?")).await.unwrap();

    let errors = host.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("malformed arguments"));
    assert_eq!(city.received(), vec![json!("Paris")]);
    assert!(unit.received().is_empty());
    assert_eq!(node.state(), NodeState::Done);
    assert_eq!(
        host.messages()
            .iter()
            .filter(|m| *m == "Using tool: getWeather")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_transport_error_leaves_inputs_closed() {
    let transport = Arc::new(ScriptedTransport::failing("connection reset"));
    let (node, host, _reply) = chat(transport.clone());

    let err = node.deliver("user", json!("hi")).await.unwrap_err();
    assert!(matches!(err, NodeError::Transport(_)));

    assert_eq!(node.state(), NodeState::Errored);
    assert_eq!(host.errors().len(), 1);
    assert!(host.errors()[0].contains("connection reset"));
    assert!(transport.last_token().unwrap().is_cancelled());

    assert!(!node.inputs().all_open());
    assert_eq!(
        node.inputs().get("user").unwrap().value(),
        Some(&json!("hi"))
    );

    let next = node.deliver("user", json!("again")).await.unwrap_err();
    assert!(matches!(next, NodeError::Port(PortError::Closed(_))));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_halt_aborts_once() {
    let transport = Arc::new(ScriptedTransport::hanging());
    let (node, host, _reply) = chat(transport.clone());

    let running = node.clone();
    let handle = tokio::spawn(async move { running.deliver("user", json!("hi")).await });

    while transport.last_token().is_none() {
        tokio::task::yield_now().await;
    }
    assert_eq!(node.state(), NodeState::Processing);

    node.halt();
    node.halt();
    handle.await.unwrap().unwrap();

    assert_eq!(host.errors(), vec!["Completion aborted"]);
    assert_eq!(node.state(), NodeState::Aborted);
    assert!(node.inputs().all_open());
    assert!(node.inputs().get("user").unwrap().value().is_none());
}

#[tokio::test]
async fn test_node_runs_again_after_finishing() {
    let transport = Arc::new(ScriptedTransport::finishing(Vec::new()));
    let (node, host, _reply) = chat(transport.clone());

    node.deliver("user", json!("one")).await.unwrap();
    node.deliver("user", json!("two")).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages, vec![ChatMessage::user("two")]);
    assert_eq!(host.messages()[0], "Creating chat completion...");
}

#[tokio::test]
async fn test_reserved_tools_input_is_rejected() {
    let transport = Arc::new(ScriptedTransport::finishing(Vec::new()));
    let (node, host, _reply) = chat(transport.clone());
    node.inputs().add(Port::input("tools"));
    node.inputs().write("tools", json!([])).unwrap();

    let err = node.deliver("user", json!("hi")).await.unwrap_err();
    assert!(matches!(err, NodeError::Validation(_)));

    assert!(transport.requests().is_empty());
    assert_eq!(node.state(), NodeState::Errored);
    assert_eq!(host.errors().len(), 1);
    assert!(node.inputs().all_open());
}

#[tokio::test]
async fn test_invalid_setting_is_reported() {
    let transport = Arc::new(ScriptedTransport::finishing(Vec::new()));
    let (node, host, _reply) = chat(transport.clone());
    node.set_setting("temperature", json!("warm"));

    let err = node.deliver("user", json!("hi")).await.unwrap_err();
    assert!(matches!(err, NodeError::Settings(_)));
    assert!(host.errors()[0].contains("temperature"));
    assert!(transport.requests().is_empty());
    assert!(node.inputs().all_open());
}
