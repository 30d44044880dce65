use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chat::messages::{self, RESERVED_TOOLS_INPUT};
use crate::chat::router::{self, Routed};
use crate::chat::settings::{
    CompletionSettings, STOP, STOP_SEQUENCES_ERROR, default_settings, parse_stop_sequences,
};
use crate::chat::tools::{self, REPLY_PORT, is_reply_port};
use crate::core::debounce::Debouncer;
use crate::core::error::NodeError;
use crate::core::graph::{Connection, PortSet};
use crate::core::host::{NodeHost, NodeState};
use crate::core::node::{ExecuteOnce, GraphNode};
use crate::core::validation::ValidationResult;
use crate::core::{NodeValue, Settings};
use crate::llm::{ChatMessage, ChatTransport, CompletionOutcome, CompletionRequest};

/// Idle time after the last stop-sequence edit before it is validated.
pub const STOP_VALIDATION_WINDOW: Duration = Duration::from_millis(750);

/// A graph node that runs a chat completion over its inputs.
///
/// Inputs become the conversation, outputs other than `reply` become tools,
/// streamed messages go out on `reply`, and tool calls in the final answer are
/// routed to whatever is wired to the matching output.
pub struct ChatNode {
    id: Uuid,
    inputs: PortSet,
    outputs: PortSet,
    settings: Arc<RwLock<Settings>>,
    host: Arc<dyn NodeHost>,
    transport: Arc<dyn ChatTransport>,
    once: ExecuteOnce,
    abort: Mutex<Option<CancellationToken>>,
    state: Mutex<NodeState>,
    stop_validation: Debouncer,
}

impl ChatNode {
    pub fn new(
        inputs: PortSet,
        outputs: PortSet,
        settings: Settings,
        host: Arc<dyn NodeHost>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            inputs,
            outputs,
            settings: Arc::new(RwLock::new(settings)),
            host,
            transport,
            once: ExecuteOnce::new(),
            abort: Mutex::new(None),
            state: Mutex::new(NodeState::Idle),
            stop_validation: Debouncer::new(STOP_VALIDATION_WINDOW),
        }
    }

    /// The node as first dropped on a graph: a `user` input, a `reply`
    /// output and default settings.
    pub fn with_defaults(host: Arc<dyn NodeHost>, transport: Arc<dyn ChatTransport>) -> Self {
        Self::new(
            PortSet::inputs(["user"]),
            PortSet::outputs([REPLY_PORT]),
            default_settings(),
            host,
            transport,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> NodeState {
        *self.state.lock()
    }

    /// Change one setting the way the settings panel does.
    pub fn set_setting(&self, key: &str, value: NodeValue) {
        self.settings.write().insert(key.to_string(), value);
        if key == STOP {
            self.stop_sequences_changed();
        }
    }

    /// Clear the stop-sequence field error and validate the field once edits
    /// settle.
    pub fn stop_sequences_changed(&self) {
        self.host.set_field_error(STOP, None);

        let host = self.host.clone();
        let settings = self.settings.clone();
        self.stop_validation.schedule(move || {
            let raw = settings.read().get(STOP).cloned();
            if let Err(e) = parse_stop_sequences(raw.as_ref()) {
                log::debug!("{}", e);
                host.set_field_error(STOP, Some(STOP_SEQUENCES_ERROR));
            }
        });
    }

    /// Check the wiring for things that will fail or surprise at run time.
    pub fn validate_ports(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.inputs.names().iter().any(|n| n == RESERVED_TOOLS_INPUT) {
            result.add_error(format!(
                "Input '{}' is reserved and will be rejected",
                RESERVED_TOOLS_INPUT
            ));
        }

        let outputs = self.outputs.snapshot();
        if !outputs.iter().any(|p| is_reply_port(p.name())) {
            result.add_warning(format!(
                "No '{}' output, streamed messages will be dropped",
                REPLY_PORT
            ));
        }
        for port in outputs.iter().filter(|p| !is_reply_port(p.name())) {
            if port.connections().is_empty() {
                result.add_warning(format!(
                    "Tool output '{}' has no parameters connected",
                    port.name()
                ));
            }
        }

        result
    }

    fn set_state(&self, state: NodeState) {
        *self.state.lock() = state;
        self.host.set_state(state);
    }

    fn prepare_request(&self) -> Result<CompletionRequest, NodeError> {
        self.host.log("Getting tools...");
        let tools = tools::build(&self.outputs.snapshot());
        self.host
            .log(&format!("Tools: {}", serde_json::to_string(&tools).unwrap_or_default()));

        let messages = messages::assemble(&self.inputs.snapshot())?;
        self.host.log(&format!(
            "Messages: {}",
            serde_json::to_string(&messages).unwrap_or_default()
        ));

        let settings = CompletionSettings::from_settings(&self.settings.read())?;
        Ok(settings.into_request(messages, tools))
    }

    async fn do_chat_completion(&self) -> Result<(), NodeError> {
        self.host.clear_logs();
        self.host.log("Creating chat completion...");
        self.set_state(NodeState::Processing);
        self.inputs.close();
        self.validate_ports().log_summary();

        let request = match self.prepare_request() {
            Ok(request) => request,
            Err(e) => {
                self.host.error(&e);
                self.set_state(NodeState::Errored);
                self.inputs.open();
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        *self.abort.lock() = Some(cancel.clone());

        let reply = self.reply_connections();
        let on_message = |message: ChatMessage| send_reply(&reply, &message);
        let result = self
            .transport
            .complete(request, cancel.clone(), &on_message)
            .await;

        self.abort.lock().take();

        match result {
            Ok(CompletionOutcome::Finished(messages)) => {
                self.host.log(&format!(
                    "Completed: {}",
                    serde_json::to_string(&messages).unwrap_or_default()
                ));
                self.dispatch_tool_calls(&messages);
                self.set_state(NodeState::Done);
                self.inputs.open();
                self.inputs.clear();
                Ok(())
            }
            Ok(CompletionOutcome::Aborted) => {
                self.host.error(&NodeError::Aborted);
                self.set_state(NodeState::Aborted);
                self.inputs.open();
                self.inputs.clear();
                Ok(())
            }
            Err(e) => {
                cancel.cancel();
                let e = NodeError::from(e);
                self.host.error(&e);
                self.set_state(NodeState::Errored);
                log::warn!(
                    "[{}] Inputs stay closed after a failed completion; the node ignores new input until they are reopened",
                    self.id
                );
                Err(e)
            }
        }
    }

    fn reply_connections(&self) -> Vec<Connection> {
        self.outputs
            .snapshot()
            .into_iter()
            .filter(|p| is_reply_port(p.name()))
            .flat_map(|p| p.connections().to_vec())
            .collect()
    }

    /// Route every tool call of the finished turn, in order. A call with bad
    /// arguments is reported and skipped.
    fn dispatch_tool_calls(&self, messages: &[ChatMessage]) {
        let outputs = self.outputs.snapshot();
        for call in messages.iter().flat_map(|m| m.tool_calls.iter()) {
            self.host.log(&format!("Using tool: {}", call.name()));
            match router::route(call, &outputs) {
                Ok(Routed::Delivered(count)) => {
                    log::debug!("[{}] '{}' delivered {} argument(s)", self.id, call.name(), count);
                }
                Ok(Routed::NoMatchingPort) => {}
                Err(e) => self.host.error(&NodeError::from(e)),
            }
        }
    }
}

fn send_reply(reply: &[Connection], message: &ChatMessage) {
    match serde_json::to_value(message) {
        Ok(value) => {
            for connection in reply {
                connection.send(value.clone());
            }
        }
        Err(e) => log::error!("Failed to serialize streamed message: {}", e),
    }
}

#[async_trait]
impl GraphNode for ChatNode {
    fn inputs(&self) -> &PortSet {
        &self.inputs
    }

    fn outputs(&self) -> &PortSet {
        &self.outputs
    }

    fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    async fn main(&self, trigger: &str, _value: NodeValue) -> Result<(), NodeError> {
        if !self.inputs.all_ready() {
            self.host.log("Reaching back...");
            self.host.reach_back();
            return Ok(());
        }

        let Some(_guard) = self.once.try_enter() else {
            log::debug!(
                "[{}] Completion already running, ignoring trigger on '{}'",
                self.id,
                trigger
            );
            return Ok(());
        };

        self.do_chat_completion().await
    }

    fn halt(&self) {
        match self.abort.lock().take() {
            Some(token) => token.cancel(),
            None => log::debug!("[{}] Nothing to halt", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{CollectingTarget, Port};
    use crate::core::host::MemoryHost;
    use crate::llm::ScriptedTransport;
    use serde_json::json;

    fn node(host: Arc<MemoryHost>) -> ChatNode {
        ChatNode::with_defaults(host, Arc::new(ScriptedTransport::finishing(Vec::new())))
    }

    #[test]
    fn test_defaults() {
        let node = node(Arc::new(MemoryHost::new()));
        assert_eq!(node.state(), NodeState::Idle);
        assert_eq!(node.inputs().names(), vec!["user"]);
        assert_eq!(node.outputs().names(), vec!["reply"]);
        assert_eq!(node.settings().get("model"), Some(&json!("gpt-3.5-turbo")));
    }

    #[test]
    fn test_halt_without_completion_is_a_no_op() {
        let node = node(Arc::new(MemoryHost::new()));
        node.halt();
        node.halt();
        assert_eq!(node.state(), NodeState::Idle);
    }

    #[test]
    fn test_validate_ports_flags_wiring() {
        let node = node(Arc::new(MemoryHost::new()));
        assert!(node.validate_ports().is_safe());
        assert!(!node.validate_ports().has_warnings());

        node.inputs().add(Port::input("tools"));
        node.outputs().add(Port::output("lookup"));
        let result = node.validate_ports();
        assert!(!result.is_safe());
        assert_eq!(result.warnings().count(), 1);

        node.outputs()
            .connect("lookup", Connection::to(Arc::new(CollectingTarget::default())))
            .unwrap();
        assert!(!node.validate_ports().has_warnings());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_sequences_validated_after_edits_settle() {
        let host = Arc::new(MemoryHost::new());
        let node = node(host.clone());

        node.set_setting(STOP, json!("[\"a\""));
        tokio::time::sleep(Duration::from_millis(300)).await;
        node.set_setting(STOP, json!("not json"));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(host.field_error(STOP).is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(host.field_error(STOP).as_deref(), Some(STOP_SEQUENCES_ERROR));

        node.set_setting(STOP, json!("[\"END\"]"));
        assert!(host.field_error(STOP).is_none());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(host.field_error(STOP).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_stop_sequences_are_valid() {
        let host = Arc::new(MemoryHost::new());
        let node = node(host.clone());

        node.set_setting(STOP, json!(""));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(host.field_error(STOP).is_none());
    }
}
