//! OpenAI-compatible chat completion transport
//!
//! Speaks the `/v1/chat/completions` protocol, either as a single JSON
//! response or as a server-sent event stream of deltas.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::llm::pacing::WordPacer;
use crate::llm::{
    ChatMessage, ChatTransport, CompletionOutcome, CompletionRequest, LLMError, MessageSink, Role,
    ToolCall,
};

/// Configuration for the OpenAI transport
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Full chat completions URL (default: https://api.openai.com/v1/chat/completions)
    pub url: String,
    /// Whole-request timeout enforced by the HTTP client (default: 120s)
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Response from a non-streaming chat completion
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub role: Option<Role>,
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl From<ResponseMessage> for ChatMessage {
    fn from(message: ResponseMessage) -> Self {
        ChatMessage::new(
            message.role.unwrap_or(Role::Assistant),
            message
                .content
                .map(serde_json::Value::String)
                .unwrap_or_default(),
        )
        .with_tool_calls(message.tool_calls)
    }
}

/// One server-sent event of a streaming completion
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<DeltaFunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaFunctionCall {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Default, Clone)]
struct ToolCallBuilder {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates tool call deltas during streaming, keyed by call index
#[derive(Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, ToolCallBuilder>,
}

impl ToolCallAccumulator {
    pub fn add_delta(&mut self, delta: &DeltaToolCall) {
        let builder = self.calls.entry(delta.index).or_default();

        if let Some(id) = &delta.id {
            builder.id = Some(id.clone());
        }

        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                builder.name = Some(name.clone());
            }
            if let Some(arguments) = &function.arguments {
                builder.arguments.push_str(arguments);
            }
        }
    }

    /// Finished calls in index order. Calls that never got a name are dropped.
    pub fn build(self) -> Vec<ToolCall> {
        self.calls
            .into_values()
            .filter_map(|builder| {
                let Some(name) = builder.name else {
                    log::warn!("Dropping streamed tool call without a function name");
                    return None;
                };
                let mut call = ToolCall::new(name, builder.arguments);
                call.id = builder.id;
                Some(call)
            })
            .collect()
    }
}

/// Everything streamed so far for one choice
#[derive(Default)]
struct ChoiceAccumulator {
    role: Option<Role>,
    content: String,
    tool_calls: ToolCallAccumulator,
}

impl ChoiceAccumulator {
    fn into_message(self) -> ChatMessage {
        let content = if self.content.is_empty() {
            serde_json::Value::Null
        } else {
            self.content.into()
        };
        ChatMessage::new(self.role.unwrap_or(Role::Assistant), content)
            .with_tool_calls(self.tool_calls.build())
    }
}

/// Folds stream chunks into complete messages, one per choice index.
#[derive(Default)]
pub struct StreamAssembler {
    choices: BTreeMap<u32, ChoiceAccumulator>,
}

impl StreamAssembler {
    /// Record a chunk and return the partial messages worth forwarding:
    /// one per choice that carried text.
    pub fn push(&mut self, chunk: StreamChunk) -> Vec<ChatMessage> {
        let mut partials = Vec::new();
        for choice in chunk.choices {
            let acc = self.choices.entry(choice.index).or_default();
            if let Some(role) = choice.delta.role {
                acc.role = Some(role);
            }
            if let Some(calls) = &choice.delta.tool_calls {
                for delta in calls {
                    acc.tool_calls.add_delta(delta);
                }
            }
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                acc.content.push_str(&content);
                partials.push(ChatMessage::new(
                    acc.role.unwrap_or(Role::Assistant),
                    content,
                ));
            }
            if let Some(reason) = choice.finish_reason {
                log::debug!("Choice {} finished: {}", choice.index, reason);
            }
        }
        partials
    }

    pub fn finish(self) -> Vec<ChatMessage> {
        self.choices
            .into_values()
            .map(ChoiceAccumulator::into_message)
            .collect()
    }
}

/// Chat completions over HTTP
#[derive(Clone, Debug)]
pub struct OpenAiTransport {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiTransport {
    pub fn new(config: OpenAiConfig) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn request_builder(&self, request: &CompletionRequest) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(request);
        if request.credential.is_empty() {
            builder
        } else {
            builder.bearer_auth(request.credential.expose())
        }
    }

    async fn complete_once(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_message: MessageSink<'_>,
    ) -> Result<CompletionOutcome, LLMError> {
        let send = self.request_builder(&request).send();
        let response = tokio::select! {
            response = send => response?,
            _ = cancel.cancelled() => return Ok(CompletionOutcome::Aborted),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Status { status, body });
        }

        let mut parsed: CompletionResponse = response.json().await?;
        if parsed.choices.is_empty() {
            return Err(LLMError::InvalidResponse("No choices in response".to_string()));
        }
        parsed.choices.sort_by_key(|c| c.index);

        let mut pacer = WordPacer::new(request.target_wpm);
        let mut messages = Vec::with_capacity(parsed.choices.len());
        for choice in parsed.choices {
            let message = ChatMessage::from(choice.message);
            if let Some(text) = message.content.as_str() {
                tokio::select! {
                    _ = pacer.pace(text) => {}
                    _ = cancel.cancelled() => return Ok(CompletionOutcome::Aborted),
                }
            }
            on_message(message.clone());
            messages.push(message);
        }
        Ok(CompletionOutcome::Finished(messages))
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_message: MessageSink<'_>,
    ) -> Result<CompletionOutcome, LLMError> {
        let mut event_source = EventSource::new(self.request_builder(&request))
            .map_err(|e| LLMError::StreamError(e.to_string()))?;
        let mut pacer = WordPacer::new(request.target_wpm);
        let mut assembler = StreamAssembler::default();
        let mut chunk_count: usize = 0;

        loop {
            let event = tokio::select! {
                event = event_source.next() => event,
                _ = cancel.cancelled() => {
                    event_source.close();
                    return Ok(CompletionOutcome::Aborted);
                }
            };

            match event {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(msg))) => {
                    chunk_count += 1;
                    if msg.data == "[DONE]" {
                        break;
                    }

                    let chunk = match serde_json::from_str::<StreamChunk>(&msg.data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            log::debug!("Skipping unparseable stream chunk {}: {}", chunk_count, e);
                            continue;
                        }
                    };

                    for partial in assembler.push(chunk) {
                        if let Some(text) = partial.content.as_str() {
                            tokio::select! {
                                _ = pacer.pace(text) => {}
                                _ = cancel.cancelled() => {
                                    event_source.close();
                                    return Ok(CompletionOutcome::Aborted);
                                }
                            }
                        }
                        on_message(partial);
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => break,
                Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                    event_source.close();
                    let body = response.text().await.unwrap_or_default();
                    return Err(LLMError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Some(Err(e)) => {
                    event_source.close();
                    log::error!("Stream failed after {} chunks: {}", chunk_count, e);
                    return Err(LLMError::StreamError(e.to_string()));
                }
            }
        }

        event_source.close();
        Ok(CompletionOutcome::Finished(assembler.finish()))
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_message: MessageSink<'_>,
    ) -> Result<CompletionOutcome, LLMError> {
        if request.stream {
            self.complete_streaming(request, cancel, on_message).await
        } else {
            self.complete_once(request, cancel, on_message).await
        }
    }
}
