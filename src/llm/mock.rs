//! A transport that plays back a fixed script.
//!
//! Used by the test suite and the demos to drive a node without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::llm::{ChatMessage, ChatTransport, CompletionOutcome, CompletionRequest, LLMError, MessageSink};

/// How a scripted completion ends after its chunks are played.
#[derive(Debug, Clone)]
pub enum ScriptEnd {
    Finish(Vec<ChatMessage>),
    Fail(String),
    /// Wait until the request is cancelled.
    Hang,
}

#[derive(Debug)]
pub struct ScriptedTransport {
    chunks: Vec<ChatMessage>,
    end: ScriptEnd,
    requests: Mutex<Vec<CompletionRequest>>,
    last_token: Mutex<Option<CancellationToken>>,
}

impl ScriptedTransport {
    pub fn new(end: ScriptEnd) -> Self {
        Self {
            chunks: Vec::new(),
            end,
            requests: Mutex::new(Vec::new()),
            last_token: Mutex::new(None),
        }
    }

    pub fn finishing(messages: Vec<ChatMessage>) -> Self {
        Self::new(ScriptEnd::Finish(messages))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(ScriptEnd::Fail(message.into()))
    }

    pub fn hanging() -> Self {
        Self::new(ScriptEnd::Hang)
    }

    /// Messages streamed before the script ends.
    pub fn with_chunks(mut self, chunks: Vec<ChatMessage>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Every request this transport has been asked to run.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// The cancellation token of the most recent request.
    pub fn last_token(&self) -> Option<CancellationToken> {
        self.last_token.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_message: MessageSink<'_>,
    ) -> Result<CompletionOutcome, LLMError> {
        self.requests.lock().push(request);
        *self.last_token.lock() = Some(cancel.clone());

        for chunk in &self.chunks {
            if cancel.is_cancelled() {
                return Ok(CompletionOutcome::Aborted);
            }
            on_message(chunk.clone());
            tokio::task::yield_now().await;
        }

        match &self.end {
            ScriptEnd::Finish(messages) => Ok(CompletionOutcome::Finished(messages.clone())),
            ScriptEnd::Fail(message) => Err(LLMError::StreamError(message.clone())),
            ScriptEnd::Hang => {
                cancel.cancelled().await;
                Ok(CompletionOutcome::Aborted)
            }
        }
    }
}
