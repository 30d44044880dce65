use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::error::NodeError;

/// The visible state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Idle,
    Processing,
    Done,
    Errored,
    Aborted,
}

impl NodeState {
    /// `Done`, `Errored` and `Aborted` end one invocation.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Errored | NodeState::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// A single line in a node's visible log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// What the graph runtime offers a node besides its ports.
pub trait NodeHost: Send + Sync {
    fn log(&self, message: &str);
    fn error(&self, error: &NodeError);
    fn clear_logs(&self);
    fn set_state(&self, state: NodeState);

    /// Ask upstream nodes to (re-)produce their values.
    fn reach_back(&self);

    /// Show or clear (`None`) an error next to a settings field.
    fn set_field_error(&self, field: &str, error: Option<&str>);
}

/// Simple in-memory host that records everything a node tells it.
#[derive(Debug, Default)]
pub struct MemoryHost {
    entries: Mutex<Vec<LogEntry>>,
    states: Mutex<Vec<NodeState>>,
    field_errors: Mutex<HashMap<String, String>>,
    reach_backs: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Every state the node went through, oldest first.
    pub fn states(&self) -> Vec<NodeState> {
        self.states.lock().clone()
    }

    pub fn state(&self) -> Option<NodeState> {
        self.states.lock().last().copied()
    }

    pub fn field_error(&self, field: &str) -> Option<String> {
        self.field_errors.lock().get(field).cloned()
    }

    pub fn reach_backs(&self) -> usize {
        self.reach_backs.load(Ordering::SeqCst)
    }

    fn push(&self, level: LogLevel, message: String) {
        self.entries.lock().push(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }
}

impl NodeHost for MemoryHost {
    fn log(&self, message: &str) {
        self.push(LogLevel::Info, message.to_string());
    }

    fn error(&self, error: &NodeError) {
        self.push(LogLevel::Error, error.to_string());
    }

    fn clear_logs(&self) {
        self.entries.lock().clear();
    }

    fn set_state(&self, state: NodeState) {
        self.states.lock().push(state);
    }

    fn reach_back(&self) {
        self.reach_backs.fetch_add(1, Ordering::SeqCst);
    }

    fn set_field_error(&self, field: &str, error: Option<&str>) {
        let mut errors = self.field_errors.lock();
        match error {
            Some(message) => {
                errors.insert(field.to_string(), message.to_string());
            }
            None => {
                errors.remove(field);
            }
        }
    }
}
