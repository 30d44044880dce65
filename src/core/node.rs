use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::core::error::NodeError;
use crate::core::graph::PortSet;
use crate::core::{NodeValue, Settings};

/// A node as the graph runtime drives it.
///
/// The host writes an incoming value into one of the node's inputs and then
/// calls [`main`](GraphNode::main) with the name of the port that fired. A
/// user-requested stop arrives through [`halt`](GraphNode::halt), possibly
/// while `main` is still suspended on the network.
#[async_trait]
pub trait GraphNode: Send + Sync {
    fn inputs(&self) -> &PortSet;

    fn outputs(&self) -> &PortSet;

    /// Snapshot of the node's settings dictionary.
    fn settings(&self) -> Settings;

    /// Called by the host whenever an input receives data.
    ///
    /// # Arguments
    /// * `trigger` - Name of the input that fired
    /// * `value` - The value that arrived on it
    async fn main(&self, trigger: &str, value: NodeValue) -> Result<(), NodeError>;

    /// Cancel whatever the node is doing. The default does nothing.
    fn halt(&self) {}

    /// Write `value` into input `port` and run the node, the way the host
    /// delivers data.
    async fn deliver(&self, port: &str, value: NodeValue) -> Result<(), NodeError> {
        self.inputs().write(port, value.clone())?;
        self.main(port, value).await
    }
}

/// Lets a unit of work run at most once at a time.
#[derive(Debug, Default)]
pub struct ExecuteOnce {
    running: AtomicBool,
}

impl ExecuteOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a guard if nothing else is running, `None` otherwise.
    /// The slot frees itself when the guard drops.
    pub fn try_enter(&self) -> Option<OnceGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| OnceGuard {
                running: &self.running,
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct OnceGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for OnceGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_once_is_exclusive() {
        let once = ExecuteOnce::new();
        let guard = once.try_enter();
        assert!(guard.is_some());
        assert!(once.is_running());
        assert!(once.try_enter().is_none());

        drop(guard);
        assert!(!once.is_running());
        assert!(once.try_enter().is_some());
    }
}
