//! Ports and connections as the graph host exposes them to a node.
//!
//! The host owns the topology: it adds, renames and connects ports and writes
//! incoming values into inputs. Nodes only read values, open/close/clear their
//! inputs and call [`Connection::send`].

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::error::PortError;
use crate::core::{NodeValue, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// The receiving end of a connection: another node's input.
pub trait InputTarget: Send + Sync {
    /// Settings of the node that owns the input.
    fn settings(&self) -> Settings;

    /// Deliver a value to the input.
    fn receive(&self, value: NodeValue);
}

/// A directed edge from one of our outputs to another node's input.
#[derive(Clone)]
pub struct Connection {
    target: Arc<dyn InputTarget>,
}

impl Connection {
    pub fn new(target: Arc<dyn InputTarget>) -> Self {
        Self { target }
    }

    /// Connect to any concrete target without spelling out the coercion.
    pub fn to<T: InputTarget + 'static>(target: Arc<T>) -> Self {
        Self { target }
    }

    pub fn settings(&self) -> Settings {
        self.target.settings()
    }

    pub fn send(&self, value: NodeValue) {
        self.target.receive(value);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("settings", &self.target.settings())
            .finish()
    }
}

/// A named slot on a node.
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    direction: PortDirection,
    value: Option<NodeValue>,
    connections: Vec<Connection>,
    open: bool,
}

impl Port {
    pub fn input(name: impl Into<String>) -> Self {
        Self::with_direction(name, PortDirection::Input)
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self::with_direction(name, PortDirection::Output)
    }

    fn with_direction(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            value: None,
            connections: Vec::new(),
            open: true,
        }
    }

    /// Builder-style helper, mostly for wiring test graphs.
    pub fn with_value(mut self, value: NodeValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn value(&self) -> Option<&NodeValue> {
        self.value.as_ref()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }
}

/// The ordered ports of one side of a node.
///
/// Declaration order is preserved; it is the order the host shows the ports
/// in and the order conversations are assembled in.
#[derive(Debug)]
pub struct PortSet {
    direction: PortDirection,
    ports: RwLock<Vec<Port>>,
}

impl PortSet {
    pub fn new(direction: PortDirection) -> Self {
        Self {
            direction,
            ports: RwLock::new(Vec::new()),
        }
    }

    pub fn inputs<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let set = Self::new(PortDirection::Input);
        for name in names {
            set.add(Port::input(name));
        }
        set
    }

    pub fn outputs<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let set = Self::new(PortDirection::Output);
        for name in names {
            set.add(Port::output(name));
        }
        set
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn add(&self, mut port: Port) {
        if port.direction != self.direction {
            log::warn!(
                "Port '{}' added to a {:?} set, treating it as {:?}",
                port.name,
                self.direction,
                self.direction
            );
            port.direction = self.direction;
        }
        self.ports.write().push(port);
    }

    /// Rename the first port called `from`.
    pub fn rename(&self, from: &str, to: impl Into<String>) -> Result<(), PortError> {
        let mut ports = self.ports.write();
        let port = ports
            .iter_mut()
            .find(|p| p.name == from)
            .ok_or_else(|| PortError::NotFound(from.to_string()))?;
        port.name = to.into();
        Ok(())
    }

    /// Attach a connection to every port called `name`.
    pub fn connect(&self, name: &str, connection: Connection) -> Result<(), PortError> {
        let mut ports = self.ports.write();
        let mut found = false;
        for port in ports.iter_mut().filter(|p| p.name == name) {
            port.connections.push(connection.clone());
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(PortError::NotFound(name.to_string()))
        }
    }

    /// Store a value on an input. Closed ports refuse the write.
    pub fn write(&self, name: &str, value: NodeValue) -> Result<(), PortError> {
        let mut ports = self.ports.write();
        let port = ports
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PortError::NotFound(name.to_string()))?;
        if !port.open {
            return Err(PortError::Closed(name.to_string()));
        }
        port.value = Some(value);
        Ok(())
    }

    pub fn open(&self) {
        self.ports.write().iter_mut().for_each(|p| p.open = true);
    }

    pub fn close(&self) {
        self.ports.write().iter_mut().for_each(|p| p.open = false);
    }

    /// Drop every buffered value.
    pub fn clear(&self) {
        self.ports.write().iter_mut().for_each(|p| p.value = None);
    }

    /// True when every port holds a value.
    pub fn all_ready(&self) -> bool {
        self.ports.read().iter().all(Port::has_data)
    }

    pub fn all_open(&self) -> bool {
        self.ports.read().iter().all(Port::is_open)
    }

    pub fn get(&self, name: &str) -> Option<Port> {
        self.ports.read().iter().find(|p| p.name == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.ports.read().iter().map(|p| p.name.clone()).collect()
    }

    /// A point-in-time copy of the ports, safe to hold across awaits.
    pub fn snapshot(&self) -> Vec<Port> {
        self.ports.read().clone()
    }

    pub fn len(&self) -> usize {
        self.ports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.read().is_empty()
    }
}

/// A leaf input that keeps everything it receives.
///
/// Handy as the far end of a `reply` output, or as a stand-in parameter node
/// when all that matters is the declared settings.
#[derive(Debug, Default)]
pub struct CollectingTarget {
    settings: Settings,
    received: Mutex<Vec<NodeValue>>,
}

impl CollectingTarget {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<NodeValue> {
        self.received.lock().clone()
    }
}

impl InputTarget for CollectingTarget {
    fn settings(&self) -> Settings {
        self.settings.clone()
    }

    fn receive(&self, value: NodeValue) {
        self.received.lock().push(value);
    }
}
