//! Transports carrying DPA frames between the host and the mesh.
//!
//! A transport moves whole frames. Outbound frames are written with
//! [`Transport::send`]; inbound frames are delivered asynchronously, from a
//! transport-owned thread, to every registered listener.

mod channel;
mod udp;

pub use channel::*;
pub use udp::*;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::TransportError;

// ============================================================================
// Transport Trait
// ============================================================================

/// Something delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete inbound frame.
    Frame(Vec<u8>),
    /// An asynchronous transport error.
    Error(String),
}

/// Callback receiving transport events.
pub type Listener = Box<dyn Fn(TransportEvent) + Send + Sync>;

/// Proof of a listener registration, consumed by
/// [`Transport::unregister_listener`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// A bidirectional frame transport.
pub trait Transport: Send {
    /// Open the underlying channel and begin delivering inbound frames.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Transmit one frame fully, or fail.
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Register a listener for inbound events.
    fn register_listener(&self, listener: Listener) -> ListenerHandle;

    /// Remove a listener. Returns false if it was not registered.
    fn unregister_listener(&self, handle: ListenerHandle) -> bool;

    /// Stop delivering events and release the underlying channel.
    fn stop(&mut self);
}

// ============================================================================
// Listener Registry
// ============================================================================

/// Shared listener list, cloned into transport reader threads.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    next_id: Arc<AtomicU64>,
    listeners: Arc<RwLock<Vec<(u64, Listener)>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener.
    pub fn register(&self, listener: Listener) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, listener));
        ListenerHandle(id)
    }

    /// Remove a listener.
    pub fn unregister(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle.0);
        listeners.len() != before
    }

    /// Drop every listener.
    #[cfg(test)]
    pub(crate) fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every listener.
    pub fn dispatch(&self, event: TransportEvent) {
        let listeners = self.listeners.read();
        if listeners.is_empty() {
            debug!("Dropping transport event, no listener registered");
            return;
        }
        for (_, listener) in listeners.iter() {
            listener(event.clone());
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

// ============================================================================
// Transport Registry
// ============================================================================

/// Registry key of a transport implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// In-process channel.
    Channel,
    /// Raw frames over UDP.
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Channel => write!(f, "channel"),
            TransportKind::Udp => write!(f, "udp"),
        }
    }
}

/// Constructor of a transport from its configuration.
pub type TransportFactory = fn(&TransportConfig) -> Result<Box<dyn Transport>, TransportError>;

/// Maps transport kinds to their constructors.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    factories: HashMap<TransportKind, TransportFactory>,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl TransportRegistry {
    /// Create a registry without any transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in transports.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TransportKind::Channel, create_loopback_transport);
        registry.register(TransportKind::Udp, create_udp_transport);
        registry
    }

    /// Register or replace the constructor for `kind`.
    pub fn register(&mut self, kind: TransportKind, factory: TransportFactory) {
        self.factories.insert(kind, factory);
    }

    /// True if a constructor is registered for `kind`.
    pub fn supports(&self, kind: TransportKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build the transport selected by `config`.
    pub fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>, TransportError> {
        let kind = config.kind();
        let factory = self
            .factories
            .get(&kind)
            .ok_or(TransportError::Unsupported(kind))?;
        debug!("Creating {} transport", kind);
        factory(config)
    }
}

fn create_loopback_transport(_config: &TransportConfig) -> Result<Box<dyn Transport>, TransportError> {
    let (transport, device) = channel_pair();
    spawn_loopback_device(device, LoopbackRoute::default())?;
    Ok(Box::new(transport))
}

fn create_udp_transport(config: &TransportConfig) -> Result<Box<dyn Transport>, TransportError> {
    match config {
        TransportConfig::Udp(udp) => Ok(Box::new(UdpTransport::new(udp.clone()))),
        other => Err(TransportError::Unsupported(other.kind())),
    }
}
