//! Queue of inbound transport events awaiting the caller thread.

use std::time::Instant;

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError};

use crate::transport::{Listener, TransportEvent};

/// Result of waiting on the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Wait {
    /// An event arrived.
    Ready(TransportEvent),
    /// The deadline passed.
    TimedOut,
    /// The feeding listener was dropped.
    Cancelled,
}

/// Receiving end of the events delivered to the engine's listener.
pub(crate) struct Inbox {
    events: Receiver<TransportEvent>,
}

impl Inbox {
    /// Create an inbox and the listener that feeds it.
    pub(crate) fn new() -> (Inbox, Listener) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener: Listener = Box::new(move |event| {
            // The inbox is gone once the engine shuts down.
            let _ = tx.send(event);
        });
        (Inbox { events: rx }, listener)
    }

    /// Discard queued events. Returns how many were dropped.
    pub(crate) fn drain(&self) -> usize {
        self.events.try_iter().count()
    }

    /// Wait for the next event, until `deadline` or indefinitely.
    pub(crate) fn wait_until(&self, deadline: Option<Instant>) -> Wait {
        match deadline {
            Some(deadline) => match self.events.recv_deadline(deadline) {
                Ok(event) => Wait::Ready(event),
                Err(RecvTimeoutError::Timeout) => Wait::TimedOut,
                Err(RecvTimeoutError::Disconnected) => Wait::Cancelled,
            },
            None => match self.events.recv() {
                Ok(event) => Wait::Ready(event),
                Err(RecvError) => Wait::Cancelled,
            },
        }
    }
}
