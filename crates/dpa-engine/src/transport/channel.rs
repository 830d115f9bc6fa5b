//! In-process transport backed by crossbeam channels.
//!
//! [`channel_pair`] returns the host side, a [`ChannelTransport`], and the
//! device side, a [`DeviceEndpoint`]. Tests script the device side directly;
//! [`spawn_loopback_device`] answers every request on its own.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use dpa_protocol::{Confirmation, Request, Response, ResponseCode};
use tracing::{debug, trace, warn};

use super::{Listener, ListenerHandle, ListenerRegistry, Transport, TransportEvent};
use crate::error::TransportError;

/// Create a connected host/device pair.
pub fn channel_pair() -> (ChannelTransport, DeviceEndpoint) {
    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (event_tx, event_rx) = crossbeam_channel::unbounded();

    let transport = ChannelTransport {
        to_device: request_tx,
        from_device: event_rx,
        listeners: ListenerRegistry::new(),
        worker: None,
    };
    let device = DeviceEndpoint {
        requests: request_rx,
        events: event_tx,
    };
    (transport, device)
}

/// Host side of an in-process channel.
pub struct ChannelTransport {
    to_device: Sender<Vec<u8>>,
    from_device: Receiver<TransportEvent>,
    listeners: ListenerRegistry,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl Transport for ChannelTransport {
    fn start(&mut self) -> Result<(), TransportError> {
        if self.worker.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let from_device = self.from_device.clone();
        let listeners = self.listeners.clone();

        let thread = thread::Builder::new()
            .name("dpa-channel-rx".to_string())
            .spawn(move || loop {
                select! {
                    recv(from_device) -> event => match event {
                        Ok(event) => listeners.dispatch(event),
                        Err(_) => {
                            debug!("Device side of channel closed");
                            listeners.dispatch(TransportEvent::Error("device disconnected".to_string()));
                            break;
                        }
                    },
                    recv(shutdown_rx) -> _ => break,
                }
            })?;

        self.worker = Some((shutdown_tx, thread));
        Ok(())
    }

    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.worker.is_none() {
            return Err(TransportError::NotStarted);
        }
        trace!("channel tx {}", hex::encode(frame));
        self.to_device
            .send(frame.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    fn register_listener(&self, listener: Listener) -> ListenerHandle {
        self.listeners.register(listener)
    }

    fn unregister_listener(&self, handle: ListenerHandle) -> bool {
        self.listeners.unregister(handle)
    }

    fn stop(&mut self) {
        if let Some((shutdown_tx, thread)) = self.worker.take() {
            drop(shutdown_tx);
            if thread.join().is_err() {
                warn!("Channel reader thread panicked");
            }
        }
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Device side of an in-process channel.
pub struct DeviceEndpoint {
    requests: Receiver<Vec<u8>>,
    events: Sender<TransportEvent>,
}

impl DeviceEndpoint {
    /// Block until the host sends a frame. Returns `None` once the host is gone.
    pub fn recv_request(&self) -> Option<Vec<u8>> {
        self.requests.recv().ok()
    }

    /// Wait up to `timeout` for a frame from the host.
    pub fn recv_request_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        match self.requests.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Deliver a frame to the host. Returns false once the host is gone.
    pub fn send_frame(&self, frame: Vec<u8>) -> bool {
        self.events.send(TransportEvent::Frame(frame)).is_ok()
    }

    /// Report an asynchronous transport error to the host.
    pub fn report_error(&self, message: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Error(message.into())).is_ok()
    }
}

/// Routing parameters reported by the loopback device in its confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackRoute {
    /// Request hops.
    pub hops: u8,
    /// Timeslot length in 10 ms units.
    pub timeslot_length: u8,
    /// Response hops.
    pub hops_response: u8,
}

impl Default for LoopbackRoute {
    fn default() -> Self {
        LoopbackRoute {
            hops: 1,
            timeslot_length: 3,
            hops_response: 1,
        }
    }
}

/// Answer every request arriving at `device` with a successful, empty
/// response, preceded by a confirmation for remote addresses.
///
/// The thread exits when the host side is dropped.
pub fn spawn_loopback_device(
    device: DeviceEndpoint,
    route: LoopbackRoute,
) -> Result<JoinHandle<()>, TransportError> {
    let thread = thread::Builder::new()
        .name("dpa-loopback".to_string())
        .spawn(move || {
            while let Some(frame) = device.recv_request() {
                let request = match Request::decode(&frame) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("Loopback device rejected frame: {}", e);
                        device.report_error(e.to_string());
                        continue;
                    }
                };

                if !request.is_local_device() {
                    let confirmation = Confirmation {
                        address: request.address,
                        peripheral: request.peripheral,
                        command: request.command,
                        hw_profile_id: request.hw_profile_id,
                        dpa_value: 0,
                        hops: route.hops,
                        timeslot_length: route.timeslot_length,
                        hops_response: route.hops_response,
                    };
                    device.send_frame(confirmation.encode());
                }

                let response = Response::for_request(&request, ResponseCode::NoError, 0, Vec::new());
                if !device.send_frame(response.encode()) {
                    break;
                }
            }
        })?;

    Ok(thread)
}
