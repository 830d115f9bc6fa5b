//! Raw-frame UDP transport.
//!
//! Each datagram carries exactly one DPA frame. Datagrams from addresses other
//! than the configured remote are dropped. Datagrams longer than
//! `max_packet_size` are reported as errors, never delivered truncated.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use super::{Listener, ListenerHandle, ListenerRegistry, Transport, TransportEvent};
use crate::config::UdpConfig;
use crate::error::TransportError;

/// A bound socket and its reader thread.
struct Running {
    socket: Arc<UdpSocket>,
    stop: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

/// Transport sending raw frames to a UDP gateway.
pub struct UdpTransport {
    config: UdpConfig,
    listeners: ListenerRegistry,
    running: Option<Running>,
}

impl UdpTransport {
    /// Create an unstarted transport.
    pub fn new(config: UdpConfig) -> Self {
        UdpTransport {
            config,
            listeners: ListenerRegistry::new(),
            running: None,
        }
    }

    /// Address the socket is bound to, once started.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.running
            .as_ref()
            .and_then(|running| running.socket.local_addr().ok())
    }
}

fn read_loop(
    socket: Arc<UdpSocket>,
    stop: Arc<AtomicBool>,
    listeners: ListenerRegistry,
    config: UdpConfig,
) {
    // One spare byte reveals datagrams the socket would otherwise truncate.
    let mut buffer = vec![0u8; config.max_packet_size + 1];

    while !stop.load(Ordering::Acquire) {
        match socket.recv_from(&mut buffer) {
            Ok((len, from)) => {
                if from != config.remote {
                    debug!("Dropping {} byte datagram from unexpected peer {}", len, from);
                    continue;
                }
                if len > config.max_packet_size {
                    warn!(
                        "Dropping datagram from {} larger than {} bytes",
                        from, config.max_packet_size
                    );
                    listeners.dispatch(TransportEvent::Error(format!(
                        "datagram exceeds {} bytes",
                        config.max_packet_size
                    )));
                    continue;
                }
                trace!("udp rx {}", hex::encode(&buffer[..len]));
                listeners.dispatch(TransportEvent::Frame(buffer[..len].to_vec()));
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                error!("UDP receive failed: {}", e);
                listeners.dispatch(TransportEvent::Error(e.to_string()));
            }
        }
    }

    debug!("UDP reader stopped");
}

impl Transport for UdpTransport {
    fn start(&mut self) -> Result<(), TransportError> {
        if self.running.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let socket = UdpSocket::bind(self.config.local)?;
        socket.set_read_timeout(Some(Duration::from_millis(self.config.recv_timeout_ms)))?;
        let socket = Arc::new(socket);
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let socket = socket.clone();
            let stop = stop.clone();
            let listeners = self.listeners.clone();
            let config = self.config.clone();
            thread::Builder::new()
                .name("dpa-udp-rx".to_string())
                .spawn(move || read_loop(socket, stop, listeners, config))?
        };

        info!(
            "UDP transport bound to {}, gateway {}",
            self.config.local, self.config.remote
        );
        self.running = Some(Running {
            socket,
            stop,
            reader,
        });
        Ok(())
    }

    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let running = self.running.as_ref().ok_or(TransportError::NotStarted)?;

        if frame.len() > self.config.max_packet_size {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max: self.config.max_packet_size,
            });
        }

        trace!("udp tx {}", hex::encode(frame));
        let written = running.socket.send_to(frame, self.config.remote)?;
        if written != frame.len() {
            return Err(TransportError::ShortWrite {
                written,
                size: frame.len(),
            });
        }
        Ok(())
    }

    fn register_listener(&self, listener: Listener) -> ListenerHandle {
        self.listeners.register(listener)
    }

    fn unregister_listener(&self, handle: ListenerHandle) -> bool {
        self.listeners.unregister(handle)
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop.store(true, Ordering::Release);
            if running.reader.join().is_err() {
                warn!("UDP reader thread panicked");
            }
            info!("UDP transport stopped");
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config(remote: std::net::SocketAddr) -> UdpConfig {
        UdpConfig {
            local: "127.0.0.1:0".parse().unwrap(),
            remote,
            recv_timeout_ms: 20,
            max_packet_size: 128,
        }
    }

    #[test]
    fn test_send_requires_start() {
        let gateway = UdpSocket::bind("127.0.0.1:0").unwrap();
        let transport = UdpTransport::new(loopback_config(gateway.local_addr().unwrap()));
        assert!(matches!(transport.send(&[0x00]), Err(TransportError::NotStarted)));
    }

    #[test]
    fn test_udp_round_trip() {
        let gateway = UdpSocket::bind("127.0.0.1:0").unwrap();
        gateway.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let mut transport = UdpTransport::new(loopback_config(gateway.local_addr().unwrap()));
        let (tx, rx) = crossbeam_channel::unbounded();
        transport.register_listener(Box::new(move |event| {
            let _ = tx.send(event);
        }));
        transport.start().unwrap();
        let host = transport.local_addr().unwrap();

        transport.send(&[0x00, 0x00, 0x06, 0x03, 0xFF, 0xFF]).unwrap();
        let mut buffer = [0u8; 64];
        let (len, from) = gateway.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[0x00, 0x00, 0x06, 0x03, 0xFF, 0xFF]);
        assert_eq!(from, host);

        gateway.send_to(&[0x00, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x00, 0x00], host).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            TransportEvent::Frame(vec![0x00, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x00, 0x00])
        );

        transport.stop();
    }

    #[test]
    fn test_oversized_datagram_is_reported() {
        let gateway = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut transport = UdpTransport::new(loopback_config(gateway.local_addr().unwrap()));
        let (tx, rx) = crossbeam_channel::unbounded();
        transport.register_listener(Box::new(move |event| {
            let _ = tx.send(event);
        }));
        transport.start().unwrap();
        let host = transport.local_addr().unwrap();

        let mut oversized = vec![0x00, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x00, 0x00];
        oversized.resize(200, 0xAA);
        gateway.send_to(&oversized, host).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            TransportEvent::Error("datagram exceeds 128 bytes".to_string())
        );

        let exact = vec![0x00; 128];
        gateway.send_to(&exact, host).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            TransportEvent::Frame(exact)
        );

        transport.stop();
    }

    #[test]
    fn test_frame_too_large() {
        let gateway = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut transport = UdpTransport::new(loopback_config(gateway.local_addr().unwrap()));
        transport.start().unwrap();

        assert!(matches!(
            transport.send(&[0u8; 129]),
            Err(TransportError::FrameTooLarge { size: 129, max: 128 })
        ));
    }
}
