//! The request engine.
//!
//! One request is in flight at a time. A request to the locally attached device
//! is answered directly; a request to a remote node is first confirmed by the
//! coordinator, which reports the routing parameters that bound the response.
//!
//! ```text
//!  Idle ──send──▶ Sent ──remote──▶ AwaitingConfirmation ──▶ AwaitingResponse ──▶ Resolved
//!                   └────local──────────────────────────────────▲
//! ```
//!
//! After a routed exchange the mesh is still busy delivering the response to
//! the coordinator's neighbours, so the next [`RequestEngine::send`] first
//! waits until routing has finished.

use std::thread;
use std::time::{Duration, Instant};

use dpa_metrics::{metric_defs, ExchangeLabels};
use dpa_protocol::{parse_confirmation, parse_response, Confirmation, MessageKind, Request};
use dpa_timing::TimingModel;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::TransportError;
use crate::inbox::{Inbox, Wait};
use crate::outcome::{ProcessingFailure, ProcessingOutcome};
use crate::transport::{ListenerHandle, Transport, TransportEvent, TransportRegistry};

/// Message the engine waits for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Confirmation,
    Response,
}

/// Inbox and listener registration of a started engine.
struct Session {
    inbox: Inbox,
    listener: ListenerHandle,
}

/// The last exchange, kept until the next `send` to time routing.
#[derive(Debug)]
struct PendingExchange {
    confirmation: Option<(Confirmation, Instant)>,
    outcome: ProcessingOutcome,
}

/// Drives request, confirmation and response exchanges over a [`Transport`].
pub struct RequestEngine {
    transport: Box<dyn Transport>,
    timing: TimingModel,
    default_timeout: Option<Duration>,
    session: Option<Session>,
    pending: Option<PendingExchange>,
}

impl RequestEngine {
    /// Create an engine over `transport`. Long-lasting operations wait without
    /// limit until [`RequestEngine::set_default_timeout`] is called.
    pub fn new(transport: Box<dyn Transport>, timing: TimingModel) -> Self {
        RequestEngine {
            transport,
            timing,
            default_timeout: None,
            session: None,
            pending: None,
        }
    }

    /// Create an engine with the transport and timing described by `config`.
    pub fn from_config(
        config: &EngineConfig,
        registry: &TransportRegistry,
    ) -> Result<Self, TransportError> {
        let transport = registry.create(&config.transport)?;
        let mut engine = Self::new(transport, config.timing_model());
        engine.set_default_timeout(config.response_timeout());
        Ok(engine)
    }

    /// Start the transport and begin collecting inbound frames.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.session.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let (inbox, listener) = Inbox::new();
        let listener = self.transport.register_listener(listener);
        if let Err(e) = self.transport.start() {
            self.transport.unregister_listener(listener);
            return Err(e);
        }

        self.session = Some(Session { inbox, listener });
        info!("Request engine started");
        Ok(())
    }

    /// Stop the transport. Later sends fail until the engine is started again.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            self.transport.unregister_listener(session.listener);
            self.transport.stop();
            self.pending = None;
            info!("Request engine stopped");
        }
    }

    /// True between [`RequestEngine::start`] and [`RequestEngine::shutdown`].
    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Set the response timeout for long-lasting operations. `None` waits
    /// without limit.
    pub fn set_default_timeout(&mut self, timeout: Option<Duration>) {
        self.default_timeout = timeout;
    }

    /// Response timeout for long-lasting operations.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// The timing model, with the facts learned so far.
    pub fn timing(&self) -> &TimingModel {
        &self.timing
    }

    /// Send a request using the default timeout.
    pub fn send(&mut self, request: &Request) -> ProcessingOutcome {
        self.send_with_timeout(request, self.default_timeout)
    }

    /// Send a request. `timeout` applies only to long-lasting operations; other
    /// requests are bounded by the timing model. `None` waits without limit.
    pub fn send_with_timeout(
        &mut self,
        request: &Request,
        timeout: Option<Duration>,
    ) -> ProcessingOutcome {
        self.finish_routing();

        let labels = ExchangeLabels::new(request.peripheral, request.is_local_device());
        debug!(
            "Sending request: nadr=0x{:04x} pnum=0x{:02x} pcmd=0x{:02x} hwpid=0x{:04x} data={}",
            request.address,
            request.peripheral,
            request.command,
            request.hw_profile_id,
            hex::encode(&request.payload)
        );

        let started = Instant::now();
        let (outcome, confirmation) = self.exchange(request, timeout, &labels);

        match &outcome {
            ProcessingOutcome::Success(response) => {
                metrics::counter!(metric_defs::RESPONSES_RECEIVED.name, &labels.to_labels())
                    .increment(1);
                metrics::histogram!(metric_defs::EXCHANGE_LATENCY.name, &labels.to_labels())
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                debug!(
                    "Exchange completed in {:?} with {}",
                    started.elapsed(),
                    response.response_code
                );
            }
            ProcessingOutcome::Failure(failure) => {
                let labels = labels.with(&[("kind", failure.kind.as_str().to_string())]);
                metrics::counter!(metric_defs::EXCHANGE_FAILURES.name, &labels).increment(1);
                warn!(
                    "Request to nadr 0x{:04x} pnum 0x{:02x} failed: {}",
                    request.address, request.peripheral, failure
                );
            }
        }

        self.pending = Some(PendingExchange {
            confirmation,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Sleep until the mesh has routed the previous response, if it was routed.
    fn finish_routing(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if let (Some((confirmation, received)), ProcessingOutcome::Success(response)) =
            (&pending.confirmation, &pending.outcome)
        {
            let wait = self
                .timing
                .wait_to_finish_routing(confirmation, response.payload.len(), *received);
            metrics::histogram!(metric_defs::ROUTING_WAIT.name).record(wait.as_secs_f64() * 1000.0);
            if !wait.is_zero() {
                debug!("Waiting {:?} for the mesh to finish routing", wait);
                thread::sleep(wait);
            }
        }
    }

    /// Run one exchange. Returns the outcome and the confirmation, if one arrived.
    fn exchange(
        &mut self,
        request: &Request,
        timeout: Option<Duration>,
        labels: &ExchangeLabels,
    ) -> (ProcessingOutcome, Option<(Confirmation, Instant)>) {
        let Some(session) = self.session.as_ref() else {
            return (ProcessingFailure::engine("engine not started").into(), None);
        };

        let stale = session.inbox.drain();
        if stale > 0 {
            debug!("Discarded {} stale inbound events", stale);
        }

        let frame = request.encode();
        trace!("tx {}", hex::encode(&frame));
        if let Err(e) = self.transport.send(&frame) {
            let failure = ProcessingFailure::dispatch("failed to send request").with_cause(e);
            return (failure.into(), None);
        }
        metrics::counter!(metric_defs::REQUESTS_SENT.name, &labels.to_labels()).increment(1);

        let params = self.timing.timing_params(request);
        let sent = Instant::now();
        let long_lasting = request.is_long_lasting();

        let (mut awaiting, mut deadline) = if request.is_local_device() {
            let deadline = if long_lasting {
                deadline_after(sent, timeout)
            } else {
                let window = self.timing.wait_for_response(request, None, params.as_ref());
                metrics::histogram!(metric_defs::RESPONSE_DEADLINE.name, &labels.to_labels())
                    .record(window.as_secs_f64() * 1000.0);
                Some(sent + window)
            };
            (Awaiting::Response, deadline)
        } else {
            let window = self.timing.wait_for_confirmation(request);
            (Awaiting::Confirmation, Some(sent + window))
        };
        let mut confirmation: Option<(Confirmation, Instant)> = None;

        loop {
            let frame = match session.inbox.wait_until(deadline) {
                Wait::Ready(TransportEvent::Frame(frame)) => frame,
                Wait::Ready(TransportEvent::Error(message)) => {
                    let failure =
                        ProcessingFailure::transport(format!("transport error: {}", message));
                    return (failure.into(), confirmation);
                }
                Wait::TimedOut => {
                    let stage = match awaiting {
                        Awaiting::Confirmation => "confirmation",
                        Awaiting::Response => "response",
                    };
                    warn!("Timed out waiting for {}", stage);
                    return (ProcessingFailure::receive("timed out").into(), confirmation);
                }
                Wait::Cancelled => {
                    return (ProcessingFailure::receive("interrupted").into(), confirmation);
                }
            };

            let received = Instant::now();
            trace!("rx {}", hex::encode(&frame));

            let kind = match MessageKind::of(&frame) {
                Ok(kind) => kind,
                Err(e) => {
                    metrics::counter!(metric_defs::MALFORMED_FRAMES.name).increment(1);
                    let failure = ProcessingFailure::receive("malformed frame").with_cause(e);
                    return (failure.into(), confirmation);
                }
            };

            match (awaiting, kind) {
                (Awaiting::Confirmation, MessageKind::Confirmation) => {
                    let confirmed = match parse_confirmation(&frame) {
                        Ok(confirmed) => confirmed,
                        Err(e) => {
                            metrics::counter!(metric_defs::MALFORMED_FRAMES.name).increment(1);
                            let failure =
                                ProcessingFailure::receive("malformed confirmation").with_cause(e);
                            return (failure.into(), confirmation);
                        }
                    };
                    info!(
                        "Confirmation from nadr 0x{:04x}: hops={} timeslot={} hops_response={}",
                        confirmed.address,
                        confirmed.hops,
                        confirmed.timeslot_length,
                        confirmed.hops_response
                    );
                    metrics::counter!(
                        metric_defs::CONFIRMATIONS_RECEIVED.name,
                        &labels.to_labels()
                    )
                    .increment(1);

                    deadline = if long_lasting {
                        deadline_after(received, timeout)
                    } else {
                        let window =
                            self.timing
                                .wait_for_response(request, Some(&confirmed), params.as_ref());
                        metrics::histogram!(
                            metric_defs::RESPONSE_DEADLINE.name,
                            &labels.to_labels()
                        )
                        .record(window.as_secs_f64() * 1000.0);
                        Some(received + window)
                    };
                    awaiting = Awaiting::Response;
                    confirmation = Some((confirmed, received));
                }
                (Awaiting::Response, MessageKind::Response) => {
                    let response = match parse_response(&frame) {
                        Ok(response) => response,
                        Err(e) => {
                            metrics::counter!(metric_defs::MALFORMED_FRAMES.name).increment(1);
                            let failure =
                                ProcessingFailure::receive("malformed response").with_cause(e);
                            return (failure.into(), confirmation);
                        }
                    };
                    info!(
                        "Response from nadr 0x{:04x}: {} dpa_value=0x{:02x} data={}",
                        response.address,
                        response.response_code,
                        response.dpa_value,
                        hex::encode(&response.payload)
                    );

                    if self.timing.observe(request, &response) {
                        if let Some(bonded) = self.timing.bonded_nodes() {
                            metrics::gauge!(metric_defs::BONDED_NODES.name).set(bonded as f64);
                        }
                    }
                    return (ProcessingOutcome::Success(response), confirmation);
                }
                (Awaiting::Confirmation, MessageKind::Response) => {
                    let failure = ProcessingFailure::transport(
                        "response received while waiting for confirmation",
                    );
                    return (failure.into(), confirmation);
                }
                (Awaiting::Response, MessageKind::Confirmation) => {
                    let failure = ProcessingFailure::transport("unexpected confirmation");
                    return (failure.into(), confirmation);
                }
            }
        }
    }
}

/// Deadline `timeout` after `start`. `None` waits without limit, as does a
/// timeout too large to represent.
fn deadline_after(start: Instant, timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|timeout| start.checked_add(timeout))
}

impl Drop for RequestEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
