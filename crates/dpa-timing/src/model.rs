//! Wait windows for each stage of an exchange.

use std::time::{Duration, Instant};

use dpa_protocol::*;
use tracing::trace;

use crate::facts::{FactsStore, FrcTimingParams, InitialSettings, TimingFacts};
use crate::mode::{HwRevision, RfMode};

// ============================================================================
// Constants
// ============================================================================

/// Processing delay of the host-side stack, added to every response deadline.
pub const LIBRARY_DELAY: Duration = Duration::from_millis(2000);

/// Default time to wait for a confirmation.
pub const DEFAULT_CONFIRMATION_WAIT: Duration = LIBRARY_DELAY;

/// Margin added to routed response deadlines.
pub const SAFETY_TIMEOUT_MS: u64 = 40;

/// FRC requests carrying at most this many bytes after the FRC command run in
/// standard (2-bit) mode.
const STANDARD_FRC_MAX_DATA_LENGTH: usize = 2;

/// Length of a response timeslot, in milliseconds, for a response carrying
/// `payload_len` bytes.
pub fn timeslot_length_ms(payload_len: usize, rf_mode: RfMode, hw_revision: HwRevision) -> u64 {
    match (hw_revision, rf_mode) {
        (HwRevision::Dctr5xD, RfMode::Std) => match payload_len {
            0..=11 => 30,
            12..=32 => 40,
            33..=53 => 50,
            _ => 60,
        },
        (HwRevision::Dctr5xD, RfMode::Lp) => match payload_len {
            0..=13 => 80,
            14..=35 => 90,
            _ => 100,
        },
        (HwRevision::Dctr7xD, RfMode::Std) => match payload_len {
            0..=18 => 30,
            19..=41 => 40,
            _ => 50,
        },
        (HwRevision::Dctr7xD, RfMode::Lp) => match payload_len {
            0..=8 => 80,
            9..=31 => 90,
            _ => 100,
        },
    }
}

/// Response slot length used for the response deadline, derived from the
/// request timeslot reported in a confirmation.
fn response_slot_ms(timeslot_length: u8) -> u64 {
    if timeslot_length == 20 {
        200
    } else if timeslot_length > 6 {
        100
    } else {
        50
    }
}

// ============================================================================
// Timing Model
// ============================================================================

/// Computes wait windows and learns the facts they depend on.
#[derive(Debug, Clone)]
pub struct TimingModel {
    rf_mode: RfMode,
    hw_revision: HwRevision,
    confirmation_wait: Duration,
    store: FactsStore,
}

impl Default for TimingModel {
    fn default() -> Self {
        Self::new(RfMode::default(), HwRevision::default(), DEFAULT_CONFIRMATION_WAIT)
    }
}

impl TimingModel {
    /// Create a model with no known facts.
    pub fn new(rf_mode: RfMode, hw_revision: HwRevision, confirmation_wait: Duration) -> Self {
        Self::with_initial_settings(rf_mode, hw_revision, confirmation_wait, InitialSettings::default())
    }

    /// Create a model seeded with facts known up front.
    pub fn with_initial_settings(
        rf_mode: RfMode,
        hw_revision: HwRevision,
        confirmation_wait: Duration,
        initial: InitialSettings,
    ) -> Self {
        TimingModel {
            rf_mode,
            hw_revision,
            confirmation_wait,
            store: FactsStore::new(rf_mode, initial),
        }
    }

    /// Configured RF mode.
    pub fn rf_mode(&self) -> RfMode {
        self.rf_mode
    }

    /// Configured transceiver revision.
    pub fn hw_revision(&self) -> HwRevision {
        self.hw_revision
    }

    /// Time to wait for the confirmation of a remote request.
    pub fn wait_for_confirmation(&self, _request: &Request) -> Duration {
        self.confirmation_wait
    }

    /// Time to wait for the response, counted from dispatch for local requests
    /// and from the confirmation otherwise.
    pub fn wait_for_response(
        &self,
        request: &Request,
        confirmation: Option<&Confirmation>,
        params: Option<&FrcTimingParams>,
    ) -> Duration {
        let extra = self.extra_millis(request, params);

        let Some(confirmation) = confirmation else {
            return LIBRARY_DELAY + Duration::from_millis(extra);
        };

        let request_routing =
            (confirmation.hops as u64 + 1) * confirmation.timeslot_length as u64 * 10;
        let response_routing = (confirmation.hops_response as u64 + 1)
            * response_slot_ms(confirmation.timeslot_length);

        let millis = request_routing + response_routing + SAFETY_TIMEOUT_MS + extra;
        trace!(
            "Response window: request {} ms, response {} ms, extra {} ms",
            request_routing,
            response_routing,
            extra
        );
        LIBRARY_DELAY + Duration::from_millis(millis)
    }

    /// Time still needed for the mesh to finish routing a response received
    /// after `confirmation`.
    pub fn wait_to_finish_routing(
        &self,
        confirmation: &Confirmation,
        response_payload_len: usize,
        confirmation_received: Instant,
    ) -> Duration {
        self.wait_to_finish_routing_at(
            confirmation,
            response_payload_len,
            confirmation_received,
            Instant::now(),
        )
    }

    /// [`TimingModel::wait_to_finish_routing`] evaluated at `now`.
    pub fn wait_to_finish_routing_at(
        &self,
        confirmation: &Confirmation,
        response_payload_len: usize,
        confirmation_received: Instant,
        now: Instant,
    ) -> Duration {
        let slot = timeslot_length_ms(response_payload_len, self.rf_mode, self.hw_revision);
        let millis = (confirmation.hops as u64 + 1) * confirmation.timeslot_length as u64 * 10
            + (confirmation.hops_response as u64 + 1) * slot * 10;

        let routed = confirmation_received + Duration::from_millis(millis);
        routed.saturating_duration_since(now)
    }

    /// Learn from a response. Only successful responses are considered.
    /// Returns true if a fact changed.
    pub fn observe(&mut self, request: &Request, response: &Response) -> bool {
        if !response.response_code.is_ok() {
            return false;
        }
        self.store.observe(request, response)
    }

    /// Facts known for a peripheral.
    pub fn facts(&self, peripheral: u8) -> Option<&TimingFacts> {
        self.store.get(peripheral)
    }

    /// Bonded node count, if known.
    pub fn bonded_nodes(&self) -> Option<u16> {
        self.store.bonded_nodes()
    }

    /// Timing params needed to time `request`, if any.
    pub fn timing_params(&mut self, request: &Request) -> Option<FrcTimingParams> {
        if request.peripheral == PNUM_FRC {
            Some(self.store.frc_params())
        } else {
            None
        }
    }

    fn extra_millis(&self, request: &Request, params: Option<&FrcTimingParams>) -> u64 {
        match request.peripheral {
            PNUM_FRC => self.frc_extra_millis(request, params),
            PNUM_UART => uart_extra_millis(request),
            _ => 0,
        }
    }

    fn frc_extra_millis(&self, request: &Request, params: Option<&FrcTimingParams>) -> u64 {
        match request.command {
            CMD_FRC_SEND | CMD_FRC_SEND_SELECTIVE => {}
            _ => return 0,
        }

        let params = params.copied().unwrap_or(FrcTimingParams {
            bonded_nodes: 0,
            rf_mode: self.rf_mode,
            response_time: Default::default(),
        });
        let bonded = params.bonded_nodes as u64;
        let response_time = params.response_time.as_millis();

        // The first data byte is the FRC command itself.
        let user_data = request.payload.len().saturating_sub(1);
        if user_data <= STANDARD_FRC_MAX_DATA_LENGTH {
            return bonded * 130 + response_time + 250;
        }

        match params.rf_mode {
            RfMode::Std => bonded * 150 + response_time + 290,
            RfMode::Lp => bonded * 200 + response_time + 390,
        }
    }
}

fn uart_extra_millis(request: &Request) -> u64 {
    if request.command != CMD_UART_WRITE_READ {
        return 0;
    }
    match request.payload.first() {
        Some(&UART_TIMEOUT_NO_READ) | None => 0,
        Some(&timeout) => timeout as u64 * 10,
    }
}
