//! Metric declarations for the DPA request engine.
//!
//! Every metric the engine emits is declared once as a [`Metric`] constant in
//! [`metric_defs`], together with its description, unit and label keys. The
//! `metrics` facade is re-exported so callers can install any recorder.
//!
//! # Example
//!
//! ```rust,ignore
//! use dpa_metrics::{describe_metrics, metric_defs, ExchangeLabels};
//!
//! describe_metrics();
//!
//! let labels = ExchangeLabels::new(0x06, false);
//! metrics::counter!(metric_defs::REQUESTS_SENT.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A value that can go up and down.
    Gauge,
    /// A distribution of recorded values.
    Histogram,
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use dpa_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("dpa.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["peripheral"]);
///
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, e.g. `dpa.engine.requests`.
    pub name: &'static str,
    /// Counter, gauge or histogram.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Option<Unit>,
    /// Label keys attached when the metric is recorded.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declares a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Declares a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Declares a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers the description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metrics emitted by the request engine.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Label Keys
    // ========================================================================

    /// Labels present on every exchange metric.
    pub const EXCHANGE_LABELS: &[&str] = &["peripheral", "target"];

    /// Labels present on failure metrics.
    pub const FAILURE_LABELS: &[&str] = &["peripheral", "target", "kind"];

    // ========================================================================
    // Exchange Metrics
    // ========================================================================

    /// Requests handed to the transport.
    pub const REQUESTS_SENT: Metric = Metric::counter("dpa.engine.requests")
        .with_description("Requests handed to the transport")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Confirmations received for remote requests.
    pub const CONFIRMATIONS_RECEIVED: Metric = Metric::counter("dpa.engine.confirmations")
        .with_description("Confirmations received for remote requests")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Responses received, whatever their response code.
    pub const RESPONSES_RECEIVED: Metric = Metric::counter("dpa.engine.responses")
        .with_description("Responses received")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Exchanges that ended with a failure.
    ///
    /// Labels: peripheral, target, kind (dispatch, receive, transport, engine)
    pub const EXCHANGE_FAILURES: Metric = Metric::counter("dpa.engine.failures")
        .with_description("Exchanges that ended with a failure")
        .with_unit(Unit::Count)
        .with_labels(FAILURE_LABELS);

    /// Inbound frames that could not be parsed.
    pub const MALFORMED_FRAMES: Metric = Metric::counter("dpa.engine.malformed_frames")
        .with_description("Inbound frames that could not be parsed")
        .with_unit(Unit::Count);

    /// Time from dispatch to the final response.
    pub const EXCHANGE_LATENCY: Metric = Metric::histogram("dpa.engine.exchange_latency_ms")
        .with_description("Time from dispatch to the final response")
        .with_unit(Unit::Milliseconds)
        .with_labels(EXCHANGE_LABELS);

    /// Time spent waiting for the mesh to finish routing a previous response.
    pub const ROUTING_WAIT: Metric = Metric::histogram("dpa.engine.routing_wait_ms")
        .with_description("Time spent waiting for the mesh to finish routing")
        .with_unit(Unit::Milliseconds);

    // ========================================================================
    // Timing Model Metrics
    // ========================================================================

    /// Bonded node count last learned from coordinator traffic.
    pub const BONDED_NODES: Metric = Metric::gauge("dpa.timing.bonded_nodes")
        .with_description("Bonded node count learned from coordinator traffic")
        .with_unit(Unit::Count);

    /// Response deadline computed for an exchange.
    pub const RESPONSE_DEADLINE: Metric = Metric::histogram("dpa.timing.response_deadline_ms")
        .with_description("Response deadline computed for an exchange")
        .with_unit(Unit::Milliseconds)
        .with_labels(EXCHANGE_LABELS);

    /// All metrics, for bulk description.
    pub const ALL: &[&Metric] = &[
        &REQUESTS_SENT,
        &CONFIRMATIONS_RECEIVED,
        &RESPONSES_RECEIVED,
        &EXCHANGE_FAILURES,
        &MALFORMED_FRAMES,
        &EXCHANGE_LATENCY,
        &ROUTING_WAIT,
        &BONDED_NODES,
        &RESPONSE_DEADLINE,
    ];
}

/// Labels identifying the peripheral and target of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeLabels {
    /// Peripheral number.
    pub peripheral: u8,
    /// True when the locally attached device was addressed.
    pub local: bool,
}

impl ExchangeLabels {
    /// Creates labels for an exchange.
    pub fn new(peripheral: u8, local: bool) -> Self {
        Self { peripheral, local }
    }

    /// Converts the labels to `metrics` label pairs.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("peripheral", format!("0x{:02x}", self.peripheral)),
            ("target", if self.local { "local" } else { "remote" }.to_string()),
        ]
    }

    /// Returns the labels extended with additional pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Registers descriptions of every metric in [`metric_defs::ALL`].
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
