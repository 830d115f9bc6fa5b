//! Result of one exchange.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use dpa_protocol::Response;

/// Stage at which an exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request could not be handed to the transport.
    Dispatch,
    /// Nothing usable arrived in time, or an inbound frame could not be parsed.
    Receive,
    /// The transport delivered something out of protocol order, or reported
    /// an error of its own.
    TransportInternal,
    /// The engine itself could not carry out the exchange.
    EngineInternal,
}

impl FailureKind {
    /// Short lowercase name, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Dispatch => "dispatch",
            FailureKind::Receive => "receive",
            FailureKind::TransportInternal => "transport",
            FailureKind::EngineInternal => "engine",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an exchange failed.
#[derive(Debug, Clone)]
pub struct ProcessingFailure {
    /// Failure stage.
    pub kind: FailureKind,
    /// Human-readable description.
    pub description: String,
    /// Underlying error, if any.
    pub cause: Option<Arc<dyn Error + Send + Sync>>,
}

impl ProcessingFailure {
    /// Create a failure without an underlying cause.
    pub fn new(kind: FailureKind, description: impl Into<String>) -> Self {
        ProcessingFailure {
            kind,
            description: description.into(),
            cause: None,
        }
    }

    /// Attach the underlying error.
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub(crate) fn dispatch(description: impl Into<String>) -> Self {
        Self::new(FailureKind::Dispatch, description)
    }

    pub(crate) fn receive(description: impl Into<String>) -> Self {
        Self::new(FailureKind::Receive, description)
    }

    pub(crate) fn transport(description: impl Into<String>) -> Self {
        Self::new(FailureKind::TransportInternal, description)
    }

    pub(crate) fn engine(description: impl Into<String>) -> Self {
        Self::new(FailureKind::EngineInternal, description)
    }
}

impl fmt::Display for ProcessingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.description)
    }
}

impl Error for ProcessingFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Final outcome of [`RequestEngine::send`](crate::RequestEngine::send).
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// The addressed device answered. The response code may still report an
    /// error raised by the device.
    Success(Response),
    /// No response was obtained.
    Failure(ProcessingFailure),
}

impl ProcessingOutcome {
    /// Returns true for [`ProcessingOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Success(_))
    }

    /// The response, if the exchange succeeded.
    pub fn response(&self) -> Option<&Response> {
        match self {
            ProcessingOutcome::Success(response) => Some(response),
            ProcessingOutcome::Failure(_) => None,
        }
    }

    /// The failure, if the exchange failed.
    pub fn failure(&self) -> Option<&ProcessingFailure> {
        match self {
            ProcessingOutcome::Success(_) => None,
            ProcessingOutcome::Failure(failure) => Some(failure),
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<Response, ProcessingFailure> {
        match self {
            ProcessingOutcome::Success(response) => Ok(response),
            ProcessingOutcome::Failure(failure) => Err(failure),
        }
    }
}

impl From<ProcessingFailure> for ProcessingOutcome {
    fn from(failure: ProcessingFailure) -> Self {
        ProcessingOutcome::Failure(failure)
    }
}
