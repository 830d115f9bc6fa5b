//! Error types for configuration and transports.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportKind;

/// Errors raised while loading or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid YAML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised by transports.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation requires a started transport.
    #[error("transport not started")]
    NotStarted,

    /// The transport was already started.
    #[error("transport already started")]
    AlreadyStarted,

    /// The peer side of the transport has gone away.
    #[error("transport disconnected")]
    Disconnected,

    /// Frame exceeds what the transport can carry.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Frame size.
        size: usize,
        /// Maximum supported size.
        max: usize,
    },

    /// Only part of the frame was written.
    #[error("short write: {written} of {size} bytes")]
    ShortWrite {
        /// Bytes written.
        written: usize,
        /// Frame size.
        size: usize,
    },

    /// No factory is registered for the configured transport kind.
    #[error("no transport registered for kind {0}")]
    Unsupported(TransportKind),

    /// Socket or thread error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}
