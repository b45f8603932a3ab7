//! Error types for the enceladus capture agent

use thiserror::Error;

/// Result type alias for enceladus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the enceladus capture agent
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem or OS I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration file '{path}': {reason}")]
    ConfigParse { path: String, reason: String },

    /// Configuration value rejected by validation
    #[error("Invalid configuration value '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface has no usable hardware address
    #[error("Interface '{0}' has no hardware address")]
    NoHardwareAddress(String),

    /// Capture error (open, read or statistics)
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// The frame stream of a capture source was already handed out
    #[error("Frame stream of capture on '{0}' was already taken")]
    StreamTaken(String),

    /// Metrics sink error
    #[error("Metrics sink error: {0}")]
    Sink(String),

    /// A pipeline stage failed to come up
    #[error("Stage '{stage}' failed to start: {reason}")]
    StageStartup { stage: String, reason: String },

    /// Every consumer of the relay queue is gone
    #[error("Relay queue closed")]
    RelayClosed,

    /// Invalid address or identifier text
    #[error("Invalid value '{value}': {reason}")]
    InvalidValue { value: String, reason: String },

    /// Logging could not be initialised
    #[error("Logging initialisation failed: {0}")]
    Logging(String),
}

impl Error {
    /// Create a capture error with a custom message
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Error::Capture(msg.into())
    }

    /// Create a metrics sink error with a custom message
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Error::Sink(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a stage startup error
    pub fn stage_startup<S: Into<String>, R: Into<String>>(stage: S, reason: R) -> Self {
        Error::StageStartup {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to configuration or usage rather than runtime
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigParse { .. } | Error::InvalidConfig { .. } | Error::InvalidValue { .. }
        )
    }
}
