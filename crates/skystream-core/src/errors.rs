//! Error taxonomy for the firehose client.
//!
//! - [`StreamError::Transport`]: connect or keepalive failure. Reported through
//!   the `error` event, and as the result of an in-flight `connect()`.
//! - [`StreamError::Parse`]: one malformed frame. Never touches connection state.
//! - [`StreamError::ReconnectExhausted`]: the attempt budget ran out.
//! - [`StreamError::Aborted`]: a pending `connect()` was cut short by `disconnect()`.
//!
//! Connection state changes only on transport close; every variant here is
//! informational to the state machine.

use thiserror::Error;

/// Errors produced by the firehose client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The transport failed to open or broke while open.
    #[error("transport error on {url}: {message}")]
    Transport {
        /// Endpoint the transport was using.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// A frame could not be decoded.
    #[error("failed to parse frame: {message}")]
    Parse {
        /// Decoder failure.
        message: String,
        /// The offending payload, verbatim.
        raw: String,
    },

    /// Reconnection gave up after the configured number of attempts.
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A pending connect was cancelled by `disconnect()`.
    #[error("connect aborted by disconnect")]
    Aborted,

    /// The configured endpoint cannot be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl StreamError {
    /// Build a transport error.
    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Build a parse error carrying the raw frame.
    pub fn parse(message: impl ToString, raw: impl Into<String>) -> Self {
        Self::Parse {
            message: message.to_string(),
            raw: raw.into(),
        }
    }

    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TRANSPORT",
            Self::Parse { .. } => "PARSE",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::Aborted => "ABORTED",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }
}

/// Error a subscription handler may return. Logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, StreamError>;
