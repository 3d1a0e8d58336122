//! Error kinds shared across the crate
// (c) 2026 OpenNetty contributors

use thiserror::Error;

/// Failure parsing or serializing a raw OpenWebNet [`Frame`](crate::frame::Frame).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The byte string did not start with `*` and end with `##`.
    #[error("missing frame sentinel: {0}")]
    MissingSentinel(&'static str),
    /// A field or parameter contained a character that isn't a decimal digit.
    #[error("field {field} contains non-digit byte {byte:#04x}")]
    NonDigitByte {
        /// index of the offending field
        field: usize,
        /// the offending byte
        byte: u8,
    },
    /// `*` or `#` separators did not balance (e.g. an empty field list).
    #[error("unbalanced separators in frame")]
    UnbalancedSeparators,
    /// The frame exceeded [`crate::frame::MAX_FRAME_LEN`].
    #[error("frame of {0} bytes exceeds the {1} byte soft cap")]
    TooLong(usize, usize),
}

/// Failure encoding or decoding a dialect-specific [`Address`](crate::protocol::address::Address).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A numeric component was outside its legal range for the dialect.
    #[error("{component} value {value} out of range {min}..={max}")]
    OutOfRange {
        /// name of the offending component, e.g. "area", "unit"
        component: &'static str,
        /// the value that was rejected
        value: i64,
        /// minimum legal value
        min: i64,
        /// maximum legal value
        max: i64,
    },
    /// The address text could not be parsed at all.
    #[error("malformed {dialect} address: {text}")]
    Malformed {
        /// dialect name
        dialect: &'static str,
        /// the offending text
        text: String,
    },
}

/// Failure during session handshake, authentication or lifecycle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Frame failed to parse and the stream could not be resynchronized.
    #[error("unrecoverable frame error: {0}")]
    Frame(#[from] FrameError),
    /// The gateway rejected session-type negotiation or authentication.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// No ACK was received within the per-session deadline.
    #[error("session open timed out")]
    OpenTimeout,
    /// The session is not in a state that allows the requested operation.
    #[error("session is {0:?}, cannot proceed")]
    WrongState(&'static str),
}

/// Transport-level byte I/O failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying connection was closed (by us, the peer, or an error).
    #[error("connection closed")]
    Closed,
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,
    /// The deadline for the operation elapsed.
    #[error("deadline elapsed")]
    DeadlineElapsed,
}

/// Outcome of a dispatched [`Transaction`](crate::worker::Transaction) after retries are exhausted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The gateway answered NACK. Terminal; not retried.
    #[error("gateway rejected the request")]
    GatewayRejected,
    /// The gateway answered Busy. Retryable.
    #[error("gateway busy")]
    GatewayBusy,
    /// No response was observed within the per-request timeout. Retryable.
    #[error("transaction timed out")]
    TransactionTimeout,
    /// The session closed while the transaction was in flight. Retryable after reopen.
    #[error("session closed while transaction was pending")]
    SessionClosed,
    /// The transaction was cancelled by its caller before dispatch.
    #[error("transaction cancelled")]
    Cancelled,
}

impl TransactionError {
    /// Whether this outcome is eligible for another retry attempt, per spec.md §7.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayBusy | Self::TransactionTimeout | Self::SessionClosed
        )
    }
}

/// Failure loading or validating startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),
    /// Two gateways or endpoints declared the same name.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// "gateway" or "endpoint"
        kind: &'static str,
        /// the repeated name
        name: String,
    },
    /// An endpoint referenced a gateway that isn't declared.
    #[error("endpoint {endpoint} references unknown gateway {gateway}")]
    UnknownGateway {
        /// endpoint name
        endpoint: String,
        /// gateway name it referenced
        gateway: String,
    },
    /// An endpoint had neither a device binding nor an explicit address+capability set.
    #[error("endpoint {0} has neither a device binding nor an explicit address")]
    UnderspecifiedEndpoint(String),
}

/// Failure performing a [`Controller`](crate::controller::Controller) operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// The endpoint's capability set does not include the one this operation requires.
    #[error("endpoint {endpoint} is missing capability {capability:?}")]
    CapabilityMissing {
        /// endpoint name
        endpoint: String,
        /// the capability that was required
        capability: crate::protocol::message::Capability,
    },
    /// The underlying transaction failed after retries.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// The requested value was outside the protocol's legal range.
    #[error("value {value} is not a legal {what} for this protocol")]
    InvalidValue {
        /// what kind of value was rejected, e.g. "brightness level"
        what: &'static str,
        /// the rejected value
        value: i64,
    },
}
