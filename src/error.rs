//! Error types for the IEC 60870-5-104 protocol engine.

use thiserror::Error;

/// Result type alias for IEC 104 operations.
pub type Result<T> = std::result::Result<T, Iec104Error>;

/// IEC 60870-5-104 protocol error types.
///
/// Errors fall into three severity classes:
///
/// - connection-fatal: [`Io`](Self::Io), [`Connection`](Self::Connection),
///   [`ConnectionTimeout`](Self::ConnectionTimeout), [`IdleTimeout`](Self::IdleTimeout)
/// - frame-discard: decode failures and [`SequenceMismatch`](Self::SequenceMismatch);
///   the offending frame is dropped, the connection survives
/// - caller error: [`UnsupportedOperation`](Self::UnsupportedOperation), a
///   pushed operation that is not valid for the link's role
#[derive(Debug, Error)]
pub enum Iec104Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection timeout
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// Idle test frame could not be flushed
    #[error("Idle timeout: test frame write failed")]
    IdleTimeout,

    /// Malformed frame (framing or control field)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Malformed ASDU payload
    #[error("Invalid ASDU: {0}")]
    InvalidAsdu(String),

    /// Unknown type identifier
    #[error("Unknown type ID: {0}")]
    UnknownTypeId(u8),

    /// Unknown cause of transmission
    #[error("Unknown cause of transmission: {0}")]
    UnknownCot(u16),

    /// Unknown qualifier byte
    #[error("Unknown qualifier: {0}")]
    UnknownQualifier(u8),

    /// Inbound I-frame out of sequence
    #[error("Sequence number mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// The receive counter at the time the frame arrived
        expected: u16,
        /// The send sequence number carried by the frame
        actual: u16,
    },

    /// Recognized frame with an unsupported type/cause/flag combination
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),

    /// Operation pushed to a link whose role cannot encode it
    #[error("Operation not supported by {role} role: {operation}")]
    UnsupportedOperation {
        /// Role of the link the operation was pushed to
        role: &'static str,
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// Command or event channel closed (link already torn down)
    #[error("Channel closed")]
    ChannelClosed,
}

impl Iec104Error {
    /// Create an invalid frame error.
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create an invalid ASDU error.
    pub fn invalid_asdu(msg: impl Into<String>) -> Self {
        Self::InvalidAsdu(msg.into())
    }

    /// Check if this error must tear the connection down.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Connection(_) | Self::ConnectionTimeout | Self::IdleTimeout
        )
    }

    /// Check if this error only discards a single frame.
    pub fn is_frame_discard(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame(_)
                | Self::InvalidAsdu(_)
                | Self::UnknownTypeId(_)
                | Self::UnknownCot(_)
                | Self::UnknownQualifier(_)
                | Self::SequenceMismatch { .. }
                | Self::UnsupportedFrame(_)
        )
    }
}
