//! Error type for framing and translation failures.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for packet framing and translation.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O failure while reading or writing a frame.
    #[error("packet I/O failure: {message}")]
    #[diagnostic(code(buildmux::proto::io))]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// A frame declared a payload larger than [`crate::frame::MAX_PAYLOAD_SIZE`].
    #[error("packet payload too large: {size} bytes (max {max})")]
    #[diagnostic(code(buildmux::proto::too_large))]
    PayloadTooLarge {
        /// The declared size.
        size: u32,
        /// The configured maximum.
        max: u32,
    },

    /// The payload could not be translated (malformed binary data).
    #[error("malformed packet payload: {message}")]
    #[diagnostic(code(buildmux::proto::malformed))]
    Malformed {
        /// Description of the failure.
        message: String,
    },

    /// A byte did not correspond to a known [`crate::frame::PacketType`].
    #[error("unknown packet type byte: {byte}")]
    #[diagnostic(code(buildmux::proto::unknown_packet_type))]
    UnknownPacketType {
        /// The unrecognized type byte.
        byte: u8,
    },
}

impl Error {
    /// Wrap an I/O error.
    #[must_use]
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }

    /// A malformed-payload error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io(err)
    }
}

/// Result type for packet framing and translation.
pub type Result<T> = std::result::Result<T, Error>;
