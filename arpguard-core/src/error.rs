//! Error types for arpguard

use thiserror::Error;

/// Result type alias for arpguard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for arpguard
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (log file, savefile)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer shorter than the ARP header it claims to hold
    #[error("Malformed ARP message: {len} bytes, need at least {required}")]
    MalformedMessage { len: usize, required: usize },

    /// Address widths the binding table cannot represent
    #[error("Unsupported ARP address widths: hlen={hlen}, plen={plen}")]
    UnsupportedAddressLength { hlen: u8, plen: u8 },

    /// Binding table reached its bound
    #[error("Binding table full ({capacity} entries)")]
    TableFull { capacity: usize },

    /// Frame could not be parsed at the link layer
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),

    /// Capture error
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// A detection worker or blocking task died
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Create a capture error with a custom message
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Error::Capture(msg.into())
    }

    /// Create a packet parsing error with a custom message
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Error::PacketParsing(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only concerns a single message and processing can
    /// continue with the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage { .. }
                | Error::UnsupportedAddressLength { .. }
                | Error::TableFull { .. }
                | Error::PacketParsing(_)
        )
    }
}
