//! Error taxonomy for the signer wire protocol.
//!
//! These error codes are returned in the response frame and propagated
//! to the client. Error messages are kept minimal to avoid leaking
//! security-relevant information; the host only ever sees a code.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Error codes for the signer command processor.
///
/// Every failure is reported at the point of first detection; none are
/// retried internally, and any in-flight assembly or partially parsed
/// payload is discarded whole when one of these is raised.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    /// A frame or record is shorter than its declared length.
    Truncated = 0x01,
    /// An assembly or record exceeds its declared or hard size bound.
    ResourceOverflow = 0x02,
    /// A TLV tag is not part of the command's schema.
    UnknownTag = 0x03,
    /// A unique TLV tag appeared more than once.
    DuplicateTag = 0x04,
    /// A required TLV tag is missing from the payload.
    MissingRequiredTag = 0x05,
    /// A field failed handler-level semantic validation.
    InvalidField = 0x06,
    /// Signature or certificate verification failed.
    TrustViolation = 0x07,
    /// Unknown command class or sub-selector.
    InvalidCommand = 0x08,
    /// Continuation frame without a matching in-flight transfer.
    InvalidChunk = 0x09,
}

impl Error {
    /// Returns the error code as a u8.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Intentionally terse messages to avoid information leakage
        match self {
            Error::Truncated => write!(f, "Truncated"),
            Error::ResourceOverflow => write!(f, "Resource overflow"),
            Error::UnknownTag => write!(f, "Unknown tag"),
            Error::DuplicateTag => write!(f, "Duplicate tag"),
            Error::MissingRequiredTag => write!(f, "Missing required tag"),
            Error::InvalidField => write!(f, "Invalid field"),
            Error::TrustViolation => write!(f, "Trust violation"),
            Error::InvalidCommand => write!(f, "Invalid command"),
            Error::InvalidChunk => write!(f, "Invalid chunk"),
        }
    }
}
