use core::fmt::{self, Display};

#[cfg(feature = "std")]
use std::io;

/// Errors that may occur while encoding an image.
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum EncodeError {
    /// The byte writer failed (ERR_IO).
    Io(io::Error),

    /// The upstream row source signaled a non-EOF error (ERR_SOURCE).
    Source(Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[cfg(feature = "std")]
impl Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Io(e) => write!(f, "write error: {}", e),
            EncodeError::Source(e) => write!(f, "row source error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Io(e) => Some(e),
            EncodeError::Source(e) => Some(e.as_ref()),
        }
    }
}

#[cfg(feature = "std")]
impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::Io(e)
    }
}

/// Errors that may occur while decoding an image.
///
/// `NoFooter` is deliberately not returned from [`crate::Decoder::decode`]
/// itself — a missing or malformed footer does not invalidate pixels already
/// decoded. It is exposed through [`crate::DecodeOutcome::require_footer`]
/// for callers that want strict validation.
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum DecodeError {
    /// The byte reader failed for a reason other than running out of data
    /// at a pixel/argument boundary (ERR_IO).
    Io(io::Error),

    /// Missing magic, bad channel count, or zero-sized image (ERR_BADHEADER).
    BadHeader,

    /// The byte stream ended before `width * height` pixels were produced,
    /// or mid-argument-bytes (ERR_TRUNCATED).
    Truncated,

    /// All pixels decoded, but the footer was absent or malformed
    /// (ERR_NOFOOTER). Warning-level: see the type-level docs.
    NoFooter,

    /// The downstream row sink signaled an error (ERR_SINK).
    Sink(Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[cfg(feature = "std")]
impl PartialEq for DecodeError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DecodeError::Io(a), DecodeError::Io(b)) => a.kind() == b.kind(),
            (DecodeError::BadHeader, DecodeError::BadHeader) => true,
            (DecodeError::Truncated, DecodeError::Truncated) => true,
            (DecodeError::NoFooter, DecodeError::NoFooter) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "std")]
impl Eq for DecodeError {}

#[cfg(feature = "std")]
impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Io(e) => write!(f, "read error: {}", e),
            DecodeError::BadHeader => f.write_str("malformed RPK header"),
            DecodeError::Truncated => f.write_str("truncated RPK bitstream"),
            DecodeError::NoFooter => f.write_str("missing or malformed RPK footer"),
            DecodeError::Sink(e) => write!(f, "row sink error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Io(e) => Some(e),
            DecodeError::Sink(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::Io(e)
    }
}

/// Maps a `read_exact` failure at a point where the bitstream format
/// requires more bytes to follow into [`DecodeError::Truncated`]; any other
/// I/O failure is [`DecodeError::Io`].
#[cfg(feature = "std")]
pub(crate) fn map_read_exact(e: io::Error) -> DecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::Truncated
    } else {
        DecodeError::Io(e)
    }
}
