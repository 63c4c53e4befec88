//! Error types for the tar codec.
//!
//! Parsing a malformed archive never fails: bad numeric fields decode as zero
//! and a truncated buffer simply ends the entry list. Errors only surface from
//! the strict [`parse_octal`] helper and from I/O while materializing an
//! [`ArchiveSource`] into bytes.
//!
//! [`parse_octal`]: crate::field::parse_octal
//! [`ArchiveSource`]: crate::ArchiveSource

/// Result type alias for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A numeric header field contains something other than octal digits.
    #[error("invalid octal field: {0:?}")]
    InvalidOctal(Vec<u8>),

    /// I/O error while reading an archive source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
