//! Byte buffers tagged with a MIME type.

/// MIME type attached to archives produced by [`TarWriter::write_blob`].
///
/// [`TarWriter::write_blob`]: crate::TarWriter::write_blob
pub const TAR_MIME_TYPE: &str = "application/x-tar";

/// An owned byte buffer with an optional MIME type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    /// The bytes.
    pub data: Vec<u8>,
    /// Content type, if known.
    pub mime_type: Option<String>,
}

impl Blob {
    /// Wrap `data` with an optional content type.
    #[must_use]
    pub fn new(data: Vec<u8>, mime_type: Option<&str>) -> Self {
        Self {
            data,
            mime_type: mime_type.map(str::to_owned),
        }
    }

    /// Length of the data in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there is no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Unwrap the data, dropping the MIME type.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
