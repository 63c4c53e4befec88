//! Normalizing archive inputs into one contiguous byte buffer.
//!
//! The reader parses synchronously over a `&[u8]`. Anything that has to be
//! awaited first (an async stream or a file on disk) is drained here, in a
//! single step, before parsing starts.

use std::{fmt, path::PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{blob::Blob, error::Result};

/// Any input shape the reader accepts.
pub enum ArchiveSource {
    /// Bytes already in memory.
    Bytes(Vec<u8>),
    /// An async stream to be read to completion.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// A file on disk.
    File(PathBuf),
}

impl ArchiveSource {
    /// Wrap an async reader.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    /// Returns true if no await is needed to get at the bytes.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// Produce the contiguous archive bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading the stream or file fails.
    ///
    /// [`Error::Io`]: crate::Error::Io
    pub async fn materialize(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(data) => Ok(data),
            Self::Stream(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data).await?;
                Ok(data)
            }
            Self::File(path) => Ok(tokio::fs::read(&path).await?),
        }
    }
}

impl fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}

impl From<&[u8]> for ArchiveSource {
    fn from(data: &[u8]) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl From<Blob> for ArchiveSource {
    fn from(blob: Blob) -> Self {
        Self::Bytes(blob.into_inner())
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}
