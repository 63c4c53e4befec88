//! Parsing an in-memory archive into entry descriptors.

use std::path::Path;

use log::{debug, trace};
use tokio::io::AsyncRead;

use crate::{
    blob::Blob,
    error::Result,
    header::{EntryType, Header, HEADER_SIZE},
    input::ArchiveSource,
};

/// Metadata for one archive member.
///
/// Descriptors do not hold the payload; they record where the member's
/// header sits in the [`TarReader`] buffer they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Relative path; `/` separates nested components.
    pub name: String,
    /// File or directory.
    pub entry_type: EntryType,
    /// Payload length in bytes.
    pub size: u64,
    /// Permission bits.
    pub mode: u32,
    /// Owner user ID.
    pub uid: u64,
    /// Owner group ID.
    pub gid: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u64,
    /// Owner user name.
    pub user: String,
    /// Owner group name.
    pub group: String,
    /// Offset of this entry's header block in the source buffer.
    pub header_offset: usize,
}

impl EntryDescriptor {
    fn from_header(header: &Header, header_offset: usize) -> Self {
        Self {
            name: header.name(),
            entry_type: header.entry_type(),
            size: header.size(),
            mode: header.mode(),
            uid: header.uid(),
            gid: header.gid(),
            mtime: header.mtime(),
            user: header.username(),
            group: header.groupname(),
            header_offset,
        }
    }

    /// Returns true if this is a regular file entry.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.entry_type.is_file()
    }

    /// Returns true if this is a directory entry.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type.is_dir()
    }

    /// Offset of the first payload byte in the source buffer.
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.header_offset + HEADER_SIZE
    }
}

/// Space an entry occupies in the archive: one header block plus the payload
/// rounded up to whole blocks.
///
/// Returns `None` if the result does not fit in a `usize`.
pub(crate) fn entry_span(size: u64) -> Option<usize> {
    let padded = size.checked_next_multiple_of(HEADER_SIZE as u64)?;
    usize::try_from(padded).ok()?.checked_add(HEADER_SIZE)
}

/// A parsed archive.
///
/// The reader owns the archive bytes and the ordered list of entries found
/// in them. Payloads are sliced out on demand.
///
/// # Example
///
/// ```
/// use tar_codec::{TarReader, TarWriter};
///
/// let mut writer = TarWriter::new();
/// writer.add_file("hello.txt", "hello");
/// let reader = TarReader::new(writer.write());
///
/// assert_eq!(reader.len(), 1);
/// assert_eq!(reader.get_text_file("hello.txt").as_deref(), Some("hello"));
/// assert!(reader.get_text_file("missing.txt").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TarReader {
    data: Vec<u8>,
    entries: Vec<EntryDescriptor>,
}

impl TarReader {
    /// Parse an archive that is already in memory.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let entries = parse_entries(&data);
        debug!(
            "parsed {} entries from {} byte archive",
            entries.len(),
            data.len()
        );
        Self { data, entries }
    }

    /// Normalize `source` into bytes and parse it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the source cannot be read.
    ///
    /// [`Error::Io`]: crate::Error::Io
    pub async fn from_source(source: impl Into<ArchiveSource>) -> Result<Self> {
        let data = source.into().materialize().await?;
        Ok(Self::new(data))
    }

    /// Read an async stream to completion and parse it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading the stream fails.
    ///
    /// [`Error::Io`]: crate::Error::Io
    pub async fn read_async(reader: impl AsyncRead + Send + Unpin + 'static) -> Result<Self> {
        Self::from_source(ArchiveSource::from_reader(reader)).await
    }

    /// Read an archive file and parse it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    ///
    /// [`Error::Io`]: crate::Error::Io
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(ArchiveSource::File(path.as_ref().to_path_buf())).await
    }

    /// All entries, in archive order.
    #[must_use]
    pub fn entries(&self) -> &[EntryDescriptor] {
        &self.entries
    }

    /// The first entry named exactly `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&EntryDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The archive bytes the entries point into.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Give back the archive bytes, dropping the parsed entries.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// The payload of `entry`.
    ///
    /// A payload that runs past the end of a truncated archive is cut short
    /// at the last available byte.
    #[must_use]
    pub fn payload(&self, entry: &EntryDescriptor) -> &[u8] {
        let start = entry.payload_offset().min(self.data.len());
        let len = usize::try_from(entry.size).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    /// The raw payload of the first entry named `name`.
    #[must_use]
    pub fn get_binary_file(&self, name: &str) -> Option<&[u8]> {
        self.entry(name).map(|entry| self.payload(entry))
    }

    /// The payload of the first entry named `name`, decoded as UTF-8.
    ///
    /// Invalid sequences are replaced with U+FFFD.
    #[must_use]
    pub fn get_text_file(&self, name: &str) -> Option<String> {
        self.get_binary_file(name)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }

    /// The payload of the first entry named `name`, copied into a [`Blob`]
    /// tagged with `mime_type`.
    #[must_use]
    pub fn get_blob(&self, name: &str, mime_type: Option<&str>) -> Option<Blob> {
        self.get_binary_file(name)
            .map(|data| Blob::new(data.to_vec(), mime_type))
    }
}

/// Walk the header chain from offset 0.
///
/// Stops at the first header whose name field is empty (this covers the
/// zero-block end marker) or when less than a full header remains.
fn parse_entries(data: &[u8]) -> Vec<EntryDescriptor> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while let Some(header) = data.get(offset..).and_then(Header::from_prefix) {
        if header.name_bytes().is_empty() {
            break;
        }

        let entry = EntryDescriptor::from_header(header, offset);
        trace!(
            "entry {:?} at {offset}: {:?}, {} bytes",
            entry.name,
            entry.entry_type,
            entry.size
        );

        let next = entry_span(entry.size).and_then(|span| offset.checked_add(span));
        entries.push(entry);
        match next {
            Some(next) => offset = next,
            None => break,
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_block(name: &str, entry_type: EntryType, size: u64) -> Vec<u8> {
        let mut header = Header::new_ustar();
        header.set_name(name);
        header.set_entry_type(entry_type);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_checksum();
        header.as_bytes().to_vec()
    }

    fn archive(parts: &[(&str, EntryType, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        for (name, entry_type, payload) in parts {
            data.extend(header_block(name, *entry_type, payload.len() as u64));
            data.extend_from_slice(payload);
            data.resize(data.len().next_multiple_of(HEADER_SIZE), 0);
        }
        data.extend([0u8; 2 * HEADER_SIZE]);
        data
    }

    #[test]
    fn test_entry_span() {
        assert_eq!(entry_span(0), Some(512));
        assert_eq!(entry_span(1), Some(1024));
        assert_eq!(entry_span(512), Some(1024));
        assert_eq!(entry_span(513), Some(1536));
        assert_eq!(entry_span(u64::MAX), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(TarReader::new(Vec::new()).is_empty());
        assert!(TarReader::new(vec![0u8; 10240]).is_empty());
        assert!(TarReader::new(vec![0u8; 100]).is_empty());
    }

    #[test]
    fn test_offsets_follow_payload_padding() {
        let data = archive(&[
            ("a.txt", EntryType::Regular, b"hello"),
            ("b.bin", EntryType::Regular, &[0u8; 600]),
            ("c.txt", EntryType::Regular, b""),
            ("d", EntryType::Directory, b""),
        ]);
        let reader = TarReader::new(data);
        let offsets: Vec<_> = reader.entries().iter().map(|e| e.header_offset).collect();
        assert_eq!(offsets, [0, 1024, 2560, 3072]);
        assert_eq!(reader.entries()[0].payload_offset(), 512);
        assert!(reader.entries()[3].is_dir());
        assert!(reader.entries()[2].is_file());
    }

    #[test]
    fn test_truncated_header_ends_parse() {
        let mut data = archive(&[("a.txt", EntryType::Regular, b"hello")]);
        data.truncate(1024);
        data.extend(&header_block("b.txt", EntryType::Regular, 0)[..300]);
        let reader = TarReader::new(data);
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_truncated_payload_is_clamped() {
        let mut data = header_block("big.txt", EntryType::Regular, 4096);
        data.extend_from_slice(b"partial");
        let reader = TarReader::new(data);
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.get_binary_file("big.txt"), Some(&b"partial"[..]));
    }

    #[test]
    fn test_malformed_numbers_read_as_zero() {
        let mut block = header_block("weird", EntryType::Regular, 0);
        block[100..108].copy_from_slice(b"rwxr-xr-");
        block[124..136].copy_from_slice(b"not a size!!");
        block[136..148].copy_from_slice(b"99999999999\0");
        let reader = TarReader::new(block);
        let entry = &reader.entries()[0];
        assert_eq!(entry.mode, 0);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.mtime, 0);
    }

    #[test]
    fn test_checksum_is_not_validated() {
        let mut data = archive(&[("a.txt", EntryType::Regular, b"hello")]);
        data[148..156].copy_from_slice(b"0000000\0");
        let reader = TarReader::new(data);
        assert_eq!(reader.get_text_file("a.txt").as_deref(), Some("hello"));
    }

    #[test]
    fn test_duplicate_names_return_first() {
        let data = archive(&[
            ("dup.txt", EntryType::Regular, b"first"),
            ("dup.txt", EntryType::Regular, b"second"),
        ]);
        let reader = TarReader::new(data);
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.entry("dup.txt").unwrap().header_offset, 0);
        assert_eq!(reader.get_text_file("dup.txt").as_deref(), Some("first"));
    }

    #[test]
    fn test_missing_name_is_none() {
        let reader = TarReader::new(archive(&[("a.txt", EntryType::Regular, b"x")]));
        assert!(reader.entry("b.txt").is_none());
        assert!(reader.get_binary_file("b.txt").is_none());
        assert!(reader.get_text_file("b.txt").is_none());
        assert!(reader.get_blob("b.txt", None).is_none());
    }

    #[test]
    fn test_blob_extraction() {
        let reader = TarReader::new(archive(&[("img.png", EntryType::Regular, &[0x89, b'P'])]));
        let blob = reader.get_blob("img.png", Some("image/png")).unwrap();
        assert_eq!(blob.data, [0x89, b'P']);
        assert_eq!(blob.mime_type.as_deref(), Some("image/png"));
        assert_eq!(reader.get_blob("img.png", None).unwrap().mime_type, None);
    }

    #[test]
    fn test_invalid_utf8_text_is_lossy() {
        let reader = TarReader::new(archive(&[("bad.txt", EntryType::Regular, &[b'a', 0xff])]));
        assert_eq!(reader.get_text_file("bad.txt").as_deref(), Some("a\u{fffd}"));
    }

    #[tokio::test]
    async fn test_read_async() {
        let data = archive(&[("a.txt", EntryType::Regular, b"hello")]);
        let reader = TarReader::read_async(std::io::Cursor::new(data)).await.unwrap();
        assert_eq!(reader.get_text_file("a.txt").as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.tar");
        std::fs::write(&path, archive(&[("etc", EntryType::Directory, b"")])).unwrap();
        let reader = TarReader::open(&path).await.unwrap();
        assert!(reader.entry("etc").unwrap().is_dir());
    }
}
