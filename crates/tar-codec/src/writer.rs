//! Serializing named payloads into a USTAR archive.

use log::{debug, trace};

use crate::{
    blob::{Blob, TAR_MIME_TYPE},
    header::{EntryType, Header, HEADER_SIZE},
    metadata::{Defaults, EntryMetadata, ResolvedMetadata},
    reader::entry_span,
};

/// Archives are padded to a whole number of 20-block records.
pub const RECORD_SIZE: usize = 20 * HEADER_SIZE;

/// Zero blocks that terminate an archive.
const END_OF_ARCHIVE_BLOCKS: usize = 2;

/// One queued archive member.
///
/// `size` is taken from the payload when the item is added and never
/// recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteItem {
    pub name: String,
    pub entry_type: EntryType,
    pub payload: Vec<u8>,
    pub size: u64,
    pub metadata: ResolvedMetadata,
}

impl WriteItem {
    fn span(&self) -> usize {
        entry_span(self.size).unwrap_or(usize::MAX)
    }

    fn header(&self) -> Header {
        let meta = &self.metadata;
        let mut header = Header::new_ustar();
        header.set_name(&self.name);
        header.set_entry_type(self.entry_type);
        header.set_size(self.size);
        header.set_mode(meta.mode);
        header.set_uid(meta.uid);
        header.set_gid(meta.gid);
        header.set_mtime(meta.mtime);
        header.set_username(&meta.user);
        header.set_groupname(&meta.group);
        header.set_checksum();
        header
    }
}

/// Builds a USTAR archive in memory.
///
/// Items are queued with [`add_file`] and [`add_folder`] and serialized in
/// insertion order by [`write`], which sizes and allocates the whole archive
/// up front.
///
/// # Example
///
/// ```
/// use tar_codec::{EntryMetadata, TarWriter};
///
/// let mut writer = TarWriter::new();
/// writer
///     .add_file("a.txt", "hello")
///     .add_folder("etc")
///     .add_file_with(
///         "etc/d.txt",
///         "Some text content",
///         EntryMetadata {
///             mode: Some(0o777),
///             ..Default::default()
///         },
///     );
///
/// let data = writer.write();
/// assert_eq!(data.len() % 10240, 0);
/// ```
///
/// [`add_file`]: TarWriter::add_file
/// [`add_folder`]: TarWriter::add_folder
/// [`write`]: TarWriter::write
#[derive(Debug, Clone, Default)]
pub struct TarWriter {
    defaults: Defaults,
    items: Vec<WriteItem>,
}

impl TarWriter {
    /// Create an empty writer using [`Defaults::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with custom fallback metadata.
    #[must_use]
    pub fn with_defaults(defaults: Defaults) -> Self {
        Self {
            defaults,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Queue a regular file.
    pub fn add_file(&mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) -> &mut Self {
        self.add_file_with(name, payload, EntryMetadata::default())
    }

    /// Queue a regular file with metadata overrides.
    pub fn add_file_with(
        &mut self,
        name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        metadata: EntryMetadata,
    ) -> &mut Self {
        self.push(name.into(), EntryType::Regular, payload.into(), metadata)
    }

    /// Queue a directory.
    pub fn add_folder(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_folder_with(name, EntryMetadata::default())
    }

    /// Queue a directory with metadata overrides.
    pub fn add_folder_with(&mut self, name: impl Into<String>, metadata: EntryMetadata) -> &mut Self {
        self.push(name.into(), EntryType::Directory, Vec::new(), metadata)
    }

    fn push(
        &mut self,
        name: String,
        entry_type: EntryType,
        payload: Vec<u8>,
        metadata: EntryMetadata,
    ) -> &mut Self {
        let size = payload.len() as u64;
        let metadata = self.defaults.resolve(entry_type, metadata);
        trace!("queued {name:?}: {entry_type:?}, {size} bytes");
        self.items.push(WriteItem {
            name,
            entry_type,
            payload,
            size,
            metadata,
        });
        self
    }

    /// Queued items, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[WriteItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Length in bytes of the archive [`write`] will produce.
    ///
    /// Every item takes a header block plus its payload rounded up to whole
    /// blocks; two zero blocks follow the last item, and the total is rounded
    /// up to a whole record.
    ///
    /// [`write`]: TarWriter::write
    #[must_use]
    pub fn archive_size(&self) -> usize {
        let used = self
            .items
            .iter()
            .fold(END_OF_ARCHIVE_BLOCKS * HEADER_SIZE, |total, item| {
                total.saturating_add(item.span())
            });
        used.next_multiple_of(RECORD_SIZE)
    }

    /// Serialize every queued item into one archive buffer.
    ///
    /// Calling this again produces identical bytes.
    #[must_use]
    pub fn write(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.archive_size()];
        let mut offset = 0;

        for item in &self.items {
            let header = item.header();
            data[offset..offset + HEADER_SIZE].copy_from_slice(header.as_bytes());

            let start = offset + HEADER_SIZE;
            data[start..start + item.payload.len()].copy_from_slice(&item.payload);
            offset += item.span();
        }

        debug!(
            "wrote {} entries into {} byte archive",
            self.items.len(),
            data.len()
        );
        data
    }

    /// Serialize the archive and tag it as `application/x-tar`.
    #[must_use]
    pub fn write_blob(&self) -> Blob {
        Blob::new(self.write(), Some(TAR_MIME_TYPE))
    }
}
