//! Minimal USTAR archive reader and writer.
//!
//! This crate packages a directory of small files into a tar archive held
//! entirely in memory, and unpacks such archives back into named payloads.
//! Only regular files and directories are modeled; GNU and PAX extensions,
//! links, devices and compression are out of scope.
//!
//! # Format
//!
//! Every entry is a 512-byte header block followed by its payload, padded to
//! the next block boundary. Numeric header fields are zero-padded octal
//! ASCII; see [`field`] for the exact layout. The header checksum is the
//! unsigned sum of all 512 header bytes with the checksum field itself
//! counted as spaces. The archive is closed by two zero blocks and padded to
//! a multiple of 10240 bytes.
//!
//! # Example
//!
//! ```
//! use tar_codec::{EntryMetadata, EntryType, TarReader, TarWriter};
//!
//! let mut writer = TarWriter::new();
//! writer.add_file("a.txt", "hello");
//! writer.add_folder("etc");
//! writer.add_file_with(
//!     "etc/d.txt",
//!     "Some text content",
//!     EntryMetadata {
//!         user: Some("coder".into()),
//!         group: Some("codergroup".into()),
//!         mode: Some(0o777),
//!         ..Default::default()
//!     },
//! );
//!
//! let reader = TarReader::new(writer.write());
//! let names: Vec<_> = reader.entries().iter().map(|e| e.name.as_str()).collect();
//! assert_eq!(names, ["a.txt", "etc", "etc/d.txt"]);
//!
//! assert_eq!(reader.entry("etc").unwrap().entry_type, EntryType::Directory);
//! let d = reader.entry("etc/d.txt").unwrap();
//! assert_eq!((d.user.as_str(), d.group.as_str(), d.mode), ("coder", "codergroup", 0o777));
//! assert_eq!(reader.get_text_file("etc/d.txt").as_deref(), Some("Some text content"));
//! ```
//!
//! # Inputs
//!
//! [`TarReader::new`] parses bytes that are already in memory. Async streams
//! and files go through [`ArchiveSource`], which reads them to completion
//! before the synchronous parse starts:
//!
//! ```no_run
//! # async fn example() -> tar_codec::Result<()> {
//! use tar_codec::TarReader;
//!
//! let reader = TarReader::open("template.tar").await?;
//! for entry in reader.entries() {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

mod blob;
mod error;
pub mod field;
pub mod filetree;
mod header;
mod input;
mod metadata;
mod reader;
mod writer;

pub use blob::{Blob, TAR_MIME_TYPE};
pub use error::{Error, Result};
pub use header::{EntryType, Header, HEADER_SIZE, USTAR_MAGIC, USTAR_VERSION};
pub use input::ArchiveSource;
pub use metadata::{Defaults, EntryMetadata, ResolvedMetadata};
pub use reader::{EntryDescriptor, TarReader};
pub use writer::{TarWriter, WriteItem, RECORD_SIZE};
