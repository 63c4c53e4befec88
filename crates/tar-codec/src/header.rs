//! The 512-byte USTAR header block.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::field::{
    self, read_fixed_bytes, read_fixed_text, read_octal, write_fixed_text, write_octal, Field,
};

/// Size of a tar header block in bytes.
pub const HEADER_SIZE: usize = 512;

/// Magic string for UStar format headers, without its trailing NUL.
pub const USTAR_MAGIC: &[u8; 5] = b"ustar";

/// Version field for UStar format headers.
pub const USTAR_VERSION: &[u8; 2] = b"00";

/// Entry type stored in the type flag byte.
///
/// Only the two kinds this codec produces are modeled. Every flag other than
/// `'5'` reads back as [`EntryType::Regular`], including historical codes for
/// links and devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (type `'0'`).
    Regular,
    /// Directory (type `'5'`).
    Directory,
}

impl EntryType {
    /// Classify a raw type flag byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'5' => EntryType::Directory,
            _ => EntryType::Regular,
        }
    }

    /// The type flag byte written for this entry type.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Directory => b'5',
        }
    }

    /// Returns true if this is a regular file entry.
    #[must_use]
    pub fn is_file(self) -> bool {
        self == EntryType::Regular
    }

    /// Returns true if this is a directory entry.
    #[must_use]
    pub fn is_dir(self) -> bool {
        self == EntryType::Directory
    }
}

impl From<u8> for EntryType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<EntryType> for u8 {
    fn from(entry_type: EntryType) -> Self {
        entry_type.to_byte()
    }
}

/// A USTAR header block.
///
/// The reader views headers in place over the archive buffer; the writer
/// builds one on the stack and copies it into the output.
///
/// ```
/// use tar_codec::{EntryType, Header};
///
/// let mut header = Header::new_ustar();
/// header.set_name("etc/motd");
/// header.set_entry_type(EntryType::Regular);
/// header.set_size(5);
/// header.set_checksum();
/// assert!(header.verify_checksum());
/// assert_eq!(header.name(), "etc/motd");
/// ```
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Header {
    bytes: [u8; HEADER_SIZE],
}

impl Header {
    /// Create a zeroed header carrying the UStar magic and version.
    #[must_use]
    pub fn new_ustar() -> Self {
        let mut header = Self {
            bytes: [0u8; HEADER_SIZE],
        };
        header.bytes[field::MAGIC.range()].copy_from_slice(USTAR_MAGIC);
        header.bytes[field::VERSION.range()].copy_from_slice(USTAR_VERSION);
        header
    }

    /// View the first 512 bytes of `bytes` as a header.
    ///
    /// Returns `None` if fewer than 512 bytes are available.
    #[must_use]
    pub fn from_prefix(bytes: &[u8]) -> Option<&Header> {
        Header::ref_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    /// Get a reference to the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.bytes
    }

    /// Check if this header carries the UStar magic and version.
    #[must_use]
    pub fn is_ustar(&self) -> bool {
        read_fixed_bytes(&self.bytes, field::MAGIC) == USTAR_MAGIC
            && self.bytes[field::VERSION.range()] == *USTAR_VERSION
    }

    /// Check if every byte of the block is zero.
    ///
    /// Two consecutive empty blocks mark the end of a tar archive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Raw bytes of the name field, up to the first NUL.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        read_fixed_bytes(&self.bytes, field::NAME)
    }

    /// The entry path.
    #[must_use]
    pub fn name(&self) -> String {
        read_fixed_text(&self.bytes, field::NAME)
    }

    /// The entry type.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.bytes[field::TYPEFLAG.offset])
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        read_octal(&self.bytes, field::SIZE)
    }

    /// Permission bits. A value too wide for a `u32` reads as zero.
    #[must_use]
    pub fn mode(&self) -> u32 {
        u32::try_from(read_octal(&self.bytes, field::MODE)).unwrap_or(0)
    }

    /// Owner user ID.
    #[must_use]
    pub fn uid(&self) -> u64 {
        read_octal(&self.bytes, field::UID)
    }

    /// Owner group ID.
    #[must_use]
    pub fn gid(&self) -> u64 {
        read_octal(&self.bytes, field::GID)
    }

    /// Modification time in seconds since the Unix epoch.
    #[must_use]
    pub fn mtime(&self) -> u64 {
        read_octal(&self.bytes, field::MTIME)
    }

    /// Owner user name.
    #[must_use]
    pub fn username(&self) -> String {
        read_fixed_text(&self.bytes, field::UNAME)
    }

    /// Owner group name.
    #[must_use]
    pub fn groupname(&self) -> String {
        read_fixed_text(&self.bytes, field::GNAME)
    }

    /// The checksum value stored in the header.
    #[must_use]
    pub fn stored_checksum(&self) -> u64 {
        read_octal(&self.bytes, field::CHECKSUM)
    }

    /// Set the entry path, cut at 100 bytes.
    pub fn set_name(&mut self, name: &str) {
        write_fixed_text(&mut self.bytes, field::NAME, name);
    }

    /// Set the type flag byte.
    pub fn set_entry_type(&mut self, entry_type: EntryType) {
        self.bytes[field::TYPEFLAG.offset] = entry_type.to_byte();
    }

    /// Set the payload length as 11 octal digits.
    pub fn set_size(&mut self, size: u64) {
        self.set_octal(field::SIZE, size, field::LONG_DIGITS);
    }

    /// Set the permission bits as 7 octal digits.
    pub fn set_mode(&mut self, mode: u32) {
        self.set_octal(field::MODE, u64::from(mode), field::SHORT_DIGITS);
    }

    /// Set the owner user ID as 7 octal digits.
    pub fn set_uid(&mut self, uid: u64) {
        self.set_octal(field::UID, uid, field::SHORT_DIGITS);
    }

    /// Set the owner group ID as 7 octal digits.
    pub fn set_gid(&mut self, gid: u64) {
        self.set_octal(field::GID, gid, field::SHORT_DIGITS);
    }

    /// Set the modification time as 11 octal digits.
    pub fn set_mtime(&mut self, mtime: u64) {
        self.set_octal(field::MTIME, mtime, field::LONG_DIGITS);
    }

    /// Set the owner user name, cut at 32 bytes.
    pub fn set_username(&mut self, user: &str) {
        write_fixed_text(&mut self.bytes, field::UNAME, user);
    }

    /// Set the owner group name, cut at 32 bytes.
    pub fn set_groupname(&mut self, group: &str) {
        write_fixed_text(&mut self.bytes, field::GNAME, group);
    }

    fn set_octal(&mut self, field: Field, value: u64, digits: usize) {
        write_octal(&mut self.bytes, field, value, digits);
    }

    /// Compute the header checksum.
    ///
    /// This is the unsigned sum of all header bytes, counting the checksum
    /// field (bytes 148..156) as spaces.
    #[must_use]
    pub fn compute_checksum(&self) -> u64 {
        let (before, rest) = self.bytes.split_at(field::CHECKSUM.offset);
        let after = &rest[field::CHECKSUM.width..];
        let blanks = field::CHECKSUM.width as u64 * u64::from(b' ');
        before.iter().chain(after).map(|&b| u64::from(b)).sum::<u64>() + blanks
    }

    /// Fill in the checksum field.
    ///
    /// Writes six octal digits and a NUL, leaving a trailing space in the
    /// last byte of the field.
    pub fn set_checksum(&mut self) {
        let sum = self.compute_checksum();
        self.bytes[field::CHECKSUM.range()].fill(b' ');
        self.set_octal(field::CHECKSUM, sum, field::CHECKSUM_DIGITS);
    }

    /// Check the stored checksum against the header contents.
    #[must_use]
    pub fn verify_checksum(&self) -> bool {
        self.stored_checksum() == self.compute_checksum()
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new_ustar()
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Header(empty)");
        }
        f.debug_struct("Header")
            .field("name", &self.name())
            .field("entry_type", &self.entry_type())
            .field("size", &self.size())
            .field("mode", &format_args!("{:#o}", self.mode()))
            .field("owner", &format_args!("{}:{}", self.uid(), self.gid()))
            .field("checksum_ok", &self.verify_checksum())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(size_of::<Header>(), HEADER_SIZE);
    }

    #[test]
    fn test_new_ustar() {
        let header = Header::new_ustar();
        assert!(header.is_ustar());
        assert_eq!(&header.as_bytes()[257..265], b"ustar\x0000");
        assert!(!header.is_empty());
    }

    #[test]
    fn test_from_prefix_insufficient() {
        assert!(Header::from_prefix(&[0u8; 511]).is_none());
        assert!(Header::from_prefix(&[0u8; 512]).is_some_and(Header::is_empty));
        assert!(Header::from_prefix(&[0u8; 1024]).is_some());
    }

    #[test]
    fn test_entry_type_roundtrip() {
        assert_eq!(EntryType::from_byte(b'0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'5'), EntryType::Directory);
        assert_eq!(EntryType::Regular.to_byte(), b'0');
        assert_eq!(u8::from(EntryType::Directory), b'5');
        assert_eq!(EntryType::from(b'5'), EntryType::Directory);
    }

    #[test]
    fn test_other_type_flags_read_as_regular() {
        for flag in [b'\0', b'1', b'2', b'3', b'4', b'6', b'7', b'L', b'x', b'g'] {
            assert_eq!(EntryType::from_byte(flag), EntryType::Regular, "{flag}");
        }
    }

    #[test]
    fn test_entry_type_predicates() {
        assert!(EntryType::Regular.is_file());
        assert!(!EntryType::Regular.is_dir());
        assert!(EntryType::Directory.is_dir());
        assert!(!EntryType::Directory.is_file());
    }

    #[test]
    fn test_setters_and_getters() {
        let mut header = Header::new_ustar();
        header.set_name("etc/d.txt");
        header.set_entry_type(EntryType::Directory);
        header.set_size(0o1234);
        header.set_mode(0o777);
        header.set_uid(1000);
        header.set_gid(1001);
        header.set_mtime(1_700_000_000);
        header.set_username("coder");
        header.set_groupname("codergroup");

        assert_eq!(header.name(), "etc/d.txt");
        assert_eq!(header.name_bytes(), b"etc/d.txt");
        assert_eq!(header.entry_type(), EntryType::Directory);
        assert_eq!(header.size(), 0o1234);
        assert_eq!(header.mode(), 0o777);
        assert_eq!(header.uid(), 1000);
        assert_eq!(header.gid(), 1001);
        assert_eq!(header.mtime(), 1_700_000_000);
        assert_eq!(header.username(), "coder");
        assert_eq!(header.groupname(), "codergroup");
        assert_eq!(&header.as_bytes()[124..136], b"00000001234\0");
        assert_eq!(&header.as_bytes()[100..108], b"0000777\0");
    }

    #[test]
    fn test_checksum_empty_header() {
        let header = Header::from_prefix(&[0u8; 512]).unwrap();
        // Only the eight checksum bytes count, as spaces.
        assert_eq!(header.compute_checksum(), 8 * 32);
    }

    #[test]
    fn test_set_checksum() {
        let mut header = Header::new_ustar();
        header.set_name("a.txt");
        header.set_checksum();

        let bytes = header.as_bytes();
        assert_eq!(bytes[154], 0);
        assert_eq!(bytes[155], b' ');
        assert!(header.verify_checksum());

        let mut spaced = *bytes;
        spaced[148..156].fill(b' ');
        let sum: u64 = spaced.iter().map(|&b| u64::from(b)).sum();
        assert_eq!(header.stored_checksum(), sum);
    }

    #[test]
    fn test_checksum_detects_change() {
        let mut header = Header::new_ustar();
        header.set_name("a.txt");
        header.set_checksum();
        header.set_name("b.txt");
        assert!(!header.verify_checksum());
    }

    #[test]
    fn test_debug_impl() {
        let mut header = Header::new_ustar();
        header.set_name("hello.txt");
        header.set_mode(0o644);
        header.set_uid(1000);
        header.set_gid(1000);
        header.set_checksum();
        let debug = format!("{header:?}");
        assert!(debug.contains("hello.txt"));
        assert!(debug.contains("0o644"));
        assert!(debug.contains("1000:1000"));
        assert!(debug.contains("checksum_ok: true"));

        let empty = Header::from_prefix(&[0u8; 512]).unwrap();
        assert_eq!(format!("{empty:?}"), "Header(empty)");
    }

    #[test]
    fn test_mode_field_without_terminator() {
        let mut header = Header::new_ustar();
        header.set_octal(field::MODE, 0o7777_7777, 8);
        assert_eq!(&header.as_bytes()[field::MODE.range()], b"77777777");
        assert_eq!(header.mode(), 0o7777_7777);

        header.bytes[field::MODE.range()].copy_from_slice(b"0000x44\0");
        assert_eq!(header.mode(), 0);
    }
}
