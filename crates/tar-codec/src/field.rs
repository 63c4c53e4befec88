//! Fixed-width header field encoding.
//!
//! Every USTAR header field lives at a fixed byte offset with a fixed width.
//! The [`Field`] constants below are the only place those offsets appear;
//! the header and writer go through [`read_fixed_text`], [`write_fixed_text`],
//! [`read_octal`] and [`write_octal`] rather than slicing by hand.
//!
//! | Field    | Offset | Width | Encoding                 |
//! |----------|--------|-------|--------------------------|
//! | name     | 0      | 100   | UTF-8 text, NUL-padded   |
//! | mode     | 100    | 8     | octal ASCII              |
//! | uid      | 108    | 8     | octal ASCII              |
//! | gid      | 116    | 8     | octal ASCII              |
//! | size     | 124    | 12    | octal ASCII              |
//! | mtime    | 136    | 12    | octal ASCII              |
//! | checksum | 148    | 8     | octal ASCII (computed)   |
//! | typeflag | 156    | 1     | `'0'` file, `'5'` dir    |
//! | magic    | 257    | 5     | `"ustar"`                |
//! | version  | 263    | 2     | `"00"`                   |
//! | uname    | 265    | 32    | UTF-8 text, NUL-padded   |
//! | gname    | 297    | 32    | UTF-8 text, NUL-padded   |

use std::ops::Range;

use log::trace;

use crate::error::{Error, Result};

/// Location of one fixed-width field inside a 512-byte header block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Byte offset from the start of the header.
    pub offset: usize,
    /// Width of the field in bytes.
    pub width: usize,
}

impl Field {
    /// Create a field descriptor.
    #[must_use]
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// Byte range covered by this field.
    #[must_use]
    pub const fn range(self) -> Range<usize> {
        self.offset..self.offset + self.width
    }
}

/// Entry path.
pub const NAME: Field = Field::new(0, 100);
/// Permission bits.
pub const MODE: Field = Field::new(100, 8);
/// Owner user ID.
pub const UID: Field = Field::new(108, 8);
/// Owner group ID.
pub const GID: Field = Field::new(116, 8);
/// Payload length in bytes.
pub const SIZE: Field = Field::new(124, 12);
/// Modification time in seconds since the Unix epoch.
pub const MTIME: Field = Field::new(136, 12);
/// Header checksum.
pub const CHECKSUM: Field = Field::new(148, 8);
/// Entry type flag.
pub const TYPEFLAG: Field = Field::new(156, 1);
/// Format magic.
pub const MAGIC: Field = Field::new(257, 5);
/// Format version.
pub const VERSION: Field = Field::new(263, 2);
/// Owner user name.
pub const UNAME: Field = Field::new(265, 32);
/// Owner group name.
pub const GNAME: Field = Field::new(297, 32);

/// Octal digits written into the mode, uid and gid fields.
pub const SHORT_DIGITS: usize = 7;
/// Octal digits written into the size and mtime fields.
pub const LONG_DIGITS: usize = 11;
/// Octal digits written into the checksum field.
pub const CHECKSUM_DIGITS: usize = 6;

/// The bytes before the first NUL, or all of `bytes` if there is none.
///
/// ```
/// use tar_codec::field::truncate_null;
///
/// assert_eq!(truncate_null(b"coder\0\0\0"), b"coder");
/// assert_eq!(truncate_null(b"ustar\000"), b"ustar");
/// assert_eq!(truncate_null(&[b'n'; 100]), &[b'n'; 100][..]);
/// ```
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    bytes.split(|&b| b == 0).next().unwrap_or(bytes)
}

/// Read the bytes of a NUL-padded field, up to the first NUL.
///
/// A field that lies past the end of `buf` reads as empty.
#[must_use]
pub fn read_fixed_bytes(buf: &[u8], field: Field) -> &[u8] {
    buf.get(field.range()).map_or(&[][..], truncate_null)
}

/// Read a NUL-padded text field.
///
/// Invalid UTF-8 sequences are replaced rather than reported.
#[must_use]
pub fn read_fixed_text(buf: &[u8], field: Field) -> String {
    String::from_utf8_lossy(read_fixed_bytes(buf, field)).into_owned()
}

/// Write `text` into a field, truncating to the field width and NUL-filling
/// the remainder.
pub fn write_fixed_text(buf: &mut [u8], field: Field, text: &str) {
    let Some(dst) = buf.get_mut(field.range()) else {
        return;
    };
    let src = text.as_bytes();
    let len = src.len().min(dst.len());
    dst[..len].copy_from_slice(&src[..len]);
    dst[len..].fill(0);
}

/// Parse an octal ASCII field into a u64.
///
/// Leading spaces are skipped and the digits end at the first space or NUL.
/// An empty field is zero.
///
/// # Errors
///
/// Returns [`Error::InvalidOctal`] if the digits contain anything other than
/// `0`-`7`, or if the value overflows a u64.
pub fn parse_octal(bytes: &[u8]) -> Result<u64> {
    bytes
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| b != b' ' && b != 0)
        .try_fold(0u64, |value, &b| {
            let digit = match b {
                b'0'..=b'7' => u64::from(b - b'0'),
                _ => return None,
            };
            value.checked_mul(8)?.checked_add(digit)
        })
        .ok_or_else(|| Error::InvalidOctal(bytes.to_vec()))
}

/// Read an octal numeric field, treating anything malformed as zero.
#[must_use]
pub fn read_octal(buf: &[u8], field: Field) -> u64 {
    let bytes = buf.get(field.range()).unwrap_or_default();
    parse_octal(bytes).unwrap_or_else(|err| {
        trace!("field at offset {} read as zero: {err}", field.offset);
        0
    })
}

/// Write `value` as `digits` zero-padded octal digits followed by a NUL, if
/// the field has room for one.
///
/// Values that need more than `digits` digits keep only their low-order
/// digits. Bytes after the terminator are left untouched.
pub fn write_octal(buf: &mut [u8], field: Field, value: u64, digits: usize) {
    let Some(dst) = buf.get_mut(field.range()) else {
        return;
    };
    let digits = digits.min(dst.len());
    let mut rest = value;
    for slot in dst[..digits].iter_mut().rev() {
        *slot = b'0' + (rest & 7) as u8;
        rest >>= 3;
    }
    if let Some(terminator) = dst.get_mut(digits) {
        *terminator = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_fit_in_header() {
        for field in [
            NAME, MODE, UID, GID, SIZE, MTIME, CHECKSUM, TYPEFLAG, MAGIC, VERSION, UNAME, GNAME,
        ] {
            assert!(field.range().end <= crate::HEADER_SIZE, "{field:?}");
        }
    }

    #[test]
    fn test_fields_are_contiguous() {
        assert_eq!(NAME.range().end, MODE.offset);
        assert_eq!(MODE.range().end, UID.offset);
        assert_eq!(UID.range().end, GID.offset);
        assert_eq!(GID.range().end, SIZE.offset);
        assert_eq!(SIZE.range().end, MTIME.offset);
        assert_eq!(MTIME.range().end, CHECKSUM.offset);
        assert_eq!(CHECKSUM.range().end, TYPEFLAG.offset);
        assert_eq!(UNAME.range().end, GNAME.offset);
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal(b"0000644\0").unwrap(), 0o644);
        assert_eq!(parse_octal(b"0000755\0").unwrap(), 0o755);
        assert_eq!(parse_octal(b"     123 ").unwrap(), 0o123);
        assert_eq!(parse_octal(b" 12 34\0").unwrap(), 0o12);
        assert_eq!(parse_octal(b"00000000012\0").unwrap(), 10);
        assert_eq!(parse_octal(b"0").unwrap(), 0);
        assert_eq!(parse_octal(b"").unwrap(), 0);
        assert_eq!(parse_octal(b"\0\0\0\0").unwrap(), 0);
        assert_eq!(parse_octal(b"        ").unwrap(), 0);
    }

    #[test]
    fn test_parse_octal_invalid() {
        assert!(matches!(parse_octal(b"12389"), Err(Error::InvalidOctal(_))));
        assert!(matches!(parse_octal(b"abc"), Err(Error::InvalidOctal(_))));
        assert!(matches!(
            parse_octal(b"7777777777777777777777777"),
            Err(Error::InvalidOctal(_))
        ));
    }

    #[test]
    fn test_read_octal_recovers_zero() {
        let mut header = [0u8; 512];
        header[SIZE.range()].copy_from_slice(b"garbage!!!!\0");
        assert_eq!(read_octal(&header, SIZE), 0);

        header[MODE.range()].copy_from_slice(b"0000644\0");
        assert_eq!(read_octal(&header, MODE), 0o644);
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let short = [b'a'; 10];
        assert_eq!(read_fixed_bytes(&short, UNAME), b"");
        assert_eq!(read_octal(&short, MTIME), 0);
    }

    #[test]
    fn test_write_fixed_text_pads_and_truncates() {
        let mut header = [0xffu8; 512];
        write_fixed_text(&mut header, UNAME, "coder");
        assert_eq!(&header[265..270], b"coder");
        assert!(header[270..297].iter().all(|&b| b == 0));
        assert_eq!(header[297], 0xff);
        assert_eq!(read_fixed_text(&header, UNAME), "coder");

        let long = "x".repeat(40);
        write_fixed_text(&mut header, GNAME, &long);
        assert_eq!(read_fixed_text(&header, GNAME), "x".repeat(32));
        assert_eq!(header[329], 0xff);
    }

    #[test]
    fn test_name_exactly_100_bytes() {
        let mut header = [0u8; 512];
        let name = "n".repeat(100);
        write_fixed_text(&mut header, NAME, &name);
        assert_eq!(read_fixed_text(&header, NAME), name);
    }

    #[test]
    fn test_write_octal() {
        let mut header = [0u8; 512];
        write_octal(&mut header, MODE, 0o664, SHORT_DIGITS);
        assert_eq!(&header[MODE.range()], b"0000664\0");

        write_octal(&mut header, SIZE, 17, LONG_DIGITS);
        assert_eq!(&header[SIZE.range()], b"00000000021\0");
        assert_eq!(read_octal(&header, SIZE), 17);
    }

    #[test]
    fn test_write_octal_keeps_low_digits() {
        let mut header = [0u8; 512];
        write_octal(&mut header, UID, 0o123_4567_0, SHORT_DIGITS);
        assert_eq!(&header[UID.range()], b"2345670\0");
    }

    #[test]
    fn test_write_octal_leaves_trailing_bytes() {
        let mut header = [0u8; 512];
        header[CHECKSUM.range()].fill(b' ');
        write_octal(&mut header, CHECKSUM, 0o1234, CHECKSUM_DIGITS);
        assert_eq!(&header[CHECKSUM.range()], b"001234\0 ");
    }
}
