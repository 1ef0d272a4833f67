//! Minimal TIFF/EXIF IFD reader
//!
//! Only what timestamp lookup needs: byte order, IFD0, the Exif sub-IFD
//! pointer and ASCII-typed entries.

use crate::types::BackupError;
use chrono::NaiveDateTime;

/// IFD0 `DateTime` (last modification, what HEIC writers fill in).
pub const TAG_DATE_TIME: u16 = 0x0132;
/// IFD0 pointer to the Exif sub-IFD.
pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
/// Exif sub-IFD `DateTimeOriginal` (shutter time).
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_IFD: u16 = 13;
const ENTRY_LEN: usize = 12;

/// Format used by EXIF for all date/time fields.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
struct Entry {
    typ: u16,
    count: u32,
    // Offset of the 4-byte value/offset field within the TIFF block.
    value_at: usize,
}

/// Borrowed view over a TIFF block (the bytes after `Exif\0\0`).
pub struct Tiff<'a> {
    buf: &'a [u8],
    little: bool,
    ifd0: usize,
}

impl<'a> Tiff<'a> {
    /// Validate the TIFF header.
    pub fn parse(buf: &'a [u8]) -> Result<Self, BackupError> {
        if buf.len() < 8 {
            return Err(malformed("TIFF header truncated"));
        }
        let little = match &buf[0..2] {
            b"II" => true,
            b"MM" => false,
            _ => return Err(malformed("bad TIFF byte order mark")),
        };
        let tiff = Self {
            buf,
            little,
            ifd0: 0,
        };
        if tiff.u16_at(2)? != 42 {
            return Err(malformed("bad TIFF magic"));
        }
        let ifd0 = tiff.u32_at(4)? as usize;
        Ok(Self { ifd0, ..tiff })
    }

    /// ASCII tag from IFD0.
    pub fn ifd0_ascii(&self, tag: u16) -> Result<Option<&'a str>, BackupError> {
        match self.find(self.ifd0, tag)? {
            Some(entry) => self.ascii(entry).map(Some),
            None => Ok(None),
        }
    }

    /// ASCII tag from the Exif sub-IFD, `None` when there is no sub-IFD.
    pub fn exif_ascii(&self, tag: u16) -> Result<Option<&'a str>, BackupError> {
        let Some(pointer) = self.find(self.ifd0, TAG_EXIF_IFD_POINTER)? else {
            return Ok(None);
        };
        if !matches!(pointer.typ, TYPE_LONG | TYPE_IFD) {
            return Err(malformed("Exif IFD pointer has unexpected type"));
        }
        let exif_ifd = self.u32_at(pointer.value_at)? as usize;
        match self.find(exif_ifd, tag)? {
            Some(entry) => self.ascii(entry).map(Some),
            None => Ok(None),
        }
    }

    fn find(&self, ifd: usize, tag: u16) -> Result<Option<Entry>, BackupError> {
        let count = self.u16_at(ifd)? as usize;
        let mut off = ifd + 2;
        for _ in 0..count {
            if off + ENTRY_LEN > self.buf.len() {
                return Err(malformed("IFD runs past end of block"));
            }
            if self.u16_at(off)? == tag {
                return Ok(Some(Entry {
                    typ: self.u16_at(off + 2)?,
                    count: self.u32_at(off + 4)?,
                    value_at: off + 8,
                }));
            }
            off += ENTRY_LEN;
        }
        Ok(None)
    }

    fn ascii(&self, entry: Entry) -> Result<&'a str, BackupError> {
        if entry.typ != TYPE_ASCII {
            return Err(malformed("expected ASCII entry"));
        }
        let len = entry.count as usize;
        let start = if len <= 4 {
            entry.value_at
        } else {
            self.u32_at(entry.value_at)? as usize
        };
        let bytes = start
            .checked_add(len)
            .and_then(|end| self.buf.get(start..end))
            .ok_or_else(|| malformed("ASCII value out of bounds"))?;
        let text = std::str::from_utf8(bytes).map_err(|_| malformed("ASCII value not UTF-8"))?;
        Ok(text.trim_end_matches('\0').trim())
    }

    fn u16_at(&self, off: usize) -> Result<u16, BackupError> {
        let bytes: [u8; 2] = self
            .buf
            .get(off..off + 2)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| malformed("read past end of TIFF block"))?;
        Ok(if self.little {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn u32_at(&self, off: usize) -> Result<u32, BackupError> {
        let bytes: [u8; 4] = self
            .buf
            .get(off..off + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| malformed("read past end of TIFF block"))?;
        Ok(if self.little {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` string.
pub fn parse_exif_datetime(text: &str) -> Result<NaiveDateTime, BackupError> {
    NaiveDateTime::parse_from_str(text, EXIF_DATETIME_FORMAT)
        .map_err(|e| BackupError::Metadata(format!("bad EXIF datetime '{}': {}", text, e)))
}

fn malformed(what: &str) -> BackupError {
    BackupError::Metadata(what.to_string())
}


#[cfg(test)]
mod tests {
    use super::fixture::tiff_be;
    use super::*;

    #[test]
    fn test_reads_date_time_original_from_exif_ifd() {
        let block = tiff_be(Some("2020:01:01 00:00:00"), Some("2023:07:15 10:00:00"));
        let tiff = Tiff::parse(&block).unwrap();

        assert_eq!(
            tiff.exif_ascii(TAG_DATE_TIME_ORIGINAL).unwrap(),
            Some("2023:07:15 10:00:00")
        );
        assert_eq!(tiff.ifd0_ascii(TAG_DATE_TIME).unwrap(), Some("2020:01:01 00:00:00"));
    }

    #[test]
    fn test_missing_exif_ifd_is_none() {
        let block = tiff_be(Some("2020:01:01 00:00:00"), None);
        let tiff = Tiff::parse(&block).unwrap();

        assert_eq!(tiff.exif_ascii(TAG_DATE_TIME_ORIGINAL).unwrap(), None);
    }

    #[test]
    fn test_little_endian_header() {
        // II, 42, IFD0 at 8, zero entries.
        let block = b"II\x2a\0\x08\0\0\0\0\0\0\0\0\0";
        let tiff = Tiff::parse(block).unwrap();
        assert_eq!(tiff.ifd0_ascii(TAG_DATE_TIME).unwrap(), None);
    }

    #[test]
    fn test_rejects_bad_byte_order() {
        assert!(Tiff::parse(b"XX\0\x2a\0\0\0\x08").is_err());
    }

    #[test]
    fn test_ifd_offset_out_of_bounds_is_error() {
        let block = b"MM\0\x2a\0\0\xff\xff";
        let tiff = Tiff::parse(block).unwrap();
        assert!(tiff.ifd0_ascii(TAG_DATE_TIME).is_err());
    }

    #[test]
    fn test_parse_exif_datetime() {
        let parsed = parse_exif_datetime("2024:01:02 03:04:05").unwrap();
        assert_eq!(parsed.to_string(), "2024-01-02 03:04:05");
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_err());
    }
}
