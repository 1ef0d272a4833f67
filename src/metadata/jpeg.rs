//! JPEG: `DateTimeOriginal` from the APP1 Exif segment

use super::tiff::{parse_exif_datetime, Tiff, TAG_DATE_TIME_ORIGINAL};
use crate::types::BackupError;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const EXIF_HEAD: &[u8] = b"Exif\0\0";
const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

pub fn capture_time(path: &Path) -> Result<Option<NaiveDateTime>, BackupError> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    read_capture_time(&mut reader)
}

pub(crate) fn read_capture_time<R: Read>(r: &mut R) -> Result<Option<NaiveDateTime>, BackupError> {
    let mut soi = [0u8; 2];
    r.read_exact(&mut soi)?;
    if soi != [0xFF, 0xD8] {
        return Err(BackupError::Metadata("missing JPEG SOI marker".to_string()));
    }

    while let Some(marker) = read_marker(r)? {
        if marker == MARKER_SOS || marker == MARKER_EOI {
            break;
        }
        // Standalone markers carry no length.
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            continue;
        }

        let mut len = [0u8; 2];
        r.read_exact(&mut len)?;
        let seg_len = u16::from_be_bytes(len) as usize;
        if seg_len < 2 {
            return Err(BackupError::Metadata("JPEG segment length < 2".to_string()));
        }
        let remaining = seg_len - 2;

        if marker == MARKER_APP1 {
            let mut data = vec![0u8; remaining];
            r.read_exact(&mut data)?;
            if let Some(tiff) = data.strip_prefix(EXIF_HEAD) {
                let tiff = Tiff::parse(tiff)?;
                return match tiff.exif_ascii(TAG_DATE_TIME_ORIGINAL)? {
                    Some(text) => parse_exif_datetime(text).map(Some),
                    None => Ok(None),
                };
            }
            // XMP or other APP1 payloads: keep looking.
        } else {
            io::copy(&mut r.by_ref().take(remaining as u64), &mut io::sink())?;
        }
    }
    Ok(None)
}

/// Next marker code, skipping 0xFF fill bytes. `None` at end of stream.
fn read_marker<R: Read>(r: &mut R) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    loop {
        if r.read(&mut b)? == 0 {
            return Ok(None);
        }
        if b[0] == 0xFF {
            break;
        }
    }
    loop {
        if r.read(&mut b)? == 0 {
            return Ok(None);
        }
        if b[0] != 0xFF {
            return Ok(Some(b[0]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tiff::fixture::tiff_be;
    use std::io::Cursor;

    fn jpeg_with_app1(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        // APP0 JFIF first, as cameras write it.
        out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        out.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        out.extend_from_slice(&[0xFF, MARKER_APP1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0xFF, MARKER_SOS, 0x00, 0x02, 0xFF, MARKER_EOI]);
        out
    }

    fn exif_payload(tiff: Vec<u8>) -> Vec<u8> {
        let mut payload = EXIF_HEAD.to_vec();
        payload.extend(tiff);
        payload
    }

    #[test]
    fn test_reads_date_time_original() {
        let jpeg = jpeg_with_app1(&exif_payload(tiff_be(None, Some("2023:07:15 10:00:00"))));
        let ts = read_capture_time(&mut Cursor::new(jpeg)).unwrap().unwrap();
        assert_eq!(ts.to_string(), "2023-07-15 10:00:00");
    }

    #[test]
    fn test_date_time_alone_is_not_enough() {
        let jpeg = jpeg_with_app1(&exif_payload(tiff_be(Some("2019:05:05 05:05:05"), None)));
        assert_eq!(read_capture_time(&mut Cursor::new(jpeg)).unwrap(), None);
    }

    #[test]
    fn test_xmp_app1_is_skipped() {
        let jpeg = jpeg_with_app1(b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta/>");
        assert_eq!(read_capture_time(&mut Cursor::new(jpeg)).unwrap(), None);
    }

    #[test]
    fn test_no_exif_segment() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, MARKER_EOI];
        assert_eq!(read_capture_time(&mut Cursor::new(jpeg)).unwrap(), None);
    }

    #[test]
    fn test_not_a_jpeg() {
        let result = read_capture_time(&mut Cursor::new(b"\x89PNG\r\n\x1a\n".to_vec()));
        assert!(matches!(result, Err(BackupError::Metadata(_))));
    }

    #[test]
    fn test_truncated_exif_is_error() {
        let mut jpeg = jpeg_with_app1(&exif_payload(tiff_be(None, Some("2023:07:15 10:00:00"))));
        jpeg.truncate(40);
        assert!(read_capture_time(&mut Cursor::new(jpeg)).is_err());
    }
}
