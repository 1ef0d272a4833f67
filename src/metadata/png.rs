//! PNG: first EXIF-style datetime inside an `eXIf` chunk

use super::tiff::parse_exif_datetime;
use crate::types::BackupError;
use chrono::NaiveDateTime;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

// Payloads above this are not plausible EXIF blocks.
const MAX_EXIF_CHUNK: u32 = 16 * 1024 * 1024;

static EXIF_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]{4}:[0-9]{2}:[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}")
        .expect("static datetime pattern compiles")
});

pub fn capture_time(path: &Path) -> Result<Option<NaiveDateTime>, BackupError> {
    let file = File::open(path)?;
    read_capture_time(&mut BufReader::new(file))
}

/// Walk the chunk stream. A bad signature is an error; running out of bytes
/// mid-stream just means nothing was found.
pub(crate) fn read_capture_time<R: Read>(r: &mut R) -> Result<Option<NaiveDateTime>, BackupError> {
    let mut signature = [0u8; 8];
    if read_full(r, &mut signature)? < 8 || &signature != PNG_SIGNATURE {
        return Err(BackupError::Metadata("not a valid PNG file".to_string()));
    }

    loop {
        let mut header = [0u8; 8];
        if read_full(r, &mut header)? < 8 {
            return Ok(None);
        }
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let chunk_type = &header[4..8];

        if chunk_type == b"eXIf" && length <= MAX_EXIF_CHUNK {
            let mut data = vec![0u8; length as usize];
            if read_full(r, &mut data)? < data.len() {
                return Ok(None);
            }
            if let Some(found) = EXIF_DATETIME.find(&data) {
                // The pattern only matches ASCII.
                let text = String::from_utf8_lossy(found.as_bytes());
                return parse_exif_datetime(&text).map(Some);
            }
            skip(r, 4)?;
        } else if chunk_type == b"IEND" {
            return Ok(None);
        } else {
            // payload + CRC
            skip(r, u64::from(length) + 4)?;
        }
    }
}

fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn skip<R: Read>(r: &mut R, n: u64) -> io::Result<()> {
    io::copy(&mut r.by_ref().take(n), &mut io::sink()).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    fn png(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        out.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0]));
        for c in chunks {
            out.extend_from_slice(c);
        }
        out
    }

    #[test]
    fn test_finds_datetime_in_exif_chunk() {
        let data = png(&[
            chunk(b"eXIf", b"MM\0*\0\0\0\x08junk2024:01:02 03:04:05\0more"),
            chunk(b"IEND", b""),
        ]);
        let ts = read_capture_time(&mut Cursor::new(data)).unwrap().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 03:04:05");
    }

    #[test]
    fn test_exif_chunk_after_image_data() {
        let data = png(&[
            chunk(b"IDAT", &[0u8; 4096]),
            chunk(b"eXIf", b"2022:12:31 23:59:59"),
        ]);
        let ts = read_capture_time(&mut Cursor::new(data)).unwrap().unwrap();
        assert_eq!(ts.to_string(), "2022-12-31 23:59:59");
    }

    #[test]
    fn test_no_exif_chunk_is_none() {
        let data = png(&[chunk(b"IDAT", &[1, 2, 3]), chunk(b"IEND", b"")]);
        assert_eq!(read_capture_time(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn test_exif_chunk_without_datetime_is_none() {
        let data = png(&[chunk(b"eXIf", b"MM\0*\0\0\0\x08"), chunk(b"IEND", b"")]);
        assert_eq!(read_capture_time(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn test_truncated_stream_is_none() {
        let mut data = png(&[chunk(b"IDAT", &[0u8; 64])]);
        data.truncate(data.len() - 30);
        assert_eq!(read_capture_time(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn test_bad_signature_is_error() {
        let result = read_capture_time(&mut Cursor::new(b"GIF89a......".to_vec()));
        assert!(matches!(result, Err(BackupError::Metadata(_))));
    }

    #[test]
    fn test_impossible_date_is_error() {
        let data = png(&[chunk(b"eXIf", b"2024:13:45 99:00:00")]);
        assert!(read_capture_time(&mut Cursor::new(data)).is_err());
    }
}
