//! HEIC/HEIF: IFD0 `DateTime` from the `Exif` item
//!
//! The EXIF block of an ISO-BMFF image is stored as an item: `meta/iinf`
//! names its type, `meta/iloc` says where its bytes live. The item payload
//! starts with a 4-byte offset to the TIFF header.

use super::tiff::{parse_exif_datetime, Tiff, TAG_DATE_TIME};
use crate::types::BackupError;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

// Bounds on what we are willing to buffer.
const MAX_META_BOX: u64 = 16 * 1024 * 1024;
const MAX_EXIF_ITEM: u64 = 4 * 1024 * 1024;

pub fn capture_time(path: &Path) -> Result<Option<NaiveDateTime>, BackupError> {
    let file = File::open(path)?;
    read_capture_time(&mut BufReader::new(file))
}

pub(crate) fn read_capture_time<R: Read + Seek>(
    r: &mut R,
) -> Result<Option<NaiveDateTime>, BackupError> {
    let Some(meta) = read_top_level_box(r, b"meta")? else {
        return Ok(None);
    };
    // meta is a FullBox: version + flags precede the children.
    let children = meta
        .get(4..)
        .ok_or_else(|| malformed("meta box too short"))?;

    let Some(iinf) = find_child(children, b"iinf")? else {
        return Ok(None);
    };
    let Some(item_id) = exif_item_id(iinf)? else {
        return Ok(None);
    };
    let iloc = find_child(children, b"iloc")?.ok_or_else(|| malformed("meta without iloc"))?;
    let location = item_location(iloc, item_id)?.ok_or_else(|| malformed("Exif item not in iloc"))?;

    let payload = match location.construction_method {
        0 => read_extents_from_file(r, &location.extents)?,
        1 => {
            let idat = find_child(children, b"idat")?.ok_or_else(|| malformed("missing idat"))?;
            read_extents_from_slice(idat, &location.extents)?
        }
        other => {
            return Err(malformed(&format!("unsupported construction method {}", other)));
        }
    };

    let header_offset = payload
        .get(0..4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .ok_or_else(|| malformed("Exif item too short"))?;
    let tiff_block = payload
        .get(4 + header_offset..)
        .ok_or_else(|| malformed("Exif TIFF offset out of bounds"))?;

    let tiff = Tiff::parse(tiff_block)?;
    match tiff.ifd0_ascii(TAG_DATE_TIME)? {
        Some(text) => parse_exif_datetime(text).map(Some),
        None => Ok(None),
    }
}

struct ItemLocation {
    construction_method: u8,
    // (absolute offset, length); length 0 means "to end of source".
    extents: Vec<(u64, u64)>,
}

/// Scan top-level boxes for `kind` and return its payload (header stripped).
fn read_top_level_box<R: Read + Seek>(r: &mut R, kind: &[u8; 4]) -> Result<Option<Vec<u8>>, BackupError> {
    let end = r.seek(SeekFrom::End(0))?;
    let mut pos = r.seek(SeekFrom::Start(0))?;

    while pos + 8 <= end {
        let mut header = [0u8; 8];
        r.read_exact(&mut header)?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let (box_len, header_len) = match size32 {
            0 => (end - pos, 8),
            1 => {
                let mut large = [0u8; 8];
                r.read_exact(&mut large)?;
                (u64::from_be_bytes(large), 16)
            }
            n => (u64::from(n), 8),
        };
        let box_end = pos
            .checked_add(box_len)
            .filter(|e| box_len >= header_len && *e <= end)
            .ok_or_else(|| malformed("box extends past end of file"))?;

        if &header[4..8] == kind {
            let payload_len = box_len - header_len;
            if payload_len > MAX_META_BOX {
                return Err(malformed("meta box too large"));
            }
            let mut payload = vec![0u8; payload_len as usize];
            r.read_exact(&mut payload)?;
            return Ok(Some(payload));
        }

        pos = r.seek(SeekFrom::Start(box_end))?;
    }
    Ok(None)
}

/// Find a direct child box in an in-memory payload.
fn find_child<'a>(mut buf: &'a [u8], kind: &[u8; 4]) -> Result<Option<&'a [u8]>, BackupError> {
    while buf.len() >= 8 {
        let size32 = be_u32(buf, 0)?;
        let (box_len, header_len) = match size32 {
            0 => (buf.len(), 8),
            1 => (usize::try_from(be_u64(buf, 8)?).map_err(|_| malformed("box size"))?, 16),
            n => (n as usize, 8),
        };
        if box_len < header_len || box_len > buf.len() {
            return Err(malformed("child box extends past parent"));
        }
        if &buf[4..8] == kind {
            return Ok(Some(&buf[header_len..box_len]));
        }
        buf = &buf[box_len..];
    }
    Ok(None)
}

/// `iinf` → item_ID of the first `infe` with item_type `Exif`.
fn exif_item_id(iinf: &[u8]) -> Result<Option<u32>, BackupError> {
    let version = *iinf.first().ok_or_else(|| malformed("empty iinf"))?;
    let mut off = 4;
    let entry_count = if version == 0 {
        let n = be_u16(iinf, off)? as u32;
        off += 2;
        n
    } else {
        let n = be_u32(iinf, off)?;
        off += 4;
        n
    };

    let mut rest = iinf.get(off..).ok_or_else(|| malformed("iinf truncated"))?;
    for _ in 0..entry_count {
        let Some(infe) = find_child(rest, b"infe")? else {
            break;
        };
        let consumed = infe.len() + 8;
        let infe_version = *infe.first().ok_or_else(|| malformed("empty infe"))?;
        // item_type only exists from version 2 on.
        if infe_version >= 2 {
            let (item_id, type_at) = if infe_version == 2 {
                (be_u16(infe, 4)? as u32, 8)
            } else {
                (be_u32(infe, 4)?, 10)
            };
            if infe.get(type_at..type_at + 4) == Some(b"Exif".as_slice()) {
                return Ok(Some(item_id));
            }
        }
        rest = rest.get(consumed..).unwrap_or_default();
    }
    Ok(None)
}

fn item_location(iloc: &[u8], wanted: u32) -> Result<Option<ItemLocation>, BackupError> {
    let version = *iloc.first().ok_or_else(|| malformed("empty iloc"))?;
    let sizes = be_u16(iloc, 4)?;
    let offset_size = (sizes >> 12) as usize;
    let length_size = ((sizes >> 8) & 0xF) as usize;
    let base_offset_size = ((sizes >> 4) & 0xF) as usize;
    let index_size = if version == 1 || version == 2 {
        (sizes & 0xF) as usize
    } else {
        0
    };

    let mut off = 6;
    let item_count = if version < 2 {
        let n = be_u16(iloc, off)? as u32;
        off += 2;
        n
    } else {
        let n = be_u32(iloc, off)?;
        off += 4;
        n
    };

    for _ in 0..item_count {
        let item_id = if version < 2 {
            let id = be_u16(iloc, off)? as u32;
            off += 2;
            id
        } else {
            let id = be_u32(iloc, off)?;
            off += 4;
            id
        };
        let construction_method = if version == 1 || version == 2 {
            let m = (be_u16(iloc, off)? & 0xF) as u8;
            off += 2;
            m
        } else {
            0
        };
        off += 2; // data_reference_index
        let base_offset = be_uint(iloc, off, base_offset_size)?;
        off += base_offset_size;
        let extent_count = be_u16(iloc, off)?;
        off += 2;

        let mut extents = Vec::with_capacity(extent_count as usize);
        for _ in 0..extent_count {
            off += index_size;
            let extent_offset = be_uint(iloc, off, offset_size)?;
            off += offset_size;
            let extent_length = be_uint(iloc, off, length_size)?;
            off += length_size;
            let absolute = base_offset
                .checked_add(extent_offset)
                .ok_or_else(|| malformed("extent offset overflows"))?;
            extents.push((absolute, extent_length));
        }

        if item_id == wanted {
            return Ok(Some(ItemLocation {
                construction_method,
                extents,
            }));
        }
    }
    Ok(None)
}

fn read_extents_from_file<R: Read + Seek>(r: &mut R, extents: &[(u64, u64)]) -> Result<Vec<u8>, BackupError> {
    let mut out = Vec::new();
    for &(offset, length) in extents {
        let total = (out.len() as u64).checked_add(length);
        if length == 0 || total.map_or(true, |t| t > MAX_EXIF_ITEM) {
            return Err(malformed("Exif extent length unsupported"));
        }
        r.seek(SeekFrom::Start(offset))?;
        let start = out.len();
        out.resize(start + length as usize, 0);
        r.read_exact(&mut out[start..])?;
    }
    Ok(out)
}

fn read_extents_from_slice(idat: &[u8], extents: &[(u64, u64)]) -> Result<Vec<u8>, BackupError> {
    let mut out = Vec::new();
    for &(offset, length) in extents {
        let start = usize::try_from(offset).map_err(|_| malformed("idat offset"))?;
        let end = if length == 0 {
            idat.len()
        } else {
            start.saturating_add(length as usize)
        };
        let bytes = idat
            .get(start..end)
            .ok_or_else(|| malformed("idat extent out of bounds"))?;
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

fn be_u16(buf: &[u8], off: usize) -> Result<u16, BackupError> {
    Ok(be_uint(buf, off, 2)? as u16)
}

fn be_u32(buf: &[u8], off: usize) -> Result<u32, BackupError> {
    Ok(be_uint(buf, off, 4)? as u32)
}

fn be_u64(buf: &[u8], off: usize) -> Result<u64, BackupError> {
    be_uint(buf, off, 8)
}

/// Big-endian unsigned integer of `size` bytes (0, 1, 2, 4 or 8).
fn be_uint(buf: &[u8], off: usize, size: usize) -> Result<u64, BackupError> {
    let bytes = off
        .checked_add(size)
        .and_then(|end| buf.get(off..end))
        .ok_or_else(|| malformed("box field out of bounds"))?;
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn malformed(what: &str) -> BackupError {
    BackupError::Metadata(format!("HEIF: {}", what))
}
