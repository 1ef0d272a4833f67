//! Byte-level media fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::{Local, NaiveDateTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// PNG signature followed by one `eXIf` chunk carrying `date` and `salt`.
pub fn png_with_exif(date: &str, salt: &[u8]) -> Vec<u8> {
    let mut payload = date.as_bytes().to_vec();
    payload.extend_from_slice(salt);

    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    push_png_chunk(&mut bytes, b"eXIf", &payload);
    push_png_chunk(&mut bytes, b"IEND", &[]);
    bytes
}

/// PNG with no metadata at all; `salt` lands in a `tEXt` chunk.
pub fn plain_png(salt: &[u8]) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    push_png_chunk(&mut bytes, b"tEXt", salt);
    push_png_chunk(&mut bytes, b"IEND", &[]);
    bytes
}

fn push_png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    // CRC is not checked by the reader.
    out.extend_from_slice(&[0, 0, 0, 0]);
}

/// JPEG whose APP1 Exif block carries `DateTimeOriginal = date`.
pub fn jpeg_with_date_time_original(date: &str, salt: &[u8]) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());

    // IFD0 at 8: one entry pointing at the Exif IFD at 26.
    tiff.extend_from_slice(&1u16.to_le_bytes());
    push_ifd_entry(&mut tiff, 0x8769, 4, 1, 26);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    // Exif IFD at 26: DateTimeOriginal, value at 44.
    tiff.extend_from_slice(&1u16.to_le_bytes());
    push_ifd_entry(&mut tiff, 0x9003, 2, 20, 44);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    tiff.extend_from_slice(date.as_bytes());
    tiff.push(0);

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);

    let mut bytes = vec![0xFF, 0xD8];
    push_jpeg_segment(&mut bytes, 0xE1, &app1);
    push_jpeg_segment(&mut bytes, 0xFE, salt);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// JPEG with only a comment segment.
pub fn plain_jpeg(salt: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    push_jpeg_segment(&mut bytes, 0xFE, salt);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

fn push_ifd_entry(out: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: u32) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&typ.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_jpeg_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Minimal MP4 `ftyp` header.
pub fn mp4(salt: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0, 0, 0, 0x18];
    bytes.extend_from_slice(b"ftypmp42");
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(b"mp42isom");
    bytes.extend_from_slice(salt);
    bytes
}

pub fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("fixture path has a parent"))
        .expect("create fixture dir");
    fs::write(&path, content).expect("write fixture");
    path
}

pub fn set_mtime_local(path: &Path, at: NaiveDateTime) {
    let local = Local
        .from_local_datetime(&at)
        .single()
        .expect("unambiguous local time");
    let system: SystemTime = local.into();
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(system))
        .expect("set mtime");
}

pub fn datetime(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").expect("valid fixture datetime")
}

/// Regular files under `root`, relative and `/`-joined, sorted; the state directory is left out.
pub fn listing(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).expect("read dir") {
            let entry = entry.expect("dir entry");
            let path = entry.path();
            if path.file_name().is_some_and(|n| n == ".shoebox") {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).expect("under root");
                out.push(
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/"),
                );
            }
        }
    }
    out.sort();
    out
}
