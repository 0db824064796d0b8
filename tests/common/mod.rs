//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use epubio::{CompressionMethod, ZipArchive};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Writes `files` (relative path, contents) under `root`, creating directories.
pub fn populate(root: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("Couldn't write {}", path.display()))?;
    }
    Ok(())
}

/// Every regular file under `root`, keyed by its `/`-separated relative path.
pub fn snapshot(root: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(key, fs::read(entry.path())?);
    }
    Ok(files)
}

/// One member of an archive, as read back out of it
#[derive(Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub method: CompressionMethod,
    pub contents: Vec<u8>,
}

/// Reads every member of the archive at `path`, in archive order.
pub fn members(path: &Path) -> Result<Vec<Member>> {
    let bytes = fs::read(path)?;
    let archive = ZipArchive::new(&bytes).context("Couldn't load archive")?;
    let mut members = Vec::new();
    for entry in archive.entries() {
        let mut contents = Vec::new();
        archive.read(entry)?.read_to_end(&mut contents)?;
        members.push(Member {
            name: entry.path.to_string(),
            method: entry.compression_method,
            contents,
        });
    }
    Ok(members)
}

fn put16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Fields that overflowed into a Zip64 extra field hold this instead.
const SATURATED: u32 = u32::MAX;

/// Builds a stored archive the way Zip64-happy writers do:
/// every local header leaves its sizes saturated and carries them
/// in a Zip64 extended information field instead.
///
/// With `zip64_records`, the central directory does the same with its sizes
/// and offsets, and is found through Zip64 end of central directory records.
pub fn zip64_archive(files: &[(&str, &[u8])], zip64_records: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    let date = (1 << 5) | 1; // 1980-01-01

    for (name, contents) in files {
        let offset = out.len() as u64;
        let crc = crc32fast::hash(contents);
        let size = contents.len() as u64;

        out.extend_from_slice(b"PK\x03\x04");
        put16(&mut out, 45); // version needed: Zip64
        put16(&mut out, 0); // flags
        put16(&mut out, 0); // stored
        put16(&mut out, 0); // time
        put16(&mut out, date);
        put32(&mut out, crc);
        put32(&mut out, SATURATED);
        put32(&mut out, SATURATED);
        put16(&mut out, name.len() as u16);
        put16(&mut out, 20);
        out.extend_from_slice(name.as_bytes());
        put16(&mut out, 0x0001);
        put16(&mut out, 16);
        put64(&mut out, size);
        put64(&mut out, size);
        out.extend_from_slice(contents);

        central.extend_from_slice(b"PK\x01\x02");
        put16(&mut central, 45); // made by
        put16(&mut central, 45); // needed
        put16(&mut central, 0);
        put16(&mut central, 0);
        put16(&mut central, 0);
        put16(&mut central, date);
        put32(&mut central, crc);
        if zip64_records {
            put32(&mut central, SATURATED);
            put32(&mut central, SATURATED);
        } else {
            put32(&mut central, size as u32);
            put32(&mut central, size as u32);
        }
        put16(&mut central, name.len() as u16);
        put16(&mut central, if zip64_records { 28 } else { 0 });
        put16(&mut central, 0); // comment
        put16(&mut central, 0); // disk
        put16(&mut central, 0); // internal attributes
        put32(&mut central, 0); // external attributes
        put32(
            &mut central,
            if zip64_records { SATURATED } else { offset as u32 },
        );
        central.extend_from_slice(name.as_bytes());
        if zip64_records {
            put16(&mut central, 0x0001);
            put16(&mut central, 24);
            put64(&mut central, size);
            put64(&mut central, size);
            put64(&mut central, offset);
        }
    }

    let central_offset = out.len() as u64;
    let central_size = central.len() as u64;
    let entries = files.len() as u64;
    out.extend_from_slice(&central);

    if zip64_records {
        let zip64_eocdr_offset = out.len() as u64;
        out.extend_from_slice(b"PK\x06\x06");
        put64(&mut out, 44); // size of the rest of the record
        put16(&mut out, 45);
        put16(&mut out, 45);
        put32(&mut out, 0);
        put32(&mut out, 0);
        put64(&mut out, entries);
        put64(&mut out, entries);
        put64(&mut out, central_size);
        put64(&mut out, central_offset);

        out.extend_from_slice(b"PK\x06\x07");
        put32(&mut out, 0);
        put64(&mut out, zip64_eocdr_offset);
        put32(&mut out, 1);
    }

    out.extend_from_slice(b"PK\x05\x06");
    put16(&mut out, 0);
    put16(&mut out, 0);
    if zip64_records {
        put16(&mut out, u16::MAX);
        put16(&mut out, u16::MAX);
        put32(&mut out, SATURATED);
        put32(&mut out, SATURATED);
    } else {
        put16(&mut out, entries as u16);
        put16(&mut out, entries as u16);
        put32(&mut out, central_size as u32);
        put32(&mut out, central_offset as u32);
    }
    put16(&mut out, 0); // comment
    out
}
