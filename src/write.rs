//! Tools for writing a ZIP archive.
//!
//! [`ZipWriter`] lays members out one after another in the order they're
//! started, which is what lets an EPUB put its `mimetype` first.
//! Each local file header is written up front with a blank CRC and sizes,
//! then patched in place once the member's data is done,
//! so the output never needs data descriptors.
//!
//! [`ZipWriter`]: struct.ZipWriter.html

use std::io::{self, Seek, SeekFrom, Write};
use std::mem;

use chrono::{Local, NaiveDateTime};
use crc32fast::Hasher;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::*;

use crate::arch::{u16_field, u32_field};
use crate::read::CompressionMethod;
use crate::result::*;
use crate::spec::{self, System};

/// How a single member gets written
#[derive(Debug, Clone, Copy)]
pub struct EntryOptions {
    pub compression_method: CompressionMethod,
    pub last_modified: NaiveDateTime,
    /// Unix mode bits (including the file type) to record, if any
    pub unix_mode: Option<u32>,
}

impl Default for EntryOptions {
    /// Deflated, stamped with the current local time, no mode bits.
    fn default() -> Self {
        Self {
            compression_method: CompressionMethod::Deflate,
            last_modified: Local::now().naive_local(),
            unix_mode: None,
        }
    }
}

impl EntryOptions {
    pub fn compression_method(self, compression_method: CompressionMethod) -> Self {
        Self {
            compression_method,
            ..self
        }
    }

    pub fn last_modified(self, last_modified: NaiveDateTime) -> Self {
        Self {
            last_modified,
            ..self
        }
    }

    pub fn unix_mode(self, unix_mode: u32) -> Self {
        Self {
            unix_mode: Some(unix_mode),
            ..self
        }
    }
}

/// Where bytes go: straight to the underlying writer, or through a compressor.
enum Sink<W: Write> {
    Plain(W),
    Deflate(DeflateEncoder<W>),
    /// Only seen if finishing a compressor failed midway.
    Poisoned,
}

/// A member whose data is still being written
struct Pending {
    name: String,
    options: EntryOptions,
    header_offset: u64,
    data_offset: u64,
    hasher: Hasher,
    size: u64,
}

/// Everything the central directory needs to know about a finished member
struct Written {
    name: String,
    options: EntryOptions,
    header_offset: u32,
    crc32: u32,
    compressed_size: u32,
    size: u32,
}

/// Writes a ZIP archive to a seekable sink.
///
/// ```no_run
/// # use std::fs::File;
/// # use std::io::Write;
/// # use epubio::{CompressionMethod, EntryOptions, ZipWriter};
/// let mut zip = ZipWriter::new(File::create("out.zip")?);
/// zip.start_file("hello.txt", EntryOptions::default())?;
/// zip.write_all(b"Hello, world!")?;
/// zip.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ZipWriter<W: Write + Seek> {
    sink: Sink<W>,
    current: Option<Pending>,
    finished: Vec<Written>,
}

impl<W: Write + Seek> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            sink: Sink::Plain(inner),
            current: None,
            finished: Vec::new(),
        }
    }

    /// Names of the members written so far, in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.finished.iter().map(|w| w.name.as_str())
    }

    /// Starts a new member, finishing the previous one.
    /// Subsequent writes go to this member until the next `start_file()`
    /// or `finish()`.
    pub fn start_file<S: Into<String>>(&mut self, name: S, options: EntryOptions) -> ZipResult<()> {
        self.finish_file()?;

        let name = name.into();
        if name.is_empty() {
            return Err(ZipError::InvalidPath(String::from("Empty member name")));
        }
        if name.len() > u16::MAX as usize {
            return Err(ZipError::InvalidPath(format!(
                "Member name is {} bytes long",
                name.len()
            )));
        }
        if let CompressionMethod::Unsupported(method) = options.compression_method {
            return Err(ZipError::UnsupportedArchive(format!(
                "Can't write compression method {method}"
            )));
        }

        let mut inner = self.take_plain()?;
        let header_offset = inner.stream_position()?;
        let (time, date) = spec::to_msdos(&options.last_modified);
        spec::LocalFileHeader {
            minimum_extract_version: spec::version_needed(),
            flags: spec::flags_for_name(&name),
            compression_method: options.compression_method.as_u16(),
            last_modified_time: time,
            last_modified_date: date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            path: name.as_bytes(),
            extra_field: &[],
        }
        .write(&mut inner)?;
        let data_offset = inner.stream_position()?;
        debug!("Starting {name} at offset {header_offset}");

        self.sink = match options.compression_method {
            CompressionMethod::Deflate => {
                Sink::Deflate(DeflateEncoder::new(inner, Compression::default()))
            }
            _ => Sink::Plain(inner),
        };
        self.current = Some(Pending {
            name,
            options,
            header_offset,
            data_offset,
            hasher: Hasher::new(),
            size: 0,
        });
        Ok(())
    }

    /// Flushes any compressor and hands back the underlying writer.
    fn take_plain(&mut self) -> ZipResult<W> {
        match mem::replace(&mut self.sink, Sink::Poisoned) {
            Sink::Plain(w) => Ok(w),
            Sink::Deflate(encoder) => Ok(encoder.finish()?),
            Sink::Poisoned => Err(ZipError::Io(io::Error::new(
                io::ErrorKind::Other,
                "Archive writer is unusable after an earlier failure",
            ))),
        }
    }

    /// Closes out the current member (if any),
    /// going back to fill in its local header.
    fn finish_file(&mut self) -> ZipResult<()> {
        let pending = match self.current.take() {
            Some(p) => p,
            None => return Ok(()),
        };
        let mut inner = self.take_plain()?;
        let data_end = inner.stream_position()?;

        let crc32 = pending.hasher.finalize();
        let compressed_size = u32_field(data_end - pending.data_offset, "compressed size")?;
        let size = u32_field(pending.size, "file size")?;
        let header_offset = u32_field(pending.header_offset, "header offset")?;

        inner.seek(SeekFrom::Start(
            pending.header_offset + spec::LOCAL_HEADER_CRC_OFFSET,
        ))?;
        spec::write_local_sizes(&mut inner, crc32, compressed_size, size)?;
        inner.seek(SeekFrom::Start(data_end))?;
        trace!(
            "Finished {}: {size} bytes, {compressed_size} compressed, crc {crc32:08x}",
            pending.name
        );

        self.sink = Sink::Plain(inner);
        self.finished.push(Written {
            name: pending.name,
            options: pending.options,
            header_offset,
            crc32,
            compressed_size,
            size,
        });
        Ok(())
    }

    /// Writes the central directory and returns the underlying writer.
    pub fn finish(mut self) -> ZipResult<W> {
        self.finish_file()?;
        let mut inner = self.take_plain()?;

        let central_directory_offset = inner.stream_position()?;
        for written in &self.finished {
            let (time, date) = spec::to_msdos(&written.options.last_modified);
            let (system, external_file_attributes) = match written.options.unix_mode {
                Some(mode) => (System::Unix, mode << 16),
                None => (System::Dos, 0),
            };
            spec::CentralDirectoryEntry {
                source_version: system.source_version(),
                minimum_extract_version: spec::version_needed(),
                flags: spec::flags_for_name(&written.name),
                compression_method: written.options.compression_method.as_u16(),
                last_modified_time: time,
                last_modified_date: date,
                crc32: written.crc32,
                compressed_size: written.compressed_size,
                uncompressed_size: written.size,
                disk_number: 0,
                internal_file_attributes: 0,
                external_file_attributes,
                header_offset: written.header_offset,
                path: written.name.as_bytes(),
                extra_field: &[],
                file_comment: &[],
            }
            .write(&mut inner)?;
        }
        let central_directory_end = inner.stream_position()?;

        let entries = u16_field(self.finished.len(), "entry count")?;
        spec::EndOfCentralDirectory {
            disk_number: 0,
            disk_with_central_directory: 0,
            entries_on_this_disk: entries,
            entries,
            central_directory_size: u32_field(
                central_directory_end - central_directory_offset,
                "central directory size",
            )?,
            central_directory_offset: u32_field(
                central_directory_offset,
                "central directory offset",
            )?,
            file_comment: &[],
        }
        .write(&mut inner)?;
        inner.flush()?;
        debug!("Wrote central directory with {entries} entries");
        Ok(inner)
    }
}

impl<W: Write + Seek> Write for ZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pending = self.current.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "No archive member has been started")
        })?;
        let count = match &mut self.sink {
            Sink::Plain(w) => w.write(buf)?,
            Sink::Deflate(encoder) => encoder.write(buf)?,
            Sink::Poisoned => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "Archive writer is unusable after an earlier failure",
                ))
            }
        };
        pending.hasher.update(&buf[..count]);
        pending.size += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Plain(w) => w.flush(),
            Sink::Deflate(encoder) => encoder.flush(),
            Sink::Poisoned => Ok(()),
        }
    }
}
