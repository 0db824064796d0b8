//! Tools for reading a ZIP archive.
//!
//! To start reading an archive, first create a [`ZipArchive`] from its bytes.
//! E-books are small enough that reading the whole file into memory is fine;
//! larger archives can be memory-mapped by the caller.
//!
//! [`ZipArchive`]: struct.ZipArchive.html

use std::borrow::Cow;
use std::io;

use camino::{Utf8Component, Utf8Path};
use chrono::NaiveDateTime;
use flate2::read::DeflateDecoder;
use log::*;

use crate::arch::usize;
use crate::crc_reader::Crc32Reader;
use crate::result::*;
use crate::spec;

/// The compression method used to store a file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// The file is uncompressed ("stored")
    None,
    /// The file is [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE)d.
    /// This is the most common format used by ZIP archives.
    Deflate,
    /// The file is compressed with a yet-unsupported format.
    /// (The u16 indicates the internal format code.)
    Unsupported(u16),
}

/// Metadata for a file or directory in the archive,
/// retrieved from its central directory
#[derive(Debug, PartialEq, Eq)]
pub struct FileMetadata<'a> {
    /// Uncompressed size of the file in bytes
    pub size: usize,

    /// Compressed size of the file in bytes
    pub compressed_size: usize,

    /// Compression algorithm used to store the file
    pub compression_method: CompressionMethod,

    /// The CRC-32 of the decompressed file
    pub crc32: u32,

    /// True if the file is encrypted (decryption is unsupported)
    pub encrypted: bool,

    /// The provided path of the file.
    pub path: Cow<'a, Utf8Path>,

    /// When the file was last modified, if the archive recorded a valid date
    pub last_modified: Option<NaiveDateTime>,

    /// Unix mode bits, if the file was archived on a Unix OS.
    pub unix_mode: Option<u32>,

    /// The offset to the local file header in the archive
    pub(crate) header_offset: usize,
}

impl FileMetadata<'_> {
    /// Returns true if the given entry is a directory
    pub fn is_dir(&self) -> bool {
        // Path::ends_with() doesn't consider separators,
        // so we need a different approach.
        self.size == 0 && self.path.as_str().ends_with('/')
    }

    /// Returns true if the given entry is a file
    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    /// Returns the entry's path if it's safe to join onto an extraction directory:
    /// relative, and never climbing out with `..`.
    pub fn safe_path(&self) -> ZipResult<&Utf8Path> {
        let path: &Utf8Path = &self.path;
        if path.as_str().is_empty() {
            return Err(ZipError::Hierarchy(String::from("Entry with an empty path")));
        }
        for component in path.components() {
            match component {
                Utf8Component::Prefix(prefix) => {
                    return Err(ZipError::Hierarchy(format!(
                        "Prefix {prefix} found in path {path}"
                    )));
                }
                Utf8Component::RootDir => {
                    return Err(ZipError::Hierarchy(format!(
                        "Root directory found in path {path}"
                    )));
                }
                Utf8Component::ParentDir => {
                    return Err(ZipError::Hierarchy(format!(
                        "Parent dir (..) found in path {path}"
                    )));
                }
                Utf8Component::CurDir => {
                    warn!("Current dir (.) found in path {path}");
                    // Harmless. Keep going.
                }
                Utf8Component::Normal(_) => {}
            }
        }
        Ok(path)
    }
}

/// A ZIP archive to be read
pub struct ZipArchive<'a> {
    /// The contents of the ZIP archive, as a byte slice.
    mapping: &'a [u8],
    /// A list of entries from the ZIP's central directory, in archive order
    entries: Vec<FileMetadata<'a>>,
}

impl<'a> ZipArchive<'a> {
    /// Reads a ZIP archive from a byte slice.
    ///
    /// ```no_run
    /// # use std::fs;
    /// # use epubio::ZipArchive;
    /// let bytes = fs::read("book.epub")?;
    /// let archive = ZipArchive::new(&bytes)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(mapping: &'a [u8]) -> ZipResult<Self> {
        let (archive, archive_offset) = Self::with_prepended_data(mapping)?;
        if archive_offset != 0 {
            return Err(ZipError::PrependedWithUnknownBytes(archive_offset));
        }
        Ok(archive)
    }

    /// Like `ZipArchive::new()`, but allows arbitrary data to prepend the archive.
    /// Returns the ZipArchive and the number of bytes prepended to the archive.
    ///
    /// Since a ZIP archive's metadata sits at the back of the file,
    /// tools sometimes stick other data (a stub, a signature) in front of it.
    pub fn with_prepended_data(mapping: &'a [u8]) -> ZipResult<(Self, usize)> {
        let eocdr_posit = spec::find_eocdr(mapping)?;
        let eocdr = spec::EndOfCentralDirectory::parse(&mapping[eocdr_posit..])?;
        trace!("{:?}", eocdr);

        if eocdr.disk_number != eocdr.disk_with_central_directory
            || eocdr.entries != eocdr.entries_on_this_disk
        {
            return Err(ZipError::UnsupportedArchive(format!(
                "No support for multi-disk archives: disk {} of {}, {} of {} entries",
                eocdr.disk_number,
                eocdr.disk_with_central_directory,
                eocdr.entries_on_this_disk,
                eocdr.entries
            )));
        }

        let locator_posit =
            eocdr_posit.checked_sub(spec::Zip64EndOfCentralDirectoryLocator::size_in_file());
        let locator = match locator_posit {
            Some(posit) => spec::Zip64EndOfCentralDirectoryLocator::parse(&mapping[posit..])?,
            None => None,
        };

        // Zip files can be prepended by arbitrary junk,
        // so all the stored positions might be off by some offset.
        let (archive_offset, nominal_offset, entry_count) = match (locator, locator_posit) {
            (Some(locator), Some(locator_posit)) => {
                trace!("{:?}", locator);
                if u32::from(eocdr.disk_number) != locator.disk_with_central_directory
                    || locator.disks != 1
                {
                    return Err(ZipError::UnsupportedArchive(format!(
                        "No support for multi-disk archives: Zip64 locator reports disk {} of {}",
                        locator.disk_with_central_directory, locator.disks
                    )));
                }

                // Search for the Zip64 EOCDR from its nominal position
                // up to the locator.
                let search_space = mapping
                    .get(usize(locator.zip64_eocdr_offset)?..locator_posit)
                    .ok_or(ZipError::InvalidArchive(
                        "Invalid Zip64 End Of Central Directory Record offset",
                    ))?;
                // Since we're searching from the nominal position,
                // the record's position in the search space is the archive offset.
                let zip64_eocdr_posit = spec::find_zip64_eocdr(search_space)?;
                let zip64_eocdr =
                    spec::Zip64EndOfCentralDirectory::parse(&search_space[zip64_eocdr_posit..])?;
                trace!("{:?}", zip64_eocdr);

                if zip64_eocdr.disk_number != zip64_eocdr.disk_with_central_directory
                    || zip64_eocdr.entries != zip64_eocdr.entries_on_this_disk
                {
                    return Err(ZipError::UnsupportedArchive(String::from(
                        "No support for multi-disk archives",
                    )));
                }
                (
                    zip64_eocdr_posit,
                    usize(zip64_eocdr.central_directory_offset)?,
                    zip64_eocdr.entries,
                )
            }
            _ => {
                // The central directory should end right where the EOCDR starts.
                // The offset is the actual position versus the stored one.
                let nominal_offset = usize(eocdr.central_directory_offset)?;
                let archive_offset = eocdr_posit
                    .checked_sub(usize(eocdr.central_directory_size)?)
                    .and_then(|actual| actual.checked_sub(nominal_offset))
                    .ok_or(ZipError::InvalidArchive(
                        "Invalid central directory size or offset",
                    ))?;
                (archive_offset, nominal_offset, u64::from(eocdr.entries))
            }
        };

        let mapping = &mapping[archive_offset..];
        trace!(
            "{} entries at nominal offset {}",
            entry_count,
            nominal_offset
        );
        let mut central_directory = mapping.get(nominal_offset..).ok_or(
            ZipError::InvalidArchive("Central directory offset out of bounds"),
        )?;

        // Don't trust the count to size the allocation:
        // every entry takes at least 46 bytes.
        let capacity = usize(entry_count)?.min(central_directory.len() / 46);
        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..entry_count {
            let dir_entry = spec::CentralDirectoryEntry::parse_and_consume(&mut central_directory)?;
            trace!("{:?}", dir_entry);

            let file_metadata = FileMetadata::from_cde(&dir_entry)?;
            debug!("{:?}", file_metadata);
            entries.push(file_metadata);
        }

        Ok((ZipArchive { mapping, entries }, archive_offset))
    }

    /// Returns the entries found in the ZIP archive's central directory,
    /// in the order they appear there.
    ///
    /// No effort is made to deduplicate or otherwise validate these entries.
    pub fn entries(&self) -> &[FileMetadata<'a>] {
        &self.entries
    }

    /// Reads the given file from the ZIP archive.
    ///
    /// The returned reader fails at EOF if the data doesn't match
    /// the CRC-32 and size recorded for it.
    pub fn read(&self, metadata: &FileMetadata) -> ZipResult<Box<dyn io::Read + Send + 'a>> {
        let mut file_slice = self
            .mapping
            .get(metadata.header_offset..)
            .ok_or(ZipError::InvalidArchive("Local file header offset out of bounds"))?;
        let local_header = spec::LocalFileHeader::parse_and_consume(&mut file_slice)?;
        trace!("{:?}", local_header);
        debug!("Reading {}", metadata.path);
        if cfg!(feature = "check-local-metadata") && !metadata.matches_local_header(&local_header)? {
            return Err(ZipError::InvalidArchive(
                "Central directory entry doesn't match local file header",
            ));
        }

        if metadata.encrypted {
            return Err(ZipError::UnsupportedArchive(format!(
                "Can't read encrypted file {}",
                metadata.path
            )));
        }

        let data = file_slice
            .get(..metadata.compressed_size)
            .ok_or(ZipError::InvalidArchive("File data runs past the end of the archive"))?;
        make_reader(
            metadata.compression_method,
            metadata.crc32,
            metadata.size as u64,
            io::Cursor::new(data),
        )
    }
}

/// Returns a boxed read trait for a compressed file,
/// given its compression method, expected CRC and uncompressed size.
fn make_reader<'a, R: io::Read + Send + 'a>(
    compression_method: CompressionMethod,
    crc32: u32,
    size: u64,
    reader: R,
) -> ZipResult<Box<dyn io::Read + Send + 'a>> {
    match compression_method {
        CompressionMethod::None => Ok(Box::new(Crc32Reader::new(reader, crc32, size))),
        CompressionMethod::Deflate => {
            let deflate_reader = DeflateDecoder::new(reader);
            Ok(Box::new(Crc32Reader::new(deflate_reader, crc32, size)))
        }
        CompressionMethod::Unsupported(method) => Err(ZipError::UnsupportedArchive(format!(
            "Compression method {method} not supported"
        ))),
    }
}
