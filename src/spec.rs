//! Code specific to the ZIP file format specification.
//!
//! We try to keep the nitty gritty (record layouts, magic numbers,
//! MS-DOS timestamps) here, and higher-level stuff in the [`read`] and
//! [`write`] modules.
//!
//! Most comments quote the ZIP spec, [`APPNOTE.TXT`].
//!
//! [`read`]: ../read/index.html
//! [`write`]: ../write/index.html
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT

use std::borrow::Cow;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use codepage_437::*;
use memchr::memmem;

use crate::arch::usize;
use crate::read::{CompressionMethod, FileMetadata};
use crate::result::*;

// Magic numbers denoting various sections of a ZIP archive

/// End of central directory magic number
const EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 5, 6];
/// Zip64 end of central directory magic number
const ZIP64_EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 6, 6];
/// Zip64 end of central directory locator magic number
const ZIP64_EOCDR_LOCATOR_MAGIC: [u8; 4] = [b'P', b'K', 6, 7];
/// Central directory magic number
const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
/// Local file header magic number
pub const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];

/// Offset of the CRC-32 field from the start of a local file header.
/// The compressed and uncompressed sizes follow it.
pub const LOCAL_HEADER_CRC_OFFSET: u64 = 14;

/// Version 2.0: the minimum for deflate and folders.
const VERSION_NEEDED: u16 = 20;

/// Language encoding flag (EFS)
const FLAG_UTF8: u16 = 1 << 11;
/// CRC and sizes follow the data instead of living in the local header
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_ENCRYPTED: u16 = 1;

/// Header ID of the Zip64 extended information extra field
const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;

impl CompressionMethod {
    fn from_u16(u: u16) -> Self {
        match u {
            0 => CompressionMethod::None,
            8 => CompressionMethod::Deflate,
            v => CompressionMethod::Unsupported(v),
        }
    }

    pub(crate) fn as_u16(self) -> u16 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

/// The OS a file in the archive was compressed with.
/// Used to decode additional metadata like permissions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum System {
    Dos,
    Unix,
    Unknown,
}

impl System {
    fn from_source_version(source_version: u16) -> Self {
        // 4.4.2.1 The upper byte indicates the compatibility of the file
        // attribute information. [...]
        //
        //  0 - MS-DOS and OS/2 (FAT / VFAT / FAT32 file systems)
        //  3 - UNIX
        match source_version >> 8 {
            0 => System::Dos,
            3 => System::Unix,
            _ => System::Unknown,
        }
    }

    /// The "version made by" field for entries we write.
    pub fn source_version(self) -> u16 {
        let host = match self {
            System::Unix => 3,
            System::Dos | System::Unknown => 0,
        };
        (host << 8) | VERSION_NEEDED
    }
}

/// Splits `len` bytes off the front of `input`,
/// complaining instead of panicking if a record was cut short.
fn take<'a>(input: &mut &'a [u8], len: usize) -> ZipResult<&'a [u8]> {
    if input.len() < len {
        return Err(ZipError::InvalidArchive("Record runs past the end of the archive"));
    }
    let (front, rest) = input.split_at(len);
    *input = rest;
    Ok(front)
}

/// Reads a little-endian u64 from the front of the provided slice, shrinking it.
fn read_u64(input: &mut &[u8]) -> ZipResult<u64> {
    let b = take(input, 8)?;
    Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
}

/// Reads a little-endian u32 from the front of the provided slice, shrinking it.
fn read_u32(input: &mut &[u8]) -> ZipResult<u32> {
    let b = take(input, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Reads a little-endian u16 from the front of the provided slice, shrinking it.
fn read_u16(input: &mut &[u8]) -> ZipResult<u16> {
    let b = take(input, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn put_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn put_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Data from the End of central directory record
///
/// Found at the back of the ZIP archive and provides offsets for finding
/// its central directory.
#[derive(Debug)]
pub struct EndOfCentralDirectory<'a> {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub file_comment: &'a [u8],
}

impl<'a> EndOfCentralDirectory<'a> {
    // 4.3.16  End of central directory record:
    //
    // end of central dir signature    4 bytes  (0x06054b50)
    // number of this disk             2 bytes
    // number of the disk with the
    // start of the central directory  2 bytes
    // total number of entries in
    // the central dir on this disk    2 bytes
    // total number of entries in
    // the central dir                 2 bytes
    // size of the central directory   4 bytes
    // offset of start of central
    // directory with respect to
    // the starting disk number        4 bytes
    // zipfile comment length          2 bytes

    pub fn parse(mut eocdr: &'a [u8]) -> ZipResult<Self> {
        if take(&mut eocdr, 4)? != EOCDR_MAGIC {
            return Err(ZipError::InvalidArchive(
                "Invalid End Of Central Directory Record",
            ));
        }
        let disk_number = read_u16(&mut eocdr)?;
        let disk_with_central_directory = read_u16(&mut eocdr)?;
        let entries_on_this_disk = read_u16(&mut eocdr)?;
        let entries = read_u16(&mut eocdr)?;
        let central_directory_size = read_u32(&mut eocdr)?;
        let central_directory_offset = read_u32(&mut eocdr)?;
        let comment_length = usize(read_u16(&mut eocdr)?)?;
        let file_comment = take(&mut eocdr, comment_length)?;

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_size,
            central_directory_offset,
            file_comment,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> ZipResult<()> {
        w.write_all(&EOCDR_MAGIC)?;
        put_u16(w, self.disk_number)?;
        put_u16(w, self.disk_with_central_directory)?;
        put_u16(w, self.entries_on_this_disk)?;
        put_u16(w, self.entries)?;
        put_u32(w, self.central_directory_size)?;
        put_u32(w, self.central_directory_offset)?;
        put_u16(w, crate::arch::u16_field(self.file_comment.len(), "archive comment")?)?;
        w.write_all(self.file_comment)?;
        Ok(())
    }
}

/// Searches backward through `mapping` to find the
/// End of central directory record.
///
/// It should be right at the end of the file,
/// but its variable size means we can't jump to a known offset.
pub fn find_eocdr(mapping: &[u8]) -> ZipResult<usize> {
    memmem::rfind(mapping, &EOCDR_MAGIC).ok_or(ZipError::InvalidArchive(
        "Couldn't find End Of Central Directory Record",
    ))
}

/// Data from the Zip64 end of central directory locator
///
/// This immediately precedes the End of central directory record
/// on Zip64 archives and tells us where to find the Zip64 End of
/// central directory record.
#[derive(Debug)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_central_directory: u32,
    pub zip64_eocdr_offset: u64,
    pub disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    // 4.3.15 Zip64 end of central directory locator
    //
    // zip64 end of central dir locator
    // signature                       4 bytes  (0x07064b50)
    // number of the disk with the
    // start of the zip64 end of
    // central directory               4 bytes
    // relative offset of the zip64
    // end of central directory record 8 bytes
    // total number of disks           4 bytes

    /// Parses a locator from the front of `mapping`,
    /// or returns `None` if there isn't one there.
    pub fn parse(mut mapping: &[u8]) -> ZipResult<Option<Self>> {
        if !mapping.starts_with(&ZIP64_EOCDR_LOCATOR_MAGIC) {
            return Ok(None);
        }
        take(&mut mapping, 4)?;
        let disk_with_central_directory = read_u32(&mut mapping)?;
        let zip64_eocdr_offset = read_u64(&mut mapping)?;
        let disks = read_u32(&mut mapping)?;
        Ok(Some(Self {
            disk_with_central_directory,
            zip64_eocdr_offset,
            disks,
        }))
    }

    pub fn size_in_file() -> usize {
        20
    }
}

/// Data from the Zip64 end of central directory record
///
/// Holds 64-bit versions of the End of central directory record's
/// counts and offsets.
#[derive(Debug)]
pub struct Zip64EndOfCentralDirectory<'a> {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub disk_number: u32,
    pub disk_with_central_directory: u32,
    pub entries_on_this_disk: u64,
    pub entries: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
    pub extensible_data: &'a [u8],
}

impl<'a> Zip64EndOfCentralDirectory<'a> {
    // 4.3.14  Zip64 end of central directory record
    //
    // zip64 end of central dir
    // signature                       4 bytes  (0x06064b50)
    // size of zip64 end of central
    // directory record                8 bytes
    // version made by                 2 bytes
    // version needed to extract       2 bytes
    // number of this disk             4 bytes
    // number of the disk with the
    // start of the central directory  4 bytes
    // total number of entries in the
    // central directory on this disk  8 bytes
    // total number of entries in the
    // central directory               8 bytes
    // size of the central directory   8 bytes
    // offset of start of central
    // directory with respect to
    // the starting disk number        8 bytes
    // zip64 extensible data sector    (variable size)

    /// Parses the record from `eocdr`, which should run exactly to the
    /// Zip64 end of central directory locator.
    pub fn parse(mut eocdr: &'a [u8]) -> ZipResult<Self> {
        if take(&mut eocdr, 4)? != ZIP64_EOCDR_MAGIC {
            return Err(ZipError::InvalidArchive(
                "Invalid Zip64 End Of Central Directory Record",
            ));
        }
        let eocdr_size = usize(read_u64(&mut eocdr)?)?;
        let source_version = read_u16(&mut eocdr)?;
        let minimum_extract_version = read_u16(&mut eocdr)?;
        let disk_number = read_u32(&mut eocdr)?;
        let disk_with_central_directory = read_u32(&mut eocdr)?;
        let entries_on_this_disk = read_u64(&mut eocdr)?;
        let entries = read_u64(&mut eocdr)?;
        let central_directory_size = read_u64(&mut eocdr)?;
        let central_directory_offset = read_u64(&mut eocdr)?;

        // 4.3.14.1 The value stored into the "size of zip64 end of central
        // directory record" SHOULD be the size of the remaining
        // record and SHOULD NOT include the leading 12 bytes.
        //
        // Whatever follows the fixed fields is the extensible data.
        let extensible_data_length = eocdr_size
            .checked_add(12)
            .and_then(|size| size.checked_sub(Self::fixed_size_in_file()))
            .ok_or(ZipError::InvalidArchive(
                "Invalid extensible data length in Zip64 End Of Central Directory Record",
            ))?;
        if eocdr.len() != extensible_data_length {
            return Err(ZipError::InvalidArchive(
                "Invalid extensible data length in Zip64 End Of Central Directory Record",
            ));
        }

        Ok(Self {
            source_version,
            minimum_extract_version,
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_size,
            central_directory_offset,
            extensible_data: eocdr,
        })
    }

    fn fixed_size_in_file() -> usize {
        56
    }
}

/// Finds the Zip64 end of central directory record in the given slice.
///
/// The slice should start at the record's nominal location,
/// but anything prepended to the archive pushes it further back.
pub fn find_zip64_eocdr(mapping: &[u8]) -> ZipResult<usize> {
    memmem::find(mapping, &ZIP64_EOCDR_MAGIC).ok_or(ZipError::InvalidArchive(
        "Couldn't find Zip64 End Of Central Directory Record",
    ))
}

/// Data from a central directory entry
///
/// Each of these records contains information about a file or folder
/// stored in the ZIP archive.
#[derive(Debug)]
pub struct CentralDirectoryEntry<'a> {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub header_offset: u32,
    pub path: &'a [u8],
    pub extra_field: &'a [u8],
    pub file_comment: &'a [u8],
}

impl<'a> CentralDirectoryEntry<'a> {
    // 4.3.12  Central directory structure, File header:
    //
    //   central file header signature   4 bytes  (0x02014b50)
    //   version made by                 2 bytes
    //   version needed to extract       2 bytes
    //   general purpose bit flag        2 bytes
    //   compression method              2 bytes
    //   last mod file time              2 bytes
    //   last mod file date              2 bytes
    //   crc-32                          4 bytes
    //   compressed size                 4 bytes
    //   uncompressed size               4 bytes
    //   file name length                2 bytes
    //   extra field length              2 bytes
    //   file comment length             2 bytes
    //   disk number start               2 bytes
    //   internal file attributes        2 bytes
    //   external file attributes        4 bytes
    //   relative offset of local header 4 bytes
    //
    //   file name (variable size)
    //   extra field (variable size)
    //   file comment (variable size)

    pub fn parse_and_consume(entry: &mut &'a [u8]) -> ZipResult<Self> {
        if take(entry, 4)? != CENTRAL_DIRECTORY_MAGIC {
            return Err(ZipError::InvalidArchive("Invalid central directory entry"));
        }
        let source_version = read_u16(entry)?;
        let minimum_extract_version = read_u16(entry)?;
        let flags = read_u16(entry)?;
        let compression_method = read_u16(entry)?;
        let last_modified_time = read_u16(entry)?;
        let last_modified_date = read_u16(entry)?;
        let crc32 = read_u32(entry)?;
        let compressed_size = read_u32(entry)?;
        let uncompressed_size = read_u32(entry)?;
        let path_length = usize(read_u16(entry)?)?;
        let extra_field_length = usize(read_u16(entry)?)?;
        let file_comment_length = usize(read_u16(entry)?)?;
        let disk_number = read_u16(entry)?;
        let internal_file_attributes = read_u16(entry)?;
        let external_file_attributes = read_u32(entry)?;
        let header_offset = read_u32(entry)?;
        let path = take(entry, path_length)?;
        let extra_field = take(entry, extra_field_length)?;
        let file_comment = take(entry, file_comment_length)?;

        Ok(Self {
            source_version,
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number,
            internal_file_attributes,
            external_file_attributes,
            header_offset,
            path,
            extra_field,
            file_comment,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> ZipResult<()> {
        w.write_all(&CENTRAL_DIRECTORY_MAGIC)?;
        put_u16(w, self.source_version)?;
        put_u16(w, self.minimum_extract_version)?;
        put_u16(w, self.flags)?;
        put_u16(w, self.compression_method)?;
        put_u16(w, self.last_modified_time)?;
        put_u16(w, self.last_modified_date)?;
        put_u32(w, self.crc32)?;
        put_u32(w, self.compressed_size)?;
        put_u32(w, self.uncompressed_size)?;
        put_u16(w, crate::arch::u16_field(self.path.len(), "file name length")?)?;
        put_u16(w, crate::arch::u16_field(self.extra_field.len(), "extra field length")?)?;
        put_u16(w, crate::arch::u16_field(self.file_comment.len(), "file comment length")?)?;
        put_u16(w, self.disk_number)?;
        put_u16(w, self.internal_file_attributes)?;
        put_u32(w, self.external_file_attributes)?;
        put_u32(w, self.header_offset)?;
        w.write_all(self.path)?;
        w.write_all(self.extra_field)?;
        w.write_all(self.file_comment)?;
        Ok(())
    }
}

/// Returns the flags an entry with the given name should carry.
pub fn flags_for_name(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        FLAG_UTF8
    }
}

/// Decodes an entry name: UTF-8 if the EFS flag says so, CP437 otherwise.
fn decode_path(flags: u16, raw: &[u8]) -> ZipResult<Cow<'_, Utf8Path>> {
    // Bit 11: Language encoding flag (EFS).  If this bit is set,
    //         the filename and comment fields for this file
    //         MUST be encoded using UTF-8. (see APPENDIX D)
    if flags & FLAG_UTF8 != 0 {
        let utf8 = std::str::from_utf8(raw)?;
        return Ok(Cow::Borrowed(Utf8Path::new(utf8)));
    }
    let str_cow: Cow<str> = Cow::borrow_from_cp437(raw, &CP437_CONTROL);
    Ok(match str_cow {
        Cow::Borrowed(s) => Cow::Borrowed(Utf8Path::new(s)),
        Cow::Owned(s) => Cow::Owned(Utf8PathBuf::from(s)),
    })
}

/// Which kind of header an extra field came from.
/// They disagree on which Zip64 values they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Central,
    Local,
}

/// An entry's sizes and position, widened to what Zip64 allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WideFields {
    size: u64,
    compressed_size: u64,
    header_offset: u64,
    disk_number: u32,
}

impl WideFields {
    /// Replaces saturated (all ones) fields with their values from the
    /// Zip64 extended information extra field, if there is one.
    fn widen(&mut self, mut extra_field: &[u8], kind: HeaderKind) -> ZipResult<()> {
        // 4.5.1 In order to allow different programs and different types
        // of information to be stored in the 'extra' field in .ZIP
        // files, the following structure MUST be used for all
        // programs storing data in this field:
        //
        //     header1+data1 + header2+data2 . . .
        //
        // Each header MUST consist of:
        //
        //     Header ID - 2 bytes
        //     Data Size - 2 bytes
        while !extra_field.is_empty() {
            let id = read_u16(&mut extra_field)?;
            let data_size = usize(read_u16(&mut extra_field)?)?;
            let mut data = take(&mut extra_field, data_size)?;
            if id != ZIP64_EXTRA_FIELD_ID {
                continue;
            }

            // 4.5.3 The order of the fields in the zip64 extended
            // information record is fixed, but the fields MUST
            // only appear if the corresponding Local or Central
            // directory record field is set to 0xFFFF or 0xFFFFFFFF.
            //
            // [...] This entry in the Local header MUST include BOTH
            // original and compressed file size fields.
            let saturated = |v: u64| v == u64::from(u32::MAX);
            let (size, compressed_size, header_offset, disk_number) = match kind {
                HeaderKind::Central => (
                    saturated(self.size),
                    saturated(self.compressed_size),
                    saturated(self.header_offset),
                    self.disk_number == u32::from(u16::MAX),
                ),
                HeaderKind::Local => {
                    let either = saturated(self.size) || saturated(self.compressed_size);
                    (either, either, false, false)
                }
            };
            if size {
                self.size = read_u64(&mut data)?;
            }
            if compressed_size {
                self.compressed_size = read_u64(&mut data)?;
            }
            if header_offset {
                self.header_offset = read_u64(&mut data)?;
            }
            if disk_number {
                self.disk_number = read_u32(&mut data)?;
            }
            // Anything left over (sizes some writers include regardless) is ignored.
        }
        Ok(())
    }
}

impl<'a> FileMetadata<'a> {
    /// Extracts `FileMetadata` from a central directory entry
    pub(crate) fn from_cde(cde: &CentralDirectoryEntry<'a>) -> ZipResult<Self> {
        let path = decode_path(cde.flags, cde.path)?;

        let mut wide = WideFields {
            size: cde.uncompressed_size.into(),
            compressed_size: cde.compressed_size.into(),
            header_offset: cde.header_offset.into(),
            disk_number: cde.disk_number.into(),
        };
        wide.widen(cde.extra_field, HeaderKind::Central)?;

        if wide.disk_number != 0 {
            return Err(ZipError::UnsupportedArchive(format!(
                "No support for multi-disk archives: file {} claims to be on disk {}",
                path, wide.disk_number,
            )));
        }

        // External attributes hold st_mode in the upper 16 bits on Unix.
        let unix_mode = match System::from_source_version(cde.source_version) {
            System::Unix => Some(cde.external_file_attributes >> 16).filter(|m| *m != 0),
            System::Dos | System::Unknown => None,
        };

        Ok(Self {
            size: usize(wide.size)?,
            compressed_size: usize(wide.compressed_size)?,
            compression_method: CompressionMethod::from_u16(cde.compression_method),
            crc32: cde.crc32,
            encrypted: cde.flags & FLAG_ENCRYPTED != 0,
            path,
            last_modified: parse_msdos(cde.last_modified_time, cde.last_modified_date),
            unix_mode,
            header_offset: usize(wide.header_offset)?,
        })
    }

    /// Checks that a local file header describes the same file
    /// as the central directory entry this metadata came from.
    pub(crate) fn matches_local_header(&self, local: &LocalFileHeader<'_>) -> ZipResult<bool> {
        let path = decode_path(local.flags, local.path)?;
        let mut matches = path == self.path
            && CompressionMethod::from_u16(local.compression_method) == self.compression_method;
        // With a data descriptor the local CRC and sizes are zeroed.
        if local.flags & FLAG_DATA_DESCRIPTOR == 0 {
            let mut wide = WideFields {
                size: local.uncompressed_size.into(),
                compressed_size: local.compressed_size.into(),
                header_offset: 0,
                disk_number: 0,
            };
            wide.widen(local.extra_field, HeaderKind::Local)?;
            matches = matches
                && local.crc32 == self.crc32
                && usize(wide.compressed_size)? == self.compressed_size
                && usize(wide.size)? == self.size;
        }
        Ok(matches)
    }
}

/// Converts an MS-DOS time and date to a timestamp,
/// or `None` if the fields don't describe a real date.
pub fn parse_msdos(time: u16, date: u16) -> Option<NaiveDateTime> {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // MSDOS uses years since 1980; Always interpreted as a positive value
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)?.and_hms_opt(hours, minutes, seconds)
}

/// Converts a timestamp to an MS-DOS `(time, date)` pair.
///
/// MS-DOS dates cover 1980 through 2107;
/// anything outside is clamped to the nearest end of that range.
pub fn to_msdos(when: &NaiveDateTime) -> (u16, u16) {
    if when.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    if when.year() > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }
    let time = (when.hour() << 11) | (when.minute() << 5) | (when.second() / 2);
    let date = ((when.year() as u32 - 1980) << 9) | (when.month() << 5) | when.day();
    (time as u16, date as u16)
}

/// Data from a local file header
///
/// Each files' actual contents is preceded by this header.
#[derive(Debug)]
pub struct LocalFileHeader<'a> {
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub path: &'a [u8],
    pub extra_field: &'a [u8],
}

impl<'a> LocalFileHeader<'a> {
    // 4.3.7  Local file header:
    //
    // local file header signature     4 bytes  (0x04034b50)
    // version needed to extract       2 bytes
    // general purpose bit flag        2 bytes
    // compression method              2 bytes
    // last mod file time              2 bytes
    // last mod file date              2 bytes
    // crc-32                          4 bytes
    // compressed size                 4 bytes
    // uncompressed size               4 bytes
    // file name length                2 bytes
    // extra field length              2 bytes
    //
    // file name (variable size)
    // extra field (variable size)

    pub fn parse_and_consume(header: &mut &'a [u8]) -> ZipResult<Self> {
        if take(header, 4)? != LOCAL_FILE_HEADER_MAGIC {
            return Err(ZipError::InvalidArchive("Invalid local file header"));
        }
        let minimum_extract_version = read_u16(header)?;
        let flags = read_u16(header)?;
        let compression_method = read_u16(header)?;
        let last_modified_time = read_u16(header)?;
        let last_modified_date = read_u16(header)?;
        let crc32 = read_u32(header)?;
        let compressed_size = read_u32(header)?;
        let uncompressed_size = read_u32(header)?;
        let path_length = usize(read_u16(header)?)?;
        let extra_field_length = usize(read_u16(header)?)?;
        let path = take(header, path_length)?;
        let extra_field = take(header, extra_field_length)?;

        Ok(Self {
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            path,
            extra_field,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> ZipResult<()> {
        w.write_all(&LOCAL_FILE_HEADER_MAGIC)?;
        put_u16(w, self.minimum_extract_version)?;
        put_u16(w, self.flags)?;
        put_u16(w, self.compression_method)?;
        put_u16(w, self.last_modified_time)?;
        put_u16(w, self.last_modified_date)?;
        put_u32(w, self.crc32)?;
        put_u32(w, self.compressed_size)?;
        put_u32(w, self.uncompressed_size)?;
        put_u16(w, crate::arch::u16_field(self.path.len(), "file name length")?)?;
        put_u16(w, crate::arch::u16_field(self.extra_field.len(), "extra field length")?)?;
        w.write_all(self.path)?;
        w.write_all(self.extra_field)?;
        Ok(())
    }
}

/// Writes the CRC-32 and sizes that a local file header leaves blank
/// until its data has been written.
pub fn write_local_sizes<W: Write>(
    w: &mut W,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
) -> io::Result<()> {
    put_u32(w, crc32)?;
    put_u32(w, compressed_size)?;
    put_u32(w, uncompressed_size)
}

pub fn version_needed() -> u16 {
    VERSION_NEEDED
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn msdos_timestamps() {
        let when = NaiveDate::from_ymd_opt(2021, 7, 4)
            .unwrap()
            .and_hms_opt(13, 37, 42)
            .unwrap();
        let (time, date) = to_msdos(&when);
        assert_eq!(parse_msdos(time, date), Some(when));

        // Before the epoch clamps to its first day.
        let early = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let (time, date) = to_msdos(&early);
        assert_eq!(
            parse_msdos(time, date),
            NaiveDate::from_ymd_opt(1980, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );

        // Zeroed fields aren't a date.
        assert_eq!(parse_msdos(0, 0), None);
    }

    #[test]
    fn truncated_records_are_errors() {
        let mut short: &[u8] = &[b'P', b'K', 3, 4, 20, 0];
        assert!(matches!(
            LocalFileHeader::parse_and_consume(&mut short),
            Err(ZipError::InvalidArchive(_))
        ));
    }

    #[test]
    fn local_header_layout() {
        let header = LocalFileHeader {
            minimum_extract_version: 20,
            flags: 0,
            compression_method: 0,
            last_modified_time: 0,
            last_modified_date: 0,
            crc32: 0xdeadbeef,
            compressed_size: 21,
            uncompressed_size: 21,
            path: b"mimetype",
            extra_field: &[],
        };
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 30 + 8);
        assert_eq!(&bytes[30..], b"mimetype");
        assert_eq!(
            &bytes[LOCAL_HEADER_CRC_OFFSET as usize..][..4],
            &0xdeadbeefu32.to_le_bytes()
        );

        let mut slice = &bytes[..];
        let parsed = LocalFileHeader::parse_and_consume(&mut slice).unwrap();
        assert!(slice.is_empty());
        assert_eq!(parsed.path, b"mimetype");
        assert_eq!(parsed.uncompressed_size, 21);
    }

    #[test]
    fn zip64_extra_fields() {
        let mut extra = Vec::new();
        put_u16(&mut extra, ZIP64_EXTRA_FIELD_ID).unwrap();
        put_u16(&mut extra, 16).unwrap();
        extra.extend_from_slice(&5u64.to_le_bytes());
        extra.extend_from_slice(&7u64.to_le_bytes());

        let saturated = WideFields {
            size: u32::MAX.into(),
            compressed_size: u32::MAX.into(),
            header_offset: 0,
            disk_number: 0,
        };

        // Local headers carry both sizes once either overflows.
        let mut local = saturated;
        local.widen(&extra, HeaderKind::Local).unwrap();
        assert_eq!((local.size, local.compressed_size), (5, 7));

        // Fields that fit ignore the extra data.
        let small = WideFields {
            size: 3,
            compressed_size: 3,
            header_offset: 9,
            disk_number: 0,
        };
        let mut central = small;
        central.widen(&extra, HeaderKind::Central).unwrap();
        assert_eq!(central, small);

        // Central entries carry only the overflowing fields, in order.
        let mut central = WideFields {
            compressed_size: u32::MAX.into(),
            header_offset: u32::MAX.into(),
            ..small
        };
        central.widen(&extra, HeaderKind::Central).unwrap();
        assert_eq!((central.compressed_size, central.header_offset), (5, 7));
        assert_eq!(central.size, 3);

        let mut truncated = saturated;
        assert!(matches!(
            truncated.widen(&extra[..12], HeaderKind::Local),
            Err(ZipError::InvalidArchive(_))
        ));
    }

    #[test]
    fn non_ascii_names_are_flagged() {
        assert_eq!(flags_for_name("OEBPS/content.opf"), 0);
        assert_eq!(flags_for_name("OEBPS/über.xhtml"), FLAG_UTF8);
    }
}
