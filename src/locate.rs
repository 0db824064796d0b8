//! Deciding what kind of book a path holds.

use std::fs;
use std::path::Path;

use crate::result::*;

/// Extension (without the dot) that marks a packed book
pub const EPUB_EXTENSION: &str = "epub";

/// What sort of thing a path was found to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    File,
    /// Devices, sockets, FIFOs...
    Other,
}

impl From<fs::FileType> for FileKind {
    fn from(ft: fs::FileType) -> Self {
        if ft.is_dir() {
            FileKind::Directory
        } else if ft.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        }
    }
}

/// The form a book takes on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// An unpacked book
    Directory,
    /// A packed `.epub` file
    Archive,
    Unrecognized,
}

/// True if the file name ends in `.epub`, case-sensitively.
///
/// Unlike [`Path::extension()`], a file named just `.epub` counts.
fn has_epub_extension(path: &Path) -> bool {
    path.file_name().map_or(false, |name| {
        name.as_encoded_bytes()
            .strip_suffix(EPUB_EXTENSION.as_bytes())
            .map_or(false, |stem| stem.ends_with(b"."))
    })
}

impl Locator {
    /// Classifies a path that is already known to be of the given kind.
    /// Doesn't touch the filesystem.
    pub fn classify(path: &Path, kind: FileKind) -> Self {
        match kind {
            FileKind::Directory => Locator::Directory,
            FileKind::File if has_epub_extension(path) => Locator::Archive,
            FileKind::File | FileKind::Other => Locator::Unrecognized,
        }
    }

    /// Stats `path` (following symlinks) and classifies it.
    pub fn of(path: &Path) -> EpubResult<Self> {
        let metadata = fs::metadata(path).map_err(|source| EpubError::Locator {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::classify(path, metadata.file_type().into()))
    }
}
