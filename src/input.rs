//! Getting a book into a working directory.

use std::io;
use std::path::{Path, PathBuf};

use log::*;

use crate::locate::Locator;
use crate::result::*;
use crate::tree;

/// Populates a working directory.
///
/// Whatever was at the working directory beforehand is destroyed.
pub trait Unpack {
    fn unpack(&self, workdir: &Path) -> EpubResult<()>;
}

/// Reads from an unpacked book.
#[derive(Debug, Clone)]
pub struct DirInput {
    dir: PathBuf,
}

impl DirInput {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl Unpack for DirInput {
    fn unpack(&self, workdir: &Path) -> EpubResult<()> {
        info!("Copying {} to {}", self.dir.display(), workdir.display());
        let copy_error = |source: io::Error| EpubError::Copy {
            from: self.dir.clone(),
            to: workdir.to_owned(),
            source,
        };
        tree::remove_all(workdir).map_err(copy_error)?;
        tree::copy_dir(&self.dir, workdir).map_err(copy_error)
    }
}

/// Reads from a packed `.epub` file.
#[derive(Debug, Clone)]
pub struct EpubInput {
    file: PathBuf,
}

impl EpubInput {
    pub fn new<P: Into<PathBuf>>(file: P) -> Self {
        Self { file: file.into() }
    }
}

impl Unpack for EpubInput {
    fn unpack(&self, workdir: &Path) -> EpubResult<()> {
        let extract_error = |source: ZipError| EpubError::Extract {
            archive: self.file.clone(),
            to: workdir.to_owned(),
            source,
        };
        tree::remove_all(workdir).map_err(|e| extract_error(e.into()))?;
        tree::unzip(&self.file, workdir).map_err(extract_error)
    }
}

/// Picks [`DirInput`] or [`EpubInput`] depending on what `path` is.
///
/// Fails if `path` can't be stat'ed, or is neither a directory
/// nor an `.epub` file.
///
/// [`DirInput`]: struct.DirInput.html
/// [`EpubInput`]: struct.EpubInput.html
pub fn auto_input<P: AsRef<Path>>(path: P) -> EpubResult<Box<dyn Unpack>> {
    let path = path.as_ref();
    match Locator::of(path)? {
        Locator::Directory => {
            debug!("{} is a directory", path.display());
            Ok(Box::new(DirInput::new(path)))
        }
        Locator::Archive => {
            debug!("{} is an epub", path.display());
            Ok(Box::new(EpubInput::new(path)))
        }
        Locator::Unrecognized => Err(EpubError::UnrecognizedSource(path.to_owned())),
    }
}
