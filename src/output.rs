//! Getting a book out of a working directory.
//!
//! The strategies here refuse to touch an existing destination.
//! To overwrite one safely, wrap them in a [`Replace`],
//! or let [`auto_output()`] do so.
//!
//! [`Replace`]: ../replace/struct.Replace.html
//! [`auto_output()`]: fn.auto_output.html

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use camino::Utf8Path;
use chrono::{DateTime, Local};
use log::*;
use walkdir::WalkDir;

use crate::locate::Locator;
use crate::read::CompressionMethod;
use crate::replace::Replace;
use crate::result::*;
use crate::tree;
use crate::write::{EntryOptions, ZipWriter};

/// Name of the member identifying the archive as an EPUB
pub const MIMETYPE_NAME: &str = "mimetype";

/// Contents of the `mimetype` member
pub const MIMETYPE: &[u8] = b"application/epub+zip";

/// Produces output from a working directory.
pub trait Pack {
    fn pack(&self, workdir: &Path) -> EpubResult<()>;
}

impl<P: Pack + ?Sized> Pack for Box<P> {
    fn pack(&self, workdir: &Path) -> EpubResult<()> {
        (**self).pack(workdir)
    }
}

/// Writes an unpacked book. The destination must not exist.
#[derive(Debug, Clone)]
pub struct DirOutput {
    dir: PathBuf,
}

impl DirOutput {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl Pack for DirOutput {
    fn pack(&self, workdir: &Path) -> EpubResult<()> {
        if fs::symlink_metadata(&self.dir).is_ok() {
            return Err(EpubError::AlreadyExists(self.dir.clone()));
        }
        info!("Copying {} to {}", workdir.display(), self.dir.display());
        tree::copy_dir(workdir, &self.dir).map_err(|source| EpubError::Copy {
            from: workdir.to_owned(),
            to: self.dir.clone(),
            source,
        })
    }
}

/// Writes a packed `.epub` file. The destination must not exist.
#[derive(Debug, Clone)]
pub struct EpubOutput {
    file: PathBuf,
}

impl EpubOutput {
    pub fn new<P: Into<PathBuf>>(file: P) -> Self {
        Self { file: file.into() }
    }

    fn error<E: Into<ZipError>>(&self, context: String) -> impl FnOnce(E) -> EpubError + '_ {
        move |source| EpubError::ArchiveWrite {
            archive: self.file.clone(),
            context,
            source: source.into(),
        }
    }

    /// Adds one file from the working directory to the archive.
    fn add_file(
        &self,
        zip: &mut ZipWriter<BufWriter<File>>,
        path: &Path,
        relative: &Path,
    ) -> EpubResult<()> {
        let name = member_name(relative).ok_or_else(|| EpubError::ArchiveWrite {
            archive: self.file.clone(),
            context: format!("error getting relative path of {}", path.display()),
            source: ZipError::InvalidPath(relative.display().to_string()),
        })?;

        let mut source = File::open(path)
            .map_err(self.error(format!("error reading file {}", path.display())))?;
        let metadata = source
            .metadata()
            .map_err(self.error(format!("error reading file {}", path.display())))?;

        zip.start_file(name.as_str(), entry_options(&metadata))
            .map_err(self.error(format!("error creating file {name} in epub")))?;
        io::copy(&mut source, zip)
            .map_err(self.error(format!("error writing file {name} to epub")))?;
        Ok(())
    }
}

/// Joins a relative path's components with `/`,
/// as ZIP member names always use forward slashes.
/// Returns `None` for names that aren't UTF-8.
fn member_name(relative: &Path) -> Option<String> {
    let relative = Utf8Path::from_path(relative)?;
    let components: Vec<&str> = relative.components().map(|c| c.as_str()).collect();
    Some(components.join("/"))
}

fn entry_options(metadata: &fs::Metadata) -> EntryOptions {
    let mut options = EntryOptions::default();
    if let Ok(modified) = metadata.modified() {
        options = options.last_modified(local_time(modified));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_mode(metadata.permissions().mode());
    }
    options
}

fn local_time(when: SystemTime) -> chrono::NaiveDateTime {
    DateTime::<Local>::from(when).naive_local()
}

impl Pack for EpubOutput {
    fn pack(&self, workdir: &Path) -> EpubResult<()> {
        info!("Packing {} into {}", workdir.display(), self.file.display());
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.file)
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => EpubError::AlreadyExists(self.file.clone()),
                _ => EpubError::ArchiveWrite {
                    archive: self.file.clone(),
                    context: String::from("error creating destination file"),
                    source: source.into(),
                },
            })?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        // The mimetype goes first, uncompressed, so that tools sniffing
        // the first bytes of the file can recognize it.
        let mimetype_options = EntryOptions::default()
            .compression_method(CompressionMethod::None)
            .unix_mode(0o100644);
        zip.start_file(MIMETYPE_NAME, mimetype_options)
            .map_err(self.error(String::from("error writing mimetype to epub")))?;
        io::Write::write_all(&mut zip, MIMETYPE)
            .map_err(self.error(String::from("error writing mimetype to epub")))?;

        for entry in WalkDir::new(workdir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let context = match e.path() {
                    Some(p) => format!("error walking {}", p.display()),
                    None => String::from("error walking working directory"),
                };
                self.error::<io::Error>(context)(e.into())
            })?;

            // Skip the root itself and anything that isn't a regular file.
            if entry.depth() == 0 || !entry.file_type().is_file() {
                continue;
            }
            // Ours was already written.
            if entry.file_name() == MIMETYPE_NAME {
                debug!("Skipping {}", entry.path().display());
                continue;
            }

            let relative = entry.path().strip_prefix(workdir).map_err(|_| {
                EpubError::ArchiveWrite {
                    archive: self.file.clone(),
                    context: format!("error getting relative path of {}", entry.path().display()),
                    source: ZipError::InvalidPath(entry.path().display().to_string()),
                }
            })?;
            debug!("Adding {}", relative.display());
            self.add_file(&mut zip, entry.path(), relative)?;
        }

        let buffered = zip
            .finish()
            .map_err(self.error(String::from("error finishing epub")))?;
        let file = buffered.into_inner().map_err(|e| {
            self.error::<io::Error>(String::from("error finishing epub"))(e.into_error())
        })?;
        file.sync_all()
            .map_err(self.error(String::from("error finishing epub")))?;
        Ok(())
    }
}

fn dir_output(dir: PathBuf) -> Box<dyn Pack> {
    Box::new(DirOutput::new(dir))
}

fn epub_output(file: PathBuf) -> Box<dyn Pack> {
    Box::new(EpubOutput::new(file))
}

/// Picks the raw output strategy matching an input's format.
fn raw_output(kind: Locator, input: &Path) -> EpubResult<fn(PathBuf) -> Box<dyn Pack>> {
    match kind {
        Locator::Directory => Ok(dir_output),
        Locator::Archive => Ok(epub_output),
        Locator::Unrecognized => Err(EpubError::UnrecognizedSource(input.to_owned())),
    }
}

/// Writes to `dest` in the same format as `input`
/// (a directory for a directory, an `.epub` for an `.epub`),
/// safely replacing anything already at `dest`.
pub fn output_like<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    dest: Q,
) -> EpubResult<Box<dyn Pack>> {
    let input = input.as_ref();
    let make = raw_output(Locator::of(input)?, input)?;
    debug!(
        "Output to {} mirrors {}",
        dest.as_ref().display(),
        input.display()
    );
    Ok(Box::new(Replace::new(dest.as_ref(), make)))
}

/// Writes back over `input` in its own format, safely replacing it.
pub fn auto_output<P: AsRef<Path>>(input: P) -> EpubResult<Box<dyn Pack>> {
    output_like(input.as_ref(), input.as_ref())
}
