//! Filesystem plumbing: copying, removing and extracting whole trees.
//!
//! These are the primitives the strategies in [`input`], [`output`] and
//! [`replace`] are built from. They report plain I/O (or ZIP) errors and
//! leave it to their callers to say which stage failed.
//!
//! [`input`]: ../input/index.html
//! [`output`]: ../output/index.html
//! [`replace`]: ../replace/index.html

use std::fs::{self, File};
use std::io;
use std::path::Path;

use log::*;
use walkdir::WalkDir;

use crate::read::ZipArchive;
use crate::result::*;

/// Removes whatever is at `path`: a file, a symlink, or a whole directory tree.
/// Nothing being there is fine.
pub fn remove_all(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if metadata.is_dir() {
        debug!("Removing directory {}", path.display());
        fs::remove_dir_all(path)
    } else {
        debug!("Removing {}", path.display());
        fs::remove_file(path)
    }
}

/// Recursively copies the directory `src` to `dst`.
///
/// `dst` must not exist yet, but its parent must.
/// Entries are copied in sorted order; on failure, whatever was copied so far
/// stays behind.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            trace!("mkdir {}", target.display());
            fs::create_dir(&target)?;
        } else if file_type.is_file() {
            trace!("cp {} {}", entry.path().display(), target.display());
            fs::copy(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            warn!("Skipping special file {}", entry.path().display());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let points_to = fs::read_link(src)?;
    trace!("ln -s {} {}", points_to.display(), dst.display());
    std::os::unix::fs::symlink(points_to, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> io::Result<()> {
    warn!("Skipping symlink {}", src.display());
    Ok(())
}

/// Copies `src` to `dst`, whether it's a single file or a directory tree.
pub fn copy(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::metadata(src)?.is_dir() {
        copy_dir(src, dst)
    } else {
        fs::copy(src, dst).map(|_| ())
    }
}

/// Extracts every entry of the ZIP archive at `archive` into `dst`,
/// creating `dst` if needed.
///
/// Entries whose paths would escape `dst` fail the whole extraction.
/// Data stuck in front of the archive is skipped over.
pub fn unzip(archive: &Path, dst: &Path) -> ZipResult<()> {
    info!("Extracting {} to {}", archive.display(), dst.display());
    let bytes = fs::read(archive)?;
    let (zip, prepended) = ZipArchive::with_prepended_data(&bytes)?;
    if prepended != 0 {
        warn!(
            "{} starts with {prepended} bytes that aren't part of the archive",
            archive.display()
        );
    }

    fs::create_dir_all(dst)?;
    for entry in zip.entries() {
        let target = dst.join(entry.safe_path()?);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut reader = zip.read(entry)?;
        let mut sink = File::create(&target)?;
        io::copy(&mut reader, &mut sink)?;
        set_mode(&target, entry.unix_mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode.map(|m| m & 0o777) {
        Some(perms) if perms != 0 => {
            fs::set_permissions(path, fs::Permissions::from_mode(perms))
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
