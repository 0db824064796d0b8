//! Overwriting an existing output without risking it.
//!
//! [`Replace`] builds the new output in a staging directory first,
//! and only once that has fully succeeded does it remove the old output
//! and move the new one into place.
//!
//! That final move is the one window where things can still go wrong:
//! when the staging directory lives on another filesystem than the
//! destination, the move is a copy, and a copy that fails halfway leaves
//! the destination missing or incomplete ([`EpubError::Placement`]).
//! Staging next to the destination (see [`Replace::staging_in()`])
//! turns the move into a rename and closes that window.
//!
//! [`Replace`]: struct.Replace.html
//! [`Replace::staging_in()`]: struct.Replace.html#method.staging_in
//! [`EpubError::Placement`]: ../result/enum.EpubError.html#variant.Placement

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::*;

use crate::output::Pack;
use crate::result::*;
use crate::tree;

/// Prefix of staging directory names
const STAGING_PREFIX: &str = "epubio-";

/// Wraps an output strategy so it can safely overwrite `path`.
///
/// `make` builds the wrapped strategy for a given destination;
/// it gets called with a path inside the staging directory.
pub struct Replace<F> {
    path: PathBuf,
    make: F,
    staging_root: Option<PathBuf>,
}

impl<F, P> Replace<F>
where
    F: Fn(PathBuf) -> P,
    P: Pack,
{
    pub fn new<Q: Into<PathBuf>>(path: Q, make: F) -> Self {
        Self {
            path: path.into(),
            make,
            staging_root: None,
        }
    }

    /// Creates staging directories in `dir` instead of the system's
    /// temporary directory.
    pub fn staging_in<Q: Into<PathBuf>>(self, dir: Q) -> Self {
        Self {
            staging_root: Some(dir.into()),
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_dir(&self) -> EpubResult<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let staging = match &self.staging_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        staging.map_err(EpubError::Staging)
    }

    /// Swaps the staged output in for whatever is at the real destination.
    fn place(&self, staged: &Path) -> EpubResult<()> {
        let placement_error = |source: std::io::Error| EpubError::Placement {
            path: self.path.clone(),
            source,
        };
        tree::remove_all(&self.path).map_err(placement_error)?;
        if let Err(e) = fs::rename(staged, &self.path) {
            debug!(
                "Couldn't rename {} to {} ({e}), copying instead",
                staged.display(),
                self.path.display()
            );
            tree::copy(staged, &self.path).map_err(placement_error)?;
        }
        Ok(())
    }
}

impl<F, P> Pack for Replace<F>
where
    F: Fn(PathBuf) -> P,
    P: Pack,
{
    fn pack(&self, workdir: &Path) -> EpubResult<()> {
        let staging = self.staging_dir()?;
        let base_name = self
            .path
            .file_name()
            .unwrap_or_else(|| OsStr::new("staged"));
        let staged = staging.path().join(base_name);
        debug!(
            "Staging output for {} at {}",
            self.path.display(),
            staged.display()
        );

        // If this fails, `staging` is dropped (and removed) on the way out,
        // and the real destination hasn't been touched.
        (self.make)(staged.clone()).pack(workdir)?;

        info!("Moving output into place at {}", self.path.display());
        let placed = self.place(&staged);

        let staging_path = staging.path().to_owned();
        if let Err(e) = staging.close() {
            warn!(
                "Couldn't remove staging directory {}: {e}",
                staging_path.display()
            );
        }
        placed
    }
}
