//! Running a whole conversion: unpack, transform, pack.

use std::fmt;
use std::path::{Path, PathBuf};

use log::*;

use crate::input::Unpack;
use crate::output::Pack;
use crate::result::*;

/// A step that edits the unpacked book in place
pub type Step = Box<dyn Fn(&Path) -> Result<(), StepError>>;

/// Name of the working directory inside the scratch directory
const WORKDIR_NAME: &str = "epub";

/// A sequence of steps run over an unpacked book.
///
/// ```no_run
/// # use std::fs;
/// # use epubio::*;
/// Transform::new()
///     .step("add colophon", |epub| {
///         fs::write(epub.join("OEBPS/colophon.xhtml"), "<p>Made with epubio</p>")?;
///         Ok(())
///     })
///     .run(&*auto_input("book.epub")?, &*auto_output("book.epub")?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct Transform {
    steps: Vec<(String, Step)>,
    scratch_root: Option<PathBuf>,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("steps", &self.steps.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("scratch_root", &self.scratch_root)
            .finish()
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step, run after any added before it.
    pub fn step<S, F>(mut self, name: S, step: F) -> Self
    where
        S: Into<String>,
        F: Fn(&Path) -> Result<(), StepError> + 'static,
    {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    /// Creates the working directory in `dir` instead of the system's
    /// temporary directory.
    pub fn scratch_in<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// Unpacks `input` into a fresh working directory, runs each step on it,
    /// then packs it to `output`.
    ///
    /// The working directory is removed afterwards, whether or not
    /// everything succeeded. If any step fails, `output` is never run.
    pub fn run(&self, input: &dyn Unpack, output: &dyn Pack) -> EpubResult<()> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("epubtransform-");
        let scratch = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let scratch = scratch.map_err(EpubError::Staging)?;
        let workdir = scratch.path().join(WORKDIR_NAME);

        input.unpack(&workdir)?;
        for (name, step) in &self.steps {
            info!("Running {name}");
            step(workdir.as_path()).map_err(|source| EpubError::Step {
                name: name.clone(),
                source,
            })?;
        }
        output.pack(&workdir)?;

        if let Err(e) = scratch.close() {
            warn!("Couldn't remove working directory: {e}");
        }
        Ok(())
    }
}
