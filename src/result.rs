//! Error types and the related `Result<T>`s
//!
//! [`ZipError`] covers the archive format itself (reading and writing bytes),
//! while [`EpubError`] describes which stage of a conversion went wrong.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Debug, Error)]
pub enum ZipError {
    /// An error from underlying I/O
    #[error("I/O Error")]
    Io(#[from] io::Error),

    /// The ZIP archive contained invalid data per the spec.
    #[error("Invalid Zip archive: {0}")]
    InvalidArchive(&'static str),

    /// Decoding a UTF-8 name failed
    #[error("Invalid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// The ZIP archive uses (or would need) an unsupported feature
    #[error("Unsupported Zip archive: {0}")]
    UnsupportedArchive(String),

    /// The ZIP archive is prepended some unknown bytes.
    #[error("Archive prepended with {0} unknown bytes")]
    PrependedWithUnknownBytes(usize),

    /// An entry's path would land outside the directory it's extracted to.
    #[error("Archive contained a strange file hierarchy: {0}")]
    Hierarchy(String),

    /// A name given to the writer can't be stored in an archive.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A cast from a 64-bit int to a usize failed,
    /// probably on a 32-bit system.
    #[error("Zip archive too large for address space")]
    InsufficientAddressSpace,
}

pub type EpubResult<T> = Result<T, EpubError>;

/// Boxed error returned by caller-provided transform steps
pub type StepError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EpubError {
    /// The path given as input couldn't be inspected at all.
    #[error("could not stat input {}", path.display())]
    Locator {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The path is neither a directory nor an `.epub` file.
    #[error("unrecognized input file {}", .0.display())]
    UnrecognizedSource(PathBuf),

    /// An output that must be created fresh is already there.
    #[error("output {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("error copying {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error extracting {} to {}", archive.display(), to.display())]
    Extract {
        archive: PathBuf,
        to: PathBuf,
        #[source]
        source: ZipError,
    },

    /// Something went wrong assembling an archive.
    /// `context` names the stage and the offending path.
    #[error("error creating epub {}: {context}", archive.display())]
    ArchiveWrite {
        archive: PathBuf,
        context: String,
        #[source]
        source: ZipError,
    },

    /// The staged output was built, but couldn't be moved into place.
    /// The destination may now be missing or incomplete.
    #[error("error copying output into place at {}", path.display())]
    Placement {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error creating temp directory")]
    Staging(#[source] io::Error),

    #[error("transform step {name:?} failed")]
    Step {
        name: String,
        #[source]
        source: StepError,
    },
}
