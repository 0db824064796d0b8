//! epubio moves EPUB books between their two forms on disk:
//! a packed `.epub` archive, and an unpacked directory that other tools
//! can edit with ordinary file operations.
//!
//! ```no_run
//! # use std::path::Path;
//! # use epubio::*;
//! let workdir = Path::new("/tmp/book");
//!
//! // Unpack, from either a directory or an .epub file...
//! auto_input("book.epub")?.unpack(workdir)?;
//!
//! // ...do something to the files in `workdir`...
//!
//! // ...and write the result back in the same form it came in.
//! auto_output("book.epub")?.pack(workdir)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Packing always writes the `mimetype` member first and uncompressed,
//! as EPUB readers expect, followed by every other file in the working
//! directory in sorted, depth-first order.
//!
//! [`auto_output()`] never destroys the existing book until a complete
//! replacement has been built next to it (see [`Replace`]).
//! [`Transform`] strings the whole thing together around a scratch directory.
//!
//! EPUB is ZIP underneath, so the crate carries a small ZIP reader and
//! writer: [`ZipArchive`] and [`ZipWriter`].
//!
//! [`auto_output()`]: output/fn.auto_output.html
//! [`Replace`]: replace/struct.Replace.html
//! [`Transform`]: transform/struct.Transform.html
//! [`ZipArchive`]: read/struct.ZipArchive.html
//! [`ZipWriter`]: write/struct.ZipWriter.html

pub mod input;
pub mod locate;
pub mod output;
pub mod read;
pub mod replace;
pub mod result;
pub mod transform;
pub mod tree;
pub mod write;

pub use input::{auto_input, DirInput, EpubInput, Unpack};
pub use locate::{FileKind, Locator};
pub use output::{auto_output, output_like, DirOutput, EpubOutput, Pack, MIMETYPE, MIMETYPE_NAME};
pub use read::{CompressionMethod, FileMetadata, ZipArchive};
pub use replace::Replace;
pub use result::{EpubError, EpubResult, ZipError, ZipResult};
pub use transform::Transform;
pub use write::{EntryOptions, ZipWriter};

mod arch;
mod crc_reader;
mod spec;
