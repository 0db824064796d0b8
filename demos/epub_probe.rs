use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::*;
use log::*;
use memmap2::Mmap;
use rayon::prelude::*;
use structopt::*;

use epubio::{CompressionMethod, ZipArchive, MIMETYPE_NAME};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "epub_probe",
    about = "Lists the members of an .epub file and checks that each one reads back cleanly"
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    #[structopt(name("EPUB file"))]
    epub_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    probe(&args.epub_path)
}

fn probe(epub_path: &Path) -> Result<()> {
    info!("Memory mapping {:#?}", epub_path);
    let epub_file = File::open(epub_path).context("Couldn't open epub file")?;
    let mapping = unsafe { Mmap::map(&epub_file).context("Couldn't mmap epub file")? };

    let (archive, prepended) =
        ZipArchive::with_prepended_data(&mapping).context("Couldn't load archive")?;
    if prepended != 0 {
        warn!("{} bytes of junk precede the archive", prepended);
    }
    for entry in archive.entries() {
        let method = match entry.compression_method {
            CompressionMethod::None => String::from("stored"),
            CompressionMethod::Deflate => String::from("deflate"),
            CompressionMethod::Unsupported(m) => format!("method {m}"),
        };
        println!(
            "{:>10}  {:>10}  {:>9}  {}",
            entry.size, entry.compressed_size, method, entry.path
        );
    }
    match archive.entries().first() {
        Some(first) if first.path.as_str() == MIMETYPE_NAME => {}
        _ => warn!("{} doesn't start with a mimetype member", epub_path.display()),
    }

    // Readers are Send, so check every member's CRC in parallel.
    archive
        .entries()
        .par_iter()
        .filter(|e| e.is_file())
        .try_for_each(|entry| {
            let mut reader = archive.read(entry)?;
            io::copy(&mut reader, &mut io::sink())
                .with_context(|| format!("Couldn't read {}", entry.path))?;
            Ok(())
        })
}
