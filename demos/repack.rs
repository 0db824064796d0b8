use std::path::PathBuf;

use anyhow::*;
use log::*;
use structopt::*;

use epubio::*;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "repack",
    about = "Rewrites an EPUB (packed or unpacked) with its mimetype first and uncompressed"
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Write here instead of replacing the input.
    /// The output takes the same form (directory or .epub) as the input.
    #[structopt(short, long)]
    output: Option<PathBuf>,

    /// Create the working directory here instead of the system temp directory.
    #[structopt(long)]
    scratch: Option<PathBuf>,

    #[structopt(name("EPUB file or directory"))]
    input: PathBuf,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    let input = auto_input(&args.input)
        .with_context(|| format!("Couldn't read {}", args.input.display()))?;
    let dest = args.output.as_ref().unwrap_or(&args.input);
    let output = output_like(&args.input, dest)
        .with_context(|| format!("Couldn't pick an output for {}", dest.display()))?;

    let mut transform = Transform::new();
    if let Some(scratch) = args.scratch {
        transform = transform.scratch_in(scratch);
    }
    transform
        .run(&*input, &*output)
        .with_context(|| format!("Couldn't repack {}", args.input.display()))?;
    info!("Wrote {}", dest.display());
    Ok(())
}
