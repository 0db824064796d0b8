use std::fs;

use anyhow::Result;

use epubio::*;

mod common;
use common::*;

#[test]
fn missing_inputs() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let missing = scratch.path().join("no-such-book.epub");

    assert!(matches!(auto_input(&missing), Err(EpubError::Locator { .. })));
    assert!(matches!(auto_output(&missing), Err(EpubError::Locator { .. })));
    let err = auto_input(&missing).err().unwrap();
    assert!(err.to_string().starts_with("could not stat input"));
    Ok(())
}

#[test]
fn unrecognized_inputs() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let notes = scratch.path().join("notes.txt");
    fs::write(&notes, "not a book")?;

    assert!(matches!(auto_input(&notes), Err(EpubError::UnrecognizedSource(_))));
    assert!(matches!(auto_output(&notes), Err(EpubError::UnrecognizedSource(_))));
    assert!(matches!(
        output_like(&notes, scratch.path().join("out.epub")),
        Err(EpubError::UnrecognizedSource(_))
    ));
    Ok(())
}

#[test]
fn formats_are_picked_by_input() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let dir = scratch.path().join("unpacked");
    populate(&dir, &[("OEBPS/content.opf", &b"<package/>"[..])])?;

    // Directory in...
    let workdir = scratch.path().join("work");
    auto_input(&dir)?.unpack(&workdir)?;
    assert_eq!(snapshot(&workdir)?, snapshot(&dir)?);

    // ...directory out.
    let copy = scratch.path().join("copy");
    output_like(&dir, &copy)?.pack(&workdir)?;
    assert!(copy.is_dir());
    assert_eq!(snapshot(&copy)?, snapshot(&dir)?);

    // An .epub input gets an .epub output, even under another name.
    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;
    let packed = scratch.path().join("packed");
    output_like(&book, &packed)?.pack(&workdir)?;
    assert!(packed.is_file());
    assert_eq!(members(&packed)?[0].name, "mimetype");

    auto_input(&book)?.unpack(&workdir)?;
    assert_eq!(fs::read(workdir.join("mimetype"))?, MIMETYPE);
    Ok(())
}

#[test]
fn directory_output_refuses_existing_destinations() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let workdir = scratch.path().join("work");
    populate(&workdir, &[("OEBPS/content.opf", &b"<package/>"[..])])?;
    let dest = scratch.path().join("dest");
    populate(&dest, &[("keep.txt", &b"mine"[..])])?;
    let before = snapshot(&dest)?;

    match DirOutput::new(&dest).pack(&workdir) {
        Err(EpubError::AlreadyExists(p)) => assert_eq!(p, dest),
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }
    assert_eq!(snapshot(&dest)?, before);
    Ok(())
}
