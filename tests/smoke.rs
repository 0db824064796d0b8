use std::fs;

use anyhow::Result;

use epubio::*;

mod common;
use common::*;

const CONTENT_OPF: &[u8] = b"<?xml version=\"1.0\"?><package version=\"3.0\"/>";
const COVER_JPG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0, 0x10, b'J', b'F', b'I', b'F'];

#[test]
fn packs_mimetype_first_then_walk_order() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let workdir = scratch.path().join("epub");
    populate(
        &workdir,
        &[
            ("OEBPS/content.opf", CONTENT_OPF),
            ("OEBPS/images/cover.jpg", COVER_JPG),
        ],
    )?;

    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;

    let members = members(&book)?;
    assert_eq!(
        members,
        [
            Member {
                name: String::from("mimetype"),
                method: CompressionMethod::None,
                contents: MIMETYPE.to_vec(),
            },
            Member {
                name: String::from("OEBPS/content.opf"),
                method: CompressionMethod::Deflate,
                contents: CONTENT_OPF.to_vec(),
            },
            Member {
                name: String::from("OEBPS/images/cover.jpg"),
                method: CompressionMethod::Deflate,
                contents: COVER_JPG.to_vec(),
            },
        ]
    );
    Ok(())
}

#[test]
fn mimetype_is_visible_in_raw_bytes() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let workdir = scratch.path().join("epub");
    // A stray mimetype in the tree, in any walk position, changes nothing.
    populate(
        &workdir,
        &[
            ("META-INF/container.xml", &b"<container/>"[..]),
            ("mimetype", &b"text/plain"[..]),
            ("aaa.txt", &b"sorts before mimetype"[..]),
        ],
    )?;

    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;
    let bytes = fs::read(&book)?;

    // Local file header: signature, version, flags, method...
    assert_eq!(&bytes[0..4], b"PK\x03\x04");
    assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 0, "mimetype must be stored");
    let compressed = u32::from_le_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]);
    let size = u32::from_le_bytes([bytes[22], bytes[23], bytes[24], bytes[25]]);
    assert_eq!(compressed, MIMETYPE.len() as u32);
    assert_eq!(size, MIMETYPE.len() as u32);
    let name_len = u16::from_le_bytes([bytes[26], bytes[27]]) as usize;
    let extra_len = u16::from_le_bytes([bytes[28], bytes[29]]) as usize;
    assert_eq!(&bytes[30..30 + name_len], b"mimetype");
    let data = 30 + name_len + extra_len;
    assert_eq!(&bytes[data..data + MIMETYPE.len()], MIMETYPE);

    let names: Vec<_> = members(&book)?.into_iter().map(|m| m.name).collect();
    assert_eq!(names, ["mimetype", "META-INF/container.xml", "aaa.txt"]);
    Ok(())
}

#[test]
fn nested_mimetype_files_are_dropped() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let workdir = scratch.path().join("epub");
    populate(
        &workdir,
        &[
            ("OEBPS/mimetype", &b"not the real one"[..]),
            ("OEBPS/text.xhtml", &b"<p/>"[..]),
        ],
    )?;

    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;
    let names: Vec<_> = members(&book)?.into_iter().map(|m| m.name).collect();
    assert_eq!(names, ["mimetype", "OEBPS/text.xhtml"]);
    Ok(())
}

#[test]
fn round_trip() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let original = scratch.path().join("original");
    populate(
        &original,
        &[
            ("META-INF/container.xml", &b"<container/>"[..]),
            ("OEBPS/content.opf", CONTENT_OPF),
            ("OEBPS/images/cover.jpg", COVER_JPG),
            ("OEBPS/Text/\u{fc}ber.xhtml", &b"<p>\xc3\xbcber</p>"[..]),
            ("OEBPS/empty.css", &b""[..]),
        ],
    )?;

    let workdir = scratch.path().join("work");
    DirInput::new(&original).unpack(&workdir)?;
    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;

    let unpacked = scratch.path().join("unpacked");
    EpubInput::new(&book).unpack(&unpacked)?;

    let mut expected = snapshot(&original)?;
    expected.insert(String::from("mimetype"), MIMETYPE.to_vec());
    assert_eq!(snapshot(&unpacked)?, expected);
    Ok(())
}

#[test]
fn unpacking_clears_the_working_directory() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let source = scratch.path().join("source");
    populate(&source, &[("OEBPS/content.opf", CONTENT_OPF)])?;

    let workdir = scratch.path().join("work");
    populate(&workdir, &[("leftover.txt", &b"from last time"[..])])?;
    DirInput::new(&source).unpack(&workdir)?;
    assert_eq!(snapshot(&workdir)?, snapshot(&source)?);

    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;
    populate(&workdir, &[("leftover.txt", &b"from last time"[..])])?;
    EpubInput::new(&book).unpack(&workdir)?;
    assert!(!workdir.join("leftover.txt").exists());
    assert_eq!(fs::read(workdir.join("mimetype"))?, MIMETYPE);
    Ok(())
}

#[test]
fn corrupt_archives_fail_to_extract() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let book = scratch.path().join("broken.epub");
    fs::write(&book, b"PK\x03\x04 and then nothing useful")?;

    match EpubInput::new(&book).unpack(&scratch.path().join("work")) {
        Err(EpubError::Extract { .. }) => Ok(()),
        other => panic!("Expected an extraction error, got {:?}", other),
    }
}

#[test]
fn damaged_member_fails_checksum() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let workdir = scratch.path().join("epub");
    populate(&workdir, &[("OEBPS/notes.txt", &b"plain text ".repeat(50)[..])])?;
    let book = scratch.path().join("book.epub");
    EpubOutput::new(&book).pack(&workdir)?;

    // Flip a byte inside the stored mimetype data.
    let mut bytes = fs::read(&book)?;
    bytes[40] ^= 0xff;
    fs::write(&book, &bytes)?;

    match EpubInput::new(&book).unpack(&scratch.path().join("work")) {
        Err(EpubError::Extract { source, .. }) => {
            assert!(matches!(source, ZipError::Io(_)), "{:?}", source);
            Ok(())
        }
        other => panic!("Expected an extraction error, got {:?}", other),
    }
}

#[test]
fn packing_refuses_existing_archives() -> Result<()> {
    init_logging();
    let scratch = tempfile::tempdir()?;
    let workdir = scratch.path().join("epub");
    populate(&workdir, &[("OEBPS/content.opf", CONTENT_OPF)])?;
    let book = scratch.path().join("book.epub");
    fs::write(&book, "precious")?;

    match EpubOutput::new(&book).pack(&workdir) {
        Err(EpubError::AlreadyExists(p)) => assert_eq!(p, book),
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }
    assert_eq!(fs::read_to_string(&book)?, "precious");
    Ok(())
}
