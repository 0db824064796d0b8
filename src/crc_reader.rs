//! A reader that checks a member's CRC-32 and length once it's been read out.

use std::io;
use std::io::prelude::*;

use crc32fast::Hasher;

/// Reader that validates the CRC32 and the byte count when it reaches the EOF.
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    expected_checksum: u32,
    expected_size: u64,
    seen: u64,
}

impl<R> Crc32Reader<R> {
    pub fn new(inner: R, expected_checksum: u32, expected_size: u64) -> Crc32Reader<R> {
        Crc32Reader {
            inner,
            hasher: Hasher::new(),
            expected_checksum,
            expected_size,
            seen: 0,
        }
    }

    fn verify(&self) -> io::Result<()> {
        if self.seen != self.expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Expected {} bytes, got {}",
                    self.expected_size, self.seen
                ),
            ));
        }
        let actual = self.hasher.clone().finalize();
        if actual != self.expected_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Invalid checksum: expected {:08x}, got {:08x}",
                    self.expected_checksum, actual
                ),
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        if count == 0 && !buf.is_empty() {
            self.verify()?;
        }
        self.hasher.update(&buf[..count]);
        self.seen += count as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn empty_reader() {
        let data: &[u8] = b"";
        let mut buf = [0; 1];

        let mut reader = Crc32Reader::new(data, 0, 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);

        let mut reader = Crc32Reader::new(data, 1, 0);
        assert!(reader
            .read(&mut buf)
            .unwrap_err()
            .to_string()
            .contains("Invalid checksum"));
    }

    #[test]
    fn mimetype_checksum() {
        let mut reader = Crc32Reader::new(&b"application/epub+zip"[..], 0x2cab616f, 20);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"application/epub+zip");
        // Can keep reading 0 bytes after the end
        assert_eq!(reader.read(&mut [0; 4]).unwrap(), 0);
    }

    #[test]
    fn short_stream() {
        let data: &[u8] = b"1234";
        let mut reader = Crc32Reader::new(data, 0x9be3e0a3, 5);
        let err = reader.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn zero_read() {
        let data: &[u8] = b"1234";
        let mut buf = [0; 5];

        let mut reader = Crc32Reader::new(data, 0x9be3e0a3, 4);
        assert_eq!(reader.read(&mut buf[..0]).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
