use std::convert::TryFrom;

use crate::result::*;

/// A checked cast from u64 to usize,
/// which only fails on targets with less than 64-bit pointers.
pub fn usize<I: Into<u64>>(i: I) -> ZipResult<usize> {
    usize::try_from(i.into()).map_err(|_| ZipError::InsufficientAddressSpace)
}

/// Narrows a size or offset to the 32 bits a plain (non-Zip64) record holds.
///
/// `what` names the value for the error message.
pub fn u32_field(i: u64, what: &str) -> ZipResult<u32> {
    // 0xFFFFFFFF itself is reserved to mean "see the Zip64 extra field".
    match u32::try_from(i) {
        Ok(n) if n != u32::MAX => Ok(n),
        _ => Err(ZipError::UnsupportedArchive(format!(
            "{what} of {i} needs Zip64, which isn't written"
        ))),
    }
}

/// Narrows a count or length to the 16 bits a record holds.
pub fn u16_field(i: usize, what: &str) -> ZipResult<u16> {
    u16::try_from(i).map_err(|_| {
        ZipError::UnsupportedArchive(format!("{what} of {i} doesn't fit in 16 bits"))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn narrowing() {
        assert_eq!(u32_field(21, "size").unwrap(), 21);
        assert!(matches!(
            u32_field(u32::MAX as u64, "size"),
            Err(ZipError::UnsupportedArchive(_))
        ));
        assert!(u16_field(70_000, "entry count").is_err());
    }
}
