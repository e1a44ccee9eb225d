//! Byte order mark handling and UTF-8 checks.
//!
//! The parser works on UTF-8 only. A leading UTF-8 BOM is consumed
//! silently; a UTF-16 BOM is detected and reported, never transcoded.

use crate::error::{Error, ErrorKind, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Inspect the start of the document for a byte order mark.
///
/// Returns how many bytes to skip (3 for a UTF-8 BOM, 0 otherwise).
pub fn skip_bom(input: &[u8]) -> Result<usize> {
    if input.starts_with(UTF8_BOM) {
        return Ok(3);
    }
    if input.starts_with(UTF16_LE_BOM) {
        return Err(Error::new(
            ErrorKind::InvalidEncoding("UTF-16 little-endian input, expected UTF-8"),
            0,
        ));
    }
    if input.starts_with(UTF16_BE_BOM) {
        return Err(Error::new(
            ErrorKind::InvalidEncoding("UTF-16 big-endian input, expected UTF-8"),
            0,
        ));
    }
    Ok(0)
}

/// Decode a payload slice as UTF-8, reporting failures at `offset`.
pub fn as_utf8(bytes: &[u8], offset: usize) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        Error::new(
            ErrorKind::InvalidEncoding("input is not valid UTF-8"),
            offset + e.valid_up_to(),
        )
    })
}

/// Strict-mode check that a payload contains only XML Chars.
pub fn check_xml_chars(bytes: &[u8], offset: usize) -> Result<()> {
    let s = as_utf8(bytes, offset)?;
    match crate::core::unicode::check_chars(s) {
        Ok(()) => Ok(()),
        Err((cp, at)) => Err(Error::new(ErrorKind::InvalidChar(cp), offset + at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_bom_is_skipped() {
        assert_eq!(skip_bom(b"\xEF\xBB\xBF<r/>").unwrap(), 3);
        assert_eq!(skip_bom(b"<r/>").unwrap(), 0);
    }

    #[test]
    fn test_utf16_bom_is_rejected() {
        assert!(skip_bom(b"\xFF\xFE<\x00r\x00").is_err());
        assert!(skip_bom(b"\xFE\xFF\x00<\x00r").is_err());
    }

    #[test]
    fn test_invalid_utf8_offset() {
        let err = as_utf8(b"ab\xFFcd", 10).unwrap_err();
        assert_eq!(err.offset(), 12);
        assert!(matches!(err.kind(), ErrorKind::InvalidEncoding(_)));
    }

    #[test]
    fn test_check_xml_chars() {
        assert!(check_xml_chars(b"ok\ttext\n", 0).is_ok());
        let err = check_xml_chars(b"a\x01b", 4).unwrap_err();
        assert_eq!(err.offset(), 5);
        assert!(matches!(err.kind(), ErrorKind::InvalidChar(1)));
    }
}
