//! Attribute-list scanning.
//!
//! Parses the byte window between a tag name and its closing `>` or
//! `/>` into raw name/value slices. Value decoding happens in the
//! reader, which owns the entity table; this layer enforces the
//! attribute grammar and duplicate detection.

use std::collections::HashSet;

use memchr::memchr;

use crate::core::scanner::Scanner;
use crate::core::unicode::validate_name;
use crate::error::{name_to_str, Error, ErrorKind, Result};

/// A scanned attribute, values still raw.
#[derive(Debug, Clone, Copy)]
pub struct RawAttribute<'a> {
    /// Attribute name as written (may carry a prefix).
    pub name: &'a [u8],
    /// Raw value between the quotes, references unexpanded.
    pub value: &'a [u8],
    /// Absolute offset of the name.
    pub name_offset: usize,
    /// Absolute offset of the value.
    pub value_offset: usize,
}

impl<'a> RawAttribute<'a> {
    /// `(prefix, local)` split on the first colon.
    pub fn split_name(&self) -> (Option<&'a [u8]>, &'a [u8]) {
        match memchr(b':', self.name) {
            Some(pos) => (Some(&self.name[..pos]), &self.name[pos + 1..]),
            None => (None, self.name),
        }
    }
}

/// Scan the attribute window of a start/empty tag.
///
/// `window` is everything between the tag name and the terminating `>`
/// (exclusive of a trailing `/`); `base` is its absolute offset. The
/// tokenizer has already located the tag end with quote awareness, so
/// quotes inside `window` are balanced.
pub fn scan_attributes<'a>(
    window: &'a [u8],
    base: usize,
    strict: bool,
) -> Result<Vec<RawAttribute<'a>>> {
    let mut attrs: Vec<RawAttribute<'a>> = Vec::new();
    let mut seen: HashSet<&'a [u8]> = HashSet::new();
    let mut scanner = Scanner::new(window);

    loop {
        let ws = scanner.skip_whitespace();
        if scanner.is_at_end() {
            break;
        }
        let at = base + scanner.position();
        if ws == 0 {
            return Err(Error::new(
                ErrorKind::MalformedTag("whitespace required before attribute"),
                at,
            ));
        }

        let name = match scanner.read_name() {
            Some(name) => name,
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("attribute name expected"),
                    at,
                ))
            }
        };
        if strict {
            if validate_name(name).is_err() {
                return Err(Error::new(
                    ErrorKind::MalformedTag("attribute name is not a valid XML name"),
                    at,
                ));
            }
        }
        if !seen.insert(name) {
            return Err(Error::new(
                ErrorKind::DuplicateAttribute {
                    name: name_to_str(name),
                },
                at,
            ));
        }

        scanner.skip_whitespace();
        if scanner.peek() != Some(b'=') {
            return Err(Error::new(
                ErrorKind::MalformedTag("expected '=' after attribute name"),
                base + scanner.position(),
            ));
        }
        scanner.advance(1);
        scanner.skip_whitespace();

        let quote = match scanner.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("attribute value must be quoted"),
                    base + scanner.position(),
                ))
            }
        };
        scanner.advance(1);
        let value_start = scanner.position();
        let value_end = match scanner.find_byte(quote) {
            Some(end) => end,
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("attribute value is missing its closing quote"),
                    base + value_start,
                ))
            }
        };
        let value = scanner.slice(value_start, value_end);
        if let Some(lt) = memchr(b'<', value) {
            return Err(Error::new(
                ErrorKind::MalformedTag("'<' not allowed in attribute value"),
                base + value_start + lt,
            ));
        }

        attrs.push(RawAttribute {
            name,
            value,
            name_offset: at,
            value_offset: base + value_start,
        });
        scanner.set_position(value_end + 1);
    }

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(window: &[u8]) -> Result<Vec<RawAttribute<'_>>> {
        scan_attributes(window, 0, false)
    }

    #[test]
    fn test_simple_attributes() {
        let attrs = scan(b" id=\"test\" class=\"foo\"").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, b"id");
        assert_eq!(attrs[0].value, b"test");
        assert_eq!(attrs[1].name, b"class");
        assert_eq!(attrs[1].value, b"foo");
    }

    #[test]
    fn test_single_quoted() {
        let attrs = scan(b" id='te\"st'").unwrap();
        assert_eq!(attrs[0].value, b"te\"st");
    }

    #[test]
    fn test_whitespace_around_equals() {
        let attrs = scan(b"  id  =  \"v\"  ").unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, b"id");
        assert_eq!(attrs[0].value, b"v");
    }

    #[test]
    fn test_missing_whitespace_between_attributes() {
        let err = scan(b" a=\"1\"b=\"2\"").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedTag(_)));
    }

    #[test]
    fn test_duplicate_name() {
        let err = scan(b" a=\"1\" a=\"2\"").unwrap_err();
        match err.kind() {
            ErrorKind::DuplicateAttribute { name } => assert_eq!(&**name, "a"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.offset(), 7);
    }

    #[test]
    fn test_unquoted_value_rejected() {
        let err = scan(b" a=1").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedTag(_)));
    }

    #[test]
    fn test_missing_value_rejected() {
        let err = scan(b" disabled").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedTag(_)));
    }

    #[test]
    fn test_lt_in_value_rejected() {
        let err = scan(b" a=\"x<y\"").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedTag(_)));
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn test_split_name() {
        let attrs = scan(b" xmlns:xlink=\"http://www.w3.org/1999/xlink\"").unwrap();
        let (prefix, local) = attrs[0].split_name();
        assert_eq!(prefix, Some(b"xmlns" as &[u8]));
        assert_eq!(local, b"xlink");
    }

    #[test]
    fn test_strict_name_validation() {
        // Byte-level scan accepts any >= 0x80 byte; strict re-validates.
        let window = b" \xC2\xB7bad=\"v\"";
        assert!(scan_attributes(window, 0, false).is_ok());
        assert!(scan_attributes(window, 0, true).is_err());
    }

    #[test]
    fn test_empty_window() {
        assert!(scan(b"").unwrap().is_empty());
        assert!(scan(b"   ").unwrap().is_empty());
    }
}
