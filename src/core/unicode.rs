//! XML 1.0 Unicode character classes.
//!
//! Name and character predicates per the XML 1.0 Fifth Edition
//! productions: NameStartChar [4], NameChar [4a], Char [2], S [3].
//! ASCII is handled by direct matches; everything else by binary search
//! over the normative code point ranges.

/// NameStartChar ranges above ASCII, inclusive on both ends.
const NAME_START_RANGES: &[(u32, u32)] = &[
    (0xC0, 0xD6),
    (0xD8, 0xF6),
    (0xF8, 0x2FF),
    (0x370, 0x37D),
    (0x37F, 0x1FFF),
    (0x200C, 0x200D),
    (0x2070, 0x218F),
    (0x2C00, 0x2FEF),
    (0x3001, 0xD7FF),
    (0xF900, 0xFDCF),
    (0xFDF0, 0xFFFD),
    (0x10000, 0xEFFFF),
];

/// Additional NameChar ranges above ASCII (on top of NameStartChar).
const NAME_CONTINUE_EXTRA_RANGES: &[(u32, u32)] = &[
    (0xB7, 0xB7),
    (0x300, 0x36F),
    (0x203F, 0x2040),
];

#[inline]
fn in_ranges(cp: u32, ranges: &[(u32, u32)]) -> bool {
    ranges
        .binary_search_by(|&(lo, hi)| {
            if cp < lo {
                std::cmp::Ordering::Greater
            } else if cp > hi {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// True for the XML whitespace set: space, tab, LF, CR.
#[inline]
pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Byte-level variant of [`is_xml_whitespace`].
#[inline]
pub fn is_xml_whitespace_byte(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// True if every byte of `s` is XML whitespace.
pub fn is_all_whitespace(s: &[u8]) -> bool {
    s.iter().all(|&b| is_xml_whitespace_byte(b))
}

/// NameStartChar: `:` | `_` | `A-Z` | `a-z` | the 5e Unicode ranges.
#[inline]
pub fn is_name_start_char(c: char) -> bool {
    match c {
        ':' | '_' | 'A'..='Z' | 'a'..='z' => true,
        c if (c as u32) < 0x80 => false,
        c => in_ranges(c as u32, NAME_START_RANGES),
    }
}

/// NameChar: NameStartChar | `-` | `.` | `0-9` | `·` | combining marks
/// and extenders per the 5e ranges.
#[inline]
pub fn is_name_char(c: char) -> bool {
    match c {
        ':' | '_' | '-' | '.' | 'A'..='Z' | 'a'..='z' | '0'..='9' => true,
        c if (c as u32) < 0x80 => false,
        c => {
            let cp = c as u32;
            in_ranges(cp, NAME_START_RANGES) || in_ranges(cp, NAME_CONTINUE_EXTRA_RANGES)
        }
    }
}

/// Char: `#x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] |
/// [#x10000-#x10FFFF]`.
#[inline]
pub fn is_xml_char(cp: u32) -> bool {
    matches!(cp,
        0x9 | 0xA | 0xD
        | 0x20..=0xD7FF
        | 0xE000..=0xFFFD
        | 0x10000..=0x10FFFF)
}

/// ASCII fast path: may this byte start a name? Bytes >= 0x80 start a
/// multi-byte sequence and need the `char`-level check.
#[inline]
pub fn is_name_start_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// ASCII fast path: may this byte continue a name?
#[inline]
pub fn is_name_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

/// Validate a full name against the Unicode productions.
///
/// Returns the reason on failure. Used on the strict path; the lenient
/// scanner accepts anything that passes the byte-level fast path.
pub fn validate_name(name: &[u8]) -> std::result::Result<(), &'static str> {
    let s = std::str::from_utf8(name).map_err(|_| "name is not valid UTF-8")?;
    let mut chars = s.chars();
    match chars.next() {
        None => return Err("name is empty"),
        Some(c) if !is_name_start_char(c) => {
            return Err("name starts with a character that is not a NameStartChar")
        }
        Some(_) => {}
    }
    for c in chars {
        if !is_name_char(c) {
            return Err("name contains a character that is not a NameChar");
        }
    }
    Ok(())
}

/// Check that every character of `s` is an XML Char.
///
/// Returns the offending code point and its byte offset within `s`.
pub fn check_chars(s: &str) -> std::result::Result<(), (u32, usize)> {
    for (i, c) in s.char_indices() {
        if !is_xml_char(c as u32) {
            return Err((c as u32, i));
        }
    }
    Ok(())
}
