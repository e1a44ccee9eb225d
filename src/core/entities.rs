//! Entity table and reference resolution.
//!
//! Decodes character data and attribute values: line-ending
//! normalization first, then `&#N;` / `&#xH;` character references and
//! named entity references. Replacement text is re-scanned, with the
//! chain of entities currently being expanded tracked so cycles are
//! detected rather than looping. Uses Cow for zero-copy when the input
//! needs no rewriting.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io;

use memchr::memchr2;

use crate::core::unicode::{is_name_byte, is_xml_char};
use crate::error::{name_to_str, Error, ErrorKind, Result};

/// Bound on nested entity expansion.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Replacement text for the five predefined entities.
pub fn builtin(name: &[u8]) -> Option<&'static [u8]> {
    match name {
        b"lt" => Some(b"<"),
        b"gt" => Some(b">"),
        b"amp" => Some(b"&"),
        b"apos" => Some(b"'"),
        b"quot" => Some(b"\""),
        _ => None,
    }
}

/// Definition of a general entity collected from the internal subset.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    /// Internal entity: literal replacement text, character references
    /// already expanded.
    Internal(Vec<u8>),
    /// External entity: resolved through the [`EntityResolver`] hook,
    /// never by the core itself.
    External {
        /// The SYSTEM literal.
        system_id: Vec<u8>,
        /// The PUBLIC literal, when declared with PUBLIC.
        public_id: Option<Vec<u8>>,
    },
}

/// General entities declared in the DOCTYPE internal subset.
///
/// The five built-ins are implicit and cannot be shadowed. Later
/// declarations for an already-known name are ignored (first wins).
#[derive(Debug, Default)]
pub struct EntityTable {
    defs: HashMap<Vec<u8>, EntityValue>,
}

impl EntityTable {
    /// Empty table (built-ins only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Returns false if the name was already taken.
    pub fn define(&mut self, name: &[u8], value: EntityValue) -> bool {
        if builtin(name).is_some() || self.defs.contains_key(name) {
            return false;
        }
        self.defs.insert(name.to_vec(), value);
        true
    }

    /// Look up a user-declared entity by exact name.
    pub fn get(&self, name: &[u8]) -> Option<&EntityValue> {
        self.defs.get(name)
    }
}

/// Hook for resolving external entities.
///
/// The core never touches the filesystem; a byte-source adapter that
/// knows where the document came from can implement this to load
/// `<!ENTITY name SYSTEM "...">` replacement text.
pub trait EntityResolver {
    /// Return the replacement bytes for `name` with the given SYSTEM id.
    fn resolve_external(&mut self, name: &[u8], system_id: &[u8]) -> io::Result<Vec<u8>>;
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Text,
    Attribute,
}

/// Reference-expanding decoder for character data and attribute values.
pub struct Decoder<'t> {
    table: &'t EntityTable,
    resolver: Option<&'t mut (dyn EntityResolver + 'static)>,
    expand_entities: bool,
    keep_unknown: bool,
}

impl<'t> Decoder<'t> {
    /// Create a decoder over the given entity table.
    pub fn new(
        table: &'t EntityTable,
        resolver: Option<&'t mut (dyn EntityResolver + 'static)>,
        expand_entities: bool,
        keep_unknown: bool,
    ) -> Self {
        Decoder {
            table,
            resolver,
            expand_entities,
            keep_unknown,
        }
    }

    /// Decode a character-data segment. `offset` is the absolute
    /// position of `raw` in the document, used for error reporting.
    pub fn decode_text<'r>(&mut self, raw: &'r [u8], offset: usize) -> Result<Cow<'r, [u8]>> {
        self.decode(raw, offset, Mode::Text)
    }

    /// Decode an attribute value, applying attribute-value
    /// normalization: every literal whitespace character becomes a
    /// single space; whitespace produced by character references is
    /// preserved verbatim.
    pub fn decode_attribute<'r>(&mut self, raw: &'r [u8], offset: usize) -> Result<Cow<'r, [u8]>> {
        self.decode(raw, offset, Mode::Attribute)
    }

    fn decode<'r>(&mut self, raw: &'r [u8], offset: usize, mode: Mode) -> Result<Cow<'r, [u8]>> {
        let untouched = match mode {
            Mode::Text => memchr2(b'&', b'\r', raw).is_none(),
            Mode::Attribute => {
                memchr2(b'&', b'\r', raw).is_none() && memchr2(b'\t', b'\n', raw).is_none()
            }
        };
        if untouched {
            return Ok(Cow::Borrowed(raw));
        }
        if !self.expand_entities {
            return Ok(Cow::Owned(normalize_only(raw, mode)));
        }

        let mut out = Vec::with_capacity(raw.len());
        let mut chain = Vec::new();
        self.decode_into(raw, offset, mode, &mut chain, &mut out)?;
        Ok(Cow::Owned(out))
    }

    fn decode_into(
        &mut self,
        raw: &[u8],
        offset: usize,
        mode: Mode,
        chain: &mut Vec<Vec<u8>>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let mut pos = 0;
        while pos < raw.len() {
            match raw[pos] {
                b'\r' => {
                    out.push(if mode == Mode::Attribute { b' ' } else { b'\n' });
                    pos += 1;
                    if raw.get(pos) == Some(&b'\n') {
                        pos += 1;
                    }
                }
                b'\t' | b'\n' if mode == Mode::Attribute => {
                    out.push(b' ');
                    pos += 1;
                }
                b'&' => {
                    pos = self.expand_reference(raw, pos, offset, mode, chain, out)?;
                }
                _ => {
                    // Copy the run up to the next byte of interest.
                    let stop = match mode {
                        Mode::Text => memchr2(b'&', b'\r', &raw[pos..]),
                        Mode::Attribute => {
                            let a = memchr2(b'&', b'\r', &raw[pos..]);
                            let b = memchr2(b'\t', b'\n', &raw[pos..]);
                            match (a, b) {
                                (Some(x), Some(y)) => Some(x.min(y)),
                                (x, y) => x.or(y),
                            }
                        }
                    };
                    let end = stop.map(|i| pos + i).unwrap_or(raw.len());
                    out.extend_from_slice(&raw[pos..end]);
                    pos = end;
                }
            }
        }
        Ok(())
    }

    /// Expand the reference starting at `raw[pos] == b'&'`; returns the
    /// position just past its `;`.
    fn expand_reference(
        &mut self,
        raw: &[u8],
        pos: usize,
        offset: usize,
        mode: Mode,
        chain: &mut Vec<Vec<u8>>,
        out: &mut Vec<u8>,
    ) -> Result<usize> {
        let ref_offset = offset + pos;
        let rest = &raw[pos + 1..];

        if rest.first() == Some(&b'#') {
            let (c, len) = parse_char_ref(&rest[1..], ref_offset)?;
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            // '&' '#' body ';'
            return Ok(pos + 2 + len + 1);
        }

        let mut name_len = 0;
        while name_len < rest.len() && is_name_byte(rest[name_len]) {
            name_len += 1;
        }
        if name_len == 0 || rest.get(name_len) != Some(&b';') {
            return Err(Error::new(
                ErrorKind::InvalidReference("'&' does not start a reference"),
                ref_offset,
            ));
        }
        let name = &rest[..name_len];
        let after = pos + 1 + name_len + 1;

        if let Some(replacement) = builtin(name) {
            out.extend_from_slice(replacement);
            return Ok(after);
        }

        let table = self.table;
        match table.get(name) {
            Some(EntityValue::Internal(value)) => {
                self.enter(name, ref_offset, chain)?;
                self.decode_into(value, ref_offset, mode, chain, out)?;
                chain.pop();
            }
            Some(EntityValue::External { system_id, .. }) => {
                if mode == Mode::Attribute {
                    return Err(Error::new(
                        ErrorKind::InvalidReference(
                            "external entity reference in attribute value",
                        ),
                        ref_offset,
                    ));
                }
                let resolver = match self.resolver.as_deref_mut() {
                    Some(r) => r,
                    None => {
                        return Err(Error::new(
                            ErrorKind::UnknownEntity {
                                name: name_to_str(name),
                            },
                            ref_offset,
                        ))
                    }
                };
                let bytes = resolver
                    .resolve_external(name, system_id)
                    .map_err(|e| Error::io(e, ref_offset))?;
                self.enter(name, ref_offset, chain)?;
                self.decode_into(&bytes, ref_offset, mode, chain, out)?;
                chain.pop();
            }
            None if self.keep_unknown => {
                out.extend_from_slice(&raw[pos..after]);
            }
            None => {
                return Err(Error::new(
                    ErrorKind::UnknownEntity {
                        name: name_to_str(name),
                    },
                    ref_offset,
                ))
            }
        }
        Ok(after)
    }

    fn enter(&self, name: &[u8], ref_offset: usize, chain: &mut Vec<Vec<u8>>) -> Result<()> {
        if chain.iter().any(|n| n == name) || chain.len() >= MAX_EXPANSION_DEPTH {
            return Err(Error::new(
                ErrorKind::RecursiveEntity {
                    name: name_to_str(name),
                },
                ref_offset,
            ));
        }
        chain.push(name.to_vec());
        Ok(())
    }
}

/// Parse the body of a character reference after `&#`.
///
/// Returns the referenced character and the length of the body (digits,
/// including the leading `x` for hex). The code point must be an XML
/// Char.
fn parse_char_ref(body: &[u8], ref_offset: usize) -> Result<(char, usize)> {
    let invalid = |msg| Err(Error::new(ErrorKind::InvalidReference(msg), ref_offset));

    let (digits_at, radix) = if body.first() == Some(&b'x') {
        (1, 16)
    } else {
        (0, 10)
    };
    let mut cp: u32 = 0;
    let mut len = digits_at;
    while len < body.len() {
        let d = match (body[len], radix) {
            (b'0'..=b'9', _) => (body[len] - b'0') as u32,
            (b'a'..=b'f', 16) => (body[len] - b'a' + 10) as u32,
            (b'A'..=b'F', 16) => (body[len] - b'A' + 10) as u32,
            _ => break,
        };
        cp = match cp.checked_mul(radix).and_then(|v| v.checked_add(d)) {
            Some(v) if v <= 0x0010_FFFF => v,
            _ => return invalid("character reference out of range"),
        };
        len += 1;
    }
    if len == digits_at {
        return invalid("character reference without digits");
    }
    if body.get(len) != Some(&b';') {
        return invalid("character reference not terminated by ';'");
    }
    if !is_xml_char(cp) {
        return Err(Error::new(ErrorKind::InvalidChar(cp), ref_offset));
    }
    match char::from_u32(cp) {
        Some(c) => Ok((c, len)),
        None => Err(Error::new(ErrorKind::InvalidChar(cp), ref_offset)),
    }
}

/// Normalize line endings (and attribute whitespace) without touching
/// references. Used when entity expansion is disabled.
fn normalize_only(raw: &[u8], mode: Mode) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0;
    while pos < raw.len() {
        match raw[pos] {
            b'\r' => {
                out.push(if mode == Mode::Attribute { b' ' } else { b'\n' });
                pos += 1;
                if raw.get(pos) == Some(&b'\n') {
                    pos += 1;
                }
            }
            b'\t' | b'\n' if mode == Mode::Attribute => {
                out.push(b' ');
                pos += 1;
            }
            b => {
                out.push(b);
                pos += 1;
            }
        }
    }
    out
}

/// Decode an entity-value literal from an `<!ENTITY ...>` declaration.
///
/// Character references are expanded here, at declaration time; general
/// entity references and parameter entity references are bypassed, left
/// verbatim for expansion at reference time. Line endings are
/// normalized.
pub fn decode_entity_value(raw: &[u8], offset: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0;
    while pos < raw.len() {
        match raw[pos] {
            b'\r' => {
                out.push(b'\n');
                pos += 1;
                if raw.get(pos) == Some(&b'\n') {
                    pos += 1;
                }
            }
            b'&' if raw.get(pos + 1) == Some(&b'#') => {
                let (c, len) = parse_char_ref(&raw[pos + 2..], offset + pos)?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                pos += 2 + len + 1;
            }
            b'&' => {
                // General entity reference: bypassed, but must still be
                // lexically well formed.
                let rest = &raw[pos + 1..];
                let mut name_len = 0;
                while name_len < rest.len() && is_name_byte(rest[name_len]) {
                    name_len += 1;
                }
                if name_len == 0 || rest.get(name_len) != Some(&b';') {
                    return Err(Error::new(
                        ErrorKind::InvalidReference("'&' does not start a reference"),
                        offset + pos,
                    ));
                }
                out.extend_from_slice(&raw[pos..pos + 1 + name_len + 1]);
                pos += 1 + name_len + 1;
            }
            _ => {
                let end = memchr2(b'&', b'\r', &raw[pos..])
                    .map(|i| pos + i)
                    .unwrap_or(raw.len());
                out.extend_from_slice(&raw[pos..end]);
                pos = end;
            }
        }
    }
    Ok(out)
}
