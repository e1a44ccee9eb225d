//! DOCTYPE declaration and internal-subset parsing.
//!
//! Reads `<!DOCTYPE name ExternalID? [ ... ]? >`, balancing the subset
//! delimiters with awareness of quoted literals, comments, and PIs.
//! ELEMENT/ATTLIST/NOTATION declarations and parameter-entity
//! references are skipped lexically; general `<!ENTITY>` declarations
//! are collected so that references in document content can be
//! resolved. No DTD validation is performed.

use crate::core::entities::{decode_entity_value, EntityValue};
use crate::core::scanner::Scanner;
use crate::core::unicode::validate_name;
use crate::error::{Error, ErrorKind, Result};

/// Result of scanning a DOCTYPE declaration.
#[derive(Debug)]
pub struct DoctypeScan {
    /// Span of the event payload: root-element name through the byte
    /// before the terminating `>`, internal subset included.
    pub body: (usize, usize),
    /// Offset just past the terminating `>`.
    pub end: usize,
    /// General entity declarations in document order.
    pub entities: Vec<(Vec<u8>, EntityValue)>,
}

/// Scan a DOCTYPE declaration.
///
/// `start` points just past `<!DOCTYPE`. With `at_end` false, running
/// off the end of the input yields `Incomplete` so a streaming caller
/// can grow the buffer and retry.
pub fn scan_doctype(
    input: &[u8],
    start: usize,
    at_end: bool,
    strict: bool,
) -> Result<DoctypeScan> {
    let mut scanner = Scanner::at(input, start);
    let mut entities = Vec::new();

    if scanner.skip_whitespace() == 0 {
        if scanner.is_at_end() {
            return Err(need_more(at_end, scanner.position()));
        }
        return Err(doctype_err("whitespace required after '<!DOCTYPE'", &scanner));
    }

    let body_start = scanner.position();
    let name = match scanner.read_name() {
        Some(name) => name,
        None => {
            if scanner.is_at_end() {
                return Err(need_more(at_end, scanner.position()));
            }
            return Err(doctype_err("root element name expected", &scanner));
        }
    };
    if strict && validate_name(name).is_err() {
        return Err(Error::new(
            ErrorKind::DoctypeError("root element name is not a valid XML name"),
            body_start,
        ));
    }

    scanner.skip_whitespace();
    if !at_end && truncated_keyword(&scanner, &[b"SYSTEM" as &[u8], b"PUBLIC"]) {
        return Err(need_more(at_end, scanner.position()));
    }
    if scanner.starts_with(b"SYSTEM") {
        scanner.advance(6);
        require_whitespace(&mut scanner, at_end, "whitespace required after SYSTEM")?;
        read_literal(&mut scanner, at_end)?;
        scanner.skip_whitespace();
    } else if scanner.starts_with(b"PUBLIC") {
        scanner.advance(6);
        require_whitespace(&mut scanner, at_end, "whitespace required after PUBLIC")?;
        read_literal(&mut scanner, at_end)?;
        require_whitespace(
            &mut scanner,
            at_end,
            "whitespace required between public and system literals",
        )?;
        read_literal(&mut scanner, at_end)?;
        scanner.skip_whitespace();
    }

    if scanner.peek() == Some(b'[') {
        scanner.advance(1);
        scan_internal_subset(&mut scanner, at_end, strict, &mut entities)?;
        scanner.skip_whitespace();
    }

    match scanner.peek() {
        Some(b'>') => {
            let gt = scanner.position();
            Ok(DoctypeScan {
                body: (body_start, gt),
                end: gt + 1,
                entities,
            })
        }
        Some(_) => Err(doctype_err("expected '>' to close DOCTYPE", &scanner)),
        None => Err(need_more(at_end, scanner.position())),
    }
}

/// Scan the `[ ... ]` region; the cursor starts just past `[` and is
/// left just past `]`.
fn scan_internal_subset(
    scanner: &mut Scanner<'_>,
    at_end: bool,
    strict: bool,
    entities: &mut Vec<(Vec<u8>, EntityValue)>,
) -> Result<()> {
    loop {
        scanner.skip_whitespace();
        match scanner.peek() {
            None => return Err(need_more(at_end, scanner.position())),
            Some(b']') => {
                scanner.advance(1);
                return Ok(());
            }
            Some(b'%') => {
                // Parameter-entity reference: balanced lexically, never
                // expanded.
                scanner.advance(1);
                match scanner.read_name() {
                    Some(_) if scanner.peek() == Some(b';') => scanner.advance(1),
                    _ => {
                        if scanner.is_at_end() {
                            return Err(need_more(at_end, scanner.position()));
                        }
                        return Err(doctype_err("malformed parameter entity reference", scanner));
                    }
                }
            }
            Some(b'<') => {
                if scanner.starts_with(b"<!--") {
                    scanner.advance(4);
                    match scanner.find_seq(b"-->") {
                        Some(close) => {
                            if strict {
                                let body = scanner.slice(scanner.position(), close);
                                if contains_double_hyphen(body) {
                                    return Err(Error::new(
                                        ErrorKind::InvalidComment("'--' in comment body"),
                                        scanner.position(),
                                    ));
                                }
                            }
                            scanner.set_position(close + 3);
                        }
                        None => return Err(need_more(at_end, scanner.position())),
                    }
                } else if scanner.starts_with(b"<?") {
                    scanner.advance(2);
                    match scanner.find_seq(b"?>") {
                        Some(close) => scanner.set_position(close + 2),
                        None => return Err(need_more(at_end, scanner.position())),
                    }
                } else if scanner.starts_with(b"<!ENTITY") {
                    scanner.advance(8);
                    scan_entity_decl(scanner, at_end, strict, entities)?;
                } else if scanner.starts_with(b"<!ELEMENT")
                    || scanner.starts_with(b"<!ATTLIST")
                    || scanner.starts_with(b"<!NOTATION")
                {
                    scanner.advance(2);
                    skip_markup_decl(scanner, at_end)?;
                } else if scanner.starts_with(b"<!") {
                    if scanner.has_remaining(10) || at_end {
                        return Err(doctype_err(
                            "unknown markup declaration in internal subset",
                            scanner,
                        ));
                    }
                    // Could still become one of the known openers.
                    return Err(need_more(at_end, scanner.position()));
                } else if scanner.has_remaining(2) || at_end {
                    return Err(doctype_err(
                        "element content not allowed in internal subset",
                        scanner,
                    ));
                } else {
                    return Err(need_more(at_end, scanner.position()));
                }
            }
            Some(_) => {
                return Err(doctype_err(
                    "unexpected character in internal subset",
                    scanner,
                ))
            }
        }
    }
}

/// Consume a `<!ENTITY ...>` declaration; the cursor starts just past
/// the keyword. General entity declarations are recorded; parameter
/// entity declarations are skipped.
fn scan_entity_decl(
    scanner: &mut Scanner<'_>,
    at_end: bool,
    strict: bool,
    entities: &mut Vec<(Vec<u8>, EntityValue)>,
) -> Result<()> {
    require_whitespace(scanner, at_end, "whitespace required after ENTITY")?;

    if scanner.peek() == Some(b'%') {
        // Parameter entity: balance and ignore.
        scanner.advance(1);
        require_whitespace(scanner, at_end, "whitespace required after '%'")?;
        skip_markup_decl(scanner, at_end)?;
        return Ok(());
    }

    let name_at = scanner.position();
    let name = match scanner.read_name() {
        Some(name) => name.to_vec(),
        None => {
            if scanner.is_at_end() {
                return Err(need_more(at_end, scanner.position()));
            }
            return Err(doctype_err("entity name expected", scanner));
        }
    };
    if strict && validate_name(&name).is_err() {
        return Err(Error::new(
            ErrorKind::DoctypeError("entity name is not a valid XML name"),
            name_at,
        ));
    }
    require_whitespace(scanner, at_end, "whitespace required after entity name")?;

    if !at_end && truncated_keyword(scanner, &[b"SYSTEM" as &[u8], b"PUBLIC"]) {
        return Err(need_more(at_end, scanner.position()));
    }
    let value = match scanner.peek() {
        Some(b'"' | b'\'') => {
            let (start, end) = read_literal(scanner, at_end)?;
            let raw = scanner.slice(start, end);
            EntityValue::Internal(decode_entity_value(raw, start)?)
        }
        Some(b'S') if scanner.starts_with(b"SYSTEM") => {
            scanner.advance(6);
            require_whitespace(scanner, at_end, "whitespace required after SYSTEM")?;
            let (start, end) = read_literal(scanner, at_end)?;
            EntityValue::External {
                system_id: scanner.slice(start, end).to_vec(),
                public_id: None,
            }
        }
        Some(b'P') if scanner.starts_with(b"PUBLIC") => {
            scanner.advance(6);
            require_whitespace(scanner, at_end, "whitespace required after PUBLIC")?;
            let (pub_start, pub_end) = read_literal(scanner, at_end)?;
            require_whitespace(
                scanner,
                at_end,
                "whitespace required between public and system literals",
            )?;
            let (sys_start, sys_end) = read_literal(scanner, at_end)?;
            EntityValue::External {
                system_id: scanner.slice(sys_start, sys_end).to_vec(),
                public_id: Some(scanner.slice(pub_start, pub_end).to_vec()),
            }
        }
        Some(_) => return Err(doctype_err("entity value or external id expected", scanner)),
        None => return Err(need_more(at_end, scanner.position())),
    };

    // Optional NDATA clause on external entities; the notation name is
    // not interpreted.
    scanner.skip_whitespace();
    if !at_end && truncated_keyword(scanner, &[b"NDATA" as &[u8]]) {
        return Err(need_more(at_end, scanner.position()));
    }
    if scanner.starts_with(b"NDATA") {
        if matches!(value, EntityValue::Internal(_)) {
            return Err(doctype_err("NDATA not allowed on internal entities", scanner));
        }
        scanner.advance(5);
        require_whitespace(scanner, at_end, "whitespace required after NDATA")?;
        if scanner.read_name().is_none() {
            if scanner.is_at_end() {
                return Err(need_more(at_end, scanner.position()));
            }
            return Err(doctype_err("notation name expected after NDATA", scanner));
        }
        scanner.skip_whitespace();
    }

    match scanner.peek() {
        Some(b'>') => {
            scanner.advance(1);
            entities.push((name, value));
            Ok(())
        }
        Some(_) => Err(doctype_err("expected '>' to close entity declaration", scanner)),
        None => Err(need_more(at_end, scanner.position())),
    }
}

/// Skip to the `>` that closes the current markup declaration, paying
/// attention to quoted literals so a `>` inside one does not terminate.
fn skip_markup_decl(scanner: &mut Scanner<'_>, at_end: bool) -> Result<()> {
    let mut in_string = false;
    let mut string_char = 0u8;
    while let Some(b) = scanner.peek() {
        if in_string {
            if b == string_char {
                in_string = false;
            }
            scanner.advance(1);
        } else {
            match b {
                b'"' | b'\'' => {
                    in_string = true;
                    string_char = b;
                    scanner.advance(1);
                }
                b'>' => {
                    scanner.advance(1);
                    return Ok(());
                }
                _ => scanner.advance(1),
            }
        }
    }
    Err(need_more(at_end, scanner.position()))
}

/// Read a quoted literal, returning the content span; the cursor is
/// left just past the closing quote.
fn read_literal(scanner: &mut Scanner<'_>, at_end: bool) -> Result<(usize, usize)> {
    let quote = match scanner.peek() {
        Some(q @ (b'"' | b'\'')) => q,
        Some(_) => return Err(doctype_err("quoted literal expected", scanner)),
        None => return Err(need_more(at_end, scanner.position())),
    };
    scanner.advance(1);
    let start = scanner.position();
    match scanner.find_byte(quote) {
        Some(end) => {
            scanner.set_position(end + 1);
            Ok((start, end))
        }
        None => Err(need_more(at_end, scanner.position())),
    }
}

fn require_whitespace(scanner: &mut Scanner<'_>, at_end: bool, msg: &'static str) -> Result<()> {
    if scanner.skip_whitespace() == 0 {
        if scanner.is_at_end() {
            return Err(need_more(at_end, scanner.position()));
        }
        return Err(Error::new(ErrorKind::DoctypeError(msg), scanner.position()));
    }
    Ok(())
}

fn contains_double_hyphen(body: &[u8]) -> bool {
    body.windows(2).any(|w| w == b"--")
}

/// True if the remaining input is a proper, non-empty prefix of one of
/// `keywords`; with more data it could still complete.
fn truncated_keyword(scanner: &Scanner<'_>, keywords: &[&[u8]]) -> bool {
    let rest = scanner.remaining();
    !rest.is_empty()
        && keywords
            .iter()
            .any(|kw| kw.len() > rest.len() && kw.starts_with(rest))
}

fn doctype_err(msg: &'static str, scanner: &Scanner<'_>) -> Error {
    Error::new(ErrorKind::DoctypeError(msg), scanner.position())
}

fn need_more(at_end: bool, pos: usize) -> Error {
    if at_end {
        Error::new(ErrorKind::UnexpectedEof, pos)
    } else {
        Error::new(ErrorKind::Incomplete, pos)
    }
}
