//! The public reader surface.
//!
//! Two reader flavors share one event-construction core:
//! - [`slice::Reader`]: zero-copy over a fully loaded byte slice
//! - [`buffered::StreamReader`]: incremental over a growable buffer
//!   fed by a [`buffered::ByteSource`]

pub mod buffered;
pub mod config;
pub mod events;
pub mod namespaces;
pub mod slice;

use std::borrow::Cow;

use memchr::{memchr_iter, memrchr};

use crate::core::attributes::scan_attributes;
use crate::core::entities::{Decoder, EntityResolver, EntityTable, EntityValue};
use crate::core::tokenizer::{Token, TokenKind};
use crate::core::unicode::{is_all_whitespace, is_xml_whitespace_byte};
use crate::error::{name_to_str, Error, ErrorKind, Result};
use self::config::Config;
use self::events::{Attr, ElementEnd, ElementStart, Event, TextData, XmlDeclaration};

/// Byte offset plus derived line and column (both 1-based; the column
/// counts bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Absolute byte offset.
    pub offset: usize,
    /// 1-based line number.
    pub line: u64,
    /// 1-based byte column within the line.
    pub column: u64,
}

impl Position {
    pub(crate) fn start() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Advance over `bytes`.
    pub(crate) fn advance(&mut self, bytes: &[u8]) {
        self.offset += bytes.len();
        match memrchr(b'\n', bytes) {
            Some(last) => {
                self.line += memchr_iter(b'\n', bytes).count() as u64;
                self.column = (bytes.len() - last) as u64;
            }
            None => self.column += bytes.len() as u64,
        }
    }
}

/// State shared by both reader flavors: configuration, the entity
/// table, the nesting stack, the external-entity hook, and the
/// position counter.
pub(crate) struct ReaderCore {
    pub(crate) config: Config,
    pub(crate) entities: EntityTable,
    pub(crate) stack: Vec<Vec<u8>>,
    pub(crate) resolver: Option<Box<dyn EntityResolver>>,
    pub(crate) position: Position,
}

impl ReaderCore {
    pub(crate) fn new(config: Config) -> Self {
        ReaderCore {
            config,
            entities: EntityTable::new(),
            stack: Vec::new(),
            resolver: None,
            position: Position::start(),
        }
    }

    /// Build the event for a token. Returns None when the event is
    /// suppressed (text trimmed down to nothing).
    pub(crate) fn event_from_token<'b>(
        &mut self,
        input: &'b [u8],
        token: &Token,
        doctype_entities: Vec<(Vec<u8>, EntityValue)>,
    ) -> Result<Option<Event<'b>>> {
        let event = match token.kind {
            TokenKind::Eof => Some(Event::Eof),

            TokenKind::StartTag => {
                let element = self.element(input, token)?;
                self.stack.push(element.name.as_ref().to_vec());
                Some(Event::Start(element))
            }

            TokenKind::EmptyTag => Some(Event::Empty(self.element(input, token)?)),

            TokenKind::EndTag => {
                let name = span(input, token.name, token)?;
                self.close_element(name, token.span.0)?;
                Some(Event::End(ElementEnd {
                    name: Cow::Borrowed(name),
                }))
            }

            TokenKind::Text => {
                let raw = span(input, token.content, token)?;
                let decoded = self
                    .decoder()
                    .decode_text(raw, token.content.map(|c| c.0).unwrap_or(token.span.0))?;
                let decoded = if self.config.trim_text {
                    trim_cow(decoded)
                } else {
                    decoded
                };
                if decoded.is_empty() && self.config.trim_text {
                    None
                } else {
                    let whitespace_only = is_all_whitespace(&decoded);
                    Some(Event::Text(TextData::new(decoded, whitespace_only)))
                }
            }

            TokenKind::CData => Some(Event::CData(Cow::Borrowed(span(input, token.content, token)?))),

            TokenKind::Comment => {
                Some(Event::Comment(Cow::Borrowed(span(input, token.content, token)?)))
            }

            TokenKind::Pi => {
                let target = span(input, token.name, token)?;
                let data = span(input, token.content, token)?;
                Some(Event::Pi {
                    target: Cow::Borrowed(target),
                    data: if data.is_empty() {
                        None
                    } else {
                        Some(Cow::Borrowed(data))
                    },
                })
            }

            TokenKind::XmlDecl => Some(Event::Decl(self.parse_declaration(input, token)?)),

            TokenKind::DocType => {
                for (name, value) in doctype_entities {
                    // First declaration wins; later ones are ignored.
                    self.entities.define(&name, value);
                }
                Some(Event::DocType(Cow::Borrowed(span(input, token.content, token)?)))
            }
        };

        // Errors keep the position of the last good event.
        self.position.advance(&input[self.position.offset..token.span.1]);
        Ok(event)
    }

    fn decoder<'s>(&'s mut self) -> Decoder<'s> {
        Decoder::new(
            &self.entities,
            self.resolver.as_deref_mut(),
            self.config.expand_entities,
            self.config.keep_unknown_entities,
        )
    }

    fn element<'b>(&mut self, input: &'b [u8], token: &Token) -> Result<ElementStart<'b>> {
        let name = span(input, token.name, token)?;
        let window = span(input, token.content, token)?;
        let base = token.content.map(|c| c.0).unwrap_or(token.span.0);

        let raw_attrs = scan_attributes(window, base, self.config.strict)?;
        let mut attributes = Vec::with_capacity(raw_attrs.len());
        for raw in &raw_attrs {
            let value = self.decoder().decode_attribute(raw.value, raw.value_offset)?;
            attributes.push(Attr {
                name: Cow::Borrowed(raw.name),
                value,
            });
        }
        Ok(ElementStart {
            name: Cow::Borrowed(name),
            attributes,
        })
    }

    fn close_element(&mut self, name: &[u8], at: usize) -> Result<()> {
        if self.config.allow_unmatched_ends {
            if self.stack.last().map(|top| top.as_slice()) == Some(name) {
                self.stack.pop();
            }
            return Ok(());
        }
        if !self.config.check_end_names {
            self.stack.pop();
            return Ok(());
        }
        match self.stack.pop() {
            Some(top) if top == name => Ok(()),
            Some(top) => Err(Error::new(
                ErrorKind::MismatchedEnd {
                    expected: name_to_str(&top),
                    found: name_to_str(name),
                },
                at,
            )),
            None => Err(Error::new(
                ErrorKind::MismatchedEnd {
                    expected: "".into(),
                    found: name_to_str(name),
                },
                at,
            )),
        }
    }

    fn parse_declaration<'b>(
        &mut self,
        input: &'b [u8],
        token: &Token,
    ) -> Result<XmlDeclaration<'b>> {
        let window = span(input, token.content, token)?;
        let base = token.content.map(|c| c.0).unwrap_or(token.span.0);
        let attrs = scan_attributes(window, base, self.config.strict)?;

        let find = |key: &[u8]| attrs.iter().find(|a| a.name == key);

        let version = match find(b"version") {
            Some(attr) => Cow::Borrowed(attr.value),
            None if self.config.strict => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("XML declaration requires a version"),
                    token.span.0,
                ))
            }
            None => Cow::Borrowed(b"1.0".as_slice()),
        };
        if self.config.strict && attrs.first().map(|a| a.name) != Some(b"version".as_slice()) {
            return Err(Error::new(
                ErrorKind::MalformedTag("version must come first in the XML declaration"),
                token.span.0,
            ));
        }

        let encoding = find(b"encoding").map(|attr| Cow::Borrowed(attr.value));
        if self.config.strict {
            if let Some(enc) = &encoding {
                if !is_canonical_encoding(enc) {
                    return Err(Error::new(
                        ErrorKind::MalformedTag("malformed encoding name in XML declaration"),
                        token.span.0,
                    ));
                }
            }
        }

        let standalone = match find(b"standalone") {
            Some(attr) if attr.value == b"yes" => Some(true),
            Some(attr) if attr.value == b"no" => Some(false),
            Some(_) if self.config.strict => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("standalone must be 'yes' or 'no'"),
                    token.span.0,
                ))
            }
            Some(_) => Some(false),
            None => None,
        };

        Ok(XmlDeclaration {
            version,
            encoding,
            standalone,
        })
    }
}

/// EncName: an ASCII letter followed by letters, digits, `.`, `_`, `-`.
fn is_canonical_encoding(name: &[u8]) -> bool {
    match name.first() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name[1..]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

fn span<'b>(input: &'b [u8], range: Option<(usize, usize)>, token: &Token) -> Result<&'b [u8]> {
    match range {
        Some((start, end)) => Ok(&input[start..end]),
        None => Err(Error::new(
            ErrorKind::MalformedTag("token is missing a payload"),
            token.span.0,
        )),
    }
}

fn trim_cow(value: Cow<'_, [u8]>) -> Cow<'_, [u8]> {
    let bytes = value.as_ref();
    let start = bytes
        .iter()
        .position(|b| !is_xml_whitespace_byte(*b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !is_xml_whitespace_byte(*b))
        .map(|i| i + 1)
        .unwrap_or(start);
    if start == 0 && end == bytes.len() {
        return value;
    }
    match value {
        Cow::Borrowed(slice) => Cow::Borrowed(&slice[start..end]),
        Cow::Owned(mut vec) => {
            vec.truncate(end);
            vec.drain(..start);
            Cow::Owned(vec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advance() {
        let mut position = Position::start();
        position.advance(b"abc");
        assert_eq!((position.offset, position.line, position.column), (3, 1, 4));
        position.advance(b"d\nef\ngh");
        assert_eq!((position.offset, position.line, position.column), (10, 3, 3));
    }

    #[test]
    fn test_trim_cow() {
        let trimmed = trim_cow(Cow::Borrowed(b"  hi \n".as_slice()));
        assert_eq!(trimmed.as_ref(), b"hi");
        let trimmed = trim_cow(Cow::Owned(b" \t ".to_vec()));
        assert!(trimmed.is_empty());
        let untouched = trim_cow(Cow::Borrowed(b"hi".as_slice()));
        assert!(matches!(untouched, Cow::Borrowed(_)));
    }

    #[test]
    fn test_canonical_encoding() {
        assert!(is_canonical_encoding(b"UTF-8"));
        assert!(is_canonical_encoding(b"ISO-8859-1"));
        assert!(!is_canonical_encoding(b"8bit"));
        assert!(!is_canonical_encoding(b""));
        assert!(!is_canonical_encoding(b"utf 8"));
    }
}
