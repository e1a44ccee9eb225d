//! Lexical state machine for XML token extraction.
//!
//! Classifies the input into start/end/empty tags, text, CDATA
//! sections, comments, processing instructions, the XML declaration,
//! and DOCTYPE, enforcing the document-level trajectory: optional
//! declaration first, at most one DOCTYPE before the root, exactly one
//! root element, whitespace-only text outside it.
//!
//! Tokens carry byte spans, not slices, so the same machine drives both
//! the zero-copy slice reader and the streaming reader. When a token
//! runs off the end of the buffer and `at_end` is false the machine
//! rewinds and reports `Incomplete`; the streaming reader grows its
//! buffer and resumes from the extracted [`TokenizerState`].

use crate::core::dtd;
use crate::core::encoding;
use crate::core::entities::EntityValue;
use crate::core::scanner::Scanner;
use crate::core::unicode::{is_all_whitespace, is_name_start_byte, validate_name};
use crate::error::{Error, ErrorKind, Result};

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<name ...>`
    StartTag,
    /// `</name>`
    EndTag,
    /// `<name .../>`
    EmptyTag,
    /// Character data between tags.
    Text,
    /// `<![CDATA[...]]>`
    CData,
    /// `<!-- ... -->`
    Comment,
    /// `<?target data?>`
    Pi,
    /// `<?xml version=...?>` as the first token.
    XmlDecl,
    /// `<!DOCTYPE ...>`
    DocType,
    /// Input exhausted at a valid terminal position.
    Eof,
}

/// A scanned token; all positions are absolute byte offsets.
#[derive(Debug, Clone, Copy)]
pub struct Token {
    /// Kind of the token.
    pub kind: TokenKind,
    /// Outer span, from the first byte of the token to just past its
    /// last.
    pub span: (usize, usize),
    /// Tag name / PI target span.
    pub name: Option<(usize, usize)>,
    /// Payload span: text content, comment body, CDATA body, PI data,
    /// attribute window of a tag, DOCTYPE body.
    pub content: Option<(usize, usize)>,
}

impl Token {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            content: None,
        }
    }

    fn with_name(mut self, name: (usize, usize)) -> Self {
        self.name = Some(name);
        self
    }

    fn with_content(mut self, content: (usize, usize)) -> Self {
        self.content = Some(content);
        self
    }
}

/// Where the machine is in the document-level trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Nothing consumed yet; BOM not checked.
    Init,
    /// Before the root element.
    Prolog,
    /// Inside the root element.
    Content,
    /// After the root element closed.
    Epilog,
    /// Eof was emitted.
    Done,
}

/// Persistent machine state, extractable so a streaming caller can
/// rebuild the tokenizer over a regrown buffer.
#[derive(Debug, Clone)]
pub struct TokenizerState {
    pos: usize,
    doc_start: usize,
    stage: Stage,
    seen_decl: bool,
    seen_doctype: bool,
    seen_nonws: bool,
    depth: usize,
}

impl TokenizerState {
    /// State for a fresh document.
    pub fn new() -> Self {
        TokenizerState {
            pos: 0,
            doc_start: 0,
            stage: Stage::Init,
            seen_decl: false,
            seen_doctype: false,
            seen_nonws: false,
            depth: 0,
        }
    }
}

impl Default for TokenizerState {
    fn default() -> Self {
        Self::new()
    }
}

/// The lexical state machine.
pub struct Tokenizer<'a> {
    input: &'a [u8],
    scanner: Scanner<'a>,
    state: TokenizerState,
    strict: bool,
    at_end: bool,
    doctype_entities: Vec<(Vec<u8>, EntityValue)>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizer over a complete document.
    pub fn new(input: &'a [u8], strict: bool) -> Self {
        Self::resume(input, TokenizerState::new(), strict, true)
    }

    /// Rebuild a tokenizer over `input` from a previously extracted
    /// state. `at_end` tells the machine whether the buffer holds the
    /// final bytes of the document.
    pub fn resume(input: &'a [u8], state: TokenizerState, strict: bool, at_end: bool) -> Self {
        Tokenizer {
            input,
            scanner: Scanner::at(input, state.pos),
            state,
            strict,
            at_end,
            doctype_entities: Vec::new(),
        }
    }

    /// Extract the persistent state at the current position.
    pub fn state(&self) -> TokenizerState {
        let mut state = self.state.clone();
        state.pos = self.scanner.position();
        state
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Entities collected from the most recent DocType token.
    pub fn take_doctype_entities(&mut self) -> Vec<(Vec<u8>, EntityValue)> {
        std::mem::take(&mut self.doctype_entities)
    }

    /// Scan the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        if self.state.stage == Stage::Done {
            let pos = self.scanner.position();
            return Ok(Token::new(TokenKind::Eof, (pos, pos)));
        }

        if self.state.stage == Stage::Init {
            self.check_bom()?;
        }

        if self.scanner.is_at_end() {
            return self.finish();
        }

        let start = self.scanner.position();
        let result = if self.scanner.peek() == Some(b'<') {
            self.scan_markup(start)
        } else {
            self.scan_text(start, false)
        };
        if let Err(err) = &result {
            if err.is_incomplete() {
                self.scanner.set_position(start);
            }
        }
        result
    }

    fn check_bom(&mut self) -> Result<()> {
        // A UTF-8 BOM is three bytes; wait for enough input to decide.
        if !self.at_end
            && self.input.len() < 3
            && matches!(self.input.first().copied(), Some(0xEF | 0xFE | 0xFF))
        {
            return Err(Error::new(ErrorKind::Incomplete, 0));
        }
        let skip = encoding::skip_bom(self.input)?;
        self.scanner.advance(skip);
        self.state.doc_start = skip;
        self.state.stage = Stage::Prolog;
        Ok(())
    }

    fn finish(&mut self) -> Result<Token> {
        let pos = self.scanner.position();
        if !self.at_end {
            return Err(Error::new(ErrorKind::Incomplete, pos));
        }
        if self.state.depth > 0 {
            return Err(Error::new(ErrorKind::UnexpectedEof, pos));
        }
        if self.strict && self.state.stage == Stage::Prolog {
            // No root element appeared.
            return Err(Error::new(ErrorKind::UnexpectedEof, pos));
        }
        self.state.stage = Stage::Done;
        Ok(Token::new(TokenKind::Eof, (pos, pos)))
    }

    fn scan_markup(&mut self, start: usize) -> Result<Token> {
        if !self.scanner.has_remaining(2) {
            return Err(self.need_more(start));
        }
        match self.scanner.peek_at(1) {
            Some(b'/') => self.scan_end_tag(start),
            Some(b'!') => self.scan_bang(start),
            Some(b'?') => self.scan_pi(start),
            Some(b) if is_name_start_byte(b) => self.scan_start_tag(start),
            _ if !self.strict => self.scan_text(start, true),
            _ => Err(Error::new(
                ErrorKind::MalformedTag("'<' not followed by a tag name"),
                start,
            )),
        }
    }

    fn scan_start_tag(&mut self, start: usize) -> Result<Token> {
        self.scanner.advance(1);
        let name_start = self.scanner.position();
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("tag name expected"),
                    name_start,
                ))
            }
        };
        let name_end = self.scanner.position();
        if self.strict && validate_name(name).is_err() {
            return Err(Error::new(
                ErrorKind::MalformedTag("tag name is not a valid XML name"),
                name_start,
            ));
        }

        let gt = match self.scanner.find_tag_end_quoted() {
            Some(gt) => gt,
            None => return Err(self.need_more(start)),
        };
        let empty = gt > name_end && self.input[gt - 1] == b'/';
        let window_end = if empty { gt - 1 } else { gt };

        if self.state.stage == Stage::Epilog {
            return Err(Error::new(
                ErrorKind::MalformedTag("document has more than one root element"),
                start,
            ));
        }
        let kind = if empty {
            if self.state.stage == Stage::Prolog {
                self.state.stage = Stage::Epilog;
            }
            TokenKind::EmptyTag
        } else {
            if self.state.stage == Stage::Prolog {
                self.state.stage = Stage::Content;
            }
            self.state.depth += 1;
            TokenKind::StartTag
        };
        self.state.seen_nonws = true;
        self.scanner.set_position(gt + 1);

        Ok(Token::new(kind, (start, gt + 1))
            .with_name((name_start, name_end))
            .with_content((name_end, window_end)))
    }

    fn scan_end_tag(&mut self, start: usize) -> Result<Token> {
        self.scanner.advance(2);
        let name_start = self.scanner.position();
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                if self.scanner.is_at_end() {
                    return Err(self.need_more(start));
                }
                return Err(Error::new(
                    ErrorKind::MalformedTag("end tag name expected"),
                    self.scanner.position(),
                ));
            }
        };
        let name_end = self.scanner.position();
        if self.strict && validate_name(name).is_err() {
            return Err(Error::new(
                ErrorKind::MalformedTag("end tag name is not a valid XML name"),
                name_start,
            ));
        }

        self.scanner.skip_whitespace();
        match self.scanner.peek() {
            Some(b'>') => {}
            Some(_) => {
                return Err(Error::new(
                    ErrorKind::MalformedTag("expected '>' to close end tag"),
                    self.scanner.position(),
                ))
            }
            None => return Err(self.need_more(start)),
        }
        self.scanner.advance(1);

        self.state.depth = self.state.depth.saturating_sub(1);
        if self.state.depth == 0 && self.state.stage == Stage::Content {
            self.state.stage = Stage::Epilog;
        }
        self.state.seen_nonws = true;

        Ok(Token::new(TokenKind::EndTag, (start, self.scanner.position()))
            .with_name((name_start, name_end)))
    }

    fn scan_bang(&mut self, start: usize) -> Result<Token> {
        // Longest match across the three declaration prefixes.
        if self.scanner.starts_with(b"<!--") {
            return self.scan_comment(start);
        }
        if self.scanner.starts_with(b"<![CDATA[") {
            return self.scan_cdata(start);
        }
        if self.scanner.starts_with(b"<!DOCTYPE") {
            return self.scan_doctype(start);
        }
        let rest = self.scanner.remaining();
        let could_grow = [b"<!--".as_slice(), b"<![CDATA[", b"<!DOCTYPE"]
            .iter()
            .any(|prefix| prefix.starts_with(rest));
        if could_grow && !self.at_end {
            return Err(self.need_more(start));
        }
        Err(Error::new(
            ErrorKind::MalformedTag("unknown markup declaration"),
            start,
        ))
    }

    fn scan_comment(&mut self, start: usize) -> Result<Token> {
        self.scanner.advance(4);
        let body_start = self.scanner.position();
        let close = match self.scanner.find_seq(b"-->") {
            Some(close) => close,
            None => return Err(self.need_more(start)),
        };
        let body = self.scanner.slice(body_start, close);
        if let Some(at) = body.windows(2).position(|w| w == b"--") {
            return Err(Error::new(
                ErrorKind::InvalidComment("'--' in comment body"),
                body_start + at,
            ));
        }
        if body.last() == Some(&b'-') {
            return Err(Error::new(
                ErrorKind::InvalidComment("comment body must not end with '-'"),
                close - 1,
            ));
        }
        if self.strict {
            encoding::check_xml_chars(body, body_start)?;
        }
        self.scanner.set_position(close + 3);
        self.state.seen_nonws = true;
        Ok(Token::new(TokenKind::Comment, (start, close + 3)).with_content((body_start, close)))
    }

    fn scan_cdata(&mut self, start: usize) -> Result<Token> {
        if self.state.depth == 0 {
            return Err(Error::new(
                ErrorKind::MalformedTag("CDATA section outside the root element"),
                start,
            ));
        }
        self.scanner.advance(9);
        let body_start = self.scanner.position();
        let close = match self.scanner.find_seq(b"]]>") {
            Some(close) => close,
            None => return Err(self.need_more(start)),
        };
        if self.strict {
            encoding::check_xml_chars(self.scanner.slice(body_start, close), body_start)?;
        }
        self.scanner.set_position(close + 3);
        self.state.seen_nonws = true;
        Ok(Token::new(TokenKind::CData, (start, close + 3)).with_content((body_start, close)))
    }

    fn scan_doctype(&mut self, start: usize) -> Result<Token> {
        if self.state.seen_doctype {
            return Err(Error::new(
                ErrorKind::DoctypeError("multiple DOCTYPE declarations"),
                start,
            ));
        }
        if self.state.stage != Stage::Prolog {
            return Err(Error::new(
                ErrorKind::DoctypeError("DOCTYPE after the root element"),
                start,
            ));
        }
        let scan = dtd::scan_doctype(self.input, start + 9, self.at_end, self.strict)?;
        self.doctype_entities = scan.entities;
        self.state.seen_doctype = true;
        self.state.seen_nonws = true;
        self.scanner.set_position(scan.end);
        Ok(Token::new(TokenKind::DocType, (start, scan.end)).with_content(scan.body))
    }

    fn scan_pi(&mut self, start: usize) -> Result<Token> {
        self.scanner.advance(2);
        let target_start = self.scanner.position();
        let target = match self.scanner.read_name() {
            Some(target) => target,
            None => {
                if self.scanner.is_at_end() {
                    return Err(self.need_more(start));
                }
                if self.strict {
                    return Err(Error::new(
                        ErrorKind::MalformedTag("processing instruction target expected"),
                        self.scanner.position(),
                    ));
                }
                // Lenient: `<?` without a target is literal text.
                self.scanner.set_position(start);
                return self.scan_text(start, true);
            }
        };
        let target_end = self.scanner.position();
        if self.strict && validate_name(target).is_err() {
            return Err(Error::new(
                ErrorKind::MalformedTag("processing instruction target is not a valid XML name"),
                target_start,
            ));
        }

        let decl_position =
            self.state.stage == Stage::Prolog && !self.state.seen_decl && !self.state.seen_nonws;
        let is_decl = target == b"xml" && decl_position;
        if self.strict && !is_decl && target.eq_ignore_ascii_case(b"xml") {
            return Err(Error::new(
                ErrorKind::MalformedTag("'xml' is a reserved processing instruction target"),
                target_start,
            ));
        }
        if self.strict && is_decl && start != self.state.doc_start {
            return Err(Error::new(
                ErrorKind::MalformedTag("XML declaration must be the very first token"),
                start,
            ));
        }

        let close = match self.scanner.find_seq(b"?>") {
            Some(close) => close,
            None => return Err(self.need_more(start)),
        };
        self.scanner.set_position(target_end.min(close));
        self.scanner.skip_whitespace();
        let data_start = self.scanner.position().min(close);
        if self.strict {
            encoding::check_xml_chars(self.scanner.slice(data_start, close), data_start)?;
        }
        self.scanner.set_position(close + 2);
        self.state.seen_nonws = true;

        if is_decl {
            self.state.seen_decl = true;
            // The declaration keeps the whole attribute window so the
            // reader can run the attribute scanner over it.
            return Ok(Token::new(TokenKind::XmlDecl, (start, close + 2))
                .with_name((target_start, target_end))
                .with_content((target_end, close)));
        }
        Ok(Token::new(TokenKind::Pi, (start, close + 2))
            .with_name((target_start, target_end))
            .with_content((data_start, close)))
    }

    /// Scan character data. With `literal_lt` the leading `<` is part
    /// of the text (lenient recovery).
    fn scan_text(&mut self, start: usize, literal_lt: bool) -> Result<Token> {
        let search_from = if literal_lt { start + 1 } else { start };
        let end = Scanner::at(self.input, search_from)
            .find_tag_start()
            .unwrap_or(self.input.len());
        if end == self.input.len() && !self.at_end {
            return Err(Error::new(ErrorKind::Incomplete, start));
        }

        let content = self.scanner.slice(start, end);
        if let Some(at) = Scanner::at(self.input, start).find_seq(b"]]>") {
            if at < end {
                return Err(Error::new(ErrorKind::InvalidCDataTerminator, at));
            }
        }
        let whitespace_only = is_all_whitespace(content);
        if self.state.depth == 0 && !whitespace_only {
            return Err(Error::new(
                ErrorKind::MalformedTag("non-whitespace text outside the root element"),
                start,
            ));
        }
        if self.strict {
            encoding::check_xml_chars(content, start)?;
        }

        self.scanner.set_position(end);
        if !whitespace_only {
            self.state.seen_nonws = true;
        }
        Ok(Token::new(TokenKind::Text, (start, end)).with_content((start, end)))
    }

    fn need_more(&self, start: usize) -> Error {
        if self.at_end {
            Error::new(ErrorKind::UnexpectedEof, self.input.len())
        } else {
            Error::new(ErrorKind::Incomplete, start)
        }
    }
}
