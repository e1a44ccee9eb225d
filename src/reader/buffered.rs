//! Streaming reader over an incrementally growable buffer.
//!
//! A [`ByteSource`] supplies bytes on demand; the reader retokenizes
//! from its saved state whenever the buffer grows, so a token split
//! across chunk boundaries is simply retried once more data is in.
//! Events are returned owned, detached from the internal buffer.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::core::entities::EntityResolver;
use crate::core::tokenizer::{TokenKind, Tokenizer, TokenizerState};
use crate::error::{Error, ErrorKind, Result};
use crate::reader::config::Config;
use crate::reader::events::Event;
use crate::reader::{Position, ReaderCore};

/// Read granularity when pulling from an [`io::Read`] source.
const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Capability to supply more input bytes.
///
/// `read_more` appends to `buf` and returns how many bytes arrived;
/// 0 means end of input. A source that has no data right now but is
/// not finished may fail with [`io::ErrorKind::WouldBlock`]; the
/// reader surfaces that as an `Incomplete` error without poisoning
/// itself, so the caller can retry the same `next_event` call later.
pub trait ByteSource {
    /// Append available bytes to `buf`.
    fn read_more(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;
}

/// Adapter from any [`io::Read`] to a [`ByteSource`].
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        ReadSource { inner }
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read_more(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let mut chunk = [0u8; DEFAULT_CHUNK_SIZE];
        let n = self.inner.read(&mut chunk)?;
        buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

/// Pull parser over a byte source; events are owned.
pub struct StreamReader<S> {
    source: S,
    buf: Vec<u8>,
    state: TokenizerState,
    core: ReaderCore,
    source_eof: bool,
    poisoned: Option<Error>,
}

impl<S: ByteSource> StreamReader<S> {
    /// Streaming reader with the default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, Config::default())
    }

    /// Streaming reader with an explicit configuration.
    pub fn with_config(source: S, config: Config) -> Self {
        StreamReader {
            source,
            buf: Vec::new(),
            state: TokenizerState::new(),
            core: ReaderCore::new(config),
            source_eof: false,
            poisoned: None,
        }
    }

    /// Replace the configuration. Only meaningful before the first
    /// event has been read.
    pub fn set_config(&mut self, config: Config) {
        self.core.config = config;
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.core.config
    }

    /// Install the hook used to load external entities.
    pub fn set_entity_resolver(&mut self, resolver: Box<dyn EntityResolver>) {
        self.core.resolver = Some(resolver);
    }

    /// Position just past the most recently returned event.
    pub fn position(&self) -> Position {
        self.core.position
    }

    /// Advance by one event.
    pub fn next_event(&mut self) -> Result<Event<'static>> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        loop {
            let strict = self.core.config.strict;
            let mut tokenizer =
                Tokenizer::resume(&self.buf, self.state.clone(), strict, self.source_eof);
            match tokenizer.next_token() {
                Ok(token) => {
                    let doctype_entities = if token.kind == TokenKind::DocType {
                        tokenizer.take_doctype_entities()
                    } else {
                        Vec::new()
                    };
                    let state = tokenizer.state();
                    drop(tokenizer);
                    match self.core.event_from_token(&self.buf, &token, doctype_entities) {
                        Ok(Some(event)) => {
                            self.state = state;
                            return Ok(event.into_owned());
                        }
                        Ok(None) => {
                            self.state = state;
                            continue;
                        }
                        Err(err) => return Err(self.poison(err)),
                    }
                }
                Err(err) if err.is_incomplete() => {
                    drop(tokenizer);
                    match self.source.read_more(&mut self.buf) {
                        Ok(0) => self.source_eof = true,
                        Ok(_) => {}
                        Err(io_err) if io_err.kind() == io::ErrorKind::WouldBlock => {
                            // Not fatal: the caller may retry once the
                            // source has data again.
                            return Err(Error::new(ErrorKind::Incomplete, self.buf.len()));
                        }
                        Err(io_err) => {
                            let err = Error::io(io_err, self.buf.len());
                            return Err(self.poison(err));
                        }
                    }
                }
                Err(err) => return Err(self.poison(err)),
            }
        }
    }

    /// Drain the document, collecting every remaining event up to and
    /// excluding `Eof`.
    pub fn read_to_end(&mut self) -> Result<Vec<Event<'static>>> {
        let mut events = Vec::new();
        loop {
            match self.next_event()? {
                Event::Eof => return Ok(events),
                event => events.push(event),
            }
        }
    }

    fn poison(&mut self, err: Error) -> Error {
        self.poisoned = Some(err.clone());
        err
    }
}

impl<R: Read> StreamReader<ReadSource<R>> {
    /// Streaming reader over any [`io::Read`].
    pub fn from_reader(reader: R) -> Self {
        Self::new(ReadSource::new(reader))
    }
}

impl StreamReader<ReadSource<File>> {
    /// Streaming reader over a file.
    ///
    /// Installs a resolver that loads external entities from files
    /// sibling to the document, so `<!ENTITY e SYSTEM "other.xml">`
    /// resolves relative to the document's directory. The parser core
    /// itself never touches the filesystem.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let mut reader = Self::from_reader(file);
        reader.set_entity_resolver(Box::new(SiblingFileResolver { dir }));
        Ok(reader)
    }
}

/// Resolves external entities against the directory of the document.
pub struct SiblingFileResolver {
    dir: PathBuf,
}

impl SiblingFileResolver {
    /// Resolver rooted at the given directory.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        SiblingFileResolver { dir: dir.into() }
    }
}

impl EntityResolver for SiblingFileResolver {
    fn resolve_external(&mut self, _name: &[u8], system_id: &[u8]) -> io::Result<Vec<u8>> {
        let relative = std::str::from_utf8(system_id)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "system id is not UTF-8"))?;
        std::fs::read(self.dir.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::events::Event;

    /// Hands out the document in fixed-size pieces.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Chunked {
        fn new(data: &[u8], chunk: usize) -> Self {
            Chunked {
                data: data.to_vec(),
                pos: 0,
                chunk,
            }
        }
    }

    impl ByteSource for Chunked {
        fn read_more(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
            let end = (self.pos + self.chunk).min(self.data.len());
            let n = end - self.pos;
            buf.extend_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    fn event_names(input: &[u8], chunk: usize) -> Vec<String> {
        let mut reader = StreamReader::new(Chunked::new(input, chunk));
        let mut out = Vec::new();
        loop {
            match reader.next_event().unwrap() {
                Event::Eof => return out,
                Event::Start(e) => out.push(format!("+{}", e.name_str().unwrap())),
                Event::End(e) => out.push(format!("-{}", e.name_str().unwrap())),
                Event::Empty(e) => out.push(format!("*{}", e.name_str().unwrap())),
                Event::Text(t) => out.push(format!("t:{}", t.as_str().unwrap())),
                Event::CData(c) => {
                    out.push(format!("c:{}", std::str::from_utf8(&c).unwrap()))
                }
                _ => out.push("other".to_string()),
            }
        }
    }

    #[test]
    fn test_chunked_equals_whole() {
        let doc = b"<?xml version=\"1.0\"?><a x=\"1\"><b>hi &amp; bye</b><![CDATA[<&>]]><c/></a>";
        let whole = event_names(doc, doc.len());
        for chunk in [1, 2, 3, 7, 16] {
            assert_eq!(event_names(doc, chunk), whole, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_token_split_across_chunks() {
        let doc = b"<root attr=\"value\">text</root>";
        let names = event_names(doc, 4);
        assert_eq!(names, vec!["+root", "t:text", "-root"]);
    }

    #[test]
    fn test_doctype_split_across_chunks() {
        let doc = b"<!DOCTYPE r [<!ENTITY g \"X\">]><r>&g;</r>";
        let mut reader = StreamReader::new(Chunked::new(doc, 3));
        assert!(matches!(reader.next_event().unwrap(), Event::DocType(_)));
        reader.next_event().unwrap();
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::Text(t) if t.as_bytes() == b"X"
        ));
    }

    #[test]
    fn test_events_are_owned() {
        let mut reader = StreamReader::new(Chunked::new(b"<a>text</a>", 2));
        let start = reader.next_event().unwrap();
        let text = reader.next_event().unwrap();
        // Both events stay alive together even though the buffer moved.
        assert!(matches!(start, Event::Start(_)));
        assert!(matches!(text, Event::Text(t) if t.as_bytes() == b"text"));
    }

    #[test]
    fn test_truncated_document_is_eof() {
        let mut reader = StreamReader::new(Chunked::new(b"<a><b>", 2));
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        let err = reader.next_event().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnexpectedEof));
        // Poisoned thereafter.
        assert!(reader.next_event().is_err());
    }

    #[test]
    fn test_would_block_is_incomplete_not_poison() {
        struct Stalling {
            sent: bool,
        }
        impl ByteSource for Stalling {
            fn read_more(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
                if self.sent {
                    Err(io::Error::new(io::ErrorKind::WouldBlock, "try later"))
                } else {
                    self.sent = true;
                    buf.extend_from_slice(b"<r>part");
                    Ok(7)
                }
            }
        }
        let mut reader = StreamReader::new(Stalling { sent: false });
        assert!(matches!(reader.next_event().unwrap(), Event::Start(_)));
        let err = reader.next_event().unwrap_err();
        assert!(err.is_incomplete());
        // A retry hits the source again rather than replaying a
        // poisoned error.
        let err = reader.next_event().unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_read_to_end() {
        let mut reader = StreamReader::new(Chunked::new(b"<a><b/></a>", 5));
        let events = reader.read_to_end().unwrap();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_from_reader() {
        let cursor = std::io::Cursor::new(b"<r/>".to_vec());
        let mut reader = StreamReader::from_reader(cursor);
        assert!(matches!(reader.next_event().unwrap(), Event::Empty(_)));
        assert!(matches!(reader.next_event().unwrap(), Event::Eof));
    }
}
