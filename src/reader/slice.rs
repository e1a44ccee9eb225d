//! Zero-copy reader over a byte slice.

use crate::core::entities::EntityResolver;
use crate::core::tokenizer::{TokenKind, Tokenizer};
use crate::error::{Error, Result};
use crate::reader::config::Config;
use crate::reader::events::Event;
use crate::reader::{Position, ReaderCore};

/// Pull parser over a fully loaded document.
///
/// Event payloads borrow from the input slice wherever no rewriting is
/// needed. After a fatal error the reader is poisoned and every
/// subsequent call returns the same error; after `Eof` every call
/// returns `Eof`.
pub struct Reader<'a> {
    input: &'a [u8],
    tokenizer: Tokenizer<'a>,
    core: ReaderCore,
    poisoned: Option<Error>,
    finished: bool,
}

impl<'a> Reader<'a> {
    /// Reader with the default configuration.
    pub fn from_bytes(input: &'a [u8]) -> Self {
        Self::with_config(input, Config::default())
    }

    /// Reader over a string slice.
    pub fn from_str(input: &'a str) -> Self {
        Self::from_bytes(input.as_bytes())
    }

    /// Reader with an explicit configuration.
    pub fn with_config(input: &'a [u8], config: Config) -> Self {
        Reader {
            input,
            tokenizer: Tokenizer::new(input, config.strict),
            core: ReaderCore::new(config),
            poisoned: None,
            finished: false,
        }
    }

    /// Replace the configuration. Only meaningful before the first
    /// event has been read.
    pub fn set_config(&mut self, config: Config) {
        self.tokenizer = Tokenizer::resume(self.input, self.tokenizer.state(), config.strict, true);
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
    pub fn next_event(&mut self) -> Result<Event<'a>> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        loop {
            let token = match self.tokenizer.next_token() {
                Ok(token) => token,
                Err(err) => return Err(self.poison(err)),
            };
            let doctype_entities = if token.kind == TokenKind::DocType {
                self.tokenizer.take_doctype_entities()
            } else {
                Vec::new()
            };
            match self.core.event_from_token(self.input, &token, doctype_entities) {
                Ok(Some(event)) => {
                    if matches!(event, Event::Eof) {
                        self.finished = true;
                    }
                    return Ok(event);
                }
                Ok(None) => continue,
                Err(err) => return Err(self.poison(err)),
            }
        }
    }

    fn poison(&mut self, err: Error) -> Error {
        self.poisoned = Some(err.clone());
        err
    }
}

/// Iterates events until `Eof` or the first error; the error is yielded
/// once.
impl<'a> Iterator for Reader<'a> {
    type Item = Result<Event<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.poisoned.is_some() {
            return None;
        }
        match self.next_event() {
            Ok(Event::Eof) => None,
            Ok(event) => Some(Ok(event)),
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_simple_element() {
        let mut reader = Reader::from_str("<root>hello</root>");
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::Start(e) if e.name.as_ref() == b"root"
        ));
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::Text(t) if t.as_bytes() == b"hello"
        ));
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::End(e) if e.name.as_ref() == b"root"
        ));
        assert!(matches!(reader.next_event().unwrap(), Event::Eof));
    }

    #[test]
    fn test_attributes_are_decoded() {
        let mut reader = Reader::from_str("<x title=\"&lt;hi&gt;\" n=\"&#65;\"/>");
        match reader.next_event().unwrap() {
            Event::Empty(e) => {
                assert_eq!(e.get_attribute_value("title"), Some("<hi>"));
                assert_eq!(e.get_attribute_value("n"), Some("A"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_end_poisons() {
        let mut reader = Reader::from_str("<a></b>");
        reader.next_event().unwrap();
        let err = reader.next_event().unwrap_err();
        match err.kind() {
            ErrorKind::MismatchedEnd { expected, found } => {
                assert_eq!(&**expected, "a");
                assert_eq!(&**found, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
        // Poisoned: same error again.
        let again = reader.next_event().unwrap_err();
        assert!(matches!(again.kind(), ErrorKind::MismatchedEnd { .. }));
        assert_eq!(again.offset(), err.offset());
    }

    #[test]
    fn test_allow_unmatched_ends() {
        let mut reader = Reader::with_config(
            b"<a></b></a>",
            Config {
                allow_unmatched_ends: true,
                ..Config::default()
            },
        );
        reader.next_event().unwrap();
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::End(e) if e.name.as_ref() == b"b"
        ));
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::End(e) if e.name.as_ref() == b"a"
        ));
        assert!(matches!(reader.next_event().unwrap(), Event::Eof));
    }

    #[test]
    fn test_check_end_names_disabled() {
        let mut reader = Reader::with_config(
            b"<a></b>",
            Config {
                check_end_names: false,
                ..Config::default()
            },
        );
        reader.next_event().unwrap();
        assert!(matches!(reader.next_event().unwrap(), Event::End(_)));
        assert!(matches!(reader.next_event().unwrap(), Event::Eof));
    }

    #[test]
    fn test_trim_text() {
        let mut reader = Reader::with_config(
            b"<a>  padded  </a>",
            Config {
                trim_text: true,
                ..Config::default()
            },
        );
        reader.next_event().unwrap();
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::Text(t) if t.as_bytes() == b"padded"
        ));
        // Whitespace-only text produces no event at all.
        let mut reader = Reader::with_config(
            b"<a>\n\t</a>",
            Config {
                trim_text: true,
                ..Config::default()
            },
        );
        reader.next_event().unwrap();
        assert!(matches!(reader.next_event().unwrap(), Event::End(_)));
    }

    #[test]
    fn test_doctype_entities_resolve() {
        let mut reader = Reader::from_str("<!DOCTYPE r [<!ENTITY g \"X\">]><r>&g;</r>");
        assert!(matches!(reader.next_event().unwrap(), Event::DocType(_)));
        reader.next_event().unwrap();
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::Text(t) if t.as_bytes() == b"X"
        ));
    }

    #[test]
    fn test_expand_entities_disabled() {
        let mut reader = Reader::with_config(
            b"<r>&amp;</r>",
            Config {
                expand_entities: false,
                ..Config::default()
            },
        );
        reader.next_event().unwrap();
        assert!(matches!(
            reader.next_event().unwrap(),
            Event::Text(t) if t.as_bytes() == b"&amp;"
        ));
    }

    #[test]
    fn test_position_tracking() {
        let mut reader = Reader::from_str("<a>\n<b/>\n</a>");
        reader.next_event().unwrap();
        let position = reader.position();
        assert_eq!(position.offset, 3);
        assert_eq!(position.line, 1);
        reader.next_event().unwrap(); // "\n"
        reader.next_event().unwrap(); // <b/>
        let position = reader.position();
        assert_eq!(position.offset, 8);
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 5);
    }

    #[test]
    fn test_iterator_stops_at_eof() {
        let events: Vec<_> = Reader::from_str("<a><b/></a>").collect();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[test]
    fn test_iterator_yields_error_once() {
        let events: Vec<_> = Reader::from_str("<a></b>").collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }

    #[test]
    fn test_eof_idempotent() {
        let mut reader = Reader::from_str("<r/>");
        reader.next_event().unwrap();
        for _ in 0..3 {
            assert!(matches!(reader.next_event().unwrap(), Event::Eof));
        }
    }
}
