//! Error types returned by the parser.
//!
//! Every error carries the byte offset at which it was detected; line and
//! column can be derived from the reader's [`position`].
//!
//! [`position`]: crate::reader::slice::Reader::position

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Alias for `Result` with the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The category of a parse failure.
#[derive(Debug, Clone)]
pub enum ErrorKind {
    /// Input ended in the middle of a token.
    UnexpectedEof,
    /// More data is required to make progress; only returned by readers
    /// fed from an incremental byte source that has not reached EOF.
    Incomplete,
    /// A byte or code point not allowed in XML 1.0.
    InvalidChar(u32),
    /// Tag syntax error: missing `>`, malformed attribute, text outside
    /// the root element, and similar.
    MalformedTag(&'static str),
    /// An end tag did not match the open element.
    MismatchedEnd {
        /// Name of the element that is open.
        expected: Box<str>,
        /// Name found in the end tag.
        found: Box<str>,
    },
    /// The same attribute name appeared twice in one tag.
    DuplicateAttribute {
        /// The repeated attribute name.
        name: Box<str>,
    },
    /// Reference to an entity that is neither built in nor declared in
    /// the DOCTYPE internal subset.
    UnknownEntity {
        /// The referenced entity name.
        name: Box<str>,
    },
    /// An entity expansion referred back to an entity already being
    /// expanded, or exceeded the expansion depth bound.
    RecursiveEntity {
        /// Name of the entity at which the cycle was detected.
        name: Box<str>,
    },
    /// A `&...;` or `&#...;` sequence that does not form a valid
    /// reference.
    InvalidReference(&'static str),
    /// The literal `]]>` appeared in character data.
    InvalidCDataTerminator,
    /// `--` inside a comment body, or a comment ending in `--->`.
    InvalidComment(&'static str),
    /// Input is not valid UTF-8, or starts with a UTF-16 byte order mark.
    InvalidEncoding(&'static str),
    /// Malformed DOCTYPE declaration or internal subset.
    DoctypeError(&'static str),
    /// The underlying byte source failed. Streaming readers only.
    Io(Arc<io::Error>),
}

/// A parse error: what went wrong and where.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    offset: usize,
}

impl Error {
    /// Create an error at the given byte offset.
    pub fn new(kind: ErrorKind, offset: usize) -> Self {
        Error { kind, offset }
    }

    /// The category of the failure.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Byte offset into the input at which the error was detected.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True if this error only signals that more input is needed.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.kind, ErrorKind::Incomplete)
    }

    pub(crate) fn io(err: io::Error, offset: usize) -> Self {
        Error::new(ErrorKind::Io(Arc::new(err)), offset)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.kind, self.offset)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedEof => f.write_str("unexpected end of input"),
            ErrorKind::Incomplete => f.write_str("need more data"),
            ErrorKind::InvalidChar(cp) => {
                write!(f, "code point U+{:04X} not allowed in XML", cp)
            }
            ErrorKind::MalformedTag(msg) => write!(f, "malformed tag: {}", msg),
            ErrorKind::MismatchedEnd { expected, found } => {
                write!(f, "end tag '{}' does not match open element '{}'", found, expected)
            }
            ErrorKind::DuplicateAttribute { name } => {
                write!(f, "duplicate attribute '{}'", name)
            }
            ErrorKind::UnknownEntity { name } => write!(f, "unknown entity '{}'", name),
            ErrorKind::RecursiveEntity { name } => {
                write!(f, "recursive expansion of entity '{}'", name)
            }
            ErrorKind::InvalidReference(msg) => write!(f, "invalid reference: {}", msg),
            ErrorKind::InvalidCDataTerminator => f.write_str("']]>' not allowed in text"),
            ErrorKind::InvalidComment(msg) => write!(f, "invalid comment: {}", msg),
            ErrorKind::InvalidEncoding(msg) => write!(f, "invalid encoding: {}", msg),
            ErrorKind::DoctypeError(msg) => write!(f, "invalid DOCTYPE: {}", msg),
            ErrorKind::Io(err) => write!(f, "byte source error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

pub(crate) fn name_to_str(name: &[u8]) -> Box<str> {
    String::from_utf8_lossy(name).into_owned().into_boxed_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_offset() {
        let err = Error::new(ErrorKind::InvalidCDataTerminator, 17);
        assert_eq!(err.to_string(), "']]>' not allowed in text at byte 17");
    }

    #[test]
    fn test_mismatched_end_display() {
        let err = Error::new(
            ErrorKind::MismatchedEnd {
                expected: "a".into(),
                found: "b".into(),
            },
            3,
        );
        assert!(err.to_string().contains("'b'"));
        assert!(err.to_string().contains("'a'"));
        assert_eq!(err.offset(), 3);
    }

    #[test]
    fn test_incomplete_query() {
        assert!(Error::new(ErrorKind::Incomplete, 0).is_incomplete());
        assert!(!Error::new(ErrorKind::UnexpectedEof, 0).is_incomplete());
    }
}
