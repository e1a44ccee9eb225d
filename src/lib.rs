//! pullxml - streaming XML pull parser
//!
//! A non-validating XML 1.0 (+ Namespaces 1.0) pull parser. The caller
//! drives parsing by asking for the next event; no document tree is
//! built and input is processed incrementally.
//!
//! ```
//! use pullxml::{Event, Reader};
//!
//! let mut reader = Reader::from_str("<greeting kind=\"warm\">hi</greeting>");
//! loop {
//!     match reader.next_event().unwrap() {
//!         Event::Start(e) => assert_eq!(e.get_attribute_value("kind"), Some("warm")),
//!         Event::Text(t) => assert_eq!(t.as_str(), Some("hi")),
//!         Event::End(_) => {}
//!         Event::Eof => break,
//!         other => panic!("unexpected {:?}", other),
//!     }
//! }
//! ```
//!
//! Input must be UTF-8 (a leading UTF-8 BOM is tolerated). DTD
//! validation, XML 1.1, and non-UTF-8 encodings are out of scope; the
//! DOCTYPE internal subset is scanned only to collect general entity
//! declarations, which are honored when resolving references in
//! content.
//!
//! Three reader flavors:
//! - [`Reader`]: zero-copy over a byte slice
//! - [`StreamReader`]: incremental over a [`ByteSource`]
//! - [`NsReader`]: [`Reader`] plus namespace scope resolution

pub mod core;
pub mod error;
pub mod reader;

pub use crate::core::entities::{EntityResolver, EntityTable, EntityValue};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::reader::buffered::{ByteSource, ReadSource, SiblingFileResolver, StreamReader};
pub use crate::reader::config::Config;
pub use crate::reader::events::{
    Attr, ElementEnd, ElementStart, Event, TextData, XmlDeclaration,
};
pub use crate::reader::namespaces::{NamespaceTable, NsReader};
pub use crate::reader::slice::Reader;
pub use crate::reader::Position;
