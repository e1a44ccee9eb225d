//! Event types for pull-parser style XML processing.
//!
//! Payloads borrow from the input buffer where possible; the streaming
//! reader converts them with [`Event::into_owned`] before handing them
//! out.

use std::borrow::Cow;

use memchr::memchr;

/// One syntactic event, exactly one per `next_event()` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    /// Start of an element: `<name ...>`.
    Start(ElementStart<'a>),
    /// End of an element: `</name>`.
    End(ElementEnd<'a>),
    /// Empty element: `<name .../>`.
    Empty(ElementStart<'a>),
    /// Character data between tags, references expanded.
    Text(TextData<'a>),
    /// CDATA section body, verbatim.
    CData(Cow<'a, [u8]>),
    /// Comment body, verbatim.
    Comment(Cow<'a, [u8]>),
    /// Processing instruction.
    Pi {
        /// The PI target name.
        target: Cow<'a, [u8]>,
        /// Everything after the target, None when absent.
        data: Option<Cow<'a, [u8]>>,
    },
    /// XML declaration.
    Decl(XmlDeclaration<'a>),
    /// DOCTYPE body: root name, external id, and internal subset.
    DocType(Cow<'a, [u8]>),
    /// Input exhausted at a valid terminal position.
    Eof,
}

impl<'a> Event<'a> {
    /// Copy all borrowed payloads so the event outlives its buffer.
    pub fn into_owned(self) -> Event<'static> {
        match self {
            Event::Start(e) => Event::Start(e.into_owned()),
            Event::End(e) => Event::End(e.into_owned()),
            Event::Empty(e) => Event::Empty(e.into_owned()),
            Event::Text(t) => Event::Text(t.into_owned()),
            Event::CData(c) => Event::CData(owned(c)),
            Event::Comment(c) => Event::Comment(owned(c)),
            Event::Pi { target, data } => Event::Pi {
                target: owned(target),
                data: data.map(owned),
            },
            Event::Decl(d) => Event::Decl(d.into_owned()),
            Event::DocType(d) => Event::DocType(owned(d)),
            Event::Eof => Event::Eof,
        }
    }

    /// True for `Start` and `Empty`.
    pub fn is_start(&self) -> bool {
        matches!(self, Event::Start(_) | Event::Empty(_))
    }

    /// The element descriptor, for `Start` and `Empty`.
    pub fn as_start(&self) -> Option<&ElementStart<'a>> {
        match self {
            Event::Start(e) | Event::Empty(e) => Some(e),
            _ => None,
        }
    }

    /// Text content, for `Text` and `CData`.
    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            Event::Text(t) => Some(t.as_bytes()),
            Event::CData(c) => Some(c.as_ref()),
            _ => None,
        }
    }
}

/// Start/empty element descriptor: name plus ordered attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementStart<'a> {
    /// Element name as written (may carry a prefix).
    pub name: Cow<'a, [u8]>,
    /// Attributes in source order; names are unique.
    pub attributes: Vec<Attr<'a>>,
}

impl<'a> ElementStart<'a> {
    /// The name as a string, if valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name.as_ref()).ok()
    }

    /// Local part of the name, after the first colon.
    pub fn local_name(&self) -> &[u8] {
        split_name(self.name.as_ref()).1
    }

    /// Prefix of the name, before the first colon.
    pub fn prefix(&self) -> Option<&[u8]> {
        split_name(self.name.as_ref()).0
    }

    /// Find an attribute by its full name.
    pub fn get_attribute(&self, name: &[u8]) -> Option<&Attr<'a>> {
        self.attributes.iter().find(|a| a.name.as_ref() == name)
    }

    /// Find an attribute value by name, as a string.
    pub fn get_attribute_value(&self, name: &str) -> Option<&str> {
        self.get_attribute(name.as_bytes()).and_then(|a| a.value_str())
    }

    fn into_owned(self) -> ElementStart<'static> {
        ElementStart {
            name: owned(self.name),
            attributes: self.attributes.into_iter().map(Attr::into_owned).collect(),
        }
    }
}

/// End element descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementEnd<'a> {
    /// Element name as written.
    pub name: Cow<'a, [u8]>,
}

impl<'a> ElementEnd<'a> {
    /// The name as a string, if valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name.as_ref()).ok()
    }

    /// Local part of the name, after the first colon.
    pub fn local_name(&self) -> &[u8] {
        split_name(self.name.as_ref()).1
    }

    /// Prefix of the name, before the first colon.
    pub fn prefix(&self) -> Option<&[u8]> {
        split_name(self.name.as_ref()).0
    }

    fn into_owned(self) -> ElementEnd<'static> {
        ElementEnd {
            name: owned(self.name),
        }
    }
}

/// A decoded attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr<'a> {
    /// Attribute name as written.
    pub name: Cow<'a, [u8]>,
    /// Normalized value, references expanded.
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attr<'a> {
    /// The name as a string, if valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name.as_ref()).ok()
    }

    /// The value as a string, if valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value.as_ref()).ok()
    }

    /// `(prefix, local)` split on the first colon.
    pub fn split_name(&self) -> (Option<&[u8]>, &[u8]) {
        split_name(self.name.as_ref())
    }

    /// If this is an `xmlns` or `xmlns:prefix` attribute, the declared
    /// `(prefix, uri)` pair; the prefix is empty for the default
    /// namespace.
    pub fn namespace_declaration(&self) -> Option<(&[u8], &[u8])> {
        let name = self.name.as_ref();
        if name == b"xmlns" {
            Some((b"", self.value.as_ref()))
        } else if let Some(prefix) = name.strip_prefix(b"xmlns:") {
            Some((prefix, self.value.as_ref()))
        } else {
            None
        }
    }

    fn into_owned(self) -> Attr<'static> {
        Attr {
            name: owned(self.name),
            value: owned(self.value),
        }
    }
}

/// Character data with its whitespace classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TextData<'a> {
    content: Cow<'a, [u8]>,
    whitespace_only: bool,
}

impl<'a> TextData<'a> {
    pub(crate) fn new(content: Cow<'a, [u8]>, whitespace_only: bool) -> Self {
        TextData {
            content,
            whitespace_only,
        }
    }

    /// The decoded content.
    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_ref()
    }

    /// The decoded content as a string, if valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.content.as_ref()).ok()
    }

    /// True when the content is XML whitespace only.
    pub fn is_whitespace_only(&self) -> bool {
        self.whitespace_only
    }

    fn into_owned(self) -> TextData<'static> {
        TextData {
            content: owned(self.content),
            whitespace_only: self.whitespace_only,
        }
    }
}

/// Parsed XML declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDeclaration<'a> {
    /// The `version` value; defaults to `1.0` when absent in lenient
    /// mode.
    pub version: Cow<'a, [u8]>,
    /// The `encoding` value, if present.
    pub encoding: Option<Cow<'a, [u8]>>,
    /// The `standalone` value, if present.
    pub standalone: Option<bool>,
}

impl<'a> XmlDeclaration<'a> {
    fn into_owned(self) -> XmlDeclaration<'static> {
        XmlDeclaration {
            version: owned(self.version),
            encoding: self.encoding.map(owned),
            standalone: self.standalone,
        }
    }
}

fn split_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr(b':', name) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

fn owned(value: Cow<'_, [u8]>) -> Cow<'static, [u8]> {
    Cow::Owned(value.into_owned())
}
