//! Namespaces 1.0 support: prefix scopes and a resolving reader.
//!
//! A scope is pushed for every Start/Empty element after its `xmlns`
//! attributes are read, and popped when the element closes. Resolution
//! walks the bindings innermost-first, so redeclarations shadow outer
//! ones and `xmlns=""` undeclares the default namespace.

use crate::error::Result;
use crate::reader::events::{Attr, Event};
use crate::reader::slice::Reader;

/// The `xml` prefix is predefined and always in scope.
const XML_PREFIX: &[u8] = b"xml";
const XML_URI: &[u8] = b"http://www.w3.org/XML/1998/namespace";

/// Stack of namespace scopes.
#[derive(Debug, Default)]
pub struct NamespaceTable {
    /// All live bindings, outermost first; `(prefix, uri)`. An empty
    /// uri marks an undeclaration.
    bindings: Vec<(Vec<u8>, Vec<u8>)>,
    /// Binding count at each scope entry.
    scopes: Vec<usize>,
}

impl NamespaceTable {
    /// Empty table: no scopes, only the implicit `xml` prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for an element, recording its `xmlns` attributes.
    pub fn push_scope(&mut self, attributes: &[Attr<'_>]) {
        self.scopes.push(self.bindings.len());
        for attr in attributes {
            if let Some((prefix, uri)) = attr.namespace_declaration() {
                self.bindings.push((prefix.to_vec(), uri.to_vec()));
            }
        }
    }

    /// Close the innermost scope.
    pub fn pop_scope(&mut self) {
        if let Some(len) = self.scopes.pop() {
            self.bindings.truncate(len);
        }
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Resolve a prefix to its URI; the empty prefix resolves the
    /// default namespace. Returns None for unbound prefixes and
    /// undeclared defaults.
    pub fn resolve(&self, prefix: &[u8]) -> Option<&[u8]> {
        if prefix == XML_PREFIX {
            return Some(XML_URI);
        }
        for (p, uri) in self.bindings.iter().rev() {
            if p.as_slice() == prefix {
                if uri.is_empty() {
                    return None;
                }
                return Some(uri);
            }
        }
        None
    }

    /// Resolve an element name: the default namespace applies to
    /// unprefixed names. Returns `(uri, local)`.
    pub fn resolve_element<'n>(&self, name: &'n [u8]) -> (Option<&[u8]>, &'n [u8]) {
        match split(name) {
            (Some(prefix), local) => (self.resolve(prefix), local),
            (None, local) => (self.resolve(b""), local),
        }
    }

    /// Resolve an attribute name: unprefixed attributes are in no
    /// namespace. Returns `(uri, local)`.
    pub fn resolve_attribute<'n>(&self, name: &'n [u8]) -> (Option<&[u8]>, &'n [u8]) {
        match split(name) {
            (Some(prefix), local) => (self.resolve(prefix), local),
            (None, local) => (None, local),
        }
    }
}

fn split(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr::memchr(b':', name) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// A [`Reader`] that maintains namespace scopes alongside the event
/// stream.
///
/// Scopes stay live while the caller inspects the event that opened or
/// closed them; the pop for End/Empty happens on the next
/// `next_event()` call.
pub struct NsReader<'a> {
    inner: Reader<'a>,
    table: NamespaceTable,
    pending_pops: usize,
}

impl<'a> NsReader<'a> {
    /// Namespace-aware reader over a byte slice.
    pub fn from_bytes(input: &'a [u8]) -> Self {
        NsReader {
            inner: Reader::from_bytes(input),
            table: NamespaceTable::new(),
            pending_pops: 0,
        }
    }

    /// Namespace-aware reader over a string.
    pub fn from_str(input: &'a str) -> Self {
        Self::from_bytes(input.as_bytes())
    }

    /// The wrapped reader, for configuration.
    pub fn reader_mut(&mut self) -> &mut Reader<'a> {
        &mut self.inner
    }

    /// The current namespace table.
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.table
    }

    /// Advance by one event, updating namespace scopes.
    pub fn next_event(&mut self) -> Result<Event<'a>> {
        for _ in 0..std::mem::take(&mut self.pending_pops) {
            self.table.pop_scope();
        }
        let event = self.inner.next_event()?;
        match &event {
            Event::Start(e) => self.table.push_scope(&e.attributes),
            Event::Empty(e) => {
                self.table.push_scope(&e.attributes);
                self.pending_pops += 1;
            }
            Event::End(_) => self.pending_pops += 1,
            _ => {}
        }
        Ok(event)
    }

    /// Resolve an element name against the current scopes.
    pub fn resolve_element<'n>(&self, name: &'n [u8]) -> (Option<&[u8]>, &'n [u8]) {
        self.table.resolve_element(name)
    }

    /// Resolve an attribute name against the current scopes.
    pub fn resolve_attribute<'n>(&self, name: &'n [u8]) -> (Option<&[u8]>, &'n [u8]) {
        self.table.resolve_attribute(name)
    }
}
