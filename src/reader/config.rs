//! Parser configuration.

/// Options recognized by the readers.
///
/// Defaults: lenient tokenization, entity expansion on, text kept
/// verbatim, end-tag names checked.
#[derive(Debug, Clone)]
pub struct Config {
    /// Disable the tokenizer leniencies: `<` before a non-name-start
    /// byte, PIs without a valid target, and non-canonical encoding
    /// names in the declaration all become errors.
    pub strict: bool,
    /// Expand entity and character references in text and attribute
    /// values. When off, `Text` events retain the raw references and
    /// the entity table is never consulted.
    pub expand_entities: bool,
    /// Strip leading/trailing XML whitespace from `Text` events and
    /// drop events that end up empty.
    pub trim_text: bool,
    /// Enforce that each end tag matches the open element.
    pub check_end_names: bool,
    /// Permit an end tag whose name does not match the stack top; the
    /// event is still emitted. Takes precedence over
    /// `check_end_names`.
    pub allow_unmatched_ends: bool,
    /// Keep references to undeclared entities verbatim instead of
    /// erroring. Off by default even in lenient mode, because expansion
    /// changes document semantics.
    pub keep_unknown_entities: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strict: false,
            expand_entities: true,
            trim_text: false,
            check_end_names: true,
            allow_unmatched_ends: false,
            keep_unknown_entities: false,
        }
    }
}
