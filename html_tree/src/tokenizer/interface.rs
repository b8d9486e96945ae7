//! Token types emitted by the tokenizer, and the [`TokenSink`] trait the
//! tree builder implements to receive them. Grounded in
//! `html5ever::tokenizer::interface`.

use std::borrow::Cow;

use html_tree_dom::{Attribute, LocalName};
use tendril::StrTendril;

use crate::tokenizer::states;

pub use self::TagKind::{EndTag, StartTag};
pub use self::Token::{CharacterTokens, CommentToken, DoctypeToken, TagToken};
pub use self::Token::{EOFToken, NullCharacterToken, ParseError};

/// A `DOCTYPE` token. `force_quirks` reflects the tokenizer-level
/// malformed-doctype detection from spec.md §4.2; the tree builder layers
/// its own public/system-id-based quirks detection (§4.3) on top.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Doctype {
    pub name: Option<StrTendril>,
    pub public_id: Option<StrTendril>,
    pub system_id: Option<StrTendril>,
    pub force_quirks: bool,
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum TagKind {
    StartTag,
    EndTag,
}

/// A start or end tag token.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Tag {
    pub kind: TagKind,
    pub name: LocalName,
    pub self_closing: bool,
    pub attrs: Vec<Attribute>,
}

impl Tag {
    /// Are the tags equivalent when we don't care about attribute order?
    /// Used by test assertions; also ignores the self-closing flag.
    pub fn equiv_modulo_attr_order(&self, other: &Tag) -> bool {
        if (self.kind != other.kind) || (self.name != other.name) {
            return false;
        }
        let mut self_attrs = self.attrs.clone();
        let mut other_attrs = other.attrs.clone();
        self_attrs.sort();
        other_attrs.sort();
        self_attrs == other_attrs
    }
}

#[derive(PartialEq, Eq, Debug)]
pub enum Token {
    DoctypeToken(Doctype),
    TagToken(Tag),
    CommentToken(StrTendril),
    CharacterTokens(StrTendril),
    NullCharacterToken,
    EOFToken,
    ParseError(Cow<'static, str>),
}

/// What the tree builder wants the tokenizer to do next, returned from
/// `TokenSink::process_token`.
#[derive(Debug, PartialEq)]
#[must_use]
pub enum TokenSinkResult<Handle> {
    Continue,
    /// A `<script>` end tag was processed: the caller (the driver) may
    /// suspend parsing here. Script *execution* is a non-goal (spec.md
    /// §7), so `html_tree`'s own driver always resumes immediately, but
    /// the signal is preserved for embedders that do run scripts.
    Script(Handle),
    Plaintext,
    RawData(states::RawKind),
}

/// Types which can receive tokens from the tokenizer. The tree builder is
/// the only implementor in this crate, but keeping the tokenizer generic
/// over `TokenSink` (rather than hard-wiring the tree builder in) keeps the
/// tokenizer/tree-builder seam exactly where the teacher puts it.
pub trait TokenSink {
    type Handle;

    fn process_token(&self, token: Token, line_number: u64) -> TokenSinkResult<Self::Handle>;

    fn end(&self) {}

    /// Used in the markup declaration open state to decide whether `<![CDATA[`
    /// should be tokenized as CDATA or as a bogus comment (spec.md §4.2
    /// "CDATA sections are only recognized in foreign content").
    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        false
    }
}
