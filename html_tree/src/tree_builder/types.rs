//! Small types shared across the tree builder's insertion-mode dispatch.
//! Grounded in `html5ever::tree_builder::types`; the teacher parameterizes
//! several of these over a generic `Handle`, but our handle is always the
//! concrete `html_tree_dom::Handle`, so the parameter is dropped.

use html_tree_dom::Handle;
use tendril::StrTendril;

use crate::tokenizer::{Doctype, Tag};

/// One of the 23 insertion modes (spec.md §4.3).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InsertionMode {
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    InHeadNoscript,
    AfterHead,
    InBody,
    Text,
    InTable,
    InTableText,
    InCaption,
    InColumnGroup,
    InTableBody,
    InRow,
    InCell,
    InSelect,
    InSelectInTable,
    InTemplate,
    AfterBody,
    InFrameset,
    AfterFrameset,
    AfterAfterBody,
    AfterAfterFrameset,
}

/// Whether a run of character tokens handed to the table-text buffer was
/// whitespace, non-whitespace, or not yet classified.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SplitStatus {
    NotSplit,
    Whitespace,
    NotWhitespace,
}

/// The tree builder's own token representation: narrower than the
/// tokenizer's `Token`, with whitespace already classified for characters.
#[derive(Debug)]
pub enum BuilderToken {
    Doctype(Doctype),
    Tag(Tag),
    Comment(StrTendril),
    Characters(SplitStatus, StrTendril),
    NullCharacter,
    Eof,
}

/// What a rule wants to happen next.
pub enum ProcessResult {
    Done,
    DoneAckSelfClosing,
    SplitWhitespace(StrTendril),
    Reprocess(InsertionMode, BuilderToken),
    ReprocessForeign(BuilderToken),
    Script(Handle),
    ToPlaintext,
    ToRawData(crate::tokenizer::states::RawKind),
}

/// One entry in the active formatting element list (spec.md §4.3
/// "Active-formatting-element reconstruction").
#[derive(Clone)]
pub enum FormatEntry {
    Element(Handle, Tag),
    Marker,
}

/// Where "insert an HTML element" should place its new node, per spec.md
/// §4.3 "Insertion".
pub enum InsertionPoint {
    LastChild(Handle),
    BeforeSibling(Handle),
    TableFosterParenting {
        element: Handle,
        prev_element: Handle,
    },
}
