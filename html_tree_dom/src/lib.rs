//! Foundation types shared by the tokenizer and the tree builder: interned
//! names, the buffer-queue input utility, the concrete node store, and the
//! static data tables (named character references, the Windows-1252
//! fix-up table, and the WHATWG element/attribute category tables used by
//! foreign-content handling).
//!
//! Mirrors the role `markup5ever` plays for the teacher's `html5ever`: the
//! lower, shared crate that the parser crate (`html_tree`) depends on.

pub mod buffer_queue;
pub mod entities;
pub mod interface;
pub mod names;
pub mod node;
pub mod smallcharset;

pub use buffer_queue::{BufferQueue, SetResult};
pub use buffer_queue::SetResult::{FromSet, NotFromSet};
pub use interface::{Attribute, ExpandedName, QualName, QuirksMode};
pub use names::{ns, LocalName, Namespace, Prefix};
pub use node::{ElementFlags, Handle, Node, NodeData, NodeOrText, NodeStore, WeakHandle};
pub use smallcharset::SmallCharSet;
