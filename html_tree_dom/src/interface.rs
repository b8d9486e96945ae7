//! Shared vocabulary between the tokenizer and the tree builder: qualified
//! names, attributes, and the quirks-mode enum. Grounded in
//! `markup5ever::interface::{QualName, ExpandedName, Attribute}` and
//! `markup5ever::interface::tree_builder::QuirksMode`.

use std::fmt;

use tendril::StrTendril;

use crate::names::{LocalName, Namespace, Prefix};

/// <https://www.w3.org/TR/REC-xml-names/#dt-expname>
#[derive(Copy, Clone, Eq, Hash)]
pub struct ExpandedName<'a> {
    pub ns: &'a Namespace,
    pub local: &'a LocalName,
}

impl<'a, 'b> PartialEq<ExpandedName<'a>> for ExpandedName<'b> {
    fn eq(&self, other: &ExpandedName<'a>) -> bool {
        self.ns == other.ns && self.local == other.local
    }
}

impl<'a> fmt::Debug for ExpandedName<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.ns.as_str().is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}:{}", self.ns, self.local)
        }
    }
}

/// A tag or attribute name together with its namespace and (optional)
/// namespace prefix.
///
/// ```text
/// <furn:table>
///    |    |
///    |    +- local name
///    |
///  prefix (when resolved gives namespace)
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct QualName {
    pub prefix: Option<Prefix>,
    pub ns: Namespace,
    pub local: LocalName,
}

impl QualName {
    #[inline]
    pub fn new(prefix: Option<Prefix>, ns: Namespace, local: LocalName) -> QualName {
        QualName { prefix, ns, local }
    }

    /// Construct a name in the HTML namespace with no prefix — the common
    /// case for every tag and attribute the tokenizer produces.
    #[inline]
    pub fn html(local: LocalName) -> QualName {
        QualName::new(None, crate::names::ns::html(), local)
    }

    #[inline]
    pub fn expanded(&self) -> ExpandedName<'_> {
        ExpandedName {
            ns: &self.ns,
            local: &self.local,
        }
    }
}

/// A tag attribute.
///
/// The namespace on the attribute name is almost always the empty
/// namespace. The tokenizer creates all attributes this way; the tree
/// builder adjusts certain attribute names inside foreign content
/// (MathML, SVG) per spec.md §4.3 "Foreign content".
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Attribute {
    pub name: QualName,
    pub value: StrTendril,
}

/// <https://dom.spec.whatwg.org/#concept-document-quirks>
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum QuirksMode {
    Quirks,
    LimitedQuirks,
    NoQuirks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::ns;

    #[test]
    fn expanded_name_eq_compares_ns_and_local() {
        let a = QualName::html(LocalName::from("div"));
        let b = QualName::html(LocalName::from("div"));
        let c = QualName::new(None, ns::svg(), LocalName::from("div"));
        assert_eq!(a.expanded(), b.expanded());
        assert_ne!(a.expanded(), c.expanded());
    }
}
