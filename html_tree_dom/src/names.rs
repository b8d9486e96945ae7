//! Interned names.
//!
//! The teacher (`string_cache`-backed `LocalName`/`Namespace`/`Prefix`
//! atoms) generates one dedicated string-interning table per atom kind at
//! build time via `string_cache_codegen`, so that e.g. a `LocalName` and a
//! `Namespace` holding the same text are still distinct types. We keep that
//! type separation but back each newtype with `string_cache::DefaultAtom`
//! (a ready-made, dynamically-growing interning table) instead of running
//! codegen against a `local_names.txt`/namespace list — see DESIGN.md for
//! why the codegen step was dropped.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use string_cache::DefaultAtom;

macro_rules! interned_name {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(DefaultAtom);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(DefaultAtom::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(DefaultAtom::from(s))
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                &*self.0 == other
            }
        }

        impl<'a> PartialEq<&'a str> for $name {
            fn eq(&self, other: &&'a str) -> bool {
                &*self.0 == *other
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&*self.0, f)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&*self.0, f)
            }
        }
    };
}

interned_name!(LocalName);
interned_name!(Namespace);
interned_name!(Prefix);

/// Well-known namespace URIs, matching the teacher's `ns!(...)` macro table.
pub mod ns {
    #![allow(non_snake_case)]
    use super::Namespace;

    pub fn empty() -> Namespace {
        Namespace::from("")
    }
    pub fn html() -> Namespace {
        Namespace::from("http://www.w3.org/1999/xhtml")
    }
    pub fn xml() -> Namespace {
        Namespace::from("http://www.w3.org/XML/1998/namespace")
    }
    pub fn xmlns() -> Namespace {
        Namespace::from("http://www.w3.org/2000/xmlns/")
    }
    pub fn xlink() -> Namespace {
        Namespace::from("http://www.w3.org/1999/xlink")
    }
    pub fn svg() -> Namespace {
        Namespace::from("http://www.w3.org/2000/svg")
    }
    pub fn mathml() -> Namespace {
        Namespace::from("http://www.w3.org/1998/Math/MathML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_distinct_types_from_local_names() {
        let n: Namespace = ns::html();
        let l: LocalName = LocalName::from("html");
        assert_eq!(n.as_str(), "http://www.w3.org/1999/xhtml");
        assert_eq!(l.as_str(), "html");
    }

    #[test]
    fn interning_equal_strings_compares_equal() {
        assert_eq!(LocalName::from("div"), LocalName::from("div"));
        assert_ne!(LocalName::from("div"), LocalName::from("span"));
    }
}
