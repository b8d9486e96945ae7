//! Tag-set predicates used by scope checks, implied-end-tag generation,
//! and the adoption agency's furthest-block search (spec.md §4.3). The
//! teacher expresses these with a `declare_tag_set!` macro over a
//! compiler-plugin-backed phf set; here they're plain functions over the
//! `html_tree_dom::entities` tables, namespace-aware where the spec
//! requires it (MathML text integration points and SVG HTML integration
//! points count as *additional* scope terminators regardless of name).

use html_tree_dom::{entities, ns, ExpandedName};

fn is_html(name: &ExpandedName) -> bool {
    *name.ns == ns::html()
}

pub fn default_scope(name: ExpandedName) -> bool {
    is_html(&name) && entities::DEFAULT_SCOPE.contains(name.local.as_str())
}

pub fn button_scope(name: ExpandedName) -> bool {
    default_scope(name) || (is_html(&name) && name.local.as_str() == "button")
}

pub fn list_item_scope(name: ExpandedName) -> bool {
    default_scope(name)
        || (is_html(&name) && matches!(name.local.as_str(), "ol" | "ul"))
}

pub fn table_scope(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "html" | "table" | "template")
}

/// "Select scope": every element is a terminator except `optgroup`/`option`.
pub fn select_scope(name: ExpandedName) -> bool {
    !(is_html(&name) && matches!(name.local.as_str(), "optgroup" | "option"))
}

/// MathML text integration points and SVG HTML integration points are
/// scope terminators in every scope variant above, layered on top of the
/// name-based checks (spec.md §4.3 "ignores non-HTML elements except...").
pub fn is_extra_scope_terminator(name: ExpandedName) -> bool {
    (*name.ns == ns::mathml()
        && entities::MATHML_TEXT_INTEGRATION_POINTS.contains(name.local.as_str()))
        || (*name.ns == ns::svg()
            && entities::SVG_HTML_INTEGRATION_POINTS.contains(name.local.as_str()))
}

pub fn cursory_implied_end(name: ExpandedName) -> bool {
    is_html(&name) && entities::IMPLIED_END_TAGS.contains(name.local.as_str())
}

pub fn thorough_implied_end(name: ExpandedName) -> bool {
    is_html(&name) && entities::IMPLIED_END_TAGS_THOROUGHLY.contains(name.local.as_str())
}

/// "Special" elements, for the adoption agency's furthest-block search and
/// assorted `inBody` checks. A handful of foreign elements are special too
/// (spec.md §4.3), checked here by namespace.
pub fn special_tag(name: ExpandedName) -> bool {
    if is_html(&name) {
        return entities::SPECIAL_ELEMENTS.contains(name.local.as_str());
    }
    if *name.ns == ns::mathml() {
        return matches!(
            name.local.as_str(),
            "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
        );
    }
    if *name.ns == ns::svg() {
        return matches!(name.local.as_str(), "foreignObject" | "desc" | "title");
    }
    false
}

pub fn heading_tag(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Plain-name twin of [`heading_tag`], for dispatch sites that only have a
/// bare tag name (the token hasn't been inserted as an element yet, so
/// there's no namespace to borrow into an `ExpandedName`).
pub fn heading_tag_name(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Plain-name twin of [`table_body_context`].
pub fn table_body_context_name(name: &str) -> bool {
    matches!(name, "tbody" | "tfoot" | "thead")
}

/// Plain-name twin of [`td_th`].
pub fn td_th_name(name: &str) -> bool {
    matches!(name, "td" | "th")
}

/// "li" is its own list-item close boundary (spec.md §4.3 "list item").
pub fn close_list(name: ExpandedName) -> bool {
    is_html(&name) && name.local.as_str() == "li"
}

/// "dd"/"dt" share a list-item close boundary.
pub fn close_defn(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "dd" | "dt")
}

/// Elements that, as a fragment-context name or as the object of a "reset
/// the insertion mode" scan, identify a table-body-like context.
pub fn table_body_context(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "tbody" | "tfoot" | "thead")
}

pub fn table_row_context(name: ExpandedName) -> bool {
    is_html(&name) && name.local.as_str() == "tr"
}

pub fn td_th(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "td" | "th")
}

/// Targets of foster parenting: when the current node's name is one of
/// these, inserted nodes get redirected in front of the nearest table.
pub fn foster_target(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "table" | "tbody" | "tfoot" | "thead" | "tr")
}

pub fn table_outer(name: ExpandedName) -> bool {
    is_html(&name) && matches!(name.local.as_str(), "table" | "template" | "html")
}
