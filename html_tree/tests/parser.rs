//! Integration tests covering the end-to-end scenarios spec.md §8 names
//! concretely: the adoption agency across `</p>`, foster parenting into a
//! table, SVG integration points, template content redirection, fragment
//! parsing, and named character references with/without a trailing `;`.
//! Placed in `tests/` per crate the way the teacher places its own
//! `tests/tree_builder.rs`/`tests/tokenizer.rs` (see SPEC_FULL.md §E);
//! ordinary `#[test]`s since there's no html5lib fixture corpus here.

use html_tree::dom::{Handle, NodeData};
use html_tree::{parse_document, parse_fragment, ParseOpts};

fn find_all(node: &Handle, name: &str, out: &mut Vec<Handle>) {
    if node.as_element().map(|n| n.local.as_str() == name).unwrap_or(false) {
        out.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        find_all(child, name, out);
    }
}

fn find<'a>(node: &Handle, name: &str) -> Option<Handle> {
    let mut out = Vec::new();
    find_all(node, name, &mut out);
    out.into_iter().next()
}

fn text_of(node: &Handle) -> String {
    let mut s = String::new();
    for child in node.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            s.push_str(&contents.borrow());
        }
    }
    s
}

fn child_names(node: &Handle) -> Vec<String> {
    node.children
        .borrow()
        .iter()
        .filter_map(|c| c.as_element().map(|n| n.local.as_str().to_string()))
        .collect()
}

/// spec.md §8 scenario 1: adoption agency across a misnested `</p>`.
#[test]
fn adoption_agency_scenario_from_spec() {
    let doc = parse_document("<!DOCTYPE html><p>a<b>b<i>c</p>d</i>e</b>f", ParseOpts::default());
    let body = find(&doc, "body").expect("body");

    let p = find(&body, "p").expect("p");
    assert_eq!(text_of(&p), "a");
    let b_in_p = find(&p, "b").expect("b nested in p");
    assert_eq!(text_of(&b_in_p), "b");
    let i_in_b = find(&b_in_p, "i").expect("i nested in b");
    assert_eq!(text_of(&i_in_b), "c");

    // body's direct children after the adoption agency clones <i> and <b>
    // across the </p> boundary: p, i (clone, holding "d"), b (clone, "e"),
    // then the trailing text "f".
    let names = child_names(&body);
    assert_eq!(names, vec!["p", "i", "b"]);

    let mut is = Vec::new();
    find_all(&body, "i", &mut is);
    assert_eq!(is.len(), 2, "adoption agency should clone <i> once");
    assert_eq!(text_of(&is[1]), "d");

    let mut bs = Vec::new();
    find_all(&body, "b", &mut bs);
    assert_eq!(bs.len(), 2, "adoption agency should clone <b> once");
    assert_eq!(text_of(&bs[1]), "e");
}

/// spec.md §8 scenario 2: foster parenting + implicit tbody.
#[test]
fn foster_parenting_and_implicit_tbody() {
    let doc = parse_document("<table>foo<tr><td>bar", ParseOpts::default());
    let body = find(&doc, "body").expect("body");

    // "foo" is foster-parented out of the table, landing before it as a
    // direct text child of body.
    let has_foo_before_table = body.children.borrow().iter().any(|c| match &c.data {
        NodeData::Text { contents } => contents.borrow().contains("foo"),
        _ => false,
    });
    assert!(has_foo_before_table, "foo should be foster-parented before the table");

    let table = find(&body, "table").expect("table");
    let tbody = find(&table, "tbody").expect("implicit tbody");
    let tr = find(&tbody, "tr").expect("tr");
    let td = find(&tr, "td").expect("td");
    assert_eq!(text_of(&td), "bar");
}

/// spec.md §8 scenario 3: SVG integration points and namespace tracking.
#[test]
fn svg_integration_point_and_namespace() {
    let doc =
        parse_document("<!DOCTYPE html><svg><g></g><foreignObject><p>x</p></foreignObject></svg>", ParseOpts::default());
    let body = find(&doc, "body").expect("body");
    let svg = find(&body, "svg").expect("svg");
    assert_eq!(&*svg.as_element().unwrap().ns, "http://www.w3.org/2000/svg");

    let g = find(&svg, "g").expect("g");
    assert_eq!(&*g.as_element().unwrap().ns, "http://www.w3.org/2000/svg");

    let foreign_object = find(&svg, "foreignObject").expect("foreignObject");
    assert_eq!(&*foreign_object.as_element().unwrap().ns, "http://www.w3.org/2000/svg");

    // Content inside a foreignObject integration point reverts to HTML.
    let p = find(&foreign_object, "p").expect("p inside foreignObject");
    assert_eq!(&*p.as_element().unwrap().ns, "http://www.w3.org/1999/xhtml");
    assert_eq!(text_of(&p), "x");
}

/// spec.md §8 scenario 4: template content redirection + template-mode stack.
#[test]
fn template_content_redirection() {
    let doc = parse_document("<template><tr><td>x</td></tr></template>", ParseOpts::default());
    let body = find(&doc, "body").expect("body");
    let template = find(&body, "template").expect("template");

    // The <tr>/<td> never appear as direct tree children of <template>
    // itself; they live in its separate content fragment.
    assert!(template.children.borrow().is_empty());

    let contents = template.template_contents().expect("template content fragment");
    let tbody = find(&contents, "tbody").expect("implicit tbody inside template content");
    let tr = find(&tbody, "tr").expect("tr inside template content");
    let td = find(&tr, "td").expect("td inside template content");
    assert_eq!(text_of(&td), "x");
}

/// spec.md §8 scenario 5: fragment parsing with a `td` context element.
#[test]
fn fragment_parsing_td_context_with_table() {
    let context = html_tree::dom::QualName::html(html_tree::dom::LocalName::from("td"));
    let root = parse_fragment(context, "<table><tr><td>x", ParseOpts::default());
    let table = find(&root, "table").expect("table");
    let tbody = find(&table, "tbody").expect("tbody");
    let tr = find(&tbody, "tr").expect("tr");
    let td = find(&tr, "td").expect("td");
    assert_eq!(text_of(&td), "x");
}

/// spec.md §8 scenario 6: named character reference with/without a
/// trailing semicolon, and attribute-value suppression.
#[test]
fn named_character_reference_semicolon_handling() {
    let doc = parse_document("<p>&notin</p>", ParseOpts::default());
    let p = find(&doc, "p").expect("p");
    assert_eq!(text_of(&p), "\u{00AC}in");

    let doc = parse_document("<p>&notin;</p>", ParseOpts::default());
    let p = find(&doc, "p").expect("p");
    assert_eq!(text_of(&p), "\u{2209}");

    // Inside an attribute value, an unterminated legacy entity immediately
    // followed by letters is not decoded at all.
    let doc = parse_document(r#"<a href="?x&notin=1">x</a>"#, ParseOpts::default());
    let a = find(&doc, "a").expect("a");
    let href = a
        .attrs()
        .unwrap()
        .borrow()
        .iter()
        .find(|attr| attr.name.local.as_str() == "href")
        .map(|attr| attr.value.to_string())
        .expect("href attribute");
    assert_eq!(href, "?x&notin=1");
}

/// spec.md §3 Token / §4.2: duplicate attributes on the same tag are
/// dropped silently, first value wins.
#[test]
fn duplicate_attributes_first_wins() {
    let doc = parse_document(r#"<div id="first" id="second" class="only"></div>"#, ParseOpts::default());
    let div = find(&doc, "div").expect("div");
    let attrs = div.attrs().unwrap().borrow();
    assert_eq!(attrs.len(), 2, "duplicate id= must be dropped, not kept as a second entry");
    let id = attrs.iter().find(|a| a.name.local.as_str() == "id").unwrap();
    assert_eq!(&*id.value, "first");
}

/// spec.md §8 boundary behavior: empty input still gets the implied
/// html/head/body skeleton.
#[test]
fn empty_input_yields_implied_skeleton() {
    let doc = parse_document("", ParseOpts::default());
    assert!(find(&doc, "html").is_some());
    assert!(find(&doc, "head").is_some());
    assert!(find(&doc, "body").is_some());
}

/// spec.md §8 boundary behavior: a lone `<` with no tag name is text, not
/// an element.
#[test]
fn bare_less_than_is_text_not_an_element() {
    let doc = parse_document("<p>a < b</p>", ParseOpts::default());
    let p = find(&doc, "p").expect("p");
    assert_eq!(text_of(&p), "a < b");
}
