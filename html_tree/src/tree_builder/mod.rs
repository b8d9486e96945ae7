//! The tree-construction stage: an insertion-mode state machine that turns
//! the tokenizer's token stream into a DOM-ish tree (spec.md §4.3).
//! Grounded in `html5ever::tree_builder`. The teacher is generic over a
//! `TreeSink<Handle>` trait so any consumer can plug in a backing store;
//! spec.md asks for one concrete, owned store, so the genericity is
//! collapsed here into a `TreeBuilder` that owns an `html_tree_dom::NodeStore`
//! directly (see SPEC_FULL.md §A).

mod data;
mod rules;
mod tag_sets;
pub mod types;

use std::borrow::Cow::{self, Borrowed};
use std::cell::{Cell, RefCell};

use html_tree_dom::{
    ns, Attribute, ElementFlags, ExpandedName, Handle, NodeData, NodeOrText, NodeStore, QualName,
    QuirksMode,
};
use log::{debug, trace};
use tendril::StrTendril;

use crate::tokenizer::states::RawKind;
use crate::tokenizer::{
    Doctype, EndTag, StartTag, Tag, TagKind, Token, TokenSink, TokenSinkResult,
};

pub use self::types::InsertionMode;
use self::types::{BuilderToken, FormatEntry, InsertionPoint, ProcessResult, SplitStatus};

/// A cap on open-element-stack depth (spec.md §5 "Nested stack depth is
/// bounded by adversarial input"). Once exceeded, further element
/// insertions are treated as a parse error and dropped rather than pushed,
/// so pathological inputs can't exhaust memory via stack growth.
const MAX_OPEN_ELEMENTS: usize = 4096;

/// Tree-builder configuration. Mirrors `html5ever::tree_builder::TreeBuilderOpts`
/// (see SPEC_FULL.md §D).
#[derive(Clone, Default)]
pub struct TreeBuilderOpts {
    /// Is scripting enabled? Affects `<noscript>`'s raw-text treatment and
    /// a handful of `inHead`/`inBody` branches (spec.md §4.2/§4.3).
    pub scripting_enabled: bool,
    /// Are we parsing the contents of an `iframe srcdoc` attribute? Forces
    /// no-quirks mode regardless of any doctype (spec.md §4.3).
    pub iframe_srcdoc: bool,
    /// Drop the root `<html>` doctype node rather than reflecting it in
    /// the tree. Default false: keep it, like a real document.
    pub drop_doctype: bool,
}

/// The tree builder. Implements `TokenSink` so it can sit directly behind
/// a `Tokenizer` (spec.md §4.2/§4.3 seam).
pub struct TreeBuilder {
    pub opts: TreeBuilderOpts,
    pub store: NodeStore,

    mode: Cell<InsertionMode>,
    orig_mode: Cell<Option<InsertionMode>>,
    template_modes: RefCell<Vec<InsertionMode>>,

    open_elems: RefCell<Vec<Handle>>,
    active_formatting: RefCell<Vec<FormatEntry>>,

    head_elem: RefCell<Option<Handle>>,
    form_elem: RefCell<Option<Handle>>,

    /// Fragment-parsing context element (spec.md §4.3 "Fragment parsing").
    /// Not itself on the open-element stack; used as an extra implicit
    /// stack bottom for scope checks and insertion-mode reset.
    context_elem: RefCell<Option<Handle>>,

    frameset_ok: Cell<bool>,
    ignore_lf: Cell<bool>,
    quirks_forced_done: Cell<bool>,
    /// spec.md §4.3 "foster parenting": set only around the handful of
    /// table-related steps that call for it, not a general property of
    /// the target element.
    foster_parenting: Cell<bool>,

    pending_table_text: RefCell<Vec<(SplitStatus, StrTendril)>>,

    stopped: Cell<bool>,
    current_line: Cell<u64>,
}

impl TreeBuilder {
    pub fn new(opts: TreeBuilderOpts) -> TreeBuilder {
        TreeBuilder {
            opts,
            store: NodeStore::new(),
            mode: Cell::new(InsertionMode::Initial),
            orig_mode: Cell::new(None),
            template_modes: RefCell::new(Vec::new()),
            open_elems: RefCell::new(Vec::new()),
            active_formatting: RefCell::new(Vec::new()),
            head_elem: RefCell::new(None),
            form_elem: RefCell::new(None),
            context_elem: RefCell::new(None),
            frameset_ok: Cell::new(true),
            ignore_lf: Cell::new(false),
            quirks_forced_done: Cell::new(false),
            foster_parenting: Cell::new(false),
            pending_table_text: RefCell::new(Vec::new()),
            stopped: Cell::new(false),
            current_line: Cell::new(1),
        }
    }

    /// Build a tree builder for parsing a fragment in the context of
    /// `context`, per spec.md §4.3 "Fragment parsing": a virtual `<html>`
    /// is pushed but no head/body is implied, and the insertion mode is
    /// derived from `context`'s name.
    pub fn new_for_fragment(context: QualName, opts: TreeBuilderOpts) -> TreeBuilder {
        let tb = TreeBuilder::new(opts);
        let html = tb.store.create_element(
            QualName::html(html_tree_dom::LocalName::from("html")),
            Vec::new(),
            ElementFlags::default(),
        );
        tb.store.append(&tb.store.document, NodeOrText::Node(html.clone()));
        tb.open_elems.borrow_mut().push(html);

        if context.local.as_str() == "template" {
            tb.template_modes.borrow_mut().push(InsertionMode::InTemplate);
        }

        let ctx = tb.store.create_element(context, Vec::new(), ElementFlags::default());
        *tb.context_elem.borrow_mut() = Some(ctx);
        tb.reset_insertion_mode();
        tb
    }

    /// Feed one token through to completion, handling any `Reprocess`
    /// bouncing between insertion modes (spec.md §4.3's per-mode dispatch
    /// table, driven to a fixed point).
    fn process_to_completion(&self, mut token: BuilderToken) -> TokenSinkResult<Handle> {
        loop {
            if self.stopped.get() {
                return TokenSinkResult::Continue;
            }

            let is_foreign = self.should_process_as_foreign(&token);
            let result = if is_foreign {
                rules::step_foreign(self, token)
            } else {
                rules::step(self, self.mode.get(), token)
            };

            match result {
                ProcessResult::Done => return TokenSinkResult::Continue,
                ProcessResult::DoneAckSelfClosing => return TokenSinkResult::Continue,
                ProcessResult::Reprocess(mode, tok) => {
                    self.mode.set(mode);
                    token = tok;
                },
                ProcessResult::ReprocessForeign(tok) => {
                    token = tok;
                },
                ProcessResult::SplitWhitespace(rest) => {
                    token = BuilderToken::Characters(SplitStatus::NotWhitespace, rest);
                },
                ProcessResult::Script(node) => return TokenSinkResult::Script(node),
                ProcessResult::ToPlaintext => return TokenSinkResult::Plaintext,
                ProcessResult::ToRawData(kind) => return TokenSinkResult::RawData(kind),
            }
        }
    }

    fn should_process_as_foreign(&self, token: &BuilderToken) -> bool {
        if self.open_elems.borrow().is_empty() {
            return false;
        }
        match token {
            BuilderToken::Tag(Tag { kind: TagKind::StartTag, .. })
            | BuilderToken::Characters(..)
            | BuilderToken::NullCharacter => {
                let node = self.adjusted_current_node();
                self.is_foreign(&node)
            },
            BuilderToken::Tag(Tag { kind: TagKind::EndTag, name, .. }) => {
                // "script" end tags and a small set of others always run
                // through the HTML rules even in foreign content; the
                // per-mode table in `rules::step_foreign` itself re-checks
                // this, this is just the coarse gate.
                let _ = name;
                let node = self.adjusted_current_node();
                self.is_foreign(&node)
            },
            _ => false,
        }
    }

    // ---- element stack -------------------------------------------------

    fn push(&self, elem: Handle) {
        let mut stack = self.open_elems.borrow_mut();
        if stack.len() >= MAX_OPEN_ELEMENTS {
            drop(stack);
            self.store.parse_error(Borrowed(
                "Open element stack depth exceeded maximum, stopping insertion",
            ));
            return;
        }
        stack.push(elem);
    }

    fn pop(&self) -> Option<Handle> {
        self.open_elems.borrow_mut().pop()
    }

    fn current_node(&self) -> Handle {
        self.open_elems
            .borrow()
            .last()
            .cloned()
            .expect("open element stack unexpectedly empty")
    }

    /// spec.md §4.3/GLOSSARY "Adjusted current node": the context element
    /// when fragment-parsing and the stack holds only the virtual `<html>`.
    fn adjusted_current_node(&self) -> Handle {
        let stack = self.open_elems.borrow();
        if stack.len() == 1 {
            if let Some(ctx) = self.context_elem.borrow().clone() {
                return ctx;
            }
        }
        stack.last().cloned().expect("open element stack empty")
    }

    fn current_node_named(&self, name: &str) -> bool {
        self.current_node().as_element().map(|e| e.local.as_str() == name).unwrap_or(false)
    }

    fn html_elem_named(&self, elem: &Handle, name: &str) -> bool {
        elem.as_element()
            .map(|e| *e.ns == ns::html() && e.local.as_str() == name)
            .unwrap_or(false)
    }

    fn in_html_elem_named(&self, name: &str) -> bool {
        self.open_elems.borrow().iter().any(|e| self.html_elem_named(e, name))
    }

    fn remove_from_stack(&self, elem: &Handle) {
        self.open_elems
            .borrow_mut()
            .retain(|e| !NodeStore::same_node(e, elem));
    }

    fn position_in_stack(&self, elem: &Handle) -> Option<usize> {
        self.open_elems.borrow().iter().position(|e| NodeStore::same_node(e, elem))
    }

    fn open_elems_len(&self) -> usize {
        self.open_elems.borrow().len()
    }

    /// A cloned snapshot of the open-element stack, bottom to top, for
    /// callers that need to iterate while the stack itself might mutate.
    fn open_elems_snapshot(&self) -> Vec<Handle> {
        self.open_elems.borrow().clone()
    }

    /// Is the `n`th element from the top (0 = current node) named `name`?
    fn nth_from_top_named(&self, n: usize, name: &str) -> bool {
        let stack = self.open_elems.borrow();
        stack.len() > n
            && stack[stack.len() - 1 - n]
                .as_element()
                .map(|e| e.local.as_str() == name)
                .unwrap_or(false)
    }

    fn is_fragment(&self) -> bool {
        self.context_elem.borrow().is_some()
    }

    fn context_is_named(&self, name: &str) -> bool {
        self.context_elem
            .borrow()
            .as_ref()
            .and_then(|e| e.as_element())
            .map(|e| e.local.as_str() == name)
            .unwrap_or(false)
    }

    // ---- scope checks ---------------------------------------------------

    fn in_scope_named<F>(&self, target: &str, scope: F) -> bool
    where
        F: Fn(ExpandedName) -> bool,
    {
        for elem in self.open_elems.borrow().iter().rev() {
            let Some(name) = elem.as_element() else { continue };
            let expanded = name.expanded();
            if *name.ns == ns::html() && name.local.as_str() == target {
                return true;
            }
            if tag_sets::is_extra_scope_terminator(expanded) || scope(expanded) {
                return false;
            }
        }
        if let Some(ctx) = self.context_elem.borrow().as_ref() {
            if let Some(name) = ctx.as_element() {
                if *name.ns == ns::html() && name.local.as_str() == target {
                    return true;
                }
            }
        }
        false
    }

    fn elem_in_scope(&self, elem: &Handle, scope: impl Fn(ExpandedName) -> bool) -> bool {
        for e in self.open_elems.borrow().iter().rev() {
            if NodeStore::same_node(e, elem) {
                return true;
            }
            let Some(name) = e.as_element() else { continue };
            let expanded = name.expanded();
            if tag_sets::is_extra_scope_terminator(expanded) || scope(expanded) {
                return false;
            }
        }
        false
    }

    // ---- implied end tags ----------------------------------------------

    fn generate_implied_end_tags(&self) {
        self.generate_implied_end_except(None);
    }

    fn generate_implied_end_except(&self, exception: Option<&str>) {
        loop {
            let should_pop = {
                let stack = self.open_elems.borrow();
                match stack.last().and_then(|e| e.as_element()) {
                    Some(name) => {
                        let expanded = name.expanded();
                        tag_sets::cursory_implied_end(expanded)
                            && exception.map(|x| name.local.as_str() != x).unwrap_or(true)
                    },
                    None => false,
                }
            };
            if should_pop {
                self.pop();
            } else {
                break;
            }
        }
    }

    fn generate_implied_end_tags_thoroughly(&self) {
        loop {
            let should_pop = {
                let stack = self.open_elems.borrow();
                match stack.last().and_then(|e| e.as_element()) {
                    Some(name) => tag_sets::thorough_implied_end(name.expanded()),
                    None => false,
                }
            };
            if should_pop {
                self.pop();
            } else {
                break;
            }
        }
    }

    fn pop_until<F: Fn(ExpandedName) -> bool>(&self, pred: F) {
        loop {
            let done = self
                .open_elems
                .borrow()
                .last()
                .and_then(|e| e.as_element())
                .map(|n| pred(n.expanded()))
                .unwrap_or(true);
            if done {
                break;
            }
            self.pop();
        }
    }

    fn pop_until_named(&self, name: &str) {
        self.pop_until(|n| n.local.as_str() == name);
        self.pop();
    }

    /// Pop elements until `target` itself has been popped.
    fn pop_until_current(&self, target: &Handle) {
        loop {
            let top = self.pop();
            match top {
                Some(elem) if NodeStore::same_node(&elem, target) => break,
                Some(_) => continue,
                None => break,
            }
        }
    }

    fn close_p_element(&self) {
        self.generate_implied_end_except(Some("p"));
        if !self.current_node_named("p") {
            self.store.parse_error(Borrowed("p element in stack not at top when closing"));
        }
        self.pop_until_named("p");
    }

    fn close_p_element_in_button_scope(&self) {
        if self.in_scope_named("p", tag_sets::button_scope) {
            self.close_p_element();
        }
    }

    fn close_the_cell(&self) {
        self.generate_implied_end_tags();
        let top_is_td_th = self
            .current_node()
            .as_element()
            .map(|n| matches!(n.local.as_str(), "td" | "th"))
            .unwrap_or(false);
        if !top_is_td_th {
            self.store.parse_error(Borrowed("expected td/th at top of stack when closing cell"));
        }
        loop {
            let is_td_th = self
                .pop()
                .map(|e| e.as_element().map(|n| matches!(n.local.as_str(), "td" | "th")).unwrap_or(false))
                .unwrap_or(true);
            if is_td_th {
                break;
            }
        }
        self.clear_active_formatting_to_marker();
        self.mode.set(InsertionMode::InRow);
    }

    /// spec.md §4.3 "clear the stack back to a table context".
    fn clear_stack_to_table_context(&self) {
        loop {
            let done = self
                .current_node()
                .as_element()
                .map(|n| tag_sets::table_outer(n.expanded()))
                .unwrap_or(true);
            if done {
                break;
            }
            self.pop();
        }
    }

    /// "...table body context".
    fn clear_stack_to_table_body_context(&self) {
        loop {
            let done = self
                .current_node()
                .as_element()
                .map(|n| matches!(n.local.as_str(), "tbody" | "tfoot" | "thead" | "template" | "html"))
                .unwrap_or(true);
            if done {
                break;
            }
            self.pop();
        }
    }

    /// "...table row context".
    fn clear_stack_to_table_row_context(&self) {
        loop {
            let done = self
                .current_node()
                .as_element()
                .map(|n| matches!(n.local.as_str(), "tr" | "template" | "html"))
                .unwrap_or(true);
            if done {
                break;
            }
            self.pop();
        }
    }

    /// Whether an unclassified character token in "in table" should be
    /// buffered through "in table text" instead of inserted directly.
    fn current_node_is_table_text_context(&self) -> bool {
        self.current_node()
            .as_element()
            .map(|n| matches!(n.local.as_str(), "table" | "tbody" | "tfoot" | "thead" | "tr"))
            .unwrap_or(false)
    }

    /// Run `f` with the foster parenting flag enabled, then restore it.
    fn with_foster_parenting<R>(&self, f: impl FnOnce() -> R) -> R {
        let prev = self.foster_parenting.replace(true);
        let result = f();
        self.foster_parenting.set(prev);
        result
    }

    // ---- insertion -------------------------------------------------------

    fn appropriate_place_for_insertion(&self, override_target: Option<Handle>) -> InsertionPoint {
        let target = override_target.unwrap_or_else(|| self.current_node());
        let target_is_foster = self.foster_parenting.get()
            && target
                .as_element()
                .map(|n| tag_sets::foster_target(n.expanded()))
                .unwrap_or(false);

        if !target_is_foster {
            if let Some(template_contents) = target.template_contents() {
                return InsertionPoint::LastChild(template_contents);
            }
            return InsertionPoint::LastChild(target);
        }

        let stack = self.open_elems.borrow();
        let last_table = stack
            .iter()
            .rev()
            .find(|e| e.as_element().map(|n| n.local.as_str() == "table").unwrap_or(false))
            .cloned();

        match last_table {
            None => {
                let html = stack.first().cloned().expect("html element missing from stack");
                drop(stack);
                InsertionPoint::LastChild(html)
            },
            Some(table) => {
                if let Some(template_contents) = table.template_contents() {
                    drop(stack);
                    return InsertionPoint::LastChild(template_contents);
                }
                if let Some(parent) = table.parent() {
                    drop(stack);
                    InsertionPoint::TableFosterParenting { element: parent, prev_element: table }
                } else {
                    let idx = stack.iter().position(|e| NodeStore::same_node(e, &table)).unwrap();
                    let prev = stack[idx - 1].clone();
                    drop(stack);
                    InsertionPoint::TableFosterParenting { element: prev.clone(), prev_element: table }
                }
            },
        }
    }

    fn insert_at(&self, point: InsertionPoint, child: NodeOrText) {
        match point {
            InsertionPoint::LastChild(parent) => self.store.append(&parent, child),
            InsertionPoint::BeforeSibling(sibling) => {
                self.store.insert_before_sibling(&sibling, child)
            },
            InsertionPoint::TableFosterParenting { prev_element, .. } => {
                self.store.insert_before_sibling(&prev_element, child)
            },
        }
    }

    fn insert_appropriately(&self, child: NodeOrText, override_target: Option<Handle>) {
        let point = self.appropriate_place_for_insertion(override_target);
        self.insert_at(point, child);
    }

    fn insert_element_for(&self, tag: Tag) -> Handle {
        let elem = self.store.create_element(
            QualName::html(tag.name.clone()),
            tag.attrs.clone(),
            ElementFlags::default(),
        );
        self.insert_appropriately(NodeOrText::Node(elem.clone()), None);
        self.push(elem.clone());
        elem
    }

    fn insert_and_pop_element_for(&self, tag: Tag) -> Handle {
        let elem = self.insert_element_for(tag);
        self.pop();
        elem
    }

    fn insert_phantom(&self, name: &str) -> Handle {
        let elem = self.store.create_element(
            QualName::html(html_tree_dom::LocalName::from(name)),
            Vec::new(),
            ElementFlags::default(),
        );
        self.insert_appropriately(NodeOrText::Node(elem.clone()), None);
        self.push(elem.clone());
        elem
    }

    fn insert_foreign_element(&self, mut tag: Tag, ns_uri: html_tree_dom::Namespace) -> Handle {
        let is_mathml_annotation_xml = ns_uri == ns::mathml() && tag.name.as_str() == "annotation-xml";
        self.adjust_foreign_attributes(&mut tag);
        let name = QualName::new(None, ns_uri, tag.name.clone());
        let elem = self.store.create_element(
            name,
            tag.attrs,
            ElementFlags {
                template: false,
                mathml_annotation_xml_integration_point: is_mathml_annotation_xml,
            },
        );
        self.insert_appropriately(NodeOrText::Node(elem.clone()), None);
        self.push(elem.clone());
        elem
    }

    fn append_text(&self, text: StrTendril) {
        self.insert_appropriately(NodeOrText::Text(text), None);
    }

    fn append_comment(&self, text: StrTendril) {
        let comment = self.store.create_comment(text);
        self.insert_appropriately(NodeOrText::Node(comment), None);
    }

    fn append_comment_to_doc(&self, text: StrTendril) {
        let comment = self.store.create_comment(text);
        self.store.append(&self.store.document, NodeOrText::Node(comment));
    }

    fn append_comment_to_html(&self, text: StrTendril) {
        let html = self.open_elems.borrow().first().cloned().expect("no html element");
        let comment = self.store.create_comment(text);
        self.store.append(&html, NodeOrText::Node(comment));
    }

    // ---- active formatting elements -------------------------------------

    fn push_formatting_marker(&self) {
        self.active_formatting.borrow_mut().push(FormatEntry::Marker);
    }

    fn clear_active_formatting_to_marker(&self) {
        loop {
            let popped = self.active_formatting.borrow_mut().pop();
            match popped {
                None | Some(FormatEntry::Marker) => break,
                Some(FormatEntry::Element(..)) => continue,
            }
        }
    }

    /// A snapshot of the active formatting element list, top to bottom
    /// marker-order preserved; `None` stands in for a marker entry so
    /// callers can `take_while(Option::is_some)` to stop at the last one.
    fn active_formatting_entries(&self) -> Vec<Option<(Handle, crate::tokenizer::Tag)>> {
        self.active_formatting
            .borrow()
            .iter()
            .map(|e| match e {
                FormatEntry::Element(h, t) => Some((h.clone(), t.clone())),
                FormatEntry::Marker => None,
            })
            .collect()
    }

    fn remove_formatting_entry(&self, elem: &Handle) {
        if let Some(idx) = self.position_in_active_formatting(elem) {
            self.active_formatting.borrow_mut().remove(idx);
        }
    }

    fn position_in_active_formatting(&self, elem: &Handle) -> Option<usize> {
        self.active_formatting.borrow().iter().position(|e| match e {
            FormatEntry::Element(h, _) => NodeStore::same_node(h, elem),
            FormatEntry::Marker => false,
        })
    }

    /// "Create and insert an HTML element for a token" for a formatting
    /// element, enforcing the Noah's Ark clause (spec.md §4.3).
    fn create_formatting_element_for(&self, tag: Tag) -> Handle {
        let mut matches = Vec::new();
        for entry in self.active_formatting.borrow().iter().rev() {
            match entry {
                FormatEntry::Marker => break,
                FormatEntry::Element(h, t) => {
                    if t.name == tag.name {
                        let mut a1 = t.attrs.clone();
                        let mut a2 = tag.attrs.clone();
                        a1.sort();
                        a2.sort();
                        if a1 == a2 {
                            matches.push(h.clone());
                        }
                    }
                },
            }
        }
        if matches.len() >= 3 {
            if let Some(earliest) = matches.last() {
                let idx = self.position_in_active_formatting(earliest);
                if let Some(idx) = idx {
                    self.active_formatting.borrow_mut().remove(idx);
                }
            }
        }

        let elem = self.insert_element_for(tag.clone());
        self.active_formatting.borrow_mut().push(FormatEntry::Element(elem.clone(), tag));
        elem
    }

    /// spec.md §4.3 "Active-formatting-element reconstruction".
    fn reconstruct_active_formatting_elements(&self) {
        let len = self.active_formatting.borrow().len();
        if len == 0 {
            return;
        }
        {
            let last = &self.active_formatting.borrow()[len - 1];
            if let FormatEntry::Marker = last {
                return;
            }
            if let FormatEntry::Element(h, _) = last {
                if self.position_in_stack(h).is_some() {
                    return;
                }
            }
        }

        let mut index = len - 1;
        loop {
            if index == 0 {
                break;
            }
            index -= 1;
            let entry = self.active_formatting.borrow()[index].clone();
            match entry {
                FormatEntry::Marker => {
                    index += 1;
                    break;
                },
                FormatEntry::Element(h, _) => {
                    if self.position_in_stack(&h).is_some() {
                        index += 1;
                        break;
                    }
                },
            }
        }

        loop {
            let entry = self.active_formatting.borrow()[index].clone();
            if let FormatEntry::Element(_, tag) = entry {
                let clone = self.insert_element_for(tag.clone());
                self.active_formatting.borrow_mut()[index] = FormatEntry::Element(clone, tag);
            }
            if index + 1 >= self.active_formatting.borrow().len() {
                break;
            }
            index += 1;
        }
    }

    // ---- adoption agency ---------------------------------------------

    /// spec.md §4.3 "Adoption agency algorithm", the full 8-iteration,
    /// 20-step routine.
    fn adoption_agency(&self, name: &str) {
        for _ in 0..8 {
            let fe_index = self
                .active_formatting
                .borrow()
                .iter()
                .rposition(|e| match e {
                    FormatEntry::Marker => false,
                    FormatEntry::Element(_, t) => t.name.as_str() == name,
                });
            let (fe, fe_index) = match fe_index {
                None => {
                    self.any_other_end_tag_in_body(name);
                    return;
                },
                Some(i) => {
                    let (h, _) = match &self.active_formatting.borrow()[i] {
                        FormatEntry::Element(h, t) => (h.clone(), t.clone()),
                        FormatEntry::Marker => unreachable!(),
                    };
                    (h, i)
                },
            };

            if self.position_in_stack(&fe).is_none() {
                self.store.parse_error(Borrowed("formatting element not on stack of open elements"));
                self.active_formatting.borrow_mut().remove(fe_index);
                return;
            }

            if !self.elem_in_scope(&fe, tag_sets::default_scope) {
                self.store.parse_error(Borrowed("formatting element not in scope"));
                return;
            }

            let fe_stack_index = self.position_in_stack(&fe).unwrap();

            let furthest_block = {
                let stack = self.open_elems.borrow();
                stack[fe_stack_index + 1..]
                    .iter()
                    .find(|e| e.as_element().map(|n| tag_sets::special_tag(n.expanded())).unwrap_or(false))
                    .cloned()
            };

            let furthest_block = match furthest_block {
                None => {
                    self.pop_until_current(&fe);
                    let idx = self.position_in_active_formatting(&fe);
                    if let Some(idx) = idx {
                        self.active_formatting.borrow_mut().remove(idx);
                    }
                    return;
                },
                Some(fb) => fb,
            };

            let common_ancestor = self.open_elems.borrow()[fe_stack_index - 1].clone();

            let mut bookmark = self.position_in_active_formatting(&fe).unwrap_or(fe_index);
            let mut last_node = furthest_block.clone();
            let mut node = furthest_block.clone();
            let mut node_stack_index = self.position_in_stack(&furthest_block).unwrap();

            let mut inner_loop_counter = 0;
            loop {
                inner_loop_counter += 1;
                if node_stack_index == 0 {
                    break;
                }
                node_stack_index -= 1;
                node = self.open_elems.borrow()[node_stack_index].clone();
                if NodeStore::same_node(&node, &fe) {
                    break;
                }

                let node_format_index = self.position_in_active_formatting(&node);
                if inner_loop_counter > 3 {
                    if let Some(idx) = node_format_index {
                        self.active_formatting.borrow_mut().remove(idx);
                        if idx < bookmark {
                            bookmark = bookmark.saturating_sub(1);
                        }
                    }
                }
                let node_format_index = self.position_in_active_formatting(&node);
                let Some(node_format_index) = node_format_index else {
                    self.remove_from_stack(&node);
                    continue;
                };

                let node_tag = match &self.active_formatting.borrow()[node_format_index] {
                    FormatEntry::Element(_, t) => t.clone(),
                    FormatEntry::Marker => unreachable!(),
                };
                let clone = self.store.create_element(
                    QualName::html(node_tag.name.clone()),
                    node_tag.attrs.clone(),
                    ElementFlags::default(),
                );
                self.active_formatting.borrow_mut()[node_format_index] =
                    FormatEntry::Element(clone.clone(), node_tag);
                {
                    let mut stack = self.open_elems.borrow_mut();
                    stack[node_stack_index] = clone.clone();
                }

                self.store.remove_from_parent(&last_node);
                self.store.append(&clone, NodeOrText::Node(last_node.clone()));

                last_node = clone.clone();
                node = clone;
            }

            self.store.remove_from_parent(&last_node);
            let foster = common_ancestor
                .as_element()
                .map(|n| tag_sets::foster_target(n.expanded()))
                .unwrap_or(false);
            if foster {
                let last_node = last_node.clone();
                let common_ancestor = common_ancestor.clone();
                self.with_foster_parenting(|| {
                    self.insert_appropriately(NodeOrText::Node(last_node), Some(common_ancestor))
                });
            } else {
                self.store.append(&common_ancestor, NodeOrText::Node(last_node.clone()));
            }

            let fe_tag = match &self.active_formatting.borrow()[self.position_in_active_formatting(&fe).unwrap()] {
                FormatEntry::Element(_, t) => t.clone(),
                FormatEntry::Marker => unreachable!(),
            };
            let fe_clone = self.store.create_element(
                QualName::html(fe_tag.name.clone()),
                fe_tag.attrs.clone(),
                ElementFlags::default(),
            );
            self.store.reparent_children(&furthest_block, &fe_clone);
            self.store.append(&furthest_block, NodeOrText::Node(fe_clone.clone()));

            let fe_format_index = self.position_in_active_formatting(&fe).unwrap();
            self.active_formatting.borrow_mut().remove(fe_format_index);
            let bookmark = if fe_format_index < bookmark { bookmark - 1 } else { bookmark };
            let bookmark = bookmark.min(self.active_formatting.borrow().len());
            self.active_formatting
                .borrow_mut()
                .insert(bookmark, FormatEntry::Element(fe_clone.clone(), fe_tag));

            self.remove_from_stack(&fe);
            let fb_index = self.position_in_stack(&furthest_block).unwrap();
            self.open_elems.borrow_mut().insert(fb_index + 1, fe_clone);
        }
    }

    /// "any other end tag" (spec.md §4.3 step 1's fallback): walk the
    /// open-element stack top-down closing nodes until a matching name is
    /// found or a special element blocks it.
    fn any_other_end_tag_in_body(&self, name: &str) {
        let stack_len = self.open_elems.borrow().len();
        for i in (0..stack_len).rev() {
            let elem = self.open_elems.borrow()[i].clone();
            let Some(elname) = elem.as_element() else { continue };
            if *elname.ns == ns::html() && elname.local.as_str() == name {
                self.generate_implied_end_except(Some(name));
                if self.position_in_stack(&elem) != Some(self.open_elems.borrow().len() - 1) {
                    self.store.parse_error(Borrowed("end tag violates open elements invariant"));
                }
                self.pop_until_current(&elem);
                return;
            }
            if tag_sets::special_tag(elname.expanded()) {
                self.store.parse_error(Borrowed("end tag for non-top special element"));
                return;
            }
        }
    }

    // ---- foreign content --------------------------------------------------

    fn is_foreign(&self, node: &Handle) -> bool {
        let Some(name) = node.as_element() else { return false };
        let expanded = name.expanded();
        if *name.ns == ns::html() {
            return false;
        }
        if tag_sets::is_extra_scope_terminator(expanded) {
            return false;
        }
        if *name.ns == ns::mathml() && name.local.as_str() == "annotation-xml" {
            if node.is_mathml_annotation_xml_integration_point() {
                return false;
            }
        }
        true
    }

    fn adjust_svg_tag_name(&self, tag: &mut Tag) {
        if let Some(&adjusted) = html_tree_dom::entities::SVG_TAG_NAME_ADJUSTMENTS.get(tag.name.as_str()) {
            tag.name = html_tree_dom::LocalName::from(adjusted);
        }
    }

    fn adjust_svg_attributes(&self, tag: &mut Tag) {
        for attr in tag.attrs.iter_mut() {
            if let Some(&adjusted) =
                html_tree_dom::entities::SVG_ATTRIBUTE_ADJUSTMENTS.get(attr.name.local.as_str())
            {
                attr.name.local = html_tree_dom::LocalName::from(adjusted);
            }
        }
    }

    fn adjust_mathml_attributes(&self, _tag: &mut Tag) {
        // MathML has no attribute-name case adjustments in the WHATWG
        // table; only the foreign (xlink/xml/xmlns) adjustments below
        // apply, same as for SVG.
    }

    fn adjust_foreign_attributes(&self, tag: &mut Tag) {
        for attr in tag.attrs.iter_mut() {
            for (qname, ns_name, local) in html_tree_dom::entities::FOREIGN_ATTRIBUTE_ADJUSTMENTS {
                if attr.name.local.as_str() == *qname {
                    let namespace = match *ns_name {
                        "xlink" => ns::xlink(),
                        "xml" => ns::xml(),
                        "xmlns" => ns::xmlns(),
                        _ => ns::empty(),
                    };
                    attr.name = QualName::new(None, namespace, html_tree_dom::LocalName::from(*local));
                }
            }
        }
    }

    fn enter_foreign(&self, mut tag: Tag, ns_uri: html_tree_dom::Namespace) -> Handle {
        if ns_uri == ns::svg() {
            self.adjust_svg_tag_name(&mut tag);
            self.adjust_svg_attributes(&mut tag);
        } else if ns_uri == ns::mathml() {
            self.adjust_mathml_attributes(&mut tag);
        }
        self.insert_foreign_element(tag, ns_uri)
    }

    // ---- insertion-mode reset -------------------------------------------

    /// spec.md §4.3 "Insertion-mode reset".
    fn reset_insertion_mode(&self) {
        let stack = self.open_elems.borrow();
        let last_index = stack.len() - 1;
        for i in (0..=last_index).rev() {
            let is_last = i == 0;
            let node = if is_last {
                self.context_elem.borrow().clone().unwrap_or_else(|| stack[i].clone())
            } else {
                stack[i].clone()
            };
            let Some(name) = node.as_element() else { continue };
            if *name.ns != ns::html() && !matches!(name.local.as_str(), "td" | "th" | "tr") {
                continue;
            }
            let local = name.local.as_str();
            let mode = match local {
                "select" => {
                    let mut in_table_ancestor = false;
                    for j in (0..i).rev() {
                        if let Some(n) = stack[j].as_element() {
                            if n.local.as_str() == "table" {
                                in_table_ancestor = true;
                                break;
                            }
                            if n.local.as_str() == "template" {
                                break;
                            }
                        }
                    }
                    if in_table_ancestor { InsertionMode::InSelectInTable } else { InsertionMode::InSelect }
                },
                "td" | "th" if !is_last => InsertionMode::InCell,
                "tr" => InsertionMode::InRow,
                "tbody" | "thead" | "tfoot" => InsertionMode::InTableBody,
                "caption" => InsertionMode::InCaption,
                "colgroup" => InsertionMode::InColumnGroup,
                "table" => InsertionMode::InTable,
                "template" => {
                    drop(stack);
                    let mode = self
                        .template_modes
                        .borrow()
                        .last()
                        .copied()
                        .unwrap_or(InsertionMode::InBody);
                    self.mode.set(mode);
                    return;
                },
                "head" if !is_last => InsertionMode::InHead,
                "body" => InsertionMode::InBody,
                "frameset" => InsertionMode::InFrameset,
                "html" => {
                    if self.head_elem.borrow().is_none() {
                        InsertionMode::BeforeHead
                    } else {
                        InsertionMode::AfterHead
                    }
                },
                _ => {
                    if is_last {
                        InsertionMode::InBody
                    } else {
                        continue;
                    }
                },
            };
            self.mode.set(mode);
            return;
        }
        self.mode.set(InsertionMode::InBody);
    }

    // ---- selectedcontent post-processing (spec.md §4.4) -----------------

    /// Walk the whole tree once after parsing stops, cloning the selected
    /// `<option>` of each `<select>` into any `<selectedcontent>`
    /// descendant. Template contents are separate subtrees, so they're
    /// walked explicitly rather than falling out of the child walk.
    fn post_process_selects(&self, node: &Handle) {
        if let Some(name) = node.as_element() {
            if *name.ns == ns::html() && name.local.as_str() == "select" {
                self.clone_selected_option_into_selectedcontents(node);
            }
            if let Some(contents) = node.template_contents() {
                self.post_process_selects(&contents);
            }
        }
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children {
            self.post_process_selects(&child);
        }
    }

    fn clone_selected_option_into_selectedcontents(&self, select: &Handle) {
        let Some(option) = Self::selected_option(select) else { return };
        let mut targets = Vec::new();
        Self::collect_named_descendants(select, "selectedcontent", &mut targets);
        for target in targets {
            let existing: Vec<Handle> = target.children.borrow().clone();
            for child in existing {
                self.store.remove_from_parent(&child);
            }
            self.clone_children_into(&option, &target);
        }
    }

    /// The first `<option>` descendant carrying a `selected` attribute, or
    /// else the first `<option>` descendant at all.
    fn selected_option(select: &Handle) -> Option<Handle> {
        let mut options = Vec::new();
        Self::collect_named_descendants(select, "option", &mut options);
        options
            .iter()
            .find(|o| {
                o.attrs()
                    .map(|a| a.borrow().iter().any(|attr| attr.name.local.as_str() == "selected"))
                    .unwrap_or(false)
            })
            .cloned()
            .or_else(|| options.into_iter().next())
    }

    fn collect_named_descendants(node: &Handle, name: &str, out: &mut Vec<Handle>) {
        for child in node.children.borrow().iter() {
            if let Some(elem) = child.as_element() {
                if *elem.ns == ns::html() && elem.local.as_str() == name {
                    out.push(child.clone());
                }
            }
            Self::collect_named_descendants(child, name, out);
        }
    }

    fn clone_children_into(&self, source: &Handle, target: &Handle) {
        let children: Vec<Handle> = source.children.borrow().clone();
        for child in children {
            match &child.data {
                NodeData::Text { contents } => {
                    self.store.append(target, NodeOrText::Text(contents.borrow().clone()));
                },
                NodeData::Comment { contents } => {
                    let comment = self.store.create_comment(contents.clone());
                    self.store.append(target, NodeOrText::Node(comment));
                },
                NodeData::Element { name, attrs, .. } => {
                    let elem = self.store.create_element(
                        name.clone(),
                        attrs.borrow().clone(),
                        ElementFlags::default(),
                    );
                    self.clone_children_into(&child, &elem);
                    self.store.append(target, NodeOrText::Node(elem));
                },
                _ => {},
            }
        }
    }

    fn unexpected(&self, token: &BuilderToken) {
        self.store.parse_error(Cow::from(format!("unexpected token in mode {:?}: {:?}", self.mode.get(), token)));
    }

    fn is_type_hidden(tag: &Tag) -> bool {
        tag.attrs
            .iter()
            .any(|a| a.name.local.as_str() == "type" && a.value.eq_ignore_ascii_case("hidden"))
    }

    fn stop_parsing(&self) {
        self.stopped.set(true);
    }

    fn to_builder_token(token: Token) -> BuilderToken {
        match token {
            Token::DoctypeToken(d) => BuilderToken::Doctype(d),
            Token::TagToken(t) => BuilderToken::Tag(t),
            Token::CommentToken(c) => BuilderToken::Comment(c),
            Token::CharacterTokens(c) => BuilderToken::Characters(SplitStatus::NotSplit, c),
            Token::NullCharacterToken => BuilderToken::NullCharacter,
            Token::EOFToken => BuilderToken::Eof,
            Token::ParseError(e) => {
                // surfaced immediately rather than threaded through the
                // dispatch table, since it carries no tree-construction
                // action of its own.
                BuilderToken::Comment(StrTendril::from_slice(&e))
            },
        }
    }
}

impl TokenSink for TreeBuilder {
    type Handle = Handle;

    fn process_token(&self, token: Token, line_number: u64) -> TokenSinkResult<Handle> {
        self.current_line.set(line_number);
        if let Token::ParseError(msg) = token {
            self.store.parse_error(msg);
            return TokenSinkResult::Continue;
        }
        let token = Self::to_builder_token(token);
        self.process_to_completion(token)
    }

    fn end(&self) {
        // spec.md §4.4: clone selected `<option>` children into any
        // `<selectedcontent>` descendant of each `<select>`, walking
        // template contents too. Implemented as a tree walk from the
        // document root after parsing stops.
        self.post_process_selects(&self.store.document.clone());
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        if self.open_elems.borrow().is_empty() {
            return false;
        }
        let node = self.adjusted_current_node();
        node.as_element().map(|n| *n.ns != ns::html()).unwrap_or(false)
    }
}
