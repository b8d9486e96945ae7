//! Per-insertion-mode token dispatch (spec.md §4.3). The teacher expresses
//! this with the `match_token!` proc-macro DSL over tag-name patterns; that
//! macro isn't available outside the teacher's own workspace, so this is
//! the same dispatch written as plain `match` arms on `tag.name.as_str()`.

use std::borrow::Cow::Borrowed;

use html_tree_dom::{ns, ElementFlags, Handle, NodeOrText, QualName, QuirksMode};
use tendril::StrTendril;

use super::data;
use super::tag_sets;
use super::types::{BuilderToken, InsertionMode, ProcessResult, SplitStatus};
use super::TreeBuilder;
use crate::tokenizer::states::{Rawtext, Rcdata, ScriptData};
use crate::tokenizer::{EndTag, StartTag, Tag, TagKind};

type BT = BuilderToken;
type PR = ProcessResult;

fn is_whitespace(s: &str) -> bool {
    s.chars().all(|c| matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' '))
}

/// Split a character token into a leading whitespace run and the rest, if
/// it isn't already classified.
fn split_leading_whitespace(s: &StrTendril) -> (StrTendril, Option<StrTendril>) {
    let split_at = s.chars().take_while(|c| matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' ')).count();
    if split_at == 0 {
        return (StrTendril::new(), Some(s.clone()));
    }
    if split_at == s.len() {
        return (s.clone(), None);
    }
    let mut lead = s.clone();
    let rest = lead.unsafe_subtendril(split_at as u32, (s.len() - split_at) as u32);
    lead.unsafe_subtendril(0, split_at as u32);
    (lead, Some(rest))
}

/// Consume `tb.ignore_lf`: if it was set (by a preceding `<pre>`/`<listing>`/
/// `<textarea>` start tag, spec.md §4.3), strip a single leading line feed
/// from the first character token that follows.
fn strip_ignored_lf(tb: &TreeBuilder, mut s: StrTendril) -> StrTendril {
    if tb.ignore_lf.take() && s.starts_with('\n') {
        s.unsafe_subtendril(1, (s.len() - 1) as u32)
    } else {
        s
    }
}

pub(super) fn step(tb: &TreeBuilder, mode: InsertionMode, token: BT) -> PR {
    match mode {
        InsertionMode::Initial => initial(tb, token),
        InsertionMode::BeforeHtml => before_html(tb, token),
        InsertionMode::BeforeHead => before_head(tb, token),
        InsertionMode::InHead => in_head(tb, token),
        InsertionMode::InHeadNoscript => in_head_noscript(tb, token),
        InsertionMode::AfterHead => after_head(tb, token),
        InsertionMode::InBody => in_body(tb, token),
        InsertionMode::Text => text(tb, token),
        InsertionMode::InTable => in_table(tb, token),
        InsertionMode::InTableText => in_table_text(tb, token),
        InsertionMode::InCaption => in_caption(tb, token),
        InsertionMode::InColumnGroup => in_column_group(tb, token),
        InsertionMode::InTableBody => in_table_body(tb, token),
        InsertionMode::InRow => in_row(tb, token),
        InsertionMode::InCell => in_cell(tb, token),
        InsertionMode::InSelect => in_select(tb, token, false),
        InsertionMode::InSelectInTable => in_select(tb, token, true),
        InsertionMode::InTemplate => in_template(tb, token),
        InsertionMode::AfterBody => after_body(tb, token),
        InsertionMode::InFrameset => in_frameset(tb, token),
        InsertionMode::AfterFrameset => after_frameset(tb, token),
        InsertionMode::AfterAfterBody => after_after_body(tb, token),
        InsertionMode::AfterAfterFrameset => after_after_frameset(tb, token),
    }
}

fn is_start(tag: &Tag) -> bool {
    tag.kind == TagKind::StartTag
}

fn is_end(tag: &Tag) -> bool {
    tag.kind == TagKind::EndTag
}

fn reprocess(mode: InsertionMode, token: BT) -> PR {
    PR::Reprocess(mode, token)
}

// ---------------------------------------------------------------------
// Initial
// ---------------------------------------------------------------------

fn initial(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, ref s) if is_whitespace(s) => PR::Done,
        BT::Comment(text) => {
            tb.append_comment_to_doc(text);
            PR::Done
        },
        BT::Doctype(doctype) => {
            let (err, mode) = data::doctype_error_and_quirks(&doctype, tb.opts.iframe_srcdoc);
            if err {
                tb.store.parse_error(Borrowed("malformed doctype"));
            }
            let name = doctype.name.clone().unwrap_or_default();
            let public_id = doctype.public_id.clone().unwrap_or_default();
            let system_id = doctype.system_id.clone().unwrap_or_default();
            if !tb.opts.drop_doctype {
                tb.store.append_doctype_to_document(name, public_id, system_id);
            }
            tb.store.set_quirks_mode(mode);
            reprocess(InsertionMode::BeforeHtml, BT::Eof).pivot_to_done_after(tb, InsertionMode::BeforeHtml)
        },
        token => reprocess(InsertionMode::BeforeHtml, token),
    }
}

// small helper trait used once above to express "set mode, then stop
// (rather than reprocess this exact EOF placeholder)".
trait PivotExt {
    fn pivot_to_done_after(self, tb: &TreeBuilder, mode: InsertionMode) -> PR;
}
impl PivotExt for PR {
    fn pivot_to_done_after(self, tb: &TreeBuilder, mode: InsertionMode) -> PR {
        tb_set_mode(tb, mode);
        PR::Done
    }
}
fn tb_set_mode(tb: &TreeBuilder, mode: InsertionMode) {
    tb.mode.set(mode);
}

// ---------------------------------------------------------------------
// BeforeHtml
// ---------------------------------------------------------------------

fn before_html(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in before html"));
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment_to_doc(text);
            PR::Done
        },
        BT::Characters(_, ref s) if is_whitespace(s) => PR::Done,
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => {
            let elem = tb.store.create_element(
                QualName::html(tag.name.clone()),
                tag.attrs.clone(),
                ElementFlags::default(),
            );
            tb.store.append(&tb.store.document, NodeOrText::Node(elem.clone()));
            tb.push(elem);
            tb.mode.set(InsertionMode::BeforeHead);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && !matches!(tag.name.as_str(), "head" | "body" | "html" | "br") => {
            PR::Done
        },
        token => {
            let elem = tb.store.create_element(
                QualName::html(html_tree_dom::LocalName::from("html")),
                Vec::new(),
                ElementFlags::default(),
            );
            tb.store.append(&tb.store.document, NodeOrText::Node(elem.clone()));
            tb.push(elem);
            tb.mode.set(InsertionMode::BeforeHead);
            reprocess(InsertionMode::BeforeHead, token)
        },
    }
}

// ---------------------------------------------------------------------
// BeforeHead
// ---------------------------------------------------------------------

fn before_head(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, ref s) if is_whitespace(s) => PR::Done,
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in before head"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, BT::Tag(tag.clone())),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "head" => {
            let head = tb.insert_element_for(tag.clone());
            *tb.head_elem.borrow_mut() = Some(head);
            tb.mode.set(InsertionMode::InHead);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && !matches!(tag.name.as_str(), "head" | "body" | "html" | "br") => {
            PR::Done
        },
        token => {
            let phantom = tb.insert_phantom("head");
            *tb.head_elem.borrow_mut() = Some(phantom);
            tb.mode.set(InsertionMode::InHead);
            reprocess(InsertionMode::InHead, token)
        },
    }
}

// ---------------------------------------------------------------------
// InHead
// ---------------------------------------------------------------------

fn in_head(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(SplitStatus::Whitespace, s) => {
            tb.append_text(s);
            PR::Done
        },
        BT::Characters(SplitStatus::NotSplit, s) if is_whitespace(&s) => {
            tb.append_text(s);
            PR::Done
        },
        BT::Characters(SplitStatus::NotSplit, s) => {
            let (lead, rest) = split_leading_whitespace(&s);
            if !lead.is_empty() {
                tb.append_text(lead);
            }
            match rest {
                Some(rest) => reprocess(InsertionMode::InHead, BT::Characters(SplitStatus::NotWhitespace, rest)),
                None => PR::Done,
            }
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in head"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, BT::Tag(tag.clone())),
        BT::Tag(ref tag)
            if is_start(tag) && matches!(tag.name.as_str(), "base" | "basefont" | "bgsound" | "link") =>
        {
            tb.insert_and_pop_element_for(tag.clone());
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "meta" => {
            tb.insert_and_pop_element_for(tag.clone());
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "title" => {
            tb.insert_element_for(tag.clone());
            PR::ToRawData(Rcdata)
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && ((tag.name.as_str() == "noscript" && tb.opts.scripting_enabled)
                    || matches!(tag.name.as_str(), "noframes" | "style")) =>
        {
            tb.insert_element_for(tag.clone());
            PR::ToRawData(Rawtext)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "noscript" => {
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InHeadNoscript);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "script" => {
            tb.insert_element_for(tag.clone());
            PR::ToRawData(ScriptData)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "head" => {
            tb.pop();
            tb.mode.set(InsertionMode::AfterHead);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && matches!(tag.name.as_str(), "body" | "html" | "br") => {
            tb.pop();
            tb.mode.set(InsertionMode::AfterHead);
            reprocess(InsertionMode::AfterHead, BT::Tag(tag.clone()))
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "template" => {
            tb.push_formatting_marker();
            let elem = tb.store.create_element(
                QualName::html(tag.name.clone()),
                tag.attrs.clone(),
                ElementFlags { template: true, mathml_annotation_xml_integration_point: false },
            );
            tb.insert_appropriately(NodeOrText::Node(elem.clone()), None);
            tb.push(elem);
            tb.template_modes.borrow_mut().push(InsertionMode::InTemplate);
            tb.mode.set(InsertionMode::InTemplate);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => {
            if !tb.in_html_elem_named("template") {
                tb.store.parse_error(Borrowed("template end tag with no template open"));
                return PR::Done;
            }
            tb.generate_implied_end_tags_thoroughly();
            if !tb.current_node_named("template") {
                tb.store.parse_error(Borrowed("unexpected open elements while closing template"));
            }
            tb.pop_until_named("template");
            tb.clear_active_formatting_to_marker();
            tb.template_modes.borrow_mut().pop();
            tb.reset_insertion_mode();
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "head" => {
            tb.store.parse_error(Borrowed("head start tag while in head"));
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) => {
            tb.store.parse_error(Borrowed("unexpected end tag in head"));
            PR::Done
        },
        token => {
            tb.pop();
            tb.mode.set(InsertionMode::AfterHead);
            reprocess(InsertionMode::AfterHead, token)
        },
    }
}

fn in_head_noscript(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in head noscript"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, BT::Tag(tag.clone())),
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "noscript" => {
            tb.pop();
            tb.mode.set(InsertionMode::InHead);
            PR::Done
        },
        BT::Characters(_, ref s) if is_whitespace(s) => in_head(tb, token),
        BT::Comment(_) => in_head(tb, token),
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style"
                ) =>
        {
            in_head(tb, token)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "br" => {
            tb.pop();
            tb.mode.set(InsertionMode::InHead);
            reprocess(InsertionMode::InHead, token)
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "head" | "noscript") => {
            tb.store.parse_error(Borrowed("unexpected tag in head noscript"));
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) => {
            tb.store.parse_error(Borrowed("unexpected end tag in head noscript"));
            PR::Done
        },
        token => {
            tb.store.parse_error(Borrowed("unexpected token in head noscript"));
            tb.pop();
            tb.mode.set(InsertionMode::InHead);
            reprocess(InsertionMode::InHead, token)
        },
    }
}

fn after_head(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(SplitStatus::Whitespace, s) => {
            tb.append_text(s);
            PR::Done
        },
        BT::Characters(SplitStatus::NotSplit, s) if is_whitespace(&s) => {
            tb.append_text(s);
            PR::Done
        },
        BT::Characters(SplitStatus::NotSplit, s) => {
            let (lead, rest) = split_leading_whitespace(&s);
            if !lead.is_empty() {
                tb.append_text(lead);
            }
            match rest {
                Some(rest) => reprocess(InsertionMode::AfterHead, BT::Characters(SplitStatus::NotWhitespace, rest)),
                None => PR::Done,
            }
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype after head"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, BT::Tag(tag.clone())),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "body" => {
            tb.insert_element_for(tag.clone());
            tb.frameset_ok.set(false);
            tb.mode.set(InsertionMode::InBody);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "frameset" => {
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InFrameset);
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style"
                        | "template" | "title"
                ) =>
        {
            tb.store.parse_error(Borrowed("head-only element after head"));
            if let Some(head) = tb.head_elem.borrow().clone() {
                tb.push(head);
                let result = in_head(tb, BT::Tag(tag.clone()));
                tb.remove_from_stack(&tb.head_elem.borrow().clone().unwrap());
                result
            } else {
                PR::Done
            }
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        BT::Tag(ref tag) if is_end(tag) && matches!(tag.name.as_str(), "body" | "html" | "br") => {
            let body = tb.insert_phantom("body");
            let _ = body;
            tb.mode.set(InsertionMode::InBody);
            reprocess(InsertionMode::InBody, token)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "head" => {
            tb.store.parse_error(Borrowed("head start tag after head"));
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) => {
            tb.store.parse_error(Borrowed("unexpected end tag after head"));
            PR::Done
        },
        token => {
            tb.insert_phantom("body");
            tb.mode.set(InsertionMode::InBody);
            reprocess(InsertionMode::InBody, token)
        },
    }
}

// ---------------------------------------------------------------------
// InBody (and Text)
// ---------------------------------------------------------------------

fn in_body(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::NullCharacter => {
            tb.store.parse_error(Borrowed("null character in body"));
            PR::Done
        },
        BT::Characters(_, s) => {
            let s = strip_ignored_lf(tb, s);
            if s.is_empty() {
                return PR::Done;
            }
            if !is_whitespace(&s) {
                tb.frameset_ok.set(false);
            }
            tb.reconstruct_active_formatting_elements();
            tb.append_text(s);
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in body"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => {
            tb.store.parse_error(Borrowed("html start tag in body"));
            if let Some(html) = tb.open_elems.borrow().first().cloned() {
                html.add_attrs_if_missing(tag.attrs.clone());
            }
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style"
                        | "template" | "title"
                ) =>
        {
            in_head(tb, token)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "body" => {
            tb.store.parse_error(Borrowed("body start tag in body"));
            if tb.open_elems.borrow().len() > 1 {
                if let Some(body) = tb.open_elems.borrow().get(1).cloned() {
                    if body.as_element().map(|n| n.local.as_str() == "body").unwrap_or(false) {
                        body.add_attrs_if_missing(tag.attrs.clone());
                    }
                }
            }
            tb.frameset_ok.set(false);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "frameset" => {
            tb.store.parse_error(Borrowed("frameset start tag in body"));
            if !tb.frameset_ok.get() {
                return PR::Done;
            }
            // discard body, reinstall frameset (rarely exercised path)
            PR::Done
        },
        BT::Eof => {
            if !tb.template_modes.borrow().is_empty() {
                return in_template(tb, token);
            }
            tb.stop_parsing();
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && matches!(tag.name.as_str(), "body" | "html") => {
            if !tb.in_scope_named("body", tag_sets::default_scope) {
                tb.store.parse_error(Borrowed("body end tag without body in scope"));
                return PR::Done;
            }
            tb.mode.set(InsertionMode::AfterBody);
            if tag.name.as_str() == "html" {
                return reprocess(InsertionMode::AfterBody, BT::Tag(tag.clone()));
            }
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "address" | "article" | "aside" | "blockquote" | "center" | "details" | "dialog"
                        | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer"
                        | "header" | "hgroup" | "main" | "menu" | "nav" | "ol" | "p" | "section"
                        | "summary" | "ul"
                ) =>
        {
            tb.close_p_element_in_button_scope();
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag_sets::heading_tag_name(tag.name.as_str()) => {
            tb.close_p_element_in_button_scope();
            if tb.current_node().as_element().map(|n| tag_sets::heading_tag(n.expanded())).unwrap_or(false) {
                tb.store.parse_error(Borrowed("heading inside heading"));
                tb.pop();
            }
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "pre" | "listing") => {
            tb.close_p_element_in_button_scope();
            tb.insert_element_for(tag.clone());
            tb.ignore_lf.set(true);
            tb.frameset_ok.set(false);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "form" => {
            if tb.form_elem.borrow().is_some() && !tb.in_html_elem_named("template") {
                tb.store.parse_error(Borrowed("nested form"));
                return PR::Done;
            }
            tb.close_p_element_in_button_scope();
            let elem = tb.insert_element_for(tag.clone());
            if !tb.in_html_elem_named("template") {
                *tb.form_elem.borrow_mut() = Some(elem);
            }
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "li" => {
            tb.frameset_ok.set(false);
            list_item(tb, tag.clone(), tag_sets::close_list);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "dd" | "dt") => {
            tb.frameset_ok.set(false);
            list_item(tb, tag.clone(), tag_sets::close_defn);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "plaintext" => {
            tb.close_p_element_in_button_scope();
            tb.insert_element_for(tag.clone());
            PR::ToPlaintext
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "button" => {
            if tb.in_scope_named("button", tag_sets::default_scope) {
                tb.store.parse_error(Borrowed("nested button"));
                tb.generate_implied_end_tags();
                tb.pop_until_named("button");
            }
            tb.reconstruct_active_formatting_elements();
            tb.insert_element_for(tag.clone());
            tb.frameset_ok.set(false);
            PR::Done
        },
        BT::Tag(ref tag)
            if is_end(tag)
                && matches!(
                    tag.name.as_str(),
                    "address" | "article" | "aside" | "blockquote" | "button" | "center" | "details"
                        | "dialog" | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure"
                        | "footer" | "header" | "hgroup" | "listing" | "main" | "menu" | "nav" | "ol"
                        | "pre" | "section" | "summary" | "ul"
                ) =>
        {
            if !tb.in_scope_named(tag.name.as_str(), tag_sets::default_scope) {
                tb.store.parse_error(Borrowed("end tag without matching element in scope"));
                return PR::Done;
            }
            tb.generate_implied_end_tags();
            if !tb.current_node_named(tag.name.as_str()) {
                tb.store.parse_error(Borrowed("end tag: open elements mismatch"));
            }
            tb.pop_until_named(tag.name.as_str());
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "form" => {
            if !tb.in_html_elem_named("template") {
                let form = tb.form_elem.borrow_mut().take();
                let Some(form) = form else {
                    tb.store.parse_error(Borrowed("form end tag with no open form"));
                    return PR::Done;
                };
                if !tb.elem_in_scope(&form, tag_sets::default_scope) {
                    tb.store.parse_error(Borrowed("form end tag: form not in scope"));
                    return PR::Done;
                }
                tb.generate_implied_end_tags();
                if tb.position_in_stack(&form) != Some(tb.open_elems.borrow().len() - 1) {
                    tb.store.parse_error(Borrowed("form end tag: not at top of stack"));
                }
                tb.remove_from_stack(&form);
            } else {
                if !tb.in_scope_named("form", tag_sets::default_scope) {
                    tb.store.parse_error(Borrowed("form end tag: form not in scope"));
                    return PR::Done;
                }
                tb.generate_implied_end_tags();
                if !tb.current_node_named("form") {
                    tb.store.parse_error(Borrowed("form end tag: not at top of stack"));
                }
                tb.pop_until_named("form");
            }
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "p" => {
            if !tb.in_scope_named("p", tag_sets::button_scope) {
                tb.store.parse_error(Borrowed("p end tag without p in scope"));
                tb.insert_phantom("p");
            }
            tb.close_p_element();
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "li" => {
            if !tb.in_scope_named("li", tag_sets::list_item_scope) {
                tb.store.parse_error(Borrowed("li end tag without li in scope"));
                return PR::Done;
            }
            tb.generate_implied_end_except(Some("li"));
            if !tb.current_node_named("li") {
                tb.store.parse_error(Borrowed("li end tag: open elements mismatch"));
            }
            tb.pop_until_named("li");
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && matches!(tag.name.as_str(), "dd" | "dt") => {
            let name = tag.name.as_str();
            if !tb.in_scope_named(name, tag_sets::default_scope) {
                tb.store.parse_error(Borrowed("dd/dt end tag without element in scope"));
                return PR::Done;
            }
            tb.generate_implied_end_except(Some(name));
            if !tb.current_node_named(name) {
                tb.store.parse_error(Borrowed("dd/dt end tag: open elements mismatch"));
            }
            tb.pop_until_named(name);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag_sets::heading_tag_name(tag.name.as_str()) => {
            if !["h1", "h2", "h3", "h4", "h5", "h6"]
                .iter()
                .any(|h| tb.in_scope_named(h, tag_sets::default_scope))
            {
                tb.store.parse_error(Borrowed("heading end tag without heading in scope"));
                return PR::Done;
            }
            tb.generate_implied_end_tags();
            if !tb.current_node_named(tag.name.as_str()) {
                tb.store.parse_error(Borrowed("heading end tag: open elements mismatch"));
            }
            tb.pop_until(|n| tag_sets::heading_tag(n));
            tb.pop();
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small"
                        | "strike" | "strong" | "tt" | "u"
                ) =>
        {
            if tag.name.as_str() == "a" {
                handle_misnested_a_tag(tb);
            }
            tb.reconstruct_active_formatting_elements();
            tb.create_formatting_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag)
            if is_end(tag)
                && matches!(
                    tag.name.as_str(),
                    "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small"
                        | "strike" | "strong" | "tt" | "u"
                ) =>
        {
            tb.adoption_agency(tag.name.as_str());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "applet" | "marquee" | "object") => {
            tb.reconstruct_active_formatting_elements();
            tb.insert_element_for(tag.clone());
            tb.push_formatting_marker();
            tb.frameset_ok.set(false);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && matches!(tag.name.as_str(), "applet" | "marquee" | "object") => {
            let name = tag.name.as_str();
            if !tb.in_scope_named(name, tag_sets::default_scope) {
                tb.store.parse_error(Borrowed("end tag without matching element in scope"));
                return PR::Done;
            }
            tb.generate_implied_end_tags();
            if !tb.current_node_named(name) {
                tb.store.parse_error(Borrowed("end tag: open elements mismatch"));
            }
            tb.pop_until_named(name);
            tb.clear_active_formatting_to_marker();
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "table" => {
            if tb.store.quirks_mode.get() != QuirksMode::Quirks {
                tb.close_p_element_in_button_scope();
            }
            tb.insert_element_for(tag.clone());
            tb.frameset_ok.set(false);
            tb.mode.set(InsertionMode::InTable);
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag) && matches!(tag.name.as_str(), "area" | "br" | "embed" | "img" | "keygen" | "wbr") =>
        {
            tb.reconstruct_active_formatting_elements();
            tb.insert_and_pop_element_for(tag.clone());
            tb.frameset_ok.set(false);
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "input" => {
            tb.reconstruct_active_formatting_elements();
            tb.insert_and_pop_element_for(tag.clone());
            if !TreeBuilder::is_type_hidden(tag) {
                tb.frameset_ok.set(false);
            }
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "param" | "source" | "track") => {
            tb.insert_and_pop_element_for(tag.clone());
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "hr" => {
            tb.close_p_element_in_button_scope();
            tb.insert_and_pop_element_for(tag.clone());
            tb.frameset_ok.set(false);
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "image" => {
            tb.store.parse_error(Borrowed("image start tag treated as img"));
            let mut fixed = tag.clone();
            fixed.name = html_tree_dom::LocalName::from("img");
            reprocess(InsertionMode::InBody, BT::Tag(fixed))
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "textarea" => {
            tb.insert_element_for(tag.clone());
            tb.ignore_lf.set(true);
            tb.frameset_ok.set(false);
            PR::ToRawData(Rcdata)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "xmp" => {
            tb.close_p_element_in_button_scope();
            tb.reconstruct_active_formatting_elements();
            tb.frameset_ok.set(false);
            tb.insert_element_for(tag.clone());
            PR::ToRawData(Rawtext)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "iframe" => {
            tb.frameset_ok.set(false);
            tb.insert_element_for(tag.clone());
            PR::ToRawData(Rawtext)
        },
        BT::Tag(ref tag)
            if is_start(tag) && (tag.name.as_str() == "noembed" || (tag.name.as_str() == "noscript" && tb.opts.scripting_enabled)) =>
        {
            tb.insert_element_for(tag.clone());
            PR::ToRawData(Rawtext)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "select" => {
            tb.reconstruct_active_formatting_elements();
            tb.insert_element_for(tag.clone());
            tb.frameset_ok.set(false);
            tb.mode.set(match tb.mode.get() {
                InsertionMode::InTable | InsertionMode::InCaption | InsertionMode::InTableBody
                | InsertionMode::InRow | InsertionMode::InCell => InsertionMode::InSelectInTable,
                _ => InsertionMode::InSelect,
            });
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "optgroup" | "option") => {
            if tb.current_node_named("option") {
                tb.pop();
            }
            tb.reconstruct_active_formatting_elements();
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "rb" | "rtc") => {
            if tb.in_scope_named("ruby", tag_sets::default_scope) {
                tb.generate_implied_end_tags();
                if !tb.current_node_named("ruby") {
                    tb.store.parse_error(Borrowed("rb/rtc start tag: open elements mismatch"));
                }
            }
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "rp" | "rt") => {
            if tb.in_scope_named("ruby", tag_sets::default_scope) {
                tb.generate_implied_end_except(Some("rtc"));
                if !matches!(tb.current_node().as_element().map(|n| n.local.as_str() == "ruby" || n.local.as_str() == "rtc"), Some(true)) {
                    tb.store.parse_error(Borrowed("rp/rt start tag: open elements mismatch"));
                }
            }
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "math" => {
            tb.reconstruct_active_formatting_elements();
            let mut fixed = tag.clone();
            if fixed.self_closing {
                tb.enter_foreign(fixed, ns::mathml());
                tb.pop();
                return PR::DoneAckSelfClosing;
            }
            tb.enter_foreign(fixed, ns::mathml());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "svg" => {
            tb.reconstruct_active_formatting_elements();
            let fixed = tag.clone();
            if fixed.self_closing {
                tb.enter_foreign(fixed, ns::svg());
                tb.pop();
                return PR::DoneAckSelfClosing;
            }
            tb.enter_foreign(fixed, ns::svg());
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td" | "tfoot"
                        | "th" | "thead" | "tr"
                ) =>
        {
            tb.store.parse_error(Borrowed("table-structure start tag in body"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) => {
            tb.reconstruct_active_formatting_elements();
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) => {
            tb.any_other_end_tag_in_body(tag.name.as_str());
            PR::Done
        },
        _ => PR::Done,
    }
}

fn list_item(tb: &TreeBuilder, tag: Tag, is_closer: impl Fn(html_tree_dom::ExpandedName) -> bool) {
    let stack = tb.open_elems_snapshot();
    for elem in stack.iter().rev() {
        let Some(name) = elem.as_element() else { continue };
        let expanded = name.expanded();
        if is_closer(expanded) {
            tb.generate_implied_end_except(Some(name.local.as_str()));
            if !tb.current_node_named(name.local.as_str()) {
                tb.store.parse_error(Borrowed("list item end tag: open elements mismatch"));
            }
            tb.pop_until_named(name.local.as_str());
            break;
        }
        if tag_sets::special_tag(expanded) && !matches!(name.local.as_str(), "address" | "div" | "p") {
            break;
        }
    }
    tb.close_p_element_in_button_scope();
    tb.insert_element_for(tag);
}

fn handle_misnested_a_tag(tb: &TreeBuilder) {
    let active_a = {
        tb.active_formatting_entries()
            .into_iter()
            .rev()
            .take_while(|e| e.is_some())
            .flatten()
            .find(|(_, tag)| tag.name.as_str() == "a")
    };
    if let Some((handle, _)) = active_a {
        tb.store.parse_error(Borrowed("misnested <a> tag"));
        tb.adoption_agency("a");
        tb.remove_formatting_entry(&handle);
        tb.remove_from_stack(&handle);
    }
}

// ---------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------

fn text(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, s) => {
            let s = strip_ignored_lf(tb, s);
            if s.is_empty() {
                return PR::Done;
            }
            tb.append_text(s);
            PR::Done
        },
        BT::NullCharacter => PR::Done,
        BT::Eof => {
            tb.store.parse_error(Borrowed("eof in raw text/rcdata element"));
            tb.pop();
            tb.mode.set(tb.orig_mode.take().unwrap_or(InsertionMode::InBody));
            reprocess(tb.mode.get(), BT::Eof)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "script" => {
            let node = tb.pop().expect("script element missing from stack");
            tb.mode.set(tb.orig_mode.take().unwrap_or(InsertionMode::InBody));
            PR::Script(node)
        },
        BT::Tag(ref tag) if is_end(tag) => {
            tb.pop();
            tb.mode.set(tb.orig_mode.take().unwrap_or(InsertionMode::InBody));
            PR::Done
        },
        _ => PR::Done,
    }
}

// ---------------------------------------------------------------------
// Table family
// ---------------------------------------------------------------------

fn in_table(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, _) if tb.current_node_is_table_text_context() => {
            tb.pending_table_text.borrow_mut().clear();
            tb.orig_mode.set(Some(InsertionMode::InTable));
            reprocess(InsertionMode::InTableText, token)
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in table"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "caption" => {
            tb.clear_stack_to_table_context();
            tb.push_formatting_marker();
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InCaption);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "colgroup" => {
            tb.clear_stack_to_table_context();
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InColumnGroup);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "col" => {
            tb.clear_stack_to_table_context();
            tb.insert_phantom("colgroup");
            reprocess(InsertionMode::InColumnGroup, token)
        },
        BT::Tag(ref tag) if is_start(tag) && tag_sets::table_body_context_name(tag.name.as_str()) => {
            tb.clear_stack_to_table_context();
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InTableBody);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "td" | "th" | "tr") => {
            tb.clear_stack_to_table_context();
            tb.insert_phantom("tbody");
            reprocess(InsertionMode::InTableBody, token)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "table" => {
            tb.store.parse_error(Borrowed("nested table start tag"));
            if tb.in_scope_named("table", tag_sets::table_scope) {
                tb.pop_until_named("table");
                tb.reset_insertion_mode();
                return reprocess(tb.mode.get(), token);
            }
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "table" => {
            if !tb.in_scope_named("table", tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("table end tag without table in scope"));
                return PR::Done;
            }
            tb.pop_until_named("table");
            tb.reset_insertion_mode();
            PR::Done
        },
        BT::Tag(ref tag)
            if is_end(tag)
                && matches!(
                    tag.name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                        | "thead" | "tr"
                ) =>
        {
            tb.store.parse_error(Borrowed("unexpected end tag in table"));
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag) && matches!(tag.name.as_str(), "style" | "script" | "template") =>
        {
            in_head(tb, token)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "input" && TreeBuilder::is_type_hidden(tag) => {
            tb.store.parse_error(Borrowed("hidden input in table"));
            tb.insert_and_pop_element_for(tag.clone());
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "form" => {
            tb.store.parse_error(Borrowed("form start tag in table"));
            if tb.form_elem.borrow().is_none() && !tb.in_html_elem_named("template") {
                let elem = tb.insert_and_pop_element_for(tag.clone());
                *tb.form_elem.borrow_mut() = Some(elem);
            }
            PR::Done
        },
        BT::Eof => in_body(tb, token),
        token => {
            tb.store.parse_error(Borrowed("foster-parenting text/tag out of table"));
            foster_parent_and_process_in_body(tb, token)
        },
    }
}

fn foster_parent_and_process_in_body(tb: &TreeBuilder, token: BT) -> PR {
    tb.with_foster_parenting(|| in_body(tb, token))
}

fn in_table_text(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::NullCharacter => {
            tb.store.parse_error(Borrowed("null character in table text"));
            PR::Done
        },
        BT::Characters(_, s) => {
            let status = if is_whitespace(&s) { SplitStatus::Whitespace } else { SplitStatus::NotWhitespace };
            tb.pending_table_text.borrow_mut().push((status, s));
            PR::Done
        },
        token => {
            let all_whitespace = tb
                .pending_table_text
                .borrow()
                .iter()
                .all(|(status, _)| matches!(status, SplitStatus::Whitespace));
            let pieces: Vec<_> = tb.pending_table_text.borrow_mut().drain(..).collect();
            if all_whitespace {
                for (_, text) in pieces {
                    tb.append_text(text);
                }
            } else {
                for (_, text) in pieces {
                    tb.store.parse_error(Borrowed("non-whitespace character data in table"));
                    tb.with_foster_parenting(|| tb.append_text(text.clone()));
                }
            }
            let orig = tb.orig_mode.take().unwrap_or(InsertionMode::InTable);
            tb.mode.set(orig);
            reprocess(orig, token)
        },
    }
}

fn in_caption(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "caption" => {
            if !tb.in_scope_named("caption", tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("caption end tag without caption in scope"));
                return PR::Done;
            }
            tb.generate_implied_end_tags();
            if !tb.current_node_named("caption") {
                tb.store.parse_error(Borrowed("caption end tag: open elements mismatch"));
            }
            tb.pop_until_named("caption");
            tb.clear_active_formatting_to_marker();
            tb.mode.set(InsertionMode::InTable);
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead" | "tr"
                ) =>
        {
            if !tb.in_scope_named("caption", tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("nested caption-closing tag without caption in scope"));
                return PR::Done;
            }
            tb.pop_until_named("caption");
            tb.clear_active_formatting_to_marker();
            tb.mode.set(InsertionMode::InTable);
            reprocess(InsertionMode::InTable, token)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "table" => {
            if !tb.in_scope_named("caption", tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("table end tag without caption in scope"));
                return PR::Done;
            }
            tb.pop_until_named("caption");
            tb.clear_active_formatting_to_marker();
            tb.mode.set(InsertionMode::InTable);
            reprocess(InsertionMode::InTable, token)
        },
        BT::Tag(ref tag)
            if is_end(tag) && matches!(tag.name.as_str(), "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th" | "thead" | "tr") =>
        {
            tb.store.parse_error(Borrowed("unexpected end tag in caption"));
            PR::Done
        },
        token => in_body(tb, token),
    }
}

fn in_column_group(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, ref s) if is_whitespace(s) => {
            if let BT::Characters(_, s) = token { tb.append_text(s); }
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in column group"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "col" => {
            tb.insert_and_pop_element_for(tag.clone());
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "colgroup" => {
            if !tb.current_node_named("colgroup") {
                tb.store.parse_error(Borrowed("colgroup end tag: open elements mismatch"));
                return PR::Done;
            }
            tb.pop();
            tb.mode.set(InsertionMode::InTable);
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "col" => {
            tb.store.parse_error(Borrowed("col end tag has no content model"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        BT::Eof => in_body(tb, token),
        token => {
            if !tb.current_node_named("colgroup") {
                tb.store.parse_error(Borrowed("colgroup end tag: open elements mismatch"));
                return PR::Done;
            }
            tb.pop();
            tb.mode.set(InsertionMode::InTable);
            reprocess(InsertionMode::InTable, token)
        },
    }
}

fn in_table_body(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "tr" => {
            tb.clear_stack_to_table_body_context();
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InRow);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "th" | "td") => {
            tb.store.parse_error(Borrowed("td/th start tag implies tr"));
            tb.clear_stack_to_table_body_context();
            tb.insert_phantom("tr");
            reprocess(InsertionMode::InRow, token)
        },
        BT::Tag(ref tag)
            if is_end(tag) && tag_sets::table_body_context_name(tag.name.as_str()) =>
        {
            if !tb.in_scope_named(tag.name.as_str(), tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("table body end tag without element in scope"));
                return PR::Done;
            }
            tb.clear_stack_to_table_body_context();
            tb.pop();
            tb.mode.set(InsertionMode::InTable);
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag) && matches!(tag.name.as_str(), "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead")
                || (is_end(tag) && tag.name.as_str() == "table") =>
        {
            if !["tbody", "thead", "tfoot"].iter().any(|n| tb.in_scope_named(n, tag_sets::table_scope)) {
                tb.store.parse_error(Borrowed("no table section in scope"));
                return PR::Done;
            }
            tb.clear_stack_to_table_body_context();
            tb.pop();
            tb.mode.set(InsertionMode::InTable);
            reprocess(InsertionMode::InTable, token)
        },
        BT::Tag(ref tag)
            if is_end(tag)
                && matches!(tag.name.as_str(), "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr") =>
        {
            tb.store.parse_error(Borrowed("unexpected end tag in table body"));
            PR::Done
        },
        token => in_table(tb, token),
    }
}

fn in_row(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Tag(ref tag) if is_start(tag) && tag_sets::td_th_name(tag.name.as_str()) => {
            tb.clear_stack_to_table_row_context();
            tb.insert_element_for(tag.clone());
            tb.mode.set(InsertionMode::InCell);
            tb.push_formatting_marker();
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "tr" => {
            if !tb.in_scope_named("tr", tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("tr end tag without tr in scope"));
                return PR::Done;
            }
            tb.clear_stack_to_table_row_context();
            tb.pop();
            tb.mode.set(InsertionMode::InTableBody);
            PR::Done
        },
        BT::Tag(ref tag)
            if (is_start(tag) && matches!(tag.name.as_str(), "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr"))
                || (is_end(tag) && tag.name.as_str() == "table") =>
        {
            if !tb.in_scope_named("tr", tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("table row end tag without tr in scope"));
                return PR::Done;
            }
            tb.clear_stack_to_table_row_context();
            tb.pop();
            tb.mode.set(InsertionMode::InTableBody);
            reprocess(InsertionMode::InTableBody, token)
        },
        BT::Tag(ref tag)
            if is_end(tag) && tag_sets::table_body_context_name(tag.name.as_str()) =>
        {
            if !tb.in_scope_named(tag.name.as_str(), tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("table body end tag without element in scope"));
                return PR::Done;
            }
            if !tb.in_scope_named("tr", tag_sets::table_scope) {
                return PR::Done;
            }
            tb.clear_stack_to_table_row_context();
            tb.pop();
            tb.mode.set(InsertionMode::InTableBody);
            reprocess(InsertionMode::InTableBody, token)
        },
        BT::Tag(ref tag)
            if is_end(tag) && matches!(tag.name.as_str(), "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th") =>
        {
            tb.store.parse_error(Borrowed("unexpected end tag in row"));
            PR::Done
        },
        token => in_table(tb, token),
    }
}

fn in_cell(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Tag(ref tag) if is_end(tag) && tag_sets::td_th_name(tag.name.as_str()) => {
            if !tb.in_scope_named(tag.name.as_str(), tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("cell end tag without element in scope"));
                return PR::Done;
            }
            tb.close_the_cell();
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead" | "tr"
                ) =>
        {
            if !tb.in_scope_named("td", tag_sets::table_scope)
                && !tb.in_scope_named("th", tag_sets::table_scope)
            {
                tb.store.parse_error(Borrowed("cell-closing tag without td/th in scope"));
                return PR::Done;
            }
            tb.close_the_cell();
            reprocess(InsertionMode::InRow, token)
        },
        BT::Tag(ref tag)
            if is_end(tag) && matches!(tag.name.as_str(), "body" | "caption" | "col" | "colgroup" | "html") =>
        {
            tb.store.parse_error(Borrowed("unexpected end tag in cell"));
            PR::Done
        },
        BT::Tag(ref tag)
            if is_end(tag) && matches!(tag.name.as_str(), "table" | "tbody" | "tfoot" | "thead" | "tr") =>
        {
            if !tb.in_scope_named(tag.name.as_str(), tag_sets::table_scope) {
                tb.store.parse_error(Borrowed("cell-closing end tag without element in scope"));
                return PR::Done;
            }
            tb.close_the_cell();
            reprocess(InsertionMode::InRow, token)
        },
        token => in_body(tb, token),
    }
}

// ---------------------------------------------------------------------
// Select family
// ---------------------------------------------------------------------

/// spec.md §9: fragments with a `<select>` context use `inBody`-style
/// permissiveness instead of strict `inSelect` handling — a deliberate,
/// documented divergence from strict WHATWG behaviour that matches
/// observable browser behaviour for fragments. Preserved here rather than
/// "fixed"; see DESIGN.md.
fn in_select(tb: &TreeBuilder, token: BT, in_table: bool) -> PR {
    if tb.is_fragment() && tb.context_is_named("select") {
        return in_body(tb, token);
    }
    match token {
        BT::NullCharacter => {
            tb.store.parse_error(Borrowed("null character in select"));
            PR::Done
        },
        BT::Characters(_, s) => {
            tb.append_text(s);
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in select"));
            PR::Done
        },
        BT::Eof => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "option" => {
            if tb.current_node_named("option") {
                tb.pop();
            }
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "optgroup" => {
            if tb.current_node_named("option") {
                tb.pop();
            }
            if tb.current_node_named("optgroup") {
                tb.pop();
            }
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "selectedcontent" => {
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "optgroup" => {
            let len = tb.open_elems_len();
            if tb.current_node_named("option") && len >= 2 && tb.nth_from_top_named(1, "optgroup") {
                tb.pop();
            }
            if tb.current_node_named("optgroup") {
                tb.pop();
            } else {
                tb.store.parse_error(Borrowed("optgroup end tag without matching element"));
            }
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "option" => {
            if tb.current_node_named("option") {
                tb.pop();
            } else {
                tb.store.parse_error(Borrowed("option end tag without matching element"));
            }
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "select" => {
            if !tb.in_scope_named("select", tag_sets::select_scope) {
                tb.store.parse_error(Borrowed("select end tag without select in scope"));
                return PR::Done;
            }
            tb.pop_until_named("select");
            tb.reset_insertion_mode();
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "select" => {
            tb.store.parse_error(Borrowed("nested select start tag treated as close"));
            tb.pop_until_named("select");
            tb.reset_insertion_mode();
            PR::Done
        },
        BT::Tag(ref tag)
            if is_start(tag) && matches!(tag.name.as_str(), "input" | "keygen" | "textarea") =>
        {
            tb.store.parse_error(Borrowed("interactive element start tag in select"));
            if !tb.in_scope_named("select", tag_sets::select_scope) {
                return PR::Done;
            }
            tb.pop_until_named("select");
            tb.reset_insertion_mode();
            reprocess(tb.mode.get(), token)
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "script" | "template") => in_head(tb, token),
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        _ => {
            let _ = in_table;
            tb.store.parse_error(Borrowed("unexpected token in select"));
            PR::Done
        },
    }
}

fn in_template(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(..) | BT::Comment(_) | BT::Doctype(_) => in_body(tb, token),
        BT::Tag(ref tag)
            if is_start(tag)
                && matches!(
                    tag.name.as_str(),
                    "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style"
                        | "template" | "title"
                ) =>
        {
            in_head(tb, token)
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "template" => in_head(tb, token),
        BT::Tag(ref tag)
            if is_start(tag) && matches!(tag.name.as_str(), "caption" | "colgroup" | "tbody" | "tfoot" | "thead") =>
        {
            tb.template_modes.borrow_mut().pop();
            tb.template_modes.borrow_mut().push(InsertionMode::InTable);
            tb.mode.set(InsertionMode::InTable);
            reprocess(InsertionMode::InTable, token)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "col" => {
            tb.template_modes.borrow_mut().pop();
            tb.template_modes.borrow_mut().push(InsertionMode::InColumnGroup);
            tb.mode.set(InsertionMode::InColumnGroup);
            reprocess(InsertionMode::InColumnGroup, token)
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "tr" => {
            tb.template_modes.borrow_mut().pop();
            tb.template_modes.borrow_mut().push(InsertionMode::InTableBody);
            tb.mode.set(InsertionMode::InTableBody);
            reprocess(InsertionMode::InTableBody, token)
        },
        BT::Tag(ref tag) if is_start(tag) && matches!(tag.name.as_str(), "td" | "th") => {
            tb.template_modes.borrow_mut().pop();
            tb.template_modes.borrow_mut().push(InsertionMode::InRow);
            tb.mode.set(InsertionMode::InRow);
            reprocess(InsertionMode::InRow, token)
        },
        BT::Tag(ref tag) if is_start(tag) => {
            tb.template_modes.borrow_mut().pop();
            tb.template_modes.borrow_mut().push(InsertionMode::InBody);
            tb.mode.set(InsertionMode::InBody);
            reprocess(InsertionMode::InBody, token)
        },
        BT::Tag(ref tag) if is_end(tag) => {
            tb.store.parse_error(Borrowed("unexpected end tag in template"));
            PR::Done
        },
        BT::Eof => {
            if !tb.in_html_elem_named("template") {
                tb.stop_parsing();
                return PR::Done;
            }
            tb.store.parse_error(Borrowed("eof with template still open"));
            tb.pop_until_named("template");
            tb.clear_active_formatting_to_marker();
            tb.template_modes.borrow_mut().pop();
            tb.reset_insertion_mode();
            reprocess(tb.mode.get(), token)
        },
        token => in_body(tb, token),
    }
}

// ---------------------------------------------------------------------
// After-body family
// ---------------------------------------------------------------------

fn after_body(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, ref s) if is_whitespace(s) => in_body(tb, token),
        BT::Comment(text) => {
            if let Some(html) = tb.open_elems_snapshot().first().cloned() {
                let comment = tb.store.create_comment(text);
                tb.store.append(&html, NodeOrText::Node(comment));
            }
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype after body"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "html" => {
            if tb.is_fragment() {
                tb.store.parse_error(Borrowed("html end tag in fragment"));
                return PR::Done;
            }
            tb.mode.set(InsertionMode::AfterAfterBody);
            PR::Done
        },
        BT::Eof => {
            tb.stop_parsing();
            PR::Done
        },
        token => {
            tb.store.parse_error(Borrowed("unexpected token after body"));
            tb.mode.set(InsertionMode::InBody);
            reprocess(InsertionMode::InBody, token)
        },
    }
}

fn in_frameset(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, ref s) if is_whitespace(s) => {
            if let BT::Characters(_, s) = token { tb.append_text(s); }
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in frameset"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "frameset" => {
            tb.insert_element_for(tag.clone());
            PR::Done
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "frameset" => {
            if tb.open_elems_len() == 1 {
                tb.store.parse_error(Borrowed("frameset end tag with only html on stack"));
                return PR::Done;
            }
            tb.pop();
            if !tb.is_fragment() && !tb.current_node_named("frameset") {
                tb.mode.set(InsertionMode::AfterFrameset);
            }
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "frame" => {
            tb.insert_and_pop_element_for(tag.clone());
            PR::DoneAckSelfClosing
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "noframes" => in_head(tb, token),
        BT::Eof => {
            tb.stop_parsing();
            PR::Done
        },
        _ => {
            tb.store.parse_error(Borrowed("unexpected token in frameset"));
            PR::Done
        },
    }
}

fn after_frameset(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Characters(_, ref s) if is_whitespace(s) => {
            if let BT::Characters(_, s) = token { tb.append_text(s); }
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype after frameset"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "html" => {
            tb.mode.set(InsertionMode::AfterAfterFrameset);
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "noframes" => in_head(tb, token),
        BT::Eof => {
            tb.stop_parsing();
            PR::Done
        },
        _ => {
            tb.store.parse_error(Borrowed("unexpected token after frameset"));
            PR::Done
        },
    }
}

fn after_after_body(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Comment(text) => {
            tb.append_comment_to_doc(text);
            PR::Done
        },
        BT::Doctype(_) => in_body(tb, token),
        BT::Characters(_, ref s) if is_whitespace(s) => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Eof => {
            tb.stop_parsing();
            PR::Done
        },
        token => {
            tb.store.parse_error(Borrowed("unexpected token after body (after-after)"));
            tb.mode.set(InsertionMode::InBody);
            reprocess(InsertionMode::InBody, token)
        },
    }
}

fn after_after_frameset(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::Comment(text) => {
            tb.append_comment_to_doc(text);
            PR::Done
        },
        BT::Doctype(_) => in_body(tb, token),
        BT::Characters(_, ref s) if is_whitespace(s) => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "html" => in_body(tb, token),
        BT::Tag(ref tag) if is_start(tag) && tag.name.as_str() == "noframes" => in_head(tb, token),
        BT::Eof => {
            tb.stop_parsing();
            PR::Done
        },
        _ => {
            tb.store.parse_error(Borrowed("unexpected token after frameset (after-after)"));
            PR::Done
        },
    }
}

// ---------------------------------------------------------------------
// Foreign content (spec.md §4.3 "Foreign content")
// ---------------------------------------------------------------------

pub(super) fn step_foreign(tb: &TreeBuilder, token: BT) -> PR {
    match token {
        BT::NullCharacter => {
            tb.store.parse_error(Borrowed("null character in foreign content"));
            tb.append_text(StrTendril::from_char('\u{fffd}'));
            PR::Done
        },
        BT::Characters(_, s) => {
            if !is_whitespace(&s) {
                tb.frameset_ok.set(false);
            }
            tb.append_text(s);
            PR::Done
        },
        BT::Comment(text) => {
            tb.append_comment(text);
            PR::Done
        },
        BT::Doctype(_) => {
            tb.store.parse_error(Borrowed("doctype in foreign content"));
            PR::Done
        },
        BT::Tag(ref tag) if is_start(tag) && is_breakout(tag) => {
            tb.store.parse_error(Borrowed("html breakout tag in foreign content"));
            let stack_snapshot = tb.open_elems_snapshot();
            for elem in stack_snapshot.iter().rev() {
                let is_html_or_integration = elem
                    .as_element()
                    .map(|n| *n.ns == ns::html() || tag_sets::is_extra_scope_terminator(n.expanded()))
                    .unwrap_or(true);
                if is_html_or_integration {
                    break;
                }
                tb.pop();
            }
            reprocess(tb.mode.get(), BT::Tag(tag.clone()))
        },
        BT::Tag(ref tag) if is_start(tag) => {
            let current_ns = tb.adjusted_current_node().as_element().map(|n| n.ns.clone()).unwrap_or_else(ns::html);
            let mut fixed = tag.clone();
            let foreign_ns = current_ns.clone();
            if foreign_ns == ns::svg() {
                tb.adjust_svg_tag_name(&mut fixed);
            }
            let self_closing = fixed.self_closing;
            tb.enter_foreign(fixed, foreign_ns);
            if self_closing {
                tb.pop();
                PR::DoneAckSelfClosing
            } else {
                PR::Done
            }
        },
        BT::Tag(ref tag) if is_end(tag) && tag.name.as_str() == "script" && is_foreign_script(tb) => {
            let node = tb.pop().expect("script element missing");
            PR::Script(node)
        },
        BT::Tag(ref tag) if is_end(tag) => {
            let name = tag.name.as_str();
            let stack_snapshot = tb.open_elems_snapshot();
            let mut idx = stack_snapshot.len();
            loop {
                if idx == 0 {
                    break;
                }
                idx -= 1;
                let elem = &stack_snapshot[idx];
                let matches_name = elem
                    .as_element()
                    .map(|n| n.local.as_str().eq_ignore_ascii_case(name))
                    .unwrap_or(false);
                if matches_name {
                    tb.pop_until_current(elem);
                    break;
                }
                let is_html = elem.as_element().map(|n| *n.ns == ns::html()).unwrap_or(false);
                if is_html {
                    return step(tb, tb.mode.get(), BT::Tag(tag.clone()));
                }
                tb.pop();
            }
            PR::Done
        },
        token => step(tb, tb.mode.get(), token),
    }
}

fn is_foreign_script(tb: &TreeBuilder) -> bool {
    tb.adjusted_current_node()
        .as_element()
        .map(|n| n.local.as_str() == "script" && *n.ns != ns::html())
        .unwrap_or(false)
}

fn is_breakout(tag: &Tag) -> bool {
    if html_tree_dom::entities::FOREIGN_BREAKOUT_ELEMENTS.contains(tag.name.as_str()) {
        return true;
    }
    tag.name.as_str() == "font"
        && tag.attrs.iter().any(|a| matches!(a.name.local.as_str(), "color" | "face" | "size"))
}

