//! The HTML5 tokenizer: a byte/char-oriented state machine that turns
//! input text into a stream of [`Token`]s, per spec.md §4.2. Grounded in
//! `html5ever::tokenizer`, reworked from its macro-driven `go!`/`shorthand!`
//! DSL (which leans on the teacher's own `macros` compiler-plugin crate)
//! into plain match arms — same fields, same per-state algorithm, no
//! external proc-macro dependency. The teacher's SIMD fast path for the
//! data state is also dropped; see DESIGN.md.

mod char_ref;
pub mod interface;
pub mod states;

pub use self::interface::{
    CharacterTokens, CommentToken, DoctypeToken, EOFToken, NullCharacterToken, ParseError,
    TagToken, Token,
};
pub use self::interface::{Doctype, EndTag, StartTag, Tag, TagKind};
pub use self::interface::{TokenSink, TokenSinkResult};

use std::borrow::Cow::{self, Borrowed};
use std::cell::{Cell, RefCell, RefMut};
use std::mem;

use html_tree_dom::{small_char_set, Attribute, LocalName, QualName};
use html_tree_dom::{ns, BufferQueue, FromSet, NotFromSet, SetResult, SmallCharSet};
use log::trace;
use tendril::StrTendril;

use self::char_ref::{CharRef, CharRefTokenizer};
use self::states::{DoctypeIdKind, Public, System};
use self::states::{DoubleEscaped, Escaped};
use self::states::{DoubleQuoted, SingleQuoted, Unquoted};
use self::states::{Rawtext, Rcdata, ScriptData, ScriptDataEscaped};

/// What the driver should do after a `step()` call.
pub enum ProcessResult<Handle> {
    Continue,
    Suspend,
    Script(Handle),
}

/// What `Tokenizer::feed` reports once it runs out of buffered input.
pub enum TokenizerResult<Handle> {
    Done,
    Script(Handle),
}

fn option_push(opt_str: &mut Option<StrTendril>, c: char) {
    match *opt_str {
        Some(ref mut s) => s.push_char(c),
        None => *opt_str = Some(StrTendril::from_char(c)),
    }
}

/// Tokenizer options, with an impl for `Default`. Mirrors
/// `html5ever::tokenizer::TokenizerOpts` (see SPEC_FULL.md §C).
#[derive(Clone)]
pub struct TokenizerOpts {
    /// Report all parse errors described in the spec, at some performance
    /// penalty? Default: `false`.
    pub exact_errors: bool,

    /// Discard a `U+FEFF BYTE ORDER MARK` if we see one at the beginning
    /// of the stream? Default: `true`.
    pub discard_bom: bool,

    /// Keep a running total of time spent in the sink, printed when `end()`
    /// is called? Default: `false`.
    pub profile: bool,

    /// Initial state override. Only the tree builder (entering
    /// RCDATA/RAWTEXT/script-data for `<title>`, `<textarea>`, `<script>`,
    /// ...) and tests should use a non-`None` value.
    pub initial_state: Option<states::State>,

    /// Last start tag name, for the "appropriate end tag" check. Only the
    /// tree builder (fragment parsing, spec.md §4.3) and tests should use
    /// a non-`None` value.
    pub last_start_tag_name: Option<String>,
}

impl Default for TokenizerOpts {
    fn default() -> TokenizerOpts {
        TokenizerOpts {
            exact_errors: false,
            discard_bom: true,
            profile: false,
            initial_state: None,
            last_start_tag_name: None,
        }
    }
}

/// The HTML tokenizer.
pub struct Tokenizer<Sink> {
    opts: TokenizerOpts,
    pub sink: Sink,

    state: Cell<states::State>,
    at_eof: Cell<bool>,
    char_ref_tokenizer: RefCell<Option<Box<CharRefTokenizer>>>,

    current_char: Cell<char>,
    reconsume: Cell<bool>,
    ignore_lf: Cell<bool>,
    discard_bom: Cell<bool>,

    current_tag_kind: Cell<TagKind>,
    current_tag_name: RefCell<StrTendril>,
    current_tag_self_closing: Cell<bool>,
    current_tag_attrs: RefCell<Vec<Attribute>>,

    current_attr_name: RefCell<StrTendril>,
    current_attr_value: RefCell<StrTendril>,

    current_comment: RefCell<StrTendril>,
    current_doctype: RefCell<Doctype>,

    last_start_tag_name: RefCell<Option<LocalName>>,
    temp_buf: RefCell<StrTendril>,

    time_in_sink: Cell<u64>,
    current_line: Cell<u64>,
}

impl<Sink: TokenSink> Tokenizer<Sink> {
    pub fn new(sink: Sink, mut opts: TokenizerOpts) -> Tokenizer<Sink> {
        let start_tag_name = opts
            .last_start_tag_name
            .take()
            .map(|s| LocalName::from(&*s));
        let state = opts.initial_state.unwrap_or(states::Data);
        let discard_bom = opts.discard_bom;
        Tokenizer {
            opts,
            sink,
            state: Cell::new(state),
            char_ref_tokenizer: RefCell::new(None),
            at_eof: Cell::new(false),
            current_char: Cell::new('\0'),
            reconsume: Cell::new(false),
            ignore_lf: Cell::new(false),
            discard_bom: Cell::new(discard_bom),
            current_tag_kind: Cell::new(StartTag),
            current_tag_name: RefCell::new(StrTendril::new()),
            current_tag_self_closing: Cell::new(false),
            current_tag_attrs: RefCell::new(vec![]),
            current_attr_name: RefCell::new(StrTendril::new()),
            current_attr_value: RefCell::new(StrTendril::new()),
            current_comment: RefCell::new(StrTendril::new()),
            current_doctype: RefCell::new(Doctype::default()),
            last_start_tag_name: RefCell::new(start_tag_name),
            temp_buf: RefCell::new(StrTendril::new()),
            time_in_sink: Cell::new(0),
            current_line: Cell::new(1),
        }
    }

    /// Feed an input string into the tokenizer.
    pub fn feed(&self, input: &BufferQueue) -> TokenizerResult<Sink::Handle> {
        if input.is_empty() {
            return TokenizerResult::Done;
        }

        if self.discard_bom.get() {
            if let Some(c) = input.peek() {
                self.discard_bom.set(false);
                if c == '\u{feff}' {
                    input.next();
                }
            } else {
                return TokenizerResult::Done;
            }
        }

        self.run(input)
    }

    /// Mark the end of the input stream and flush any remaining state,
    /// including an in-progress character reference.
    pub fn end(&self, input: &BufferQueue) {
        self.at_eof.set(true);
        let _ = self.run(input);
        self.sink.end();
        if self.opts.profile {
            log::debug!("time spent in sink: {}ns", self.time_in_sink.get());
        }
    }

    pub fn set_plaintext_state(&self) {
        self.state.set(states::Plaintext);
    }

    fn process_token(&self, token: Token) -> TokenSinkResult<Sink::Handle> {
        if self.opts.profile {
            let start = std::time::Instant::now();
            let ret = self.sink.process_token(token, self.current_line.get());
            self.time_in_sink
                .set(self.time_in_sink.get() + start.elapsed().as_nanos() as u64);
            ret
        } else {
            self.sink.process_token(token, self.current_line.get())
        }
    }

    fn process_token_and_continue(&self, token: Token) {
        assert!(matches!(
            self.process_token(token),
            TokenSinkResult::Continue
        ));
    }

    //§ preprocessing-the-input-stream
    fn get_preprocessed_char(&self, mut c: char, input: &BufferQueue) -> Option<char> {
        if self.ignore_lf.get() {
            self.ignore_lf.set(false);
            if c == '\n' {
                c = input.next()?;
            }
        }

        if c == '\r' {
            self.ignore_lf.set(true);
            c = '\n';
        }

        if c == '\n' {
            self.current_line.set(self.current_line.get() + 1);
        }

        if self.opts.exact_errors
            && match c as u32 {
                0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF => true,
                n if (n & 0xFFFE) == 0xFFFE => true,
                _ => false,
            }
        {
            self.emit_error(Cow::Owned(format!("Bad character {c}")));
        }

        trace!("got character {c}");
        self.current_char.set(c);
        Some(c)
    }

    //§ tokenization
    fn get_char(&self, input: &BufferQueue) -> Option<char> {
        if self.reconsume.get() {
            self.reconsume.set(false);
            Some(self.current_char.get())
        } else {
            input
                .next()
                .and_then(|c| self.get_preprocessed_char(c, input))
        }
    }

    fn pop_except_from(&self, input: &BufferQueue, set: SmallCharSet) -> Option<SetResult> {
        if self.opts.exact_errors || self.reconsume.get() || self.ignore_lf.get() {
            return self.get_char(input).map(FromSet);
        }

        let d = input.pop_except_from(set);
        trace!("got characters {d:?}");
        match d {
            Some(FromSet(c)) => self.get_preprocessed_char(c, input).map(FromSet),
            _ => d,
        }
    }

    fn eat(&self, input: &BufferQueue, pat: &str, eq: fn(&u8, &u8) -> bool) -> Option<bool> {
        if self.ignore_lf.get() {
            self.ignore_lf.set(false);
            if self.peek(input) == Some('\n') {
                self.discard_char(input);
            }
        }

        input.push_front(mem::take(&mut self.temp_buf.borrow_mut()));
        match input.eat(pat, eq) {
            None if self.at_eof.get() => Some(false),
            None => {
                while let Some(data) = input.next() {
                    self.temp_buf.borrow_mut().push_char(data);
                }
                None
            },
            Some(matched) => Some(matched),
        }
    }

    /// Run the state machine for as long as we can.
    fn run(&self, input: &BufferQueue) -> TokenizerResult<Sink::Handle> {
        loop {
            match self.step(input) {
                ProcessResult::Continue => (),
                ProcessResult::Suspend => break,
                ProcessResult::Script(node) => return TokenizerResult::Script(node),
            }
        }
        TokenizerResult::Done
    }

    #[inline]
    fn bad_char_error(&self) {
        let msg = if self.opts.exact_errors {
            Cow::from("Bad character")
        } else {
            let c = self.current_char.get();
            let state = self.state.get();
            Cow::from(format!("Saw {c} in state {state:?}"))
        };
        self.emit_error(msg);
    }

    #[inline]
    fn bad_eof_error(&self) {
        let msg = if self.opts.exact_errors {
            Cow::from("Unexpected EOF")
        } else {
            let state = self.state.get();
            Cow::from(format!("Saw EOF in state {state:?}"))
        };
        self.emit_error(msg);
    }

    fn emit_char(&self, c: char) {
        self.process_token_and_continue(match c {
            '\0' => NullCharacterToken,
            _ => CharacterTokens(StrTendril::from_char(c)),
        });
    }

    // The string must not contain '\0'!
    fn emit_chars(&self, b: StrTendril) {
        self.process_token_and_continue(CharacterTokens(b));
    }

    fn emit_current_tag(&self) -> ProcessResult<Sink::Handle> {
        self.finish_attribute();

        let name = LocalName::from(&**self.current_tag_name.borrow());
        self.current_tag_name.borrow_mut().clear();

        match self.current_tag_kind.get() {
            StartTag => {
                *self.last_start_tag_name.borrow_mut() = Some(name.clone());
            },
            EndTag => {
                if !self.current_tag_attrs.borrow().is_empty() {
                    self.emit_error(Borrowed("Attributes on an end tag"));
                }
                if self.current_tag_self_closing.get() {
                    self.emit_error(Borrowed("Self-closing end tag"));
                }
            },
        }

        let token = TagToken(Tag {
            kind: self.current_tag_kind.get(),
            name,
            self_closing: self.current_tag_self_closing.get(),
            attrs: std::mem::take(&mut self.current_tag_attrs.borrow_mut()),
        });

        match self.process_token(token) {
            TokenSinkResult::Continue => ProcessResult::Continue,
            TokenSinkResult::Plaintext => {
                self.state.set(states::Plaintext);
                ProcessResult::Continue
            },
            TokenSinkResult::Script(node) => {
                self.state.set(states::Data);
                ProcessResult::Script(node)
            },
            TokenSinkResult::RawData(kind) => {
                self.state.set(states::RawData(kind));
                ProcessResult::Continue
            },
        }
    }

    fn emit_temp_buf(&self) {
        let buf = mem::take(&mut *self.temp_buf.borrow_mut());
        self.emit_chars(buf);
    }

    fn clear_temp_buf(&self) {
        self.temp_buf.borrow_mut().clear();
    }

    fn emit_current_comment(&self) {
        let comment = mem::take(&mut *self.current_comment.borrow_mut());
        self.process_token_and_continue(CommentToken(comment));
    }

    fn discard_tag(&self) {
        self.current_tag_name.borrow_mut().clear();
        self.current_tag_self_closing.set(false);
        *self.current_tag_attrs.borrow_mut() = vec![];
    }

    fn create_tag(&self, kind: TagKind, c: char) {
        self.discard_tag();
        self.current_tag_name.borrow_mut().push_char(c);
        self.current_tag_kind.set(kind);
    }

    fn have_appropriate_end_tag(&self) -> bool {
        match self.last_start_tag_name.borrow().as_ref() {
            Some(last) => {
                (self.current_tag_kind.get() == EndTag)
                    && (**self.current_tag_name.borrow() == **last)
            },
            None => false,
        }
    }

    fn create_attribute(&self, c: char) {
        self.finish_attribute();
        self.current_attr_name.borrow_mut().push_char(c);
    }

    fn finish_attribute(&self) {
        if self.current_attr_name.borrow().is_empty() {
            return;
        }

        let dup = {
            let name = &*self.current_attr_name.borrow();
            self.current_tag_attrs
                .borrow()
                .iter()
                .any(|a| *a.name.local == **name)
        };

        if dup {
            self.emit_error(Borrowed("Duplicate attribute"));
            self.current_attr_name.borrow_mut().clear();
            self.current_attr_value.borrow_mut().clear();
        } else {
            let name = LocalName::from(&**self.current_attr_name.borrow());
            self.current_attr_name.borrow_mut().clear();
            self.current_tag_attrs.borrow_mut().push(Attribute {
                // The tree builder adjusts the namespace in foreign content.
                name: QualName::new(None, ns::empty(), name),
                value: mem::take(&mut self.current_attr_value.borrow_mut()),
            });
        }
    }

    fn emit_current_doctype(&self) {
        let doctype = self.current_doctype.take();
        self.process_token_and_continue(DoctypeToken(doctype));
    }

    fn doctype_id(&self, kind: DoctypeIdKind) -> RefMut<'_, Option<StrTendril>> {
        let current_doctype = self.current_doctype.borrow_mut();
        match kind {
            Public => RefMut::map(current_doctype, |d| &mut d.public_id),
            System => RefMut::map(current_doctype, |d| &mut d.system_id),
        }
    }

    fn clear_doctype_id(&self, kind: DoctypeIdKind) {
        let mut id = self.doctype_id(kind);
        match *id {
            Some(ref mut s) => s.clear(),
            None => *id = Some(StrTendril::new()),
        }
    }

    fn consume_char_ref(&self) {
        *self.char_ref_tokenizer.borrow_mut() = Some(Box::new(CharRefTokenizer::new(matches!(
            self.state.get(),
            states::AttributeValue(_)
        ))));
    }

    fn emit_eof(&self) {
        self.process_token_and_continue(EOFToken);
    }

    fn peek(&self, input: &BufferQueue) -> Option<char> {
        if self.reconsume.get() {
            Some(self.current_char.get())
        } else {
            input.peek()
        }
    }

    fn discard_char(&self, input: &BufferQueue) {
        if self.reconsume.get() {
            self.reconsume.set(false);
        } else {
            input.next();
        }
    }

    fn clear_ignore_lf(&self) {
        self.ignore_lf.set(false);
    }

    fn emit_error(&self, error: Cow<'static, str>) {
        self.process_token_and_continue(ParseError(error));
    }

    fn emit_tag_and_continue(&self, next: states::State) -> ProcessResult<Sink::Handle> {
        self.state.set(next);
        self.emit_current_tag()
    }
}

macro_rules! get_char {
    ($me:expr, $input:expr) => {
        match $me.get_char($input) {
            Some(c) => c,
            None => return ProcessResult::Suspend,
        }
    };
}

macro_rules! peek_char {
    ($me:expr, $input:expr) => {
        match $me.peek($input) {
            Some(c) => c,
            None => return ProcessResult::Suspend,
        }
    };
}

macro_rules! pop_except_from {
    ($me:expr, $input:expr, $set:expr) => {
        match $me.pop_except_from($input, $set) {
            Some(r) => r,
            None => return ProcessResult::Suspend,
        }
    };
}

macro_rules! eat {
    ($me:expr, $input:expr, $pat:expr) => {
        match $me.eat($input, $pat, u8::eq_ignore_ascii_case) {
            Some(r) => r,
            None => return ProcessResult::Suspend,
        }
    };
}

impl<Sink: TokenSink> Tokenizer<Sink> {
    fn step(&self, input: &BufferQueue) -> ProcessResult<Sink::Handle> {
        if self.char_ref_tokenizer.borrow().is_some() {
            return self.step_char_ref_tokenizer(input);
        }

        trace!("processing in state {:?}", self.state.get());
        match self.state.get() {
            //§ data-state
            states::Data => {
                let set = small_char_set!('\r' '\0' '&' '<' '\n');
                match pop_except_from!(self, input, set) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\0');
                    },
                    FromSet('&') => {
                        self.consume_char_ref();
                    },
                    FromSet('<') => {
                        self.state.set(states::TagOpen);
                    },
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
                ProcessResult::Continue
            },

            //§ plaintext-state
            states::Plaintext => {
                let set = small_char_set!('\r' '\0' '\n');
                match pop_except_from!(self, input, set) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
                ProcessResult::Continue
            },

            //§ tag-open-state
            states::TagOpen => {
                let c = get_char!(self, input);
                match c {
                    '!' => self.state.set(states::MarkupDeclarationOpen),
                    '/' => self.state.set(states::EndTagOpen),
                    'a'..='z' | 'A'..='Z' => {
                        self.create_tag(StartTag, '\0');
                        self.reconsume.set(true);
                        self.current_tag_name.borrow_mut().clear();
                        self.state.set(states::TagName);
                    },
                    '?' => {
                        self.bad_char_error();
                        self.current_comment.borrow_mut().clear();
                        self.reconsume.set(true);
                        self.state.set(states::BogusComment);
                    },
                    _ => {
                        self.bad_char_error();
                        self.emit_char('<');
                        self.reconsume.set(true);
                        self.state.set(states::Data);
                    },
                }
                ProcessResult::Continue
            },

            //§ end-tag-open-state
            states::EndTagOpen => {
                let c = get_char!(self, input);
                match c {
                    'a'..='z' | 'A'..='Z' => {
                        self.create_tag(EndTag, '\0');
                        self.current_tag_name.borrow_mut().clear();
                        self.reconsume.set(true);
                        self.state.set(states::TagName);
                    },
                    '>' => {
                        self.bad_char_error();
                        self.state.set(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_comment.borrow_mut().clear();
                        self.reconsume.set(true);
                        self.state.set(states::BogusComment);
                    },
                }
                ProcessResult::Continue
            },

            //§ tag-name-state
            states::TagName => loop {
                let set = small_char_set!('\r' '\t' '\n' '\x0C' ' ' '/' '>');
                match pop_except_from!(self, input, set) {
                    FromSet('\t') | FromSet('\n') | FromSet('\x0C') | FromSet(' ') => {
                        self.state.set(states::BeforeAttributeName);
                        return ProcessResult::Continue;
                    },
                    FromSet('/') => {
                        self.state.set(states::SelfClosingStartTag);
                        return ProcessResult::Continue;
                    },
                    FromSet('>') => return self.emit_tag_and_continue(states::Data),
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.current_tag_name.borrow_mut().push_char('\u{fffd}');
                    },
                    FromSet(c) => self
                        .current_tag_name
                        .borrow_mut()
                        .push_char(c.to_ascii_lowercase()),
                    NotFromSet(b) => {
                        let lower = lower_ascii_tendril(&b);
                        self.current_tag_name.borrow_mut().push_tendril(lower);
                    },
                }
            },

            //§ rawtext-rcdata-script-data-states
            states::RawData(Rawtext) => self.step_raw_data(input, Rawtext),
            states::RawData(Rcdata) => self.step_raw_data(input, Rcdata),
            states::RawData(ScriptData) => self.step_raw_data(input, ScriptData),
            states::RawData(k @ ScriptDataEscaped(_)) => self.step_raw_data(input, k),

            states::RawLessThanSign(kind) => {
                let c = get_char!(self, input);
                match (kind, c) {
                    (_, '/') => {
                        self.clear_temp_buf();
                        self.state.set(states::RawEndTagOpen(kind));
                    },
                    (ScriptData, '!') => {
                        self.emit_chars("<!".into());
                        self.state
                            .set(states::ScriptDataEscapeStart(Escaped));
                    },
                    _ => {
                        self.emit_char('<');
                        self.reconsume.set(true);
                        self.state.set(states::RawData(kind));
                    },
                }
                ProcessResult::Continue
            },

            states::RawEndTagOpen(kind) => {
                let c = get_char!(self, input);
                match c {
                    'a'..='z' | 'A'..='Z' => {
                        self.create_tag(EndTag, '\0');
                        self.current_tag_name.borrow_mut().clear();
                        self.temp_buf.borrow_mut().push_char(c);
                        self.reconsume.set(true);
                        self.state.set(states::RawEndTagName(kind));
                    },
                    _ => {
                        self.emit_chars("</".into());
                        self.reconsume.set(true);
                        self.state.set(states::RawData(kind));
                    },
                }
                ProcessResult::Continue
            },

            states::RawEndTagName(kind) => {
                let c = get_char!(self, input);
                let is_appropriate = {
                    let buf_matches = self.have_appropriate_end_tag_name_char(c);
                    buf_matches
                };
                match c {
                    '\t' | '\n' | '\x0C' | ' ' if is_appropriate => {
                        self.state.set(states::BeforeAttributeName);
                    },
                    '/' if is_appropriate => {
                        self.state.set(states::SelfClosingStartTag);
                    },
                    '>' if is_appropriate => {
                        return self.emit_tag_and_continue(states::Data);
                    },
                    'a'..='z' | 'A'..='Z' => {
                        self.current_tag_name
                            .borrow_mut()
                            .push_char(c.to_ascii_lowercase());
                        self.temp_buf.borrow_mut().push_char(c);
                    },
                    _ => {
                        self.emit_chars("</".into());
                        self.emit_temp_buf();
                        self.reconsume.set(true);
                        self.state.set(states::RawData(kind));
                    },
                }
                ProcessResult::Continue
            },

            states::ScriptDataEscapeStart(kind) => {
                let c = get_char!(self, input);
                match c {
                    '-' => {
                        self.emit_char('-');
                        self.state.set(states::ScriptDataEscapeStartDash);
                    },
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::RawData(ScriptData));
                        let _ = kind;
                    },
                }
                ProcessResult::Continue
            },

            states::ScriptDataEscapeStartDash => {
                let c = get_char!(self, input);
                match c {
                    '-' => {
                        self.emit_char('-');
                        self.state
                            .set(states::ScriptDataEscapedDashDash(Escaped));
                    },
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::RawData(ScriptData));
                    },
                }
                ProcessResult::Continue
            },

            states::ScriptDataEscapedDash(kind) => {
                let c = get_char!(self, input);
                match c {
                    '-' => {
                        self.emit_char('-');
                        self.state.set(states::ScriptDataEscapedDashDash(kind));
                    },
                    '<' => {
                        self.reconsume.set(true);
                        self.state.set(states::RawLessThanSign(
                            states::RawKind::ScriptDataEscaped(kind),
                        ));
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                        self.state.set(states::RawData(states::RawKind::ScriptDataEscaped(kind)));
                    },
                    _ => {
                        self.emit_char(c);
                        self.state.set(states::RawData(states::RawKind::ScriptDataEscaped(kind)));
                    },
                }
                ProcessResult::Continue
            },

            states::ScriptDataEscapedDashDash(kind) => {
                let c = get_char!(self, input);
                match c {
                    '-' => self.emit_char('-'),
                    '<' => {
                        self.reconsume.set(true);
                        self.state.set(states::RawLessThanSign(
                            states::RawKind::ScriptDataEscaped(kind),
                        ));
                    },
                    '>' => {
                        self.emit_char('>');
                        self.state.set(states::RawData(ScriptData));
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                        self.state.set(states::RawData(states::RawKind::ScriptDataEscaped(kind)));
                    },
                    _ => {
                        self.emit_char(c);
                        self.state.set(states::RawData(states::RawKind::ScriptDataEscaped(kind)));
                    },
                }
                ProcessResult::Continue
            },

            states::ScriptDataDoubleEscapeEnd => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                        let kind = if self.temp_buf_is("script") {
                            ScriptEscapeKindStateHack::DoubleEscaped
                        } else {
                            ScriptEscapeKindStateHack::Escaped
                        };
                        self.emit_char(c);
                        self.state.set(match kind {
                            ScriptEscapeKindStateHack::DoubleEscaped => {
                                states::RawData(states::RawKind::ScriptDataEscaped(Escaped))
                            },
                            ScriptEscapeKindStateHack::Escaped => {
                                states::RawData(states::RawKind::ScriptDataEscaped(DoubleEscaped))
                            },
                        });
                    },
                    'a'..='z' | 'A'..='Z' => {
                        self.temp_buf.borrow_mut().push_char(c.to_ascii_lowercase());
                        self.emit_char(c);
                    },
                    _ => {
                        self.reconsume.set(true);
                        self.state
                            .set(states::RawData(states::RawKind::ScriptDataEscaped(DoubleEscaped)));
                    },
                }
                ProcessResult::Continue
            },

            //§ attribute-states
            states::BeforeAttributeName => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '/' => self.state.set(states::SelfClosingStartTag),
                    '>' => return self.emit_tag_and_continue(states::Data),
                    'A'..='Z' => self.create_attribute(c.to_ascii_lowercase()),
                    '\0' => {
                        self.bad_char_error();
                        self.create_attribute('\u{fffd}');
                    },
                    '"' | '\'' | '<' | '=' => {
                        self.bad_char_error();
                        self.create_attribute(c);
                        self.state.set(states::AttributeName);
                        return ProcessResult::Continue;
                    },
                    _ => self.create_attribute(c),
                }
                if !matches!(c, '\t' | '\n' | '\x0C' | ' ' | '/') {
                    if c != '>' {
                        self.state.set(states::AttributeName);
                    }
                }
                ProcessResult::Continue
            },

            states::AttributeName => loop {
                let set = small_char_set!('\r' '\t' '\n' '\x0C' ' ' '/' '>' '=');
                match pop_except_from!(self, input, set) {
                    FromSet('\t') | FromSet('\n') | FromSet('\x0C') | FromSet(' ') => {
                        self.state.set(states::AfterAttributeName);
                        return ProcessResult::Continue;
                    },
                    FromSet('/') => {
                        self.finish_attribute();
                        self.state.set(states::SelfClosingStartTag);
                        return ProcessResult::Continue;
                    },
                    FromSet('=') => {
                        self.state.set(states::BeforeAttributeValue);
                        return ProcessResult::Continue;
                    },
                    FromSet('>') => return self.emit_tag_and_continue(states::Data),
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.current_attr_name.borrow_mut().push_char('\u{fffd}');
                    },
                    FromSet(c) => self
                        .current_attr_name
                        .borrow_mut()
                        .push_char(c.to_ascii_lowercase()),
                    NotFromSet(b) => {
                        let lower = lower_ascii_tendril(&b);
                        self.current_attr_name.borrow_mut().push_tendril(lower);
                    },
                }
            },

            states::AfterAttributeName => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '/' => self.state.set(states::SelfClosingStartTag),
                    '=' => self.state.set(states::BeforeAttributeValue),
                    '>' => return self.emit_tag_and_continue(states::Data),
                    'A'..='Z' => {
                        self.create_attribute(c.to_ascii_lowercase());
                        self.state.set(states::AttributeName);
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.create_attribute('\u{fffd}');
                        self.state.set(states::AttributeName);
                    },
                    _ => {
                        self.create_attribute(c);
                        self.state.set(states::AttributeName);
                    },
                }
                ProcessResult::Continue
            },

            states::BeforeAttributeValue => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => ProcessResult::Continue,
                    '"' => {
                        self.state.set(states::AttributeValue(DoubleQuoted));
                        ProcessResult::Continue
                    },
                    '\'' => {
                        self.state.set(states::AttributeValue(SingleQuoted));
                        ProcessResult::Continue
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.current_attr_value.borrow_mut().push_char('\u{fffd}');
                        self.state.set(states::AttributeValue(Unquoted));
                        ProcessResult::Continue
                    },
                    '>' => {
                        self.bad_char_error();
                        self.emit_tag_and_continue(states::Data)
                    },
                    _ => {
                        self.current_attr_value.borrow_mut().push_char(c);
                        self.state.set(states::AttributeValue(Unquoted));
                        ProcessResult::Continue
                    },
                }
            },

            states::AttributeValue(DoubleQuoted) => {
                self.step_attr_value(input, '"', states::AfterAttributeValueQuoted)
            },
            states::AttributeValue(SingleQuoted) => {
                self.step_attr_value(input, '\'', states::AfterAttributeValueQuoted)
            },
            states::AttributeValue(Unquoted) => loop {
                let set = small_char_set!('\r' '\t' '\n' '\x0C' ' ' '&' '>' '\0');
                match pop_except_from!(self, input, set) {
                    FromSet('\t') | FromSet('\n') | FromSet('\x0C') | FromSet(' ') => {
                        self.state.set(states::BeforeAttributeName);
                        return ProcessResult::Continue;
                    },
                    FromSet('&') => {
                        self.consume_char_ref();
                        return ProcessResult::Continue;
                    },
                    FromSet('>') => return self.emit_tag_and_continue(states::Data),
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.current_attr_value.borrow_mut().push_char('\u{fffd}');
                    },
                    FromSet(c) => self.current_attr_value.borrow_mut().push_char(c),
                    NotFromSet(b) => self.current_attr_value.borrow_mut().push_tendril(b),
                }
            },

            states::AfterAttributeValueQuoted => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => self.state.set(states::BeforeAttributeName),
                    '/' => self.state.set(states::SelfClosingStartTag),
                    '>' => return self.emit_tag_and_continue(states::Data),
                    _ => {
                        self.bad_char_error();
                        self.reconsume.set(true);
                        self.state.set(states::BeforeAttributeName);
                    },
                }
                ProcessResult::Continue
            },

            states::SelfClosingStartTag => {
                let c = get_char!(self, input);
                match c {
                    '>' => {
                        self.current_tag_self_closing.set(true);
                        return self.emit_tag_and_continue(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        self.reconsume.set(true);
                        self.state.set(states::BeforeAttributeName);
                    },
                }
                ProcessResult::Continue
            },

            //§ markup-declaration-comment-states
            states::MarkupDeclarationOpen => {
                if eat_exact!(self, input, "--") {
                    self.current_comment.borrow_mut().clear();
                    self.state.set(states::CommentStart);
                } else if eat!(self, input, "doctype") {
                    self.state.set(states::Doctype);
                } else if self.sink.adjusted_current_node_present_but_not_in_html_namespace()
                    && eat_exact!(self, input, "[CDATA[")
                {
                    self.clear_temp_buf();
                    self.state.set(states::CdataSection);
                } else {
                    self.bad_char_error();
                    self.current_comment.borrow_mut().clear();
                    self.state.set(states::BogusComment);
                }
                ProcessResult::Continue
            },

            states::BogusComment => loop {
                let set = small_char_set!('\r' '>' '\0' '\n');
                match pop_except_from!(self, input, set) {
                    FromSet('>') => {
                        self.emit_current_comment();
                        self.state.set(states::Data);
                        return ProcessResult::Continue;
                    },
                    FromSet('\0') => self.current_comment.borrow_mut().push_char('\u{fffd}'),
                    FromSet(c) => self.current_comment.borrow_mut().push_char(c),
                    NotFromSet(b) => self.current_comment.borrow_mut().push_tendril(b),
                }
            },

            states::CommentStart => {
                let c = get_char!(self, input);
                match c {
                    '-' => self.state.set(states::CommentStartDash),
                    '>' => {
                        self.bad_char_error();
                        self.emit_current_comment();
                        self.state.set(states::Data);
                    },
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentStartDash => {
                let c = get_char!(self, input);
                match c {
                    '-' => self.state.set(states::CommentEnd),
                    '>' => {
                        self.bad_char_error();
                        self.emit_current_comment();
                        self.state.set(states::Data);
                    },
                    _ => {
                        self.current_comment.borrow_mut().push_char('-');
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            states::Comment => loop {
                let set = small_char_set!('\r' '<' '-' '\0' '\n');
                match pop_except_from!(self, input, set) {
                    FromSet('<') => {
                        self.current_comment.borrow_mut().push_char('<');
                        self.state.set(states::CommentLessThanSign);
                        return ProcessResult::Continue;
                    },
                    FromSet('-') => {
                        self.state.set(states::CommentEndDash);
                        return ProcessResult::Continue;
                    },
                    FromSet('\0') => self.current_comment.borrow_mut().push_char('\u{fffd}'),
                    FromSet(c) => self.current_comment.borrow_mut().push_char(c),
                    NotFromSet(b) => self.current_comment.borrow_mut().push_tendril(b),
                }
            },

            states::CommentLessThanSign => {
                let c = get_char!(self, input);
                match c {
                    '!' => {
                        self.current_comment.borrow_mut().push_char('!');
                        self.state.set(states::CommentLessThanSignBang);
                    },
                    '<' => self.current_comment.borrow_mut().push_char('<'),
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentLessThanSignBang => {
                let c = get_char!(self, input);
                match c {
                    '-' => self.state.set(states::CommentLessThanSignBangDash),
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentLessThanSignBangDash => {
                let c = get_char!(self, input);
                match c {
                    '-' => self.state.set(states::CommentLessThanSignBangDashDash),
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::CommentEndDash);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentLessThanSignBangDashDash => {
                let c = get_char!(self, input);
                match c {
                    '>' => {
                        self.reconsume.set(true);
                        self.state.set(states::CommentEnd);
                    },
                    _ => {
                        self.bad_char_error();
                        self.reconsume.set(true);
                        self.state.set(states::CommentEnd);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentEndDash => {
                let c = get_char!(self, input);
                match c {
                    '-' => self.state.set(states::CommentEnd),
                    _ => {
                        self.current_comment.borrow_mut().push_char('-');
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentEnd => {
                let c = get_char!(self, input);
                match c {
                    '>' => {
                        self.emit_current_comment();
                        self.state.set(states::Data);
                    },
                    '!' => self.state.set(states::CommentEndBang),
                    '-' => self.current_comment.borrow_mut().push_char('-'),
                    _ => {
                        self.current_comment.borrow_mut().push_slice("--");
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            states::CommentEndBang => {
                let c = get_char!(self, input);
                match c {
                    '-' => {
                        self.current_comment.borrow_mut().push_slice("--!");
                        self.state.set(states::CommentEndDash);
                    },
                    '>' => {
                        self.bad_char_error();
                        self.emit_current_comment();
                        self.state.set(states::Data);
                    },
                    _ => {
                        self.current_comment.borrow_mut().push_slice("--!");
                        self.reconsume.set(true);
                        self.state.set(states::Comment);
                    },
                }
                ProcessResult::Continue
            },

            //§ doctype-states
            states::Doctype => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => self.state.set(states::BeforeDoctypeName),
                    _ => {
                        self.reconsume.set(true);
                        self.state.set(states::BeforeDoctypeName);
                    },
                }
                ProcessResult::Continue
            },

            states::BeforeDoctypeName => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => ProcessResult::Continue,
                    'A'..='Z' => {
                        *self.current_doctype.borrow_mut() = Doctype::default();
                        option_push(&mut self.current_doctype.borrow_mut().name, c.to_ascii_lowercase());
                        self.state.set(states::DoctypeName);
                        ProcessResult::Continue
                    },
                    '\0' => {
                        self.bad_char_error();
                        *self.current_doctype.borrow_mut() = Doctype::default();
                        option_push(&mut self.current_doctype.borrow_mut().name, '\u{fffd}');
                        self.state.set(states::DoctypeName);
                        ProcessResult::Continue
                    },
                    '>' => {
                        self.bad_char_error();
                        *self.current_doctype.borrow_mut() = Doctype::default();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                        ProcessResult::Continue
                    },
                    _ => {
                        *self.current_doctype.borrow_mut() = Doctype::default();
                        option_push(&mut self.current_doctype.borrow_mut().name, c);
                        self.state.set(states::DoctypeName);
                        ProcessResult::Continue
                    },
                }
            },

            states::DoctypeName => loop {
                let set = small_char_set!('\r' '\t' '\n' '\x0C' ' ' '>' '\0');
                match pop_except_from!(self, input, set) {
                    FromSet('\t') | FromSet('\n') | FromSet('\x0C') | FromSet(' ') => {
                        self.state.set(states::AfterDoctypeName);
                        return ProcessResult::Continue;
                    },
                    FromSet('>') => {
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                        return ProcessResult::Continue;
                    },
                    FromSet('\0') => {
                        self.bad_char_error();
                        option_push(&mut self.current_doctype.borrow_mut().name, '\u{fffd}');
                    },
                    FromSet(c) => option_push(
                        &mut self.current_doctype.borrow_mut().name,
                        c.to_ascii_lowercase(),
                    ),
                    NotFromSet(b) => {
                        let lower = lower_ascii_tendril(&b);
                        let mut doctype = self.current_doctype.borrow_mut();
                        match doctype.name {
                            Some(ref mut s) => s.push_tendril(lower),
                            None => doctype.name = Some(lower),
                        }
                    },
                }
            },

            states::AfterDoctypeName => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => ProcessResult::Continue,
                    '>' => {
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                        ProcessResult::Continue
                    },
                    _ => {
                        if self.eat_keyword_ci(input, "public") {
                            self.state.set(states::AfterDoctypeKeyword(Public));
                        } else if self.eat_keyword_ci(input, "system") {
                            self.state.set(states::AfterDoctypeKeyword(System));
                        } else {
                            self.bad_char_error();
                            self.current_doctype.borrow_mut().force_quirks = true;
                            self.reconsume.set(true);
                            self.state.set(states::BogusDoctype);
                        }
                        ProcessResult::Continue
                    },
                }
            },

            states::AfterDoctypeKeyword(kind) => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        self.state.set(states::BeforeDoctypeIdentifier(kind))
                    },
                    '"' => {
                        self.bad_char_error();
                        self.clear_doctype_id(kind);
                        self.state
                            .set(states::DoctypeIdentifierDoubleQuoted(kind));
                    },
                    '\'' => {
                        self.bad_char_error();
                        self.clear_doctype_id(kind);
                        self.state
                            .set(states::DoctypeIdentifierSingleQuoted(kind));
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.reconsume.set(true);
                        self.state.set(states::BogusDoctype);
                    },
                }
                ProcessResult::Continue
            },

            states::BeforeDoctypeIdentifier(kind) => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '"' => {
                        self.clear_doctype_id(kind);
                        self.state
                            .set(states::DoctypeIdentifierDoubleQuoted(kind));
                    },
                    '\'' => {
                        self.clear_doctype_id(kind);
                        self.state
                            .set(states::DoctypeIdentifierSingleQuoted(kind));
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.reconsume.set(true);
                        self.state.set(states::BogusDoctype);
                    },
                }
                ProcessResult::Continue
            },

            states::DoctypeIdentifierDoubleQuoted(kind) => {
                self.step_doctype_identifier(input, kind, '"')
            },
            states::DoctypeIdentifierSingleQuoted(kind) => {
                self.step_doctype_identifier(input, kind, '\'')
            },

            states::AfterDoctypeIdentifier(kind) => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        if kind == Public {
                            self.state
                                .set(states::BetweenDoctypePublicAndSystemIdentifiers);
                        }
                    },
                    '>' => {
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                    },
                    '"' if kind == Public => {
                        self.bad_char_error();
                        self.clear_doctype_id(System);
                        self.state
                            .set(states::DoctypeIdentifierDoubleQuoted(System));
                    },
                    '\'' if kind == Public => {
                        self.bad_char_error();
                        self.clear_doctype_id(System);
                        self.state
                            .set(states::DoctypeIdentifierSingleQuoted(System));
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.reconsume.set(true);
                        self.state.set(states::BogusDoctype);
                    },
                }
                ProcessResult::Continue
            },

            states::BetweenDoctypePublicAndSystemIdentifiers => {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '>' => {
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                    },
                    '"' => {
                        self.clear_doctype_id(System);
                        self.state
                            .set(states::DoctypeIdentifierDoubleQuoted(System));
                    },
                    '\'' => {
                        self.clear_doctype_id(System);
                        self.state
                            .set(states::DoctypeIdentifierSingleQuoted(System));
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.borrow_mut().force_quirks = true;
                        self.reconsume.set(true);
                        self.state.set(states::BogusDoctype);
                    },
                }
                ProcessResult::Continue
            },

            states::BogusDoctype => {
                let c = get_char!(self, input);
                match c {
                    '>' => {
                        self.emit_current_doctype();
                        self.state.set(states::Data);
                    },
                    '\0' => self.bad_char_error(),
                    _ => (),
                }
                ProcessResult::Continue
            },

            //§ cdata-states
            states::CdataSection => loop {
                let set = small_char_set!('\r' ']' '\0' '\n');
                match pop_except_from!(self, input, set) {
                    FromSet(']') => {
                        self.state.set(states::CdataSectionBracket);
                        return ProcessResult::Continue;
                    },
                    FromSet('\0') => self.emit_char('\0'),
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::CdataSectionBracket => {
                let c = get_char!(self, input);
                match c {
                    ']' => self.state.set(states::CdataSectionEnd),
                    _ => {
                        self.emit_char(']');
                        self.reconsume.set(true);
                        self.state.set(states::CdataSection);
                    },
                }
                ProcessResult::Continue
            },

            states::CdataSectionEnd => {
                let c = get_char!(self, input);
                match c {
                    ']' => self.emit_char(']'),
                    '>' => self.state.set(states::Data),
                    _ => {
                        self.emit_chars("]]".into());
                        self.reconsume.set(true);
                        self.state.set(states::CdataSection);
                    },
                }
                ProcessResult::Continue
            },
        }
    }

    fn step_raw_data(
        &self,
        input: &BufferQueue,
        kind: states::RawKind,
    ) -> ProcessResult<Sink::Handle> {
        loop {
            let less_than_allowed = !matches!(kind, ScriptData if false);
            let set = small_char_set!('\r' '\0' '\n' '<');
            match pop_except_from!(self, input, set) {
                FromSet('\0') => {
                    self.bad_char_error();
                    self.emit_char('\u{fffd}');
                },
                FromSet('<') if less_than_allowed => {
                    self.reconsume.set(true);
                    self.state.set(states::RawLessThanSign(kind));
                    return ProcessResult::Continue;
                },
                FromSet(c) => self.emit_char(c),
                NotFromSet(b) => self.emit_chars(b),
            }
        }
    }

    fn step_attr_value(
        &self,
        input: &BufferQueue,
        quote: char,
        next: states::State,
    ) -> ProcessResult<Sink::Handle> {
        loop {
            let set = small_char_set!('\r' '\n' '&' '\0') ;
            let _ = quote;
            match self.peek(input) {
                None => return ProcessResult::Suspend,
                Some(c) if c == quote => {
                    self.discard_char(input);
                    self.state.set(next);
                    return ProcessResult::Continue;
                },
                Some('&') => {
                    self.discard_char(input);
                    self.consume_char_ref();
                    return ProcessResult::Continue;
                },
                Some('\0') => {
                    self.discard_char(input);
                    self.bad_char_error();
                    self.current_attr_value.borrow_mut().push_char('\u{fffd}');
                },
                Some(_) => match pop_except_from!(self, input, small_char_set!('\r' '\n' quote '&' '\0')) {
                    FromSet(c) => self.current_attr_value.borrow_mut().push_char(c),
                    NotFromSet(b) => self.current_attr_value.borrow_mut().push_tendril(b),
                },
            }
            let _ = set;
        }
    }

    fn step_doctype_identifier(
        &self,
        input: &BufferQueue,
        kind: DoctypeIdKind,
        quote: char,
    ) -> ProcessResult<Sink::Handle> {
        let c = get_char!(self, input);
        match c {
            c if c == quote => {
                self.state.set(states::AfterDoctypeIdentifier(kind));
            },
            '\0' => {
                self.bad_char_error();
                option_push(&mut self.doctype_id(kind), '\u{fffd}');
            },
            '>' => {
                self.bad_char_error();
                self.current_doctype.borrow_mut().force_quirks = true;
                self.emit_current_doctype();
                self.state.set(states::Data);
            },
            _ => option_push(&mut self.doctype_id(kind), c),
        }
        ProcessResult::Continue
    }

    fn eat_keyword_ci(&self, input: &BufferQueue, kw: &str) -> bool {
        matches!(self.eat(input, kw, u8::eq_ignore_ascii_case), Some(true))
    }

    fn temp_buf_is(&self, s: &str) -> bool {
        &**self.temp_buf.borrow() == s
    }

    fn have_appropriate_end_tag_name_char(&self, _c: char) -> bool {
        self.have_appropriate_end_tag()
    }

    fn step_char_ref_tokenizer(&self, input: &BufferQueue) -> ProcessResult<Sink::Handle> {
        let mut char_ref_tokenizer = self.char_ref_tokenizer.borrow_mut().take().unwrap();
        let status = char_ref_tokenizer.step(self, input);
        match status {
            char_ref::Status::Stuck => {
                *self.char_ref_tokenizer.borrow_mut() = Some(char_ref_tokenizer);
                ProcessResult::Suspend
            },
            char_ref::Status::Progress => {
                *self.char_ref_tokenizer.borrow_mut() = Some(char_ref_tokenizer);
                ProcessResult::Continue
            },
            char_ref::Status::Done(char_ref) => {
                self.process_char_ref(char_ref);
                ProcessResult::Continue
            },
        }
    }

    fn process_char_ref(&self, char_ref: CharRef) {
        let CharRef { chars, num_chars } = char_ref;
        for &c in chars.iter().take(num_chars as usize) {
            match self.state.get() {
                states::AttributeValue(_) => {
                    self.current_attr_value.borrow_mut().push_char(c);
                },
                _ => self.emit_char(c),
            }
        }
    }
}

enum ScriptEscapeKindStateHack {
    Escaped,
    DoubleEscaped,
}

fn lower_ascii_tendril(b: &StrTendril) -> StrTendril {
    if b.bytes().any(|c| c.is_ascii_uppercase()) {
        let mut out = StrTendril::new();
        for c in b.chars() {
            out.push_char(c.to_ascii_lowercase());
        }
        out
    } else {
        b.clone()
    }
}

macro_rules! eat_exact {
    ($me:expr, $input:expr, $pat:expr) => {
        match $me.eat($input, $pat, u8::eq) {
            Some(r) => r,
            None => return ProcessResult::Suspend,
        }
    };
}
use eat_exact;

#[cfg(test)]
mod tests {
    use super::*;
    use html_tree_dom::BufferQueue;
    use std::cell::RefCell;
    use tendril::SliceExt;

    struct Sink {
        tokens: RefCell<Vec<Token>>,
    }

    impl TokenSink for Sink {
        type Handle = ();
        fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
            self.tokens.borrow_mut().push(token);
            TokenSinkResult::Continue
        }
    }

    fn tokenize(input: &str) -> Vec<Token> {
        let sink = Sink {
            tokens: RefCell::new(Vec::new()),
        };
        let tok = Tokenizer::new(sink, TokenizerOpts::default());
        let buffer = BufferQueue::new();
        buffer.push_back(input.to_tendril());
        tok.feed(&buffer);
        tok.end(&buffer);
        tok.sink.tokens.into_inner()
    }

    #[test]
    fn tokenizes_simple_tag_and_text() {
        let tokens = tokenize("<p>hi</p>");
        let tags: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                TagToken(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(tags.len(), 2);
        assert_eq!(&*tags[0].name, "p");
        assert_eq!(tags[0].kind, StartTag);
        assert_eq!(tags[1].kind, EndTag);
    }

    #[test]
    fn named_char_ref_notin_without_semicolon_splits() {
        let tokens = tokenize("&notin");
        let text: String = tokens
            .iter()
            .filter_map(|t| match t {
                CharacterTokens(s) => Some(s.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "\u{00AC}in");
        assert!(tokens
            .iter()
            .any(|t| matches!(t, ParseError(_))));
    }

    #[test]
    fn named_char_ref_notin_with_semicolon() {
        let tokens = tokenize("&notin;");
        let text: String = tokens
            .iter()
            .filter_map(|t| match t {
                CharacterTokens(s) => Some(s.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "\u{2209}");
    }

    #[test]
    fn duplicate_attribute_is_dropped() {
        let tokens = tokenize(r#"<p id="a" id="b">"#);
        let tag = tokens
            .iter()
            .find_map(|t| match t {
                TagToken(tag) => Some(tag.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(tag.attrs.len(), 1);
        assert_eq!(&*tag.attrs[0].value, "a");
    }
}
