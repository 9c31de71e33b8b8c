//! Heuristic, single-pass JavaScript minifier.
//!
//! This is not a parser: it never builds an AST and never understands
//! statements or expressions as such. It tracks just enough state — one
//! token of lookbehind plus a three-state whitespace accumulator — to strip
//! whitespace and comments without changing what the code does. The two
//! places that state earns its keep are automatic-semicolon-insertion
//! safety (deciding which linebreaks are load-bearing) and the
//! division-vs-regex-literal ambiguity at `/`.
//!
//! The scanner is generic over an [`OutputSink`] so the exact same state
//! machine backs both [`minify`] (collects bytes) and [`minified_size`]
//! (counts them, without allocating the output).

use crate::error::MinifyError;
use crate::keywords::{self, KeywordClass};

/// Something a minifier pass can write its output into.
pub trait OutputSink {
    fn push_byte(&mut self, byte: u8);
    fn append_span(&mut self, bytes: &[u8]);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects the minified bytes.
#[derive(Debug, Default, Clone)]
pub struct VecSink(Vec<u8>);

impl VecSink {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl OutputSink for VecSink {
    fn push_byte(&mut self, byte: u8) {
        self.0.push(byte);
    }

    fn append_span(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Tracks only the output length, for `minified_size` callers who don't
/// want the allocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingSink(usize);

impl CountingSink {
    pub fn new() -> Self {
        Self(0)
    }
}

impl OutputSink for CountingSink {
    fn push_byte(&mut self, _byte: u8) {
        self.0 += 1;
    }

    fn append_span(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }

    fn len(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WsState {
    None,
    Space,
    Linebreak,
}

/// The previous-token tag, the other half of the scanner's tiny FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokTag {
    Start,
    Punct(u8),
    NameNumber,
    KeywordRegexOk,
    Regex,
    StringTok,
    CcComment,
    PlusPlus,
    MinusMinus,
}

const LINEBREAK_SUPPRESS_BYTES: &[u8] = b"=<>;:?|^&*/%,.([{!~+-";
const LINEBREAK_NEXT_BYTES: &[u8] = b"=<>;:?|^&*/%,.([{!~+-)]}";

fn ends_primary_expression(tag: TokTag) -> bool {
    matches!(
        tag,
        TokTag::NameNumber | TokTag::Regex | TokTag::StringTok | TokTag::Punct(b')') | TokTag::Punct(b']')
    )
}

fn in_linebreak_suppress_set(tag: TokTag) -> bool {
    match tag {
        TokTag::Start => true,
        TokTag::Punct(b) => LINEBREAK_SUPPRESS_BYTES.contains(&b),
        _ => false,
    }
}

fn in_linebreak_next_set(tag: TokTag) -> bool {
    match tag {
        TokTag::Punct(b) => LINEBREAK_NEXT_BYTES.contains(&b),
        _ => false,
    }
}

fn suppress_linebreak(prev: TokTag, next: TokTag) -> bool {
    in_linebreak_suppress_set(prev)
        || in_linebreak_next_set(next)
        || (ends_primary_expression(prev)
            && matches!(
                next,
                TokTag::Punct(b'(') | TokTag::Punct(b'[') | TokTag::Punct(b'+') | TokTag::Punct(b'-')
            ))
}

/// Join-prevention: would emitting `next` directly after `prev`, with no
/// separating byte, fuse into a different (or invalid) lexeme?
fn needs_join_separator(prev: TokTag, next: TokTag) -> bool {
    let ident_like = |t: TokTag| matches!(t, TokTag::NameNumber | TokTag::KeywordRegexOk);
    if ident_like(prev) && (ident_like(next) || next == TokTag::Regex) {
        return true;
    }
    if prev == TokTag::Punct(b'+') && matches!(next, TokTag::Punct(b'+') | TokTag::PlusPlus) {
        return true;
    }
    if prev == TokTag::PlusPlus && matches!(next, TokTag::Punct(b'+') | TokTag::PlusPlus) {
        return true;
    }
    if prev == TokTag::Punct(b'-') && matches!(next, TokTag::Punct(b'-') | TokTag::MinusMinus) {
        return true;
    }
    if prev == TokTag::MinusMinus && matches!(next, TokTag::Punct(b'-') | TokTag::MinusMinus) {
        return true;
    }
    if prev == TokTag::Punct(b'<') && next == TokTag::Punct(b'!') {
        return true;
    }
    if prev == TokTag::Punct(b'!') && next == TokTag::Punct(b'-') {
        return true;
    }
    if prev == TokTag::Punct(b'/') && next == TokTag::Regex {
        return true;
    }
    false
}

/// Decide what, if anything, to write before emitting `next`.
///
/// The very first token of the input always gets a leading `\n` — a
/// deliberate ASI-safety byte, not a reflection of the input's actual
/// leading whitespace (see the `function(){...}` scenario pinned in the
/// test module below). Every later decision is driven by the whitespace
/// state accumulated since the previous token.
fn separator_for(ws: WsState, prev: TokTag, next: TokTag) -> Option<u8> {
    if prev == TokTag::Start {
        return Some(b'\n');
    }
    match ws {
        WsState::None => None,
        WsState::Linebreak => {
            if suppress_linebreak(prev, next) {
                needs_join_separator(prev, next).then_some(b' ')
            } else {
                Some(b'\n')
            }
        }
        WsState::Space => needs_join_separator(prev, next).then_some(b' '),
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'\\' || b >= 0x80
}

fn is_ascii_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

struct Scanner<'a, S: OutputSink> {
    input: &'a [u8],
    i: usize,
    sink: S,
    ws: WsState,
    prev: TokTag,
    collapse_strings: bool,
}

impl<'a, S: OutputSink> Scanner<'a, S> {
    fn new(input: &'a [u8], sink: S, collapse_strings: bool) -> Self {
        Self {
            input,
            i: 0,
            sink,
            ws: WsState::None,
            prev: TokTag::Start,
            collapse_strings,
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.input[self.i..]
    }

    fn at_line_start(&self) -> bool {
        self.ws == WsState::Linebreak || (self.prev == TokTag::Start && self.ws == WsState::None)
    }

    fn run(mut self) -> Result<S, MinifyError> {
        while self.i < self.input.len() {
            let c = self.input[self.i];
            match c {
                b'\n' | b'\r' => {
                    self.ws = WsState::Linebreak;
                    self.i += 1;
                }
                b' ' | b'\t' => {
                    if self.ws == WsState::None {
                        self.ws = WsState::Space;
                    }
                    self.i += 1;
                }
                b'/' => self.handle_slash()?,
                b'\'' | b'"' | b'`' => self.handle_string(c)?,
                b'<' if self.rest().starts_with(b"<!--") => self.consume_line_comment_from(4),
                b'+' => self.handle_plus(),
                b'-' if self.at_line_start() && self.rest().starts_with(b"-->") => {
                    self.consume_line_comment_from(3)
                }
                b'-' => self.handle_minus(),
                b if is_ident_byte(b) => self.handle_ident_or_number()?,
                b => self.emit_punct(b),
            }
        }
        Ok(self.sink)
    }

    fn consume_line_comment_from(&mut self, prefix_len: usize) {
        self.i += prefix_len;
        while self.i < self.input.len() && self.input[self.i] != b'\n' && self.input[self.i] != b'\r'
        {
            self.i += 1;
        }
        self.ws = WsState::Linebreak;
    }

    fn handle_slash(&mut self) -> Result<(), MinifyError> {
        if self.rest().starts_with(b"//") {
            self.consume_line_comment_from(2);
            return Ok(());
        }
        if self.rest().starts_with(b"/*") {
            return self.handle_block_comment();
        }
        if ends_primary_expression(self.prev) {
            self.emit_punct(b'/');
        } else {
            self.handle_regex_literal()?;
        }
        Ok(())
    }

    fn handle_block_comment(&mut self) -> Result<(), MinifyError> {
        let start = self.i;
        let body_start = self.i + 2;
        let mut j = body_start;
        loop {
            if j + 1 > self.input.len() {
                return Err(MinifyError::UnterminatedComment(start));
            }
            if j + 1 == self.input.len() {
                return Err(MinifyError::UnterminatedComment(start));
            }
            if self.input[j] == b'*' && self.input[j + 1] == b'/' {
                break;
            }
            j += 1;
        }
        let body_end = j;
        self.i = j + 2;

        let is_cc = body_end > body_start
            && self.input[body_start] == b'@'
            && self.input[body_end - 1] == b'@';

        if is_cc {
            let full = &self.input[start..self.i];
            self.emit_verbatim(full, TokTag::CcComment);
        } else if self.ws == WsState::None {
            self.ws = WsState::Space;
        }
        Ok(())
    }

    fn handle_regex_literal(&mut self) -> Result<(), MinifyError> {
        let start = self.i;
        self.i += 1;
        let mut in_class = false;
        loop {
            if self.i >= self.input.len() {
                return Err(MinifyError::UnterminatedRegex(start));
            }
            let b = self.input[self.i];
            match b {
                b'\\' => {
                    self.i += 1;
                    if self.i >= self.input.len() {
                        return Err(MinifyError::UnterminatedRegex(start));
                    }
                    self.i += 1;
                }
                b'\n' | b'\r' => return Err(MinifyError::RegexInterruptedByNewline(self.i)),
                b'[' => {
                    in_class = true;
                    self.i += 1;
                }
                b']' => {
                    in_class = false;
                    self.i += 1;
                }
                b'/' if !in_class => {
                    self.i += 1;
                    break;
                }
                _ => self.i += 1,
            }
        }
        while self.i < self.input.len() && is_ascii_letter(self.input[self.i]) {
            self.i += 1;
        }
        let lexeme = &self.input[start..self.i];
        self.emit_verbatim(lexeme, TokTag::Regex);
        Ok(())
    }

    fn handle_string(&mut self, quote: u8) -> Result<(), MinifyError> {
        let start = self.i;
        self.i += 1;
        loop {
            if self.i >= self.input.len() {
                return Err(MinifyError::UnterminatedString(start));
            }
            let b = self.input[self.i];
            if b == b'\\' {
                self.i += 1;
                if self.i >= self.input.len() {
                    return Err(MinifyError::UnterminatedString(start));
                }
                self.i += 1;
                continue;
            }
            self.i += 1;
            if b == quote {
                break;
            }
        }
        if self.collapse_strings {
            let collapsed = [quote, quote];
            self.emit_verbatim(&collapsed, TokTag::StringTok);
        } else {
            let lexeme = &self.input[start..self.i];
            self.emit_verbatim(lexeme, TokTag::StringTok);
        }
        Ok(())
    }

    fn handle_ident_or_number(&mut self) -> Result<(), MinifyError> {
        let start = self.i;
        while self.i < self.input.len() && is_ident_byte(self.input[self.i]) {
            self.i += 1;
        }
        let lexeme = &self.input[start..self.i];
        let tag = match keywords::classify(lexeme) {
            KeywordClass::CanPrecedeRegex => TokTag::KeywordRegexOk,
            KeywordClass::Ordinary => TokTag::NameNumber,
        };
        self.emit_verbatim(lexeme, tag);
        Ok(())
    }

    fn handle_plus(&mut self) {
        if self.input.get(self.i + 1) == Some(&b'+') {
            let lexeme = &self.input[self.i..self.i + 2];
            self.i += 2;
            self.emit_verbatim(lexeme, TokTag::PlusPlus);
        } else {
            self.emit_punct(b'+');
        }
    }

    fn handle_minus(&mut self) {
        if self.input.get(self.i + 1) == Some(&b'-') {
            let lexeme = &self.input[self.i..self.i + 2];
            self.i += 2;
            self.emit_verbatim(lexeme, TokTag::MinusMinus);
        } else {
            self.emit_punct(b'-');
        }
    }

    fn emit_verbatim(&mut self, bytes: &[u8], tag: TokTag) {
        if let Some(sep) = separator_for(self.ws, self.prev, tag) {
            self.sink.push_byte(sep);
        }
        self.sink.append_span(bytes);
        self.prev = tag;
        self.ws = WsState::None;
    }

    fn emit_punct(&mut self, b: u8) {
        let tag = TokTag::Punct(b);
        if let Some(sep) = separator_for(self.ws, self.prev, tag) {
            self.sink.push_byte(sep);
        }
        self.sink.push_byte(b);
        self.prev = tag;
        self.ws = WsState::None;
        self.i += 1;
    }
}

fn run_scan<S: OutputSink>(input: &[u8], sink: S, collapse_strings: bool) -> Result<S, MinifyError> {
    Scanner::new(input, sink, collapse_strings).run()
}

/// Minify `input`, returning the minified byte stream.
///
/// On error the caller receives `Err`; no partial output is ever handed
/// back (see `error.rs` for the propagation policy).
pub fn minify(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    run_scan(input, VecSink::new(), false).map(VecSink::into_bytes)
}

/// Same algorithm as [`minify`], but only the output length is computed —
/// no bytes are allocated or copied.
pub fn minified_size(input: &[u8]) -> Result<usize, MinifyError> {
    run_scan(input, CountingSink::new(), false).map(|s| s.len())
}

/// Minify `input`, additionally collapsing every string literal's body to
/// nothing (keeping only the matching quote characters). Useful for size
/// estimation when the string contents are irrelevant noise (e.g. embedded
/// JSON payloads) but the surrounding code shape still matters.
pub fn minify_collapse_strings(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    run_scan(input, VecSink::new(), true).map(VecSink::into_bytes)
}

/// Size-only counterpart to [`minify_collapse_strings`].
pub fn minified_size_collapse_strings(input: &[u8]) -> Result<usize, MinifyError> {
    run_scan(input, CountingSink::new(), true).map(|s| s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(input: &str) -> String {
        String::from_utf8(minify(input.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn scenario_function_declaration() {
        assert_eq!(m("function () { foo(); }"), "\nfunction(){foo();}");
    }

    #[test]
    fn scenario_division_after_regex_flags() {
        assert_eq!(m("var x = /ab\\/c/g;"), "\nvar x=/ab\\/c/g;");
    }

    #[test]
    fn scenario_return_keeps_space_before_regex() {
        assert_eq!(m("return /x/g"), "\nreturn /x/g");
    }

    #[test]
    fn scenario_division_not_regex() {
        assert_eq!(m("a /b/ g"), "\na/b/g");
    }

    #[test]
    fn scenario_linebreak_before_plusplus_never_suppressed() {
        assert_eq!(m("i\n++"), "\ni\n++");
    }

    #[test]
    fn scenario_cc_comment_preserved_verbatim() {
        let out = m("/*@cc_on @*/var x=1;");
        assert!(out.contains("/*@cc_on @*/"));
        assert!(out.contains("var x=1;"));
    }

    #[test]
    fn scenario_unterminated_string_errors() {
        let result = minify(b"\"/* not valid javascript");
        assert!(matches!(result, Err(MinifyError::UnterminatedString(0))));
    }

    #[test]
    fn unterminated_block_comment_errors() {
        let result = minify(b"/* never closed");
        assert!(matches!(result, Err(MinifyError::UnterminatedComment(0))));
    }

    #[test]
    fn unterminated_regex_errors() {
        let result = minify(b"x=/abc");
        assert!(matches!(result, Err(MinifyError::UnterminatedRegex(2))));
    }

    #[test]
    fn regex_interrupted_by_raw_newline_errors() {
        let result = minify(b"x=/abc\ndef/;");
        assert!(matches!(result, Err(MinifyError::RegexInterruptedByNewline(_))));
    }

    #[test]
    fn line_comment_strips_to_end_of_line() {
        assert_eq!(m("a; // trailing comment\nb;"), "\na;\nb;");
    }

    #[test]
    fn sgml_comment_forms_are_recognized() {
        assert_eq!(m("<!-- old browser guard\na;"), "\na;");
        assert_eq!(m("a;\n--> still a comment\nb;"), "\na;\nb;");
    }

    #[test]
    fn plus_plus_plus_ambiguity_gets_a_separator() {
        assert_eq!(m("a + ++b;"), "\na+ ++b;");
        assert_eq!(m("a++ +b;"), "\na++ +b;");
    }

    #[test]
    fn minus_minus_minus_ambiguity_gets_a_separator() {
        assert_eq!(m("a - --b;"), "\na- --b;");
    }

    #[test]
    fn lt_bang_and_bang_dash_get_separators() {
        assert_eq!(m("a < !b;"), "\na< !b;");
        assert_eq!(m("!  -b;"), "\n! -b;");
    }

    #[test]
    fn collapse_strings_keeps_only_quotes() {
        let out = String::from_utf8(
            minify_collapse_strings(b"var s = 'hello world';").unwrap(),
        )
        .unwrap();
        assert_eq!(out, "\nvar s='';");
    }

    #[test]
    fn minified_size_matches_minify_length() {
        let src = b"function greet ( name ) {\n  return 'hi ' + name;\n}\n";
        let full = minify(src).unwrap();
        let size = minified_size(src).unwrap();
        assert_eq!(full.len(), size);
    }

    #[test]
    fn idempotent_on_already_minified_input() {
        let src = b"function greet(name){return 'hi '+name;}";
        let once = minify(src).unwrap();
        let twice = minify(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn monotone_size_for_realistic_input() {
        let src = b"function greet ( name ) {\n    // say hello\n    return 'hi ' + name;\n}\n";
        let out = minify(src).unwrap();
        assert!(out.len() <= src.len());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(minify(b"").unwrap(), Vec::<u8>::new());
        assert_eq!(minified_size(b"").unwrap(), 0);
    }

    #[test]
    fn identifiers_separated_by_whitespace_stay_separated() {
        assert_eq!(m("typeof x"), "\ntypeof x");
        assert_eq!(m("new Foo"), "\nnew Foo");
    }
}
