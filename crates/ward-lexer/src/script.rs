//! JavaScript tokenization.
//!
//! Three stages, each pulling from the one before:
//!
//! 1. the splitter cuts the input into strings, comments, numerals, words and
//!    punctuation, extending an operator only while each step is a complete
//!    operator;
//! 2. the joiner rejoins operators the splitter had to cut short (`...`) and
//!    decides from the previous token whether a `/` starts a regular
//!    expression literal;
//! 3. the classifier sorts words into keywords, numbers and identifiers.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::LazyLock;

use crate::lookahead::Lookahead;
use crate::span::{SourceId, Span};
use crate::stream::{CharStream, SourceStream};
use crate::token::{end_of_input, ScriptTokenKind, Token, TokenStream};
use crate::trie::PunctuationTrie;
use crate::diagnostics::{Message, MessageQueue};
use crate::{LexerError, MessageKind, ParseError};

const PUNCTUATION: &[&str] = &[
    "{", "}", "(", ")", "[", "]", ".", "...", ";", ",", "<", ">", "<=", ">=", "==", "!=", "===",
    "!==", "+", "-", "*", "%", "++", "--", "<<", ">>", ">>>", "&", "|", "^", "!", "~", "&&",
    "||", "?", ":", "=", "+=", "-=", "*=", "%=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "/",
    "/=",
];

static PUNCTUATION_TRIE: LazyLock<PunctuationTrie> =
    LazyLock::new(|| PunctuationTrie::new(PUNCTUATION.iter().copied()));

/// Reserved words, future reserved words, and the literal keywords.
const KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "implements", "import", "in", "instanceof", "interface", "let", "new", "null", "package",
    "private", "protected", "public", "return", "static", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Token texts after which a `/` starts a regular expression rather than a
/// division. `//` always starts a comment regardless.
const REGEX_PRECEDERS: &[&str] = &[
    "!", "!=", "!==", "#", "%", "%=", "&", "&&", "&&=", "&=", "(", "*", "*=", "+", "+=", ",",
    "-", "-=", "->", ".", "..", "...", "/", "/=", ":", "::", ";", "<", "<<", "<<=", "<=", "=",
    "==", "===", ">", ">=", ">>", ">>=", ">>>", ">>>=", "?", "@", "[", "^", "^=", "^^", "^^=",
    "{", "|", "|=", "||", "||=", "~", "abstract", "break", "case", "catch", "class", "const",
    "continue", "debugger", "default", "delete", "do", "else", "enum", "export", "extends",
    "field", "final", "finally", "for", "function", "goto", "if", "implements", "import", "in",
    "instanceof", "is", "namespace", "native", "new", "package", "return", "static", "switch",
    "synchronized", "throw", "throws", "transient", "try", "typeof", "use", "var", "volatile",
    "while", "with",
];

fn is_space(ch: char) -> bool {
    matches!(
        ch,
        ' ' | '\t'
            | '\r'
            | '\n'
            | '\u{c}'
            | '\u{a0}'
            | '\u{2000}'..='\u{200b}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{3000}'
            | '\u{feff}'
    )
}

fn is_line_separator(ch: char) -> bool {
    matches!(ch, '\r' | '\n' | '\u{2028}' | '\u{2029}')
}

fn starts_punctuation(ch: char) -> bool {
    PUNCTUATION_TRIE.lookup(ch).is_some()
}

/// Whether a `/` after a token with text `previous` starts a regex literal.
fn regex_may_follow(previous: &str) -> bool {
    if !REGEX_PRECEDERS.contains(&previous) {
        return false;
    }
    // `1.` is a number, not the member-access dot.
    let mut tail = previous.chars().rev();
    !(tail.next() == Some('.') && tail.next().is_some_and(|c| c.is_ascii_digit()))
}

/// `[+-]?(0[xX][0-9a-fA-F]*|0[0-7]*|[1-9][0-9]*)`
fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    match digits.strip_prefix('0') {
        Some(octal) => octal.chars().all(|c| matches!(c, '0'..='7')),
        None => {
            digits.starts_with(|c: char| matches!(c, '1'..='9'))
                && digits.chars().all(|c| c.is_ascii_digit())
        }
    }
}

fn is_float_literal(text: &str) -> bool {
    let text = text.strip_suffix(&['f', 'F', 'd', 'D'][..]).unwrap_or(text);
    text.parse::<f64>().is_ok()
}

/// First stage: cuts characters into raw script tokens.
struct Splitter<S> {
    input: Lookahead<S>,
}

impl<S: CharStream> Splitter<S> {
    fn new(stream: S) -> Self {
        Self {
            input: Lookahead::new(stream, 2),
        }
    }

    fn split(&mut self) -> Result<Option<Token<ScriptTokenKind>>, LexerError> {
        while self.next_is(is_space)? {
            self.input.pop()?;
        }
        let start = self.input.current_position();
        let Some(ch) = self.input.pop()? else {
            return Ok(None);
        };
        let mut text = String::from(ch);
        let kind = match ch {
            '"' | '\'' => {
                self.take_string(ch, &mut text)?;
                ScriptTokenKind::String
            }
            '/' if self.next_is(|c| c == '/')? => {
                self.take_while(&mut text, |c| !is_line_separator(c))?;
                ScriptTokenKind::Comment
            }
            '/' if self.next_is(|c| c == '*')? => {
                self.take_block_comment(&mut text)?;
                ScriptTokenKind::Comment
            }
            '.' if self.next_is(|c| c.is_ascii_digit())? => {
                self.take_number(&mut text)?;
                ScriptTokenKind::Word
            }
            '0'..='9' => {
                self.take_number(&mut text)?;
                ScriptTokenKind::Word
            }
            c if starts_punctuation(c) => {
                self.take_punctuation(&mut text)?;
                ScriptTokenKind::Punctuation
            }
            _ => {
                self.take_while(&mut text, |c| {
                    !(is_space(c) || c == '"' || c == '\'' || starts_punctuation(c))
                })?;
                ScriptTokenKind::Word
            }
        };
        let span = Span::span(&start, &self.input.current_position());
        Ok(Some(Token::new(text, kind, span)))
    }

    /// Reads to the closing quote. An unescaped line break or the end of
    /// input ends the string early; the partial string is still a string.
    fn take_string(&mut self, quote: char, text: &mut String) -> Result<(), LexerError> {
        let mut escaped = false;
        loop {
            self.input.fetch(1)?;
            let Some(ch) = self.input.peek(0) else {
                return Ok(());
            };
            if !escaped && is_line_separator(ch) {
                tracing::trace!(%text, "unterminated string");
                return Ok(());
            }
            self.take(text)?;
            if ch == quote && !escaped {
                return Ok(());
            }
            escaped = !escaped && ch == '\\';
        }
    }

    fn take_block_comment(&mut self, text: &mut String) -> Result<(), LexerError> {
        self.take(text)?;
        let mut star = false;
        while let Some(ch) = self.input.pop()? {
            text.push(ch);
            if star && ch == '/' {
                return Ok(());
            }
            star = ch == '*';
        }
        Ok(())
    }

    /// `0x` followed by hex digits, or `digits[.digits][e[+-]digits]`, or
    /// `.digits[e[+-]digits]`. Identifier characters stuck to the end are
    /// kept so the classifier can reject the whole word.
    fn take_number(&mut self, text: &mut String) -> Result<(), LexerError> {
        if text == "0" && self.next_is(|c| c == 'x' || c == 'X')? {
            self.take(text)?;
        } else {
            self.take_while(text, |c| c.is_ascii_digit())?;
            if !text.starts_with('.') && self.next_is(|c| c == '.')? {
                self.take(text)?;
                self.take_while(text, |c| c.is_ascii_digit())?;
            }
            if self.next_is(|c| c == 'e' || c == 'E')? {
                self.take(text)?;
                if self.next_is(|c| c == '+' || c == '-')? {
                    self.take(text)?;
                }
                self.take_while(text, |c| c.is_ascii_digit())?;
            }
        }
        self.take_while(text, |c| c.is_alphanumeric() || c == '_' || c == '$')
    }

    /// Extends the operator while each longer text is itself an operator.
    fn take_punctuation(&mut self, text: &mut String) -> Result<(), LexerError> {
        let mut node = text.chars().try_fold(&*PUNCTUATION_TRIE, |node, ch| node.lookup(ch));
        while let Some(current) = node {
            self.input.fetch(1)?;
            let next = self
                .input
                .peek(0)
                .and_then(|ch| current.lookup(ch))
                .filter(|next| next.is_terminal());
            if next.is_none() {
                break;
            }
            self.take(text)?;
            node = next;
        }
        Ok(())
    }

    /// Continues a `/` or `/=` token as a regular expression literal up to
    /// the closing slash and any flags. A line break or the end of input ends
    /// the literal early.
    fn continue_regex(
        &mut self,
        token: Token<ScriptTokenKind>,
    ) -> Result<Token<ScriptTokenKind>, LexerError> {
        let mut text = token.text;
        let mut escaped = false;
        let mut in_class = false;
        let mut closed = false;
        loop {
            self.input.fetch(1)?;
            let Some(ch) = self.input.peek(0) else {
                break;
            };
            if is_line_separator(ch) {
                break;
            }
            self.take(&mut text)?;
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    closed = true;
                    break;
                }
                _ => {}
            }
        }
        if closed {
            self.take_while(&mut text, char::is_alphabetic)?;
        } else {
            tracing::trace!(%text, "unterminated regular expression");
        }
        let span = Span::span(&token.span, &self.input.current_position());
        Ok(Token::new(text, ScriptTokenKind::Regexp, span))
    }

    fn next_is(&mut self, pred: impl Fn(char) -> bool) -> Result<bool, LexerError> {
        self.input.fetch(1)?;
        Ok(self.input.peek(0).is_some_and(pred))
    }

    fn take(&mut self, text: &mut String) -> Result<(), LexerError> {
        if let Some(ch) = self.input.pop()? {
            text.push(ch);
        }
        Ok(())
    }

    fn take_while(&mut self, text: &mut String, pred: impl Fn(char) -> bool) -> Result<(), LexerError> {
        while self.next_is(&pred)? {
            self.take(text)?;
        }
        Ok(())
    }
}

/// Second stage: rejoins cut-short operators and recognizes regex literals.
struct Joiner<S> {
    splitter: Splitter<S>,
    lookahead: VecDeque<Token<ScriptTokenKind>>,
    /// Text of the last token that was not a comment.
    previous: Option<String>,
}

impl<S: CharStream> Joiner<S> {
    fn new(stream: S) -> Self {
        Self {
            splitter: Splitter::new(stream),
            lookahead: VecDeque::new(),
            previous: None,
        }
    }

    fn join(&mut self) -> Result<Option<Token<ScriptTokenKind>>, LexerError> {
        let Some(token) = self.read()? else {
            return Ok(None);
        };
        let token = match token.kind {
            ScriptTokenKind::Punctuation if token.text.starts_with('/') && self.regex_allowed() => {
                // A slash never starts a rejoin, so nothing after it has been
                // split yet and the splitter can pick up right after it.
                debug_assert!(self.lookahead.is_empty());
                tracing::debug!(previous = ?self.previous, "slash starts a regular expression");
                self.splitter.continue_regex(token)?
            }
            ScriptTokenKind::Punctuation => self.rejoin(token)?,
            _ => token,
        };
        if token.kind != ScriptTokenKind::Comment {
            self.previous = Some(token.text.clone());
        }
        Ok(Some(token))
    }

    fn regex_allowed(&self) -> bool {
        self.previous.as_deref().map_or(true, regex_may_follow)
    }

    /// Merges directly adjacent punctuation tokens that spell a longer
    /// operator, such as `.` `.` `.` into `...`.
    fn rejoin(
        &mut self,
        mut token: Token<ScriptTokenKind>,
    ) -> Result<Token<ScriptTokenKind>, LexerError> {
        let start = token.text.chars().try_fold(&*PUNCTUATION_TRIE, |node, ch| node.lookup(ch));
        let Some(mut node) = start.filter(|node| node.has_partial_child()) else {
            return Ok(token);
        };
        let mut end = token.span.end_offset();
        let mut seen = 0;
        let mut merge = 0;
        while let Some(next) = self.peek(seen)? {
            if next.kind != ScriptTokenKind::Punctuation || next.span.start_offset() != end {
                break;
            }
            let Some(deeper) = next.text.chars().try_fold(node, |node, ch| node.lookup(ch)) else {
                break;
            };
            node = deeper;
            end = next.span.end_offset();
            seen += 1;
            if node.is_terminal() {
                merge = seen;
            }
        }
        for _ in 0..merge {
            if let Some(next) = self.read()? {
                let span = Span::span(&token.span, &next.span);
                token = Token::new(token.text + &next.text, token.kind, span);
            }
        }
        Ok(token)
    }

    fn read(&mut self) -> Result<Option<Token<ScriptTokenKind>>, LexerError> {
        match self.lookahead.pop_front() {
            Some(token) => Ok(Some(token)),
            None => self.splitter.split(),
        }
    }

    fn peek(&mut self, index: usize) -> Result<Option<&Token<ScriptTokenKind>>, LexerError> {
        while self.lookahead.len() <= index {
            match self.splitter.split()? {
                Some(token) => self.lookahead.push_back(token),
                None => break,
            }
        }
        Ok(self.lookahead.get(index))
    }
}

/// JavaScript tokenizer.
///
/// Yields keywords, integer and float literals, strings, regular expression
/// literals, punctuation, comments, and identifier words. A word that starts
/// like a number but is not a valid numeral stays a `Word`, for the parser to
/// reject, and a [`MessageKind::MalformedNumber`] message is kept for
/// [`ScriptLexer::report_messages`].
pub struct ScriptLexer<S> {
    joiner: Joiner<S>,
    pending: Option<Token<ScriptTokenKind>>,
    messages: Vec<Message>,
}

impl ScriptLexer<SourceStream<Cursor<String>>> {
    /// Tokenize an in-memory script.
    pub fn tokenize(source: &str) -> Result<Vec<Token<ScriptTokenKind>>, LexerError> {
        let stream = SourceStream::from_str(source, SourceId::new("<input>"));
        let mut lexer = ScriptLexer::new(stream);
        let mut tokens = Vec::new();
        while lexer.has_next()? {
            tokens.push(lexer.next_token()?);
        }
        Ok(tokens)
    }
}

impl<S: CharStream> ScriptLexer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            joiner: Joiner::new(stream),
            pending: None,
            messages: Vec::new(),
        }
    }

    /// Hands over the messages collected so far, leaving none behind.
    pub fn report_messages(&mut self, queue: &mut dyn MessageQueue) {
        for message in self.messages.drain(..) {
            queue.report(message);
        }
    }

    pub fn close(&mut self) -> Result<(), LexerError> {
        self.joiner.splitter.input.close()
    }

    fn produce(&mut self) -> Result<Option<Token<ScriptTokenKind>>, LexerError> {
        let Some(token) = self.joiner.join()? else {
            return Ok(None);
        };
        let token = if token.kind == ScriptTokenKind::Word {
            match classify(&token) {
                Ok(kind) => token.reclassify(kind),
                Err(err) => {
                    tracing::debug!(text = %token.text, "malformed number left as a word");
                    err.report_to(&mut self.messages);
                    token
                }
            }
        } else {
            token
        };
        tracing::trace!(kind = ?token.kind, text = %token.text, "script token");
        Ok(Some(token))
    }
}

/// Sorts a word into keyword, number, or plain identifier. Fails for a word
/// that starts like a number but matches neither numeric grammar.
fn classify(token: &Token<ScriptTokenKind>) -> Result<ScriptTokenKind, ParseError> {
    let text = token.text.as_str();
    if KEYWORDS.contains(&text) {
        return Ok(ScriptTokenKind::Keyword);
    }
    if text == "NaN" || text == "Infinity" {
        return Ok(ScriptTokenKind::Float);
    }
    if !text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '.' | '+' | '-')) {
        return Ok(ScriptTokenKind::Word);
    }
    if is_integer_literal(text) {
        Ok(ScriptTokenKind::Integer)
    } else if is_float_literal(text) {
        Ok(ScriptTokenKind::Float)
    } else {
        Err(ParseError::new(
            MessageKind::MalformedNumber,
            token.span.clone(),
            vec![text.to_string()],
        ))
    }
}

impl<S: CharStream> TokenStream for ScriptLexer<S> {
    type Kind = ScriptTokenKind;

    fn has_next(&mut self) -> Result<bool, LexerError> {
        if self.pending.is_none() {
            self.pending = self.produce()?;
        }
        Ok(self.pending.is_some())
    }

    fn next_token(&mut self) -> Result<Token<ScriptTokenKind>, LexerError> {
        self.has_next()?;
        match self.pending.take() {
            Some(token) => Ok(token),
            None => Err(end_of_input(self.joiner.splitter.input.current_position())),
        }
    }
}
