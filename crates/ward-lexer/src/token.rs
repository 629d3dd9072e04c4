use std::fmt;

use crate::span::Span;
use crate::{LexerError, MessageKind, ParseError};

/// Token classification for HTML and XML markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkupTokenKind {
    /// `<name` or `</name`, including the angle bracket.
    TagStart,
    /// `>` or `/>` closing a tag.
    TagEnd,
    Text,
    /// A quoted attribute value, quotes included.
    QuotedString,
    Comment,
    Cdata,
    /// `<!DOCTYPE ...>` and processing instructions.
    Directive,
    /// `<% ... %>` blocks.
    ServerCode,
    /// Whitespace inside a tag.
    Ignorable,
    /// Content of a raw-text element such as `script` or `style`.
    Unescaped,
    AttrName,
    AttrValue,
}

/// Token classification for JavaScript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptTokenKind {
    /// Identifiers, and numerals before classification.
    Word,
    Keyword,
    Integer,
    Float,
    /// A string literal, quotes included.
    String,
    /// A regular expression literal, slashes and flags included.
    Regexp,
    Punctuation,
    Comment,
}

/// A token produced by a lexer.
///
/// Carries the exact source text it was built from; lexers never normalize
/// text, so `span.length()` is the number of characters in `text` unless an
/// escape-decoding stream sits below the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<K> {
    pub text: String,
    pub kind: K,
    pub span: Span,
}

impl<K> Token<K> {
    pub fn new(text: impl Into<String>, kind: K, span: Span) -> Self {
        Self {
            text: text.into(),
            kind,
            span,
        }
    }

    /// The same text and span under a different kind.
    pub fn reclassify(self, kind: K) -> Self {
        Self { kind, ..self }
    }
}

impl<K: fmt::Debug> fmt::Display for Token<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} @ {}", self.kind, self.text, self.span)
    }
}

/// Forward-only, single-pass source of tokens.
pub trait TokenStream {
    type Kind;

    /// Whether another token is available. May read from the input.
    fn has_next(&mut self) -> Result<bool, LexerError>;

    /// The next token. Calling this on an exhausted stream is an
    /// [`MessageKind::EndOfInput`] error.
    fn next_token(&mut self) -> Result<Token<Self::Kind>, LexerError>;
}

pub(crate) fn end_of_input(span: Span) -> LexerError {
    ParseError::new(MessageKind::EndOfInput, span, Vec::new()).into()
}
