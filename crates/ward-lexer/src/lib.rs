//! Ward Lexer
//!
//! Front end of the Ward sandboxing toolchain. Turns raw characters into
//! position-annotated tokens for HTML/XML markup and JavaScript.
//!
//! The pieces stack as follows:
//!
//! ```text
//! CharStream  (SourceStream, Chain)
//!   -> optional escape decoding (JsUnescaper, HtmlUnescaper, UriUnescaper)
//!   -> TokenStream (MarkupLexer, ScriptLexer)
//! ```
//!
//! # Example
//!
//! ```
//! use ward_lexer::{MarkupLexer, MarkupTokenKind};
//!
//! let tokens = MarkupLexer::tokenize("<b>hi</b>").unwrap();
//! assert_eq!(tokens[0].kind, MarkupTokenKind::TagStart);
//! assert_eq!(tokens[0].text, "<b");
//! ```

pub mod config;
pub mod diagnostics;
mod entities;
pub mod escape;
mod lookahead;
pub mod markup;
pub mod script;
pub mod span;
pub mod stream;
pub mod token;
pub mod trie;

use std::fmt;

pub use config::MarkupConfig;
pub use diagnostics::{tokenize_all, Message, MessageQueue};
pub use escape::{HtmlUnescaper, JsUnescaper, UriUnescaper};
pub use markup::{MarkupLexer, MarkupSplitter};
pub use script::ScriptLexer;
pub use span::{MutablePosition, SourceId, Span};
pub use stream::{
    chain, html_unescape, js_unescape, uri_unescape, Chain, CharStream, SourceStream,
};
pub use token::{MarkupTokenKind, ScriptTokenKind, Token, TokenStream};
pub use trie::PunctuationTrie;

/// Errors raised while reading characters or producing tokens.
#[derive(Debug, thiserror::Error)]
pub enum LexerError {
    /// The underlying reader failed. Fatal and never retried.
    #[error("I/O error at {span}: {error}")]
    Io {
        span: Span,
        #[source]
        error: std::io::Error,
    },

    /// One or more streams in a chain failed to close. Every stream was still
    /// given the chance to close.
    #[error("failed to close {failures} stream(s) in chain")]
    CloseFailed {
        failures: usize,
        #[source]
        first: Box<LexerError>,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl LexerError {
    /// Hands the error to a diagnostics sink without formatting it.
    pub fn report_to(&self, queue: &mut dyn MessageQueue) {
        match self {
            LexerError::Io { span, error } => queue.report(Message::new(
                MessageKind::IoFailure,
                span.clone(),
                vec![error.to_string()],
            )),
            LexerError::CloseFailed { first, .. } => first.report_to(queue),
            LexerError::Parse(err) => err.report_to(queue),
        }
    }
}

/// A fatal tokenizer condition with the span it applies to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct ParseError {
    pub kind: MessageKind,
    pub span: Span,
    pub parts: Vec<String>,
}

impl ParseError {
    pub fn new(kind: MessageKind, span: Span, parts: Vec<String>) -> Self {
        Self { kind, span, parts }
    }

    pub fn report_to(&self, queue: &mut dyn MessageQueue) {
        queue.report(Message::new(self.kind, self.span.clone(), self.parts.clone()));
    }
}

/// Closed set of conditions this crate reports to a diagnostics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `next_token` was called on an exhausted stream.
    EndOfInput,
    /// A word looked numeric but matched neither the integer nor the float
    /// grammar.
    MalformedNumber,
    IoFailure,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::EndOfInput => "unexpected end of input",
            MessageKind::MalformedNumber => "malformed number",
            MessageKind::IoFailure => "I/O failure",
        })
    }
}
