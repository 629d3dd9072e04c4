//! Hand-off of fatal conditions to an external diagnostics sink.
//!
//! The lexers never format or print messages. They hand a `(kind, span,
//! parts)` triple to whatever [`MessageQueue`] the caller supplies.

use crate::span::Span;
use crate::token::{Token, TokenStream};
use crate::MessageKind;

/// One reported condition. `parts` are the values a renderer substitutes into
/// the message template for `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub span: Span,
    pub parts: Vec<String>,
}

impl Message {
    pub fn new(kind: MessageKind, span: Span, parts: Vec<String>) -> Self {
        Self { kind, span, parts }
    }
}

/// Receives diagnostics.
pub trait MessageQueue {
    fn report(&mut self, message: Message);
}

impl MessageQueue for Vec<Message> {
    fn report(&mut self, message: Message) {
        self.push(message);
    }
}

/// Drains `stream`, returning every token produced before the first fatal
/// error. The error, if any, goes to `queue`.
pub fn tokenize_all<T>(stream: &mut T, queue: &mut dyn MessageQueue) -> Vec<Token<T::Kind>>
where
    T: TokenStream + ?Sized,
{
    let mut tokens = Vec::new();
    loop {
        let next = match stream.has_next() {
            Ok(true) => stream.next_token(),
            Ok(false) => break,
            Err(err) => Err(err),
        };
        match next {
            Ok(token) => tokens.push(token),
            Err(err) => {
                tracing::debug!(error = %err, tokens = tokens.len(), "tokenization stopped");
                err.report_to(queue);
                break;
            }
        }
    }
    tokens
}
