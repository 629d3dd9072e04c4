use std::collections::VecDeque;

use crate::span::{MutablePosition, Span};
use crate::stream::CharStream;
use crate::LexerError;

/// Bounded buffer of characters read ahead from a stream, each paired with
/// the position it was read at.
///
/// Decoders peek into the buffer to recognize an escape and then consume only
/// what the escape used; the rest stays buffered, positions intact, for the
/// next read.
pub(crate) struct Lookahead<S> {
    stream: S,
    buffer: VecDeque<(char, MutablePosition)>,
    capacity: usize,
}

impl<S: CharStream> Lookahead<S> {
    pub(crate) fn new(stream: S, capacity: usize) -> Self {
        Self {
            stream,
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Buffers characters until `n` are available or the stream runs dry.
    pub(crate) fn fetch(&mut self, n: usize) -> Result<(), LexerError> {
        debug_assert!(n <= self.capacity, "lookahead of {n} exceeds {}", self.capacity);
        while self.buffer.len() < n {
            let position = self.stream.mutable_position();
            match self.stream.read()? {
                Some(ch) => self.buffer.push_back((ch, position)),
                None => break,
            }
        }
        Ok(())
    }

    /// Number of characters currently buffered.
    pub(crate) fn limit(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn peek(&self, index: usize) -> Option<char> {
        self.buffer.get(index).map(|(ch, _)| *ch)
    }

    /// Takes the next character, from the buffer first.
    pub(crate) fn pop(&mut self) -> Result<Option<char>, LexerError> {
        match self.buffer.pop_front() {
            Some((ch, _)) => Ok(Some(ch)),
            None => self.stream.read(),
        }
    }

    /// Drops `n` buffered characters.
    pub(crate) fn consume(&mut self, n: usize) {
        self.buffer.drain(..n.min(self.buffer.len()));
    }

    pub(crate) fn current_position(&self) -> Span {
        match self.buffer.front() {
            Some((_, position)) => position.to_span(),
            None => self.stream.current_position(),
        }
    }

    pub(crate) fn mutable_position(&self) -> MutablePosition {
        match self.buffer.front() {
            Some((_, position)) => position.clone(),
            None => self.stream.mutable_position(),
        }
    }

    pub(crate) fn close(&mut self) -> Result<(), LexerError> {
        self.buffer.clear();
        self.stream.close()
    }
}
