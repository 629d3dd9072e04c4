//! Escape-decoding stream wrappers.
//!
//! Each decoder reads one logical escape per output character. Malformed or
//! truncated escapes never fail the read: the introducer degrades to literal
//! text and the characters after it stay buffered for the next read.
//!
//! The position reported for a decoded character is the position of the first
//! character of its escape sequence.

use crate::entities::named_entity;
use crate::lookahead::Lookahead;
use crate::span::{MutablePosition, Span};
use crate::stream::CharStream;
use crate::LexerError;

/// `\uXXXX` needs four characters after the `u`.
const JS_LOOKAHEAD: usize = 4;

/// `#x0000;` is the longest reference handled after the `&`.
const HTML_LOOKAHEAD: usize = 7;

/// `XX%XX%XX%XX` follows the `%` of a four-byte UTF-8 sequence.
const URI_LOOKAHEAD: usize = 11;

/// Decodes JavaScript string-literal escapes (`\n`, `\x41`, `\u0041`, `\101`).
pub struct JsUnescaper<S> {
    lookahead: Lookahead<S>,
}

impl<S: CharStream> JsUnescaper<S> {
    pub fn new(stream: S) -> Self {
        Self {
            lookahead: Lookahead::new(stream, JS_LOOKAHEAD),
        }
    }

    /// Decodes `digits` hex digits at the front of the buffer, consuming them
    /// only if all are present and valid.
    fn hex(&mut self, digits: usize) -> Result<Option<char>, LexerError> {
        self.lookahead.fetch(digits)?;
        let decoded = digit_value(&self.lookahead, 0, digits, 16).and_then(char_or_replacement);
        if decoded.is_some() {
            self.lookahead.consume(digits);
        }
        Ok(decoded)
    }

    /// `first` is the leading octal digit, already taken. Values stay within
    /// `0o377`, so a leading `4`-`7` allows one more digit instead of two.
    fn octal(&mut self, first: char) -> Result<char, LexerError> {
        let extra = if first <= '3' { 2 } else { 1 };
        self.lookahead.fetch(extra)?;
        let mut value = first.to_digit(8).unwrap_or(0);
        let mut taken = 0;
        while taken < extra {
            match self.lookahead.peek(taken).and_then(|c| c.to_digit(8)) {
                Some(digit) => {
                    value = value * 8 + digit;
                    taken += 1;
                }
                None => break,
            }
        }
        self.lookahead.consume(taken);
        Ok(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

impl<S: CharStream> CharStream for JsUnescaper<S> {
    fn read(&mut self) -> Result<Option<char>, LexerError> {
        let Some(ch) = self.lookahead.pop()? else {
            return Ok(None);
        };
        if ch != '\\' {
            return Ok(Some(ch));
        }
        // A backslash at end of input decodes to nothing.
        let Some(introducer) = self.lookahead.pop()? else {
            return Ok(None);
        };
        let decoded = match introducer {
            'b' => '\u{8}',
            'r' => '\r',
            'n' => '\n',
            'f' => '\u{c}',
            't' => '\t',
            'v' => '\u{b}',
            'u' => self.hex(4)?.unwrap_or('u'),
            'x' => self.hex(2)?.unwrap_or('x'),
            '0'..='7' => self.octal(introducer)?,
            other => other,
        };
        tracing::trace!(?introducer, ?decoded, "decoded script escape");
        Ok(Some(decoded))
    }

    fn current_position(&self) -> Span {
        self.lookahead.current_position()
    }

    fn mutable_position(&self) -> MutablePosition {
        self.lookahead.mutable_position()
    }

    fn close(&mut self) -> Result<(), LexerError> {
        self.lookahead.close()
    }
}

/// Decodes HTML character references (`&lt;`, `&#65;`, `&#x41;`) as found in
/// attribute values.
pub struct HtmlUnescaper<S> {
    lookahead: Lookahead<S>,
}

impl<S: CharStream> HtmlUnescaper<S> {
    pub fn new(stream: S) -> Self {
        Self {
            lookahead: Lookahead::new(stream, HTML_LOOKAHEAD),
        }
    }

    /// Decodes the reference body buffered before the `;` at `end`, or `None`
    /// if it is not a reference this decoder knows.
    fn reference(&self, end: usize) -> Option<char> {
        if self.lookahead.peek(0) == Some('#') {
            return match self.lookahead.peek(1) {
                Some('x' | 'X') => digit_value(&self.lookahead, 2, end - 2, 16),
                _ => digit_value(&self.lookahead, 1, end - 1, 10),
            }
            .and_then(char::from_u32);
        }
        let name: String = (0..end).filter_map(|i| self.lookahead.peek(i)).collect();
        named_entity(&name)
    }
}

impl<S: CharStream> CharStream for HtmlUnescaper<S> {
    fn read(&mut self) -> Result<Option<char>, LexerError> {
        let Some(ch) = self.lookahead.pop()? else {
            return Ok(None);
        };
        if ch != '&' {
            return Ok(Some(ch));
        }
        self.lookahead.fetch(HTML_LOOKAHEAD)?;
        // The reference body needs at least one character before the `;`.
        let end = (1..self.lookahead.limit()).find(|&i| self.lookahead.peek(i) == Some(';'));
        let Some(end) = end else {
            return Ok(Some('&'));
        };
        match self.reference(end) {
            Some(decoded) => {
                self.lookahead.consume(end + 1);
                tracing::trace!(?decoded, "decoded character reference");
                Ok(Some(decoded))
            }
            None => Ok(Some('&')),
        }
    }

    fn current_position(&self) -> Span {
        self.lookahead.current_position()
    }

    fn mutable_position(&self) -> MutablePosition {
        self.lookahead.mutable_position()
    }

    fn close(&mut self) -> Result<(), LexerError> {
        self.lookahead.close()
    }
}

/// Decodes URI percent-escapes (`%20`, `%C3%A9`).
///
/// Runs of escaped bytes are read as UTF-8. A `%` that does not start a
/// complete, valid sequence is literal.
pub struct UriUnescaper<S> {
    lookahead: Lookahead<S>,
}

impl<S: CharStream> UriUnescaper<S> {
    pub fn new(stream: S) -> Self {
        Self {
            lookahead: Lookahead::new(stream, URI_LOOKAHEAD),
        }
    }

    /// The byte spelled by the two hex digits at buffer index `start`.
    fn byte_at(&self, start: usize) -> Option<u8> {
        digit_value(&self.lookahead, start, 2, 16).and_then(|value| u8::try_from(value).ok())
    }

    /// Decodes the sequence following a `%`, consuming it only on success.
    fn sequence(&mut self) -> Result<Option<char>, LexerError> {
        self.lookahead.fetch(2)?;
        let Some(lead) = self.byte_at(0) else {
            return Ok(None);
        };
        let width = match lead {
            0x00..=0x7f => 1,
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            _ => return Ok(None),
        };
        let used = 2 + 3 * (width - 1);
        self.lookahead.fetch(used)?;
        let mut bytes = [lead, 0, 0, 0];
        for (k, slot) in bytes.iter_mut().enumerate().take(width).skip(1) {
            let at = 3 * k - 1;
            if self.lookahead.peek(at) != Some('%') {
                return Ok(None);
            }
            let Some(byte) = self.byte_at(at + 1) else {
                return Ok(None);
            };
            *slot = byte;
        }
        let decoded = std::str::from_utf8(&bytes[..width])
            .ok()
            .and_then(|text| text.chars().next());
        if decoded.is_some() {
            self.lookahead.consume(used);
        }
        Ok(decoded)
    }
}

impl<S: CharStream> CharStream for UriUnescaper<S> {
    fn read(&mut self) -> Result<Option<char>, LexerError> {
        let Some(ch) = self.lookahead.pop()? else {
            return Ok(None);
        };
        if ch != '%' {
            return Ok(Some(ch));
        }
        match self.sequence()? {
            Some(decoded) => {
                tracing::trace!(?decoded, "decoded percent escape");
                Ok(Some(decoded))
            }
            None => Ok(Some('%')),
        }
    }

    fn current_position(&self) -> Span {
        self.lookahead.current_position()
    }

    fn mutable_position(&self) -> MutablePosition {
        self.lookahead.mutable_position()
    }

    fn close(&mut self) -> Result<(), LexerError> {
        self.lookahead.close()
    }
}

/// Reads `count` digits in `radix` starting at buffer index `start`.
/// Fails on an empty run, a non-digit, or overflow.
fn digit_value<S: CharStream>(
    lookahead: &Lookahead<S>,
    start: usize,
    count: usize,
    radix: u32,
) -> Option<u32> {
    if count == 0 {
        return None;
    }
    (start..start + count).try_fold(0u32, |acc, i| {
        let digit = lookahead.peek(i)?.to_digit(radix)?;
        acc.checked_mul(radix)?.checked_add(digit)
    })
}

/// Unpaired surrogates from `\uD800`-style escapes have no `char`.
fn char_or_replacement(value: u32) -> Option<char> {
    Some(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER))
}
