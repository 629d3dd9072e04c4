//! Position-tracking character streams.
//!
//! A [`CharStream`] yields code points one at a time and can always say where
//! the next one starts. Streams compose by wrapping: [`chain`] concatenates
//! several inputs, [`js_unescape`], [`html_unescape`] and [`uri_unescape`]
//! decode escapes on the fly. A stream handed to a wrapper belongs to that wrapper.

use std::io::{self, BufRead, BufReader, Cursor, Read};

use crate::escape::{HtmlUnescaper, JsUnescaper, UriUnescaper};
use crate::span::{MutablePosition, SourceId, Span};
use crate::LexerError;

/// A reader of code points that tracks the position of the next one.
pub trait CharStream {
    /// The next character, or `None` once the input is exhausted.
    fn read(&mut self) -> Result<Option<char>, LexerError>;

    /// Where the next `read` starts, or the position just past the end of
    /// input once exhausted.
    fn current_position(&self) -> Span;

    /// Same as [`CharStream::current_position`] but as an accumulator that
    /// wrappers can buffer alongside a character.
    fn mutable_position(&self) -> MutablePosition;

    /// Releases the underlying input.
    fn close(&mut self) -> Result<(), LexerError>;
}

impl<S: CharStream + ?Sized> CharStream for Box<S> {
    fn read(&mut self) -> Result<Option<char>, LexerError> {
        (**self).read()
    }

    fn current_position(&self) -> Span {
        (**self).current_position()
    }

    fn mutable_position(&self) -> MutablePosition {
        (**self).mutable_position()
    }

    fn close(&mut self) -> Result<(), LexerError> {
        (**self).close()
    }
}

/// A stream over UTF-8 text from any reader.
///
/// Charset detection happens upstream; this stream only decodes UTF-8.
pub struct SourceStream<R> {
    reader: Option<BufReader<R>>,
    position: MutablePosition,
}

impl SourceStream<Cursor<String>> {
    /// Create a stream over in-memory text.
    pub fn from_str(text: impl Into<String>, source: SourceId) -> Self {
        Self::from_reader(Cursor::new(text.into()), source)
    }
}

impl<R: Read> SourceStream<R> {
    pub fn from_reader(reader: R, source: SourceId) -> Self {
        Self::starting_at(reader, &Span::start_of_file(source))
    }

    /// Create a stream whose first character is at `start`, for inputs
    /// embedded inside a larger file.
    pub fn starting_at(reader: R, start: &Span) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            position: MutablePosition::at(start),
        }
    }

    fn next_byte(reader: &mut BufReader<R>) -> io::Result<Option<u8>> {
        let byte = match reader.fill_buf()? {
            [] => return Ok(None),
            [first, ..] => *first,
        };
        reader.consume(1);
        Ok(Some(byte))
    }

    fn decode(reader: &mut BufReader<R>) -> io::Result<Option<char>> {
        let Some(first) = Self::next_byte(reader)? else {
            return Ok(None);
        };
        let width = match first {
            0x00..=0x7f => return Ok(Some(char::from(first))),
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Err(invalid_utf8()),
        };
        let mut bytes = [first, 0, 0, 0];
        for slot in bytes.iter_mut().take(width).skip(1) {
            *slot = Self::next_byte(reader)?.ok_or_else(invalid_utf8)?;
        }
        std::str::from_utf8(&bytes[..width])
            .map_err(|_| invalid_utf8())
            .map(|s| s.chars().next())
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "input is not valid UTF-8")
}

impl<R: Read> CharStream for SourceStream<R> {
    fn read(&mut self) -> Result<Option<char>, LexerError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        match Self::decode(reader) {
            Ok(Some(ch)) => {
                self.position.advance(ch);
                Ok(Some(ch))
            }
            Ok(None) => Ok(None),
            Err(error) => Err(LexerError::Io {
                span: self.position.to_span(),
                error,
            }),
        }
    }

    fn current_position(&self) -> Span {
        self.position.to_span()
    }

    fn mutable_position(&self) -> MutablePosition {
        self.position.clone()
    }

    fn close(&mut self) -> Result<(), LexerError> {
        self.reader = None;
        Ok(())
    }
}

/// Produces the characters of each stream in turn. See [`chain`].
pub struct Chain {
    streams: Vec<Box<dyn CharStream>>,
    current: usize,
    /// The character the next read returns, read early so that the chain
    /// reports the next stream's position as soon as one is exhausted.
    peeked: Option<(char, MutablePosition)>,
    /// A failed read-ahead, returned by the read after the one it followed.
    pending_error: Option<LexerError>,
}

/// Concatenates `streams`, exhausting each before moving to the next.
///
/// Positions come from whichever stream is being read, so characters from the
/// second stream report the same positions that stream would report alone.
pub fn chain(streams: Vec<Box<dyn CharStream>>) -> Chain {
    Chain {
        streams,
        current: 0,
        peeked: None,
        pending_error: None,
    }
}

impl Chain {
    fn reporting(&self) -> Option<&dyn CharStream> {
        self.streams
            .get(self.current)
            .or_else(|| self.streams.last())
            .map(|stream| &**stream as &dyn CharStream)
    }

    fn pull(&mut self) -> Result<Option<(char, MutablePosition)>, LexerError> {
        while let Some(stream) = self.streams.get_mut(self.current) {
            let position = stream.mutable_position();
            if let Some(ch) = stream.read()? {
                return Ok(Some((ch, position)));
            }
            self.current += 1;
        }
        Ok(None)
    }
}

impl CharStream for Chain {
    fn read(&mut self) -> Result<Option<char>, LexerError> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        let next = match self.peeked.take() {
            Some(peeked) => Some(peeked),
            None => self.pull()?,
        };
        if next.is_some() {
            match self.pull() {
                Ok(peeked) => self.peeked = peeked,
                Err(err) => self.pending_error = Some(err),
            }
        }
        Ok(next.map(|(ch, _)| ch))
    }

    fn current_position(&self) -> Span {
        match &self.peeked {
            Some((_, position)) => position.to_span(),
            None => self
                .reporting()
                .map(|stream| stream.current_position())
                .unwrap_or_else(Span::predefined),
        }
    }

    fn mutable_position(&self) -> MutablePosition {
        match &self.peeked {
            Some((_, position)) => position.clone(),
            None => self
                .reporting()
                .map(|stream| stream.mutable_position())
                .unwrap_or_else(|| MutablePosition::at(&Span::predefined())),
        }
    }

    /// Closes every stream even when some fail, then reports one aggregate
    /// failure carrying the first cause.
    fn close(&mut self) -> Result<(), LexerError> {
        self.peeked = None;
        self.pending_error = None;
        let mut first = None;
        let mut failures = 0;
        for stream in &mut self.streams {
            if let Err(err) = stream.close() {
                failures += 1;
                first.get_or_insert(err);
            }
        }
        match first {
            None => Ok(()),
            Some(first) => {
                tracing::debug!(failures, "chain close failed");
                Err(LexerError::CloseFailed {
                    failures,
                    first: Box::new(first),
                })
            }
        }
    }
}

/// Wraps `stream` so that JavaScript string escapes are decoded.
pub fn js_unescape<S: CharStream>(stream: S) -> JsUnescaper<S> {
    JsUnescaper::new(stream)
}

/// Wraps `stream` so that HTML character references are decoded.
pub fn html_unescape<S: CharStream>(stream: S) -> HtmlUnescaper<S> {
    HtmlUnescaper::new(stream)
}

/// Wraps `stream` so that URI percent-escapes are decoded.
pub fn uri_unescape<S: CharStream>(stream: S) -> UriUnescaper<S> {
    UriUnescaper::new(stream)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn stream(text: &str) -> SourceStream<Cursor<String>> {
        SourceStream::from_str(text, SourceId::new("test"))
    }

    pub(crate) fn read_all(stream: &mut dyn CharStream) -> String {
        let mut out = String::new();
        while let Some(ch) = stream.read().unwrap() {
            out.push(ch);
        }
        out
    }

    fn coords(span: &Span) -> (usize, usize, usize) {
        (span.start_line(), span.start_column(), span.start_offset())
    }

    /// Refuses to close, leaving its input readable.
    struct StubbornStream {
        inner: SourceStream<Cursor<String>>,
    }

    impl CharStream for StubbornStream {
        fn read(&mut self) -> Result<Option<char>, LexerError> {
            self.inner.read()
        }

        fn current_position(&self) -> Span {
            self.inner.current_position()
        }

        fn mutable_position(&self) -> MutablePosition {
            self.inner.mutable_position()
        }

        fn close(&mut self) -> Result<(), LexerError> {
            Err(LexerError::Io {
                span: self.inner.current_position(),
                error: io::Error::new(io::ErrorKind::Other, "refused"),
            })
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unreadable"))
        }
    }

    // =========================================================================
    // Single source
    // =========================================================================

    #[test]
    fn test_reads_all_characters() {
        assert_eq!(read_all(&mut stream("héllo ✓")), "héllo ✓");
    }

    #[test]
    fn test_position_advances_per_character() {
        let mut s = stream("ab\ncd");
        assert_eq!(coords(&s.current_position()), (1, 1, 0));
        s.read().unwrap();
        assert_eq!(coords(&s.current_position()), (1, 2, 1));
        s.read().unwrap();
        s.read().unwrap();
        assert_eq!(coords(&s.current_position()), (2, 1, 3));
    }

    #[test]
    fn test_crlf_counts_once() {
        let mut s = stream("a\r\nb");
        read_all(&mut s);
        assert_eq!(coords(&s.current_position()), (2, 2, 4));
    }

    #[test]
    fn test_position_past_end() {
        let mut s = stream("xy");
        read_all(&mut s);
        assert_eq!(s.read().unwrap(), None);
        assert_eq!(coords(&s.current_position()), (1, 3, 2));
    }

    #[test]
    fn test_multibyte_counts_as_one_character() {
        let mut s = stream("é!");
        s.read().unwrap();
        assert_eq!(s.current_position().start_offset(), 1);
    }

    #[test]
    fn test_starting_at_embedded_offset() {
        let start = Span::point(SourceId::new("page.html"), 10, 5, 200);
        let mut s = SourceStream::starting_at(Cursor::new("x\ny"), &start);
        read_all(&mut s);
        assert_eq!(coords(&s.current_position()), (11, 2, 203));
    }

    #[test]
    fn test_invalid_utf8_is_io_error() {
        let mut s = SourceStream::from_reader(&[b'a', 0xff][..], SourceId::new("bad"));
        assert_eq!(s.read().unwrap(), Some('a'));
        match s.read() {
            Err(LexerError::Io { span, error }) => {
                assert_eq!(error.kind(), io::ErrorKind::InvalidData);
                assert_eq!(span.start_offset(), 1);
            }
            other => panic!("expected I/O error, got {other:?}"),
        }
    }

    #[test]
    fn test_reader_failure_propagates() {
        let mut s = SourceStream::from_reader(FailingReader, SourceId::new("pipe"));
        assert!(matches!(s.read(), Err(LexerError::Io { .. })));
    }

    #[test]
    fn test_read_after_close_is_end_of_input() {
        let mut s = stream("abc");
        s.close().unwrap();
        assert_eq!(s.read().unwrap(), None);
    }

    // =========================================================================
    // Chaining
    // =========================================================================

    #[test]
    fn test_chain_concatenates() {
        let mut c = chain(vec![
            Box::new(stream("ab")),
            Box::new(stream("")),
            Box::new(stream("cd")),
        ]);
        assert_eq!(read_all(&mut c), "abcd");
    }

    #[test]
    fn test_chain_reports_sub_stream_positions() {
        let second = SourceStream::from_str("x\ny", SourceId::new("second"));
        let mut c = chain(vec![Box::new(stream("ab")), Box::new(second)]);
        c.read().unwrap();
        c.read().unwrap();
        c.read().unwrap();
        let pos = c.current_position();
        assert_eq!(pos.source().name(), "second");
        assert_eq!(coords(&pos), (1, 2, 1));
    }

    #[test]
    fn test_chain_position_after_exhaustion_is_last_stream() {
        let last = SourceStream::from_str("z", SourceId::new("last"));
        let mut c = chain(vec![Box::new(stream("a")), Box::new(last)]);
        read_all(&mut c);
        let pos = c.current_position();
        assert_eq!(pos.source().name(), "last");
        assert_eq!(pos.start_offset(), 1);
    }

    #[test]
    fn test_empty_chain() {
        let mut c = chain(Vec::new());
        assert_eq!(c.read().unwrap(), None);
        assert_eq!(c.current_position(), Span::predefined());
    }

    #[test]
    fn test_chain_close_aggregates_failures() {
        let mut c = chain(vec![
            Box::new(StubbornStream {
                inner: stream("a"),
            }),
            Box::new(stream("b")),
            Box::new(StubbornStream {
                inner: stream("c"),
            }),
        ]);
        match c.close() {
            Err(LexerError::CloseFailed { failures, .. }) => assert_eq!(failures, 2),
            other => panic!("expected aggregate failure, got {other:?}"),
        }
    }

    #[test]
    fn test_chain_close_reaches_every_stream() {
        let mut c = chain(vec![
            Box::new(StubbornStream {
                inner: stream("a"),
            }),
            Box::new(stream("b")),
        ]);
        assert!(c.close().is_err());
        // The well-behaved second stream was closed despite the first failing.
        assert_eq!(c.read().unwrap(), Some('a'));
        assert_eq!(c.read().unwrap(), None);
    }

    #[test]
    fn test_chain_boundary_position_is_next_stream() {
        let second = SourceStream::from_str("x", SourceId::new("second"));
        let mut c = chain(vec![Box::new(stream("ab")), Box::new(second)]);
        c.read().unwrap();
        c.read().unwrap();
        // `x` is next, so the position is already the second stream's start.
        let pos = c.current_position();
        assert_eq!(pos.source().name(), "second");
        assert_eq!(coords(&pos), (1, 1, 0));
        assert_eq!(c.read().unwrap(), Some('x'));
        assert_eq!(coords(&c.current_position()), (1, 2, 1));
    }

    #[test]
    fn test_chain_read_ahead_failure_keeps_delivered_chars() {
        let broken = SourceStream::from_reader(FailingReader, SourceId::new("broken"));
        let mut c = chain(vec![Box::new(stream("ab")), Box::new(broken)]);
        assert_eq!(c.read().unwrap(), Some('a'));
        // Reading `b` runs into the failing stream, but `b` still comes out.
        assert_eq!(c.read().unwrap(), Some('b'));
        assert!(matches!(c.read(), Err(LexerError::Io { .. })));
    }
}
