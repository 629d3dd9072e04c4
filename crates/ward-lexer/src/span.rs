use std::fmt;
use std::sync::Arc;

/// Names the input a span points into.
///
/// Cheap to clone: every span produced from one input shares the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(Arc<str>);

impl SourceId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The last path segment of the name, for compact diagnostics.
    pub fn short_name(&self) -> &str {
        self.0
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// The range of characters in one input occupied by a token or node.
///
/// Lines and columns are 1-based. Offsets count characters from the start of
/// the input and are 0-based. Start is inclusive, end is exclusive, so
/// `length()` is the number of characters covered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    source: SourceId,
    start_line: usize,
    start_column: usize,
    start_offset: usize,
    end_line: usize,
    end_column: usize,
    end_offset: usize,
}

impl Span {
    /// An empty span at a single point.
    pub fn point(source: SourceId, line: usize, column: usize, offset: usize) -> Self {
        Self {
            source,
            start_line: line,
            start_column: column,
            start_offset: offset,
            end_line: line,
            end_column: column,
            end_offset: offset,
        }
    }

    pub fn start_of_file(source: SourceId) -> Self {
        Self::point(source, 1, 1, 0)
    }

    /// Position attached to synthesized nodes that have no source text.
    pub fn predefined() -> Self {
        Self::point(SourceId::new("predefined"), 0, 0, 0)
    }

    /// The smallest span covering both `a` and `b`.
    ///
    /// Spans from different inputs cannot be merged; `a` is returned as is.
    pub fn span(a: &Span, b: &Span) -> Span {
        if a.source != b.source {
            return a.clone();
        }
        let start = if b.start_offset < a.start_offset { b } else { a };
        let end = if b.end_offset > a.end_offset { b } else { a };
        Span {
            source: a.source.clone(),
            start_line: start.start_line,
            start_column: start.start_column,
            start_offset: start.start_offset,
            end_line: end.end_line,
            end_column: end.end_column,
            end_offset: end.end_offset,
        }
    }

    /// The gap running from the end of `a` to the start of `b`.
    ///
    /// `a` is expected to end before `b` starts. Overlapping or reversed
    /// arguments give a span whose [`length`](Self::length) is zero.
    pub fn between(a: &Span, b: &Span) -> Span {
        Span {
            source: a.source.clone(),
            start_line: a.end_line,
            start_column: a.end_column,
            start_offset: a.end_offset,
            end_line: b.start_line,
            end_column: b.start_column,
            end_offset: b.start_offset,
        }
    }

    pub fn start_of(span: &Span) -> Span {
        Self::point(
            span.source.clone(),
            span.start_line,
            span.start_column,
            span.start_offset,
        )
    }

    pub fn end_of(span: &Span) -> Span {
        Self::point(
            span.source.clone(),
            span.end_line,
            span.end_column,
            span.end_offset,
        )
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn start_line(&self) -> usize {
        self.start_line
    }

    pub fn start_column(&self) -> usize {
        self.start_column
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn end_line(&self) -> usize {
        self.end_line
    }

    pub fn end_column(&self) -> usize {
        self.end_column
    }

    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    /// Characters covered; zero when the end lies before the start.
    pub fn length(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}+{}@{}",
            self.source, self.start_line, self.start_column, self.start_offset
        )?;
        if !self.is_empty() {
            f.write_str(" - ")?;
            if self.end_line != self.start_line {
                write!(f, "{}+", self.end_line)?;
            }
            write!(f, "{}@{}", self.end_column, self.end_offset)?;
        }
        Ok(())
    }
}

/// Per-character position accumulator used inside char streams.
///
/// Updated in place on every read so streams never build a `Span` per
/// character. Convert with [`MutablePosition::to_span`] before attaching a
/// position to a token or node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutablePosition {
    source: SourceId,
    line: usize,
    column: usize,
    offset: usize,
    after_cr: bool,
}

impl MutablePosition {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            line: 1,
            column: 1,
            offset: 0,
            after_cr: false,
        }
    }

    /// Starts accumulating at the start of `span`.
    pub fn at(span: &Span) -> Self {
        Self {
            source: span.source.clone(),
            line: span.start_line,
            column: span.start_column,
            offset: span.start_offset,
            after_cr: false,
        }
    }

    /// Moves past `ch`. `\r`, `\n` and `\r\n` each end exactly one line.
    pub fn advance(&mut self, ch: char) {
        self.offset += 1;
        self.column += 1;
        match ch {
            '\n' if self.after_cr => {
                self.column = 1;
            }
            '\n' | '\r' => {
                self.line += 1;
                self.column = 1;
            }
            _ => {}
        }
        self.after_cr = ch == '\r';
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn to_span(&self) -> Span {
        Span::point(self.source.clone(), self.line, self.column, self.offset)
    }
}

impl fmt::Display for MutablePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}+{}@{}",
            self.source, self.line, self.column, self.offset
        )
    }
}
