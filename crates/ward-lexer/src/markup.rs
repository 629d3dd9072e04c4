//! HTML and XML tokenization.
//!
//! Two stages. [`MarkupSplitter`] cuts the input into raw chunks (tag starts,
//! tag ends, words, quoted strings, comments and the like) so that each chunk
//! starts exactly where the previous one ended. [`MarkupLexer`] then drops
//! whitespace inside tags, merges adjacent text, and reclassifies the words
//! inside a tag as attribute names and values.

use std::collections::VecDeque;
use std::io::Cursor;

use crate::config::MarkupConfig;
use crate::lookahead::Lookahead;
use crate::span::{SourceId, Span};
use crate::stream::{CharStream, SourceStream};
use crate::token::{end_of_input, MarkupTokenKind, Token, TokenStream};
use crate::LexerError;

/// Attributes that may appear in HTML without a value.
const VALUELESS_ATTRIBUTES: &[&str] = &[
    "checked", "compact", "declare", "defer", "disabled", "ismap", "multiple", "nohref",
    "noresize", "noshade", "nowrap", "readonly", "selected",
];

/// Constructs recognized after a `<`, each running to its own terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct {
    TagName,
    /// `</`, not yet followed by a letter.
    Slash,
    /// `<!`
    Bang,
    /// `<!-`
    BangDash,
    Comment,
    CommentDash,
    CommentDashes,
    Cdata,
    CdataBracket,
    CdataBrackets,
    Directive,
    /// `<?` processing instruction.
    Instruction,
    InstructionQmark,
    ServerCode,
    ServerCodePercent,
}

enum Step {
    Continue(Construct),
    Done(MarkupTokenKind),
}

impl Construct {
    fn step(self, ch: char, as_xml: bool) -> Step {
        use Construct::*;
        use Step::{Continue, Done};
        match (self, ch) {
            (TagName, _) => Continue(TagName),
            (Slash, _) => Continue(TagName),

            (Bang, '[') if as_xml => Continue(Cdata),
            (Bang, '-') => Continue(BangDash),
            (Bang, '>') => Done(MarkupTokenKind::Directive),
            (Bang, _) => Continue(Directive),
            (BangDash, '-') => Continue(Comment),
            (BangDash, '>') => Done(MarkupTokenKind::Directive),
            (BangDash, _) => Continue(Directive),

            (Comment | CommentDash, '-') => Continue(next_dash(self)),
            (Comment | CommentDash, _) => Continue(Comment),
            (CommentDashes, '>') => Done(MarkupTokenKind::Comment),
            (CommentDashes, '-') => Continue(CommentDashes),
            (CommentDashes, _) => Continue(Comment),

            (Cdata, ']') => Continue(CdataBracket),
            (Cdata, _) => Continue(Cdata),
            (CdataBracket, ']') => Continue(CdataBrackets),
            (CdataBracket, _) => Continue(Cdata),
            (CdataBrackets, '>') => Done(MarkupTokenKind::Cdata),
            (CdataBrackets, ']') => Continue(CdataBrackets),
            (CdataBrackets, _) => Continue(Cdata),

            (Directive, '>') => Done(MarkupTokenKind::Directive),
            (Directive, _) => Continue(Directive),

            (Instruction | InstructionQmark, '?') => Continue(InstructionQmark),
            (InstructionQmark, '>') => Done(MarkupTokenKind::Directive),
            (Instruction | InstructionQmark, _) => Continue(Instruction),

            (ServerCode | ServerCodePercent, '%') => Continue(ServerCodePercent),
            (ServerCodePercent, '>') => Done(MarkupTokenKind::ServerCode),
            (ServerCode | ServerCodePercent, _) => Continue(ServerCode),
        }
    }

    /// The kind of a construct cut short by the end of input.
    fn kind_at_end(self) -> MarkupTokenKind {
        use Construct::*;
        match self {
            TagName => MarkupTokenKind::TagStart,
            Cdata | CdataBracket | CdataBrackets => MarkupTokenKind::Cdata,
            Comment | CommentDash | CommentDashes => MarkupTokenKind::Comment,
            Directive | Instruction | InstructionQmark => MarkupTokenKind::Directive,
            ServerCode | ServerCodePercent => MarkupTokenKind::ServerCode,
            Slash | Bang | BangDash => MarkupTokenKind::Text,
        }
    }
}

fn next_dash(state: Construct) -> Construct {
    match state {
        Construct::Comment => Construct::CommentDash,
        _ => Construct::CommentDashes,
    }
}

/// Breaks a character stream into raw markup chunks.
///
/// Tracks whether it is inside a tag, and whether it is inside the content of
/// a raw-text element such as `<script>`. Inside raw text no tags, comments or
/// directives are recognized except the close tag of that element, and every
/// chunk but server code comes out as [`MarkupTokenKind::Unescaped`].
pub struct MarkupSplitter<S> {
    input: Lookahead<S>,
    config: MarkupConfig,
    in_tag: bool,
    in_raw_text: bool,
    /// Canonical name of the element whose close tag ends raw text.
    raw_text_tag: Option<String>,
    /// Whether the last non-whitespace chunk was `=`.
    after_eq: bool,
    pending: Option<Token<MarkupTokenKind>>,
}

impl<S: CharStream> MarkupSplitter<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, MarkupConfig::default())
    }

    pub fn with_config(stream: S, config: MarkupConfig) -> Self {
        Self {
            input: Lookahead::new(stream, 2),
            config,
            in_tag: false,
            in_raw_text: false,
            raw_text_tag: None,
            after_eq: false,
            pending: None,
        }
    }

    pub fn treated_as_xml(&self) -> bool {
        self.config.treat_as_xml
    }

    pub fn set_treated_as_xml(&mut self, as_xml: bool) {
        self.config.treat_as_xml = as_xml;
    }

    pub fn close(&mut self) -> Result<(), LexerError> {
        self.input.close()
    }

    fn produce(&mut self) -> Result<Option<Token<MarkupTokenKind>>, LexerError> {
        let Some(token) = self.split()? else {
            return Ok(None);
        };
        if self.in_raw_text {
            if token.kind != MarkupTokenKind::ServerCode {
                return Ok(Some(token.reclassify(MarkupTokenKind::Unescaped)));
            }
        } else if !self.config.treat_as_xml {
            match token.kind {
                MarkupTokenKind::TagStart => {
                    let name = self.config.canonical_name(&token.text[1..]);
                    if self.config.is_raw_text(&name) {
                        self.raw_text_tag = Some(name);
                    }
                }
                MarkupTokenKind::TagEnd => {
                    self.in_raw_text = self.raw_text_tag.is_some();
                    if let Some(name) = &self.raw_text_tag {
                        tracing::debug!(element = %name, "entering raw text");
                    }
                }
                _ => {}
            }
        }
        Ok(Some(token))
    }

    /// Cuts the next chunk. Every chunk starts where the previous one ended.
    fn split(&mut self) -> Result<Option<Token<MarkupTokenKind>>, LexerError> {
        let start = self.input.mutable_position();
        let Some(ch) = self.input.pop()? else {
            return Ok(None);
        };
        let mut text = String::from(ch);
        let kind = if self.in_tag {
            Some(self.split_in_tag(ch, &mut text)?)
        } else if ch == '<' {
            self.split_markup(&mut text)?
        } else {
            None
        };
        let kind = match kind {
            Some(kind) => kind,
            None => {
                self.take_while(&mut text, |c| c != '<')?;
                MarkupTokenKind::Text
            }
        };
        if kind != MarkupTokenKind::Ignorable {
            self.after_eq = text == "=";
        }
        let span = Span::span(&start.to_span(), &self.input.current_position());
        tracing::trace!(?kind, %text, "markup chunk");
        Ok(Some(Token::new(text, kind, span)))
    }

    fn split_in_tag(&mut self, ch: char, text: &mut String) -> Result<MarkupTokenKind, LexerError> {
        let kind = match ch {
            '>' => {
                self.in_tag = false;
                MarkupTokenKind::TagEnd
            }
            '/' => {
                if self.next_is(|c| c == '>')? {
                    self.take(text)?;
                    self.in_tag = false;
                    MarkupTokenKind::TagEnd
                } else {
                    MarkupTokenKind::Text
                }
            }
            '=' => MarkupTokenKind::Text,
            '"' | '\'' if self.after_eq => {
                while let Some(c) = self.input.pop()? {
                    text.push(c);
                    if c == ch {
                        break;
                    }
                }
                MarkupTokenKind::QuotedString
            }
            '"' | '\'' => MarkupTokenKind::Text,
            c if c.is_whitespace() => {
                self.take_while(text, char::is_whitespace)?;
                MarkupTokenKind::Ignorable
            }
            _ => {
                self.take_word(text)?;
                MarkupTokenKind::Text
            }
        };
        Ok(kind)
    }

    /// A bare word inside a tag: an attribute name or unquoted value.
    fn take_word(&mut self, text: &mut String) -> Result<(), LexerError> {
        loop {
            self.input.fetch(2)?;
            let Some(ch) = self.input.peek(0) else {
                return Ok(());
            };
            let next = self.input.peek(1);
            if ch == '/' && next == Some('>') && !self.after_eq {
                return Ok(());
            }
            if ch == '>' || ch == '=' || ch.is_whitespace() {
                return Ok(());
            }
            self.take(text)?;
            // A quote ending a word closes it: `<a b=c"d" e>`.
            if matches!(ch, '"' | '\'')
                && next.is_some_and(|n| n.is_whitespace() || n == '>' || n == '/')
            {
                return Ok(());
            }
        }
    }

    /// Classifies what follows a `<` outside a tag. `None` means plain text.
    fn split_markup(&mut self, text: &mut String) -> Result<Option<MarkupTokenKind>, LexerError> {
        self.input.fetch(1)?;
        let Some(next) = self.input.peek(0) else {
            return Ok(Some(MarkupTokenKind::Text));
        };
        let construct = match next {
            '/' => Some(Construct::Slash),
            '!' if !self.in_raw_text => Some(Construct::Bang),
            '?' if !self.in_raw_text => Some(Construct::Instruction),
            '%' => Some(Construct::ServerCode),
            // The second `<` may start a tag of its own.
            '<' => return Ok(Some(MarkupTokenKind::Text)),
            c if self.is_name_start(c) && !self.in_raw_text => Some(Construct::TagName),
            _ => None,
        };
        self.take(text)?;
        match construct {
            Some(construct) => self.run_construct(construct, text),
            None => Ok(None),
        }
    }

    fn run_construct(
        &mut self,
        mut state: Construct,
        text: &mut String,
    ) -> Result<Option<MarkupTokenKind>, LexerError> {
        loop {
            self.input.fetch(1)?;
            let Some(ch) = self.input.peek(0) else {
                return Ok(Some(state.kind_at_end()));
            };
            match state {
                Construct::TagName if ch.is_whitespace() || matches!(ch, '>' | '/' | '<') => {
                    return Ok(Some(self.end_tag_name(text)));
                }
                Construct::Slash if !ch.is_alphabetic() => {
                    if ch == '<' {
                        return Ok(Some(MarkupTokenKind::Text));
                    }
                    self.take(text)?;
                    return Ok(None);
                }
                _ => {}
            }
            self.take(text)?;
            match state.step(ch, self.config.treat_as_xml) {
                Step::Continue(next) => state = next,
                Step::Done(kind) => return Ok(Some(kind)),
            }
        }
    }

    /// Finishes a `<name` or `</name` chunk, leaving raw text if it closes the
    /// current raw-text element.
    fn end_tag_name(&mut self, text: &str) -> MarkupTokenKind {
        if self.in_raw_text {
            if let Some(name) = text.strip_prefix("</") {
                let name = self.config.canonical_name(name);
                if self.raw_text_tag.as_deref() == Some(name.as_str()) {
                    tracing::debug!(element = %name, "leaving raw text");
                    self.in_raw_text = false;
                    self.raw_text_tag = None;
                }
            }
        }
        self.in_tag = !self.in_raw_text;
        MarkupTokenKind::TagStart
    }

    fn is_name_start(&self, ch: char) -> bool {
        ch.is_ascii_alphabetic()
            || (self.config.treat_as_xml && (ch == ':' || ch == '_' || ch.is_alphabetic()))
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

impl<S: CharStream> TokenStream for MarkupSplitter<S> {
    type Kind = MarkupTokenKind;

    fn has_next(&mut self) -> Result<bool, LexerError> {
        if self.pending.is_none() {
            self.pending = self.produce()?;
        }
        Ok(self.pending.is_some())
    }

    fn next_token(&mut self) -> Result<Token<MarkupTokenKind>, LexerError> {
        self.has_next()?;
        self.pending
            .take()
            .ok_or_else(|| end_of_input(self.input.current_position()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagState {
    OutsideTag,
    InTag,
    SawName,
    SawEq,
}

/// Markup tokenizer: the splitter's chunks with whitespace inside tags
/// dropped, adjacent text merged, and attribute names and values classified.
pub struct MarkupLexer<S> {
    splitter: MarkupSplitter<S>,
    state: TagState,
    /// Chunks peeked from the splitter but not yet consumed.
    lookahead: VecDeque<Token<MarkupTokenKind>>,
    pending: Option<Token<MarkupTokenKind>>,
}

impl MarkupLexer<SourceStream<Cursor<String>>> {
    /// Tokenize an in-memory HTML document.
    pub fn tokenize(source: &str) -> Result<Vec<Token<MarkupTokenKind>>, LexerError> {
        let stream = SourceStream::from_str(source, SourceId::new("<input>"));
        let mut lexer = MarkupLexer::new(stream);
        let mut tokens = Vec::new();
        while lexer.has_next()? {
            tokens.push(lexer.next_token()?);
        }
        Ok(tokens)
    }
}

impl<S: CharStream> MarkupLexer<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, MarkupConfig::default())
    }

    pub fn with_config(stream: S, config: MarkupConfig) -> Self {
        Self {
            splitter: MarkupSplitter::with_config(stream, config),
            state: TagState::OutsideTag,
            lookahead: VecDeque::new(),
            pending: None,
        }
    }

    /// Whether the input is treated as XML, where element names keep their
    /// case and no element has raw-text content.
    pub fn treated_as_xml(&self) -> bool {
        self.splitter.treated_as_xml()
    }

    pub fn set_treated_as_xml(&mut self, as_xml: bool) {
        self.splitter.set_treated_as_xml(as_xml);
    }

    pub fn close(&mut self) -> Result<(), LexerError> {
        self.splitter.close()
    }

    fn produce(&mut self) -> Result<Option<Token<MarkupTokenKind>>, LexerError> {
        loop {
            let Some(token) = self.read_chunk()? else {
                return Ok(None);
            };
            match token.kind {
                MarkupTokenKind::TagStart => {
                    self.state = TagState::InTag;
                    return Ok(Some(token));
                }
                MarkupTokenKind::TagEnd => {
                    // `<input checked=>` has an empty value, unlike `<input checked>`.
                    if self.state == TagState::SawEq && !self.treated_as_xml() {
                        let empty = Token::new(
                            "",
                            MarkupTokenKind::AttrValue,
                            Span::start_of(&token.span),
                        );
                        self.lookahead.push_front(token);
                        self.state = TagState::InTag;
                        return Ok(Some(empty));
                    }
                    self.state = TagState::OutsideTag;
                    return Ok(Some(token));
                }
                MarkupTokenKind::Ignorable => continue,
                _ => {}
            }

            let is_text = token.kind == MarkupTokenKind::Text;
            let token = match self.state {
                TagState::OutsideTag => {
                    if is_text || token.kind == MarkupTokenKind::Unescaped {
                        self.collapse_subsequent(token)?
                    } else {
                        token
                    }
                }
                TagState::InTag => {
                    if is_text && token.text != "=" {
                        self.state = TagState::SawName;
                        token.reclassify(MarkupTokenKind::AttrName)
                    } else {
                        token
                    }
                }
                TagState::SawName => {
                    if is_text && token.text == "=" {
                        self.state = TagState::SawEq;
                        continue;
                    } else if is_text {
                        token.reclassify(MarkupTokenKind::AttrName)
                    } else {
                        self.state = TagState::InTag;
                        token
                    }
                }
                TagState::SawEq => {
                    if is_text || token.kind == MarkupTokenKind::QuotedString {
                        let value = if is_text {
                            self.collapse_attribute_value(token)?
                        } else {
                            token
                        };
                        self.state = TagState::InTag;
                        value.reclassify(MarkupTokenKind::AttrValue)
                    } else {
                        token
                    }
                }
            };
            tracing::trace!(kind = ?token.kind, text = %token.text, "markup token");
            return Ok(Some(token));
        }
    }

    /// Merges every directly following chunk of the same kind.
    fn collapse_subsequent(
        &mut self,
        mut token: Token<MarkupTokenKind>,
    ) -> Result<Token<MarkupTokenKind>, LexerError> {
        while self.peek_chunk(0)?.is_some_and(|next| next.kind == token.kind) {
            if let Some(next) = self.read_chunk()? {
                token = join(token, next);
            }
        }
        Ok(token)
    }

    /// Extends an unquoted attribute value over the chunks that still belong
    /// to it, so `onclick=a.b=c` and `title=foo bar>` each yield one value.
    ///
    /// Stops before whitespace followed by the end of input, a valueless
    /// attribute name, a tag end, or another `name=`.
    fn collapse_attribute_value(
        &mut self,
        mut token: Token<MarkupTokenKind>,
    ) -> Result<Token<MarkupTokenKind>, LexerError> {
        if self.treated_as_xml() {
            return Ok(token);
        }
        let mut count = 0;
        while let Some(next) = self.peek_chunk(count)? {
            let kind = next.kind;
            match kind {
                MarkupTokenKind::Text => {}
                MarkupTokenKind::Ignorable => {
                    let Some(word) = self.peek_chunk(count + 1)? else {
                        break;
                    };
                    if word.kind != MarkupTokenKind::Text || is_valueless(&word.text) {
                        break;
                    }
                    let mut eq = self.peek_chunk(count + 2)?;
                    if eq.is_some_and(|t| t.kind == MarkupTokenKind::Ignorable) {
                        eq = self.peek_chunk(count + 3)?;
                    }
                    if eq.map_or(true, |t| t.text == "=") {
                        break;
                    }
                }
                _ => break,
            }
            count += 1;
        }
        for _ in 0..count {
            if let Some(next) = self.read_chunk()? {
                token = join(token, next);
            }
        }
        Ok(token)
    }

    fn read_chunk(&mut self) -> Result<Option<Token<MarkupTokenKind>>, LexerError> {
        if let Some(token) = self.lookahead.pop_front() {
            return Ok(Some(token));
        }
        if self.splitter.has_next()? {
            return self.splitter.next_token().map(Some);
        }
        Ok(None)
    }

    fn peek_chunk(&mut self, index: usize) -> Result<Option<&Token<MarkupTokenKind>>, LexerError> {
        while self.lookahead.len() <= index && self.splitter.has_next()? {
            let token = self.splitter.next_token()?;
            self.lookahead.push_back(token);
        }
        Ok(self.lookahead.get(index))
    }
}

impl<S: CharStream> TokenStream for MarkupLexer<S> {
    type Kind = MarkupTokenKind;

    fn has_next(&mut self) -> Result<bool, LexerError> {
        if self.pending.is_none() {
            self.pending = self.produce()?;
        }
        Ok(self.pending.is_some())
    }

    fn next_token(&mut self) -> Result<Token<MarkupTokenKind>, LexerError> {
        self.has_next()?;
        match self.pending.take() {
            Some(token) => Ok(token),
            None => Err(end_of_input(self.splitter.input.current_position())),
        }
    }
}

fn join(a: Token<MarkupTokenKind>, b: Token<MarkupTokenKind>) -> Token<MarkupTokenKind> {
    let span = Span::span(&a.span, &b.span);
    Token::new(a.text + &b.text, a.kind, span)
}

fn is_valueless(name: &str) -> bool {
    VALUELESS_ATTRIBUTES
        .iter()
        .any(|attr| attr.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::tests::stream;
    use pretty_assertions::assert_eq;
    use MarkupTokenKind::*;

    fn split(source: &str) -> Vec<(MarkupTokenKind, String)> {
        let mut splitter = MarkupSplitter::new(stream(source));
        let mut out = Vec::new();
        while splitter.has_next().unwrap() {
            let token = splitter.next_token().unwrap();
            out.push((token.kind, token.text));
        }
        out
    }

    fn lex(source: &str) -> Vec<(MarkupTokenKind, String)> {
        lex_with(source, MarkupConfig::default())
    }

    fn lex_with(source: &str, config: MarkupConfig) -> Vec<(MarkupTokenKind, String)> {
        let mut lexer = MarkupLexer::with_config(stream(source), config);
        let mut out = Vec::new();
        while lexer.has_next().unwrap() {
            let token = lexer.next_token().unwrap();
            out.push((token.kind, token.text));
        }
        out
    }

    fn t(kind: MarkupTokenKind, text: &str) -> (MarkupTokenKind, String) {
        (kind, text.to_string())
    }

    // =========================================================================
    // Splitter
    // =========================================================================

    #[test]
    fn test_split_empty() {
        assert!(split("").is_empty());
    }

    #[test]
    fn test_split_plain_text() {
        assert_eq!(split("hello world"), vec![t(Text, "hello world")]);
    }

    #[test]
    fn test_split_tag_with_attribute() {
        assert_eq!(
            split(r#"<a href="x">"#),
            vec![
                t(TagStart, "<a"),
                t(Ignorable, " "),
                t(Text, "href"),
                t(Text, "="),
                t(QuotedString, r#""x""#),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_split_self_closing() {
        assert_eq!(
            split("<br/>"),
            vec![t(TagStart, "<br"), t(TagEnd, "/>")]
        );
    }

    #[test]
    fn test_split_close_tag() {
        assert_eq!(
            split("</p >"),
            vec![t(TagStart, "</p"), t(Ignorable, " "), t(TagEnd, ">")]
        );
    }

    #[test]
    fn test_split_comment() {
        assert_eq!(
            split("a<!-- x -- y -->b"),
            vec![t(Text, "a"), t(Comment, "<!-- x -- y -->"), t(Text, "b")]
        );
    }

    #[test]
    fn test_split_comment_single_dash_inside() {
        assert_eq!(
            split("<!-- a-b -->c"),
            vec![t(Comment, "<!-- a-b -->"), t(Text, "c")]
        );
    }

    #[test]
    fn test_split_directive() {
        assert_eq!(
            split("<!DOCTYPE html><p>"),
            vec![t(Directive, "<!DOCTYPE html>"), t(TagStart, "<p"), t(TagEnd, ">")]
        );
    }

    #[test]
    fn test_split_processing_instruction() {
        assert_eq!(
            split("<?xml version='1.0' ?>x"),
            vec![t(Directive, "<?xml version='1.0' ?>"), t(Text, "x")]
        );
    }

    #[test]
    fn test_split_server_code() {
        assert_eq!(
            split("<% a > b %>"),
            vec![t(ServerCode, "<% a > b %>")]
        );
    }

    #[test]
    fn test_split_cdata_in_xml() {
        let mut splitter = MarkupSplitter::with_config(stream("<![CDATA[a]]>b]]>"), MarkupConfig::xml());
        let first = splitter.next_token().unwrap();
        assert_eq!((first.kind, first.text.as_str()), (Cdata, "<![CDATA[a]]>"));
    }

    #[test]
    fn test_split_cdata_in_html_is_directive() {
        assert_eq!(split("<![CDATA[a]]>")[0], t(Directive, "<![CDATA[a]]>"));
    }

    #[test]
    fn test_split_unterminated_constructs_keep_their_kind() {
        assert_eq!(split("<!-- open"), vec![t(Comment, "<!-- open")]);
        assert_eq!(split("<!DOCTYPE"), vec![t(Directive, "<!DOCTYPE")]);
        assert_eq!(split("<? pi"), vec![t(Directive, "<? pi")]);
        assert_eq!(split("<% code"), vec![t(ServerCode, "<% code")]);
        assert_eq!(split("<div"), vec![t(TagStart, "<div")]);
        assert_eq!(split("<!"), vec![t(Text, "<!")]);
    }

    #[test]
    fn test_split_lone_angle_brackets() {
        assert_eq!(split("<"), vec![t(Text, "<")]);
        assert_eq!(split("a < b"), vec![t(Text, "a "), t(Text, "< b")]);
        assert_eq!(
            split("<<b>"),
            vec![t(Text, "<"), t(TagStart, "<b"), t(TagEnd, ">")]
        );
        assert_eq!(split("</ x"), vec![t(Text, "</ x")]);
    }

    #[test]
    fn test_split_unquoted_word_stops_before_self_close() {
        assert_eq!(
            split("<a b/>"),
            vec![
                t(TagStart, "<a"),
                t(Ignorable, " "),
                t(Text, "b"),
                t(TagEnd, "/>"),
            ]
        );
    }

    #[test]
    fn test_split_quote_not_after_eq_is_text() {
        assert_eq!(
            split(r#"<a "b">"#),
            vec![
                t(TagStart, "<a"),
                t(Ignorable, " "),
                t(Text, "\""),
                t(Text, "b\""),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_split_chunks_are_contiguous() {
        let mut splitter = MarkupSplitter::new(stream("<p class=x>a\nb<!--c-->"));
        let mut offset = 0;
        while splitter.has_next().unwrap() {
            let token = splitter.next_token().unwrap();
            assert_eq!(token.span.start_offset(), offset);
            assert_eq!(token.span.length(), token.text.chars().count());
            offset = token.span.end_offset();
        }
        assert_eq!(offset, 22);
    }

    #[test]
    fn test_split_exhausted_is_end_of_input() {
        let mut splitter = MarkupSplitter::new(stream("x"));
        splitter.next_token().unwrap();
        match splitter.next_token() {
            Err(LexerError::Parse(err)) => {
                assert_eq!(err.kind, crate::MessageKind::EndOfInput)
            }
            other => panic!("expected end of input, got {other:?}"),
        }
    }

    // =========================================================================
    // Raw text
    // =========================================================================

    #[test]
    fn test_script_content_is_unescaped() {
        assert_eq!(
            split("<script>if (a<b) x='</p>'</script>"),
            vec![
                t(TagStart, "<script"),
                t(TagEnd, ">"),
                t(Unescaped, "if (a"),
                t(Unescaped, "<b) x='"),
                t(Unescaped, "</p"),
                t(Unescaped, ">'"),
                t(TagStart, "</script"),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_raw_text_close_tag_is_case_insensitive() {
        let tokens = split("<STYLE>a<!--b</style>c");
        assert_eq!(
            tokens,
            vec![
                t(TagStart, "<STYLE"),
                t(TagEnd, ">"),
                t(Unescaped, "a"),
                t(Unescaped, "<!--b"),
                t(TagStart, "</style"),
                t(TagEnd, ">"),
                t(Text, "c"),
            ]
        );
    }

    #[test]
    fn test_server_code_in_raw_text_keeps_kind() {
        assert_eq!(
            split("<script><% x %></script>")[2],
            t(ServerCode, "<% x %>")
        );
    }

    #[test]
    fn test_xml_has_no_raw_text() {
        let mut splitter = MarkupSplitter::with_config(stream("<script><b>"), MarkupConfig::xml());
        let mut kinds = Vec::new();
        while splitter.has_next().unwrap() {
            kinds.push(splitter.next_token().unwrap().kind);
        }
        assert_eq!(kinds, vec![TagStart, TagEnd, TagStart, TagEnd]);
    }

    // =========================================================================
    // Lexer
    // =========================================================================

    #[test]
    fn test_lex_anchor() {
        assert_eq!(
            lex(r#"<a href="x">t</a>"#),
            vec![
                t(TagStart, "<a"),
                t(AttrName, "href"),
                t(AttrValue, r#""x""#),
                t(TagEnd, ">"),
                t(Text, "t"),
                t(TagStart, "</a"),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_lex_via_tokenize() {
        let tokens = MarkupLexer::tokenize("<b>hi</b>").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[2].text, "hi");
        assert_eq!(tokens[2].span.start_offset(), 3);
    }

    #[test]
    fn test_lex_valueless_attributes() {
        assert_eq!(
            lex("<input checked disabled>"),
            vec![
                t(TagStart, "<input"),
                t(AttrName, "checked"),
                t(AttrName, "disabled"),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_lex_unquoted_value_with_equals() {
        assert_eq!(
            lex("<a onclick=this.clicked=true>"),
            vec![
                t(TagStart, "<a"),
                t(AttrName, "onclick"),
                t(AttrValue, "this.clicked=true"),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_lex_unquoted_value_with_space() {
        assert_eq!(
            lex("<a title=foo bar>"),
            vec![
                t(TagStart, "<a"),
                t(AttrName, "title"),
                t(AttrValue, "foo bar"),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_lex_unquoted_value_stops_at_next_attribute() {
        assert_eq!(
            lex("<a title=foo href=bar checked>"),
            vec![
                t(TagStart, "<a"),
                t(AttrName, "title"),
                t(AttrValue, "foo"),
                t(AttrName, "href"),
                t(AttrValue, "bar"),
                t(AttrName, "checked"),
                t(TagEnd, ">"),
            ]
        );
        assert_eq!(
            lex("<input value=x checked>")[2],
            t(AttrValue, "x")
        );
    }

    #[test]
    fn test_lex_empty_value_before_tag_end() {
        let tokens = lex("<input checked=>");
        assert_eq!(
            tokens,
            vec![
                t(TagStart, "<input"),
                t(AttrName, "checked"),
                t(AttrValue, ""),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_lex_merges_text() {
        assert_eq!(
            lex("a < b & c"),
            vec![t(Text, "a < b & c")]
        );
    }

    #[test]
    fn test_lex_merged_text_spans_both_chunks() {
        let mut lexer = MarkupLexer::new(stream("a < b"));
        let token = lexer.next_token().unwrap();
        assert_eq!((token.span.start_offset(), token.span.end_offset()), (0, 5));
    }

    #[test]
    fn test_lex_merges_unescaped_script_body() {
        assert_eq!(
            lex("<script>a<b</script>"),
            vec![
                t(TagStart, "<script"),
                t(TagEnd, ">"),
                t(Unescaped, "a<b"),
                t(TagStart, "</script"),
                t(TagEnd, ">"),
            ]
        );
    }

    #[test]
    fn test_lex_xml_toggle() {
        let mut lexer = MarkupLexer::new(stream("<script><b/></script>"));
        assert!(!lexer.treated_as_xml());
        lexer.set_treated_as_xml(true);
        assert!(lexer.treated_as_xml());
        let mut kinds = Vec::new();
        while lexer.has_next().unwrap() {
            kinds.push(lexer.next_token().unwrap().kind);
        }
        assert_eq!(
            kinds,
            vec![TagStart, TagEnd, TagStart, TagEnd, TagStart, TagEnd]
        );
    }

    #[test]
    fn test_lex_xml_keeps_unquoted_values_short() {
        assert_eq!(
            lex_with("<a t=foo bar>", MarkupConfig::xml())[2],
            t(AttrValue, "foo")
        );
    }

    #[test]
    fn test_lex_comment_passes_through() {
        assert_eq!(
            lex("<!-- c --><p>"),
            vec![t(Comment, "<!-- c -->"), t(TagStart, "<p"), t(TagEnd, ">")]
        );
    }
}
