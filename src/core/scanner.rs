//! DTD Token Scanner
//!
//! Turns DTD text into tokens with one token of lookahead. Parameter entity
//! references (`%name;`) outside literals are expanded in place: the
//! replacement text is pushed as a new input frame and scanning continues
//! through it, so expansion is purely textual.
//!
//! Literal, comment and processing-instruction terminators are located with
//! memchr inside the frame the construct started in.

use super::entities::{EntityNamespace, EntityTable};
use super::error::{ErrorKind, ParseError, Result};
use memchr::{memchr, memmem};

/// Maximum number of parameter entity expansions per scan (default: 10,000)
pub const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 10_000;

/// Type of DTD token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Name or keyword, including `#`-prefixed keywords like `#PCDATA`
    Identifier,
    /// Name-character run that does not start with a name-start character
    NmToken,
    /// Quoted literal (quotes stripped)
    String,
    LParen,
    RParen,
    Comma,
    Pipe,
    Question,
    Asterisk,
    Plus,
    /// `%` followed by whitespace (parameter entity declaration marker)
    Percent,
    /// `<!`
    LtBang,
    /// `<?`
    LtQues,
    Gt,
    /// `<![`
    Conditional,
    /// `]]>`
    EndConditional,
    /// `<!-- ... -->` (text holds the body)
    Comment,
    Eof,
}

impl TokenKind {
    /// Human readable description for diagnostics
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Identifier => "name",
            TokenKind::NmToken => "name token",
            TokenKind::String => "quoted literal",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Pipe => "'|'",
            TokenKind::Question => "'?'",
            TokenKind::Asterisk => "'*'",
            TokenKind::Plus => "'+'",
            TokenKind::Percent => "'%'",
            TokenKind::LtBang => "'<!'",
            TokenKind::LtQues => "'<?'",
            TokenKind::Gt => "'>'",
            TokenKind::Conditional => "'<!['",
            TokenKind::EndConditional => "']]>'",
            TokenKind::Comment => "comment",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A scanned token with the position of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            column,
        }
    }

    /// True for an identifier with exactly this text
    #[inline]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == keyword
    }
}

/// One level of input: the source itself, or an entity's replacement text
#[derive(Debug)]
struct Frame {
    text: String,
    pos: usize,
    /// Entity being expanded (None for the source frame)
    entity: Option<String>,
}

impl Frame {
    #[inline]
    fn remaining(&self) -> &str {
        &self.text[self.pos..]
    }

    #[inline]
    fn is_exhausted(&self) -> bool {
        self.pos >= self.text.len()
    }
}

/// Tokenizer over DTD text with inline parameter entity expansion
pub struct Scanner {
    /// frames[0] is the source text; later frames are active expansions
    frames: Vec<Frame>,
    /// Position of the cursor in the source frame (1-based)
    line: u32,
    column: u32,
    source_id: Option<String>,
    peeked: Option<Token>,
    trace: bool,
    /// Parameter entity references expanded so far
    expansions: u32,
    max_expansions: u32,
}

impl Scanner {
    /// Create a scanner over `text`
    pub fn new(text: impl Into<String>, source_id: Option<String>) -> Self {
        Scanner {
            frames: vec![Frame {
                text: text.into(),
                pos: 0,
                entity: None,
            }],
            line: 1,
            column: 1,
            source_id,
            peeked: None,
            trace: false,
            expansions: 0,
            max_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }

    /// Emit every consumed token as a TRACE event
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Sets the maximum number of parameter entity expansions.
    pub fn with_max_expansions(mut self, max: u32) -> Self {
        self.max_expansions = max;
        self
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Current (line, column) in the source text
    pub fn position(&self) -> (u32, u32) {
        (self.line, self.column)
    }

    /// Build an error tagged with this scanner's source
    pub fn error(&self, kind: ErrorKind, line: u32, column: u32, message: impl Into<String>) -> ParseError {
        ParseError::new(kind, self.source_id.clone(), line, column, message)
    }

    fn lexical_error(&self, line: u32, column: u32, message: impl Into<String>) -> ParseError {
        self.error(ErrorKind::Lexical, line, column, message)
    }

    // ========================================================================
    // Token interface
    // ========================================================================

    /// Look at the next token without consuming it
    pub fn peek(&mut self, entities: &EntityTable) -> Result<&Token> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.read_token(entities)?,
        };
        Ok(self.peeked.insert(token))
    }

    /// Consume and return the next token
    pub fn get(&mut self, entities: &EntityTable) -> Result<Token> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.read_token(entities)?,
        };
        if self.trace {
            tracing::trace!(
                target: "rustydtd::scanner",
                kind = ?token.kind,
                text = %token.text,
                line = token.line,
                column = token.column,
                "token"
            );
        }
        Ok(token)
    }

    /// Consume tokens up to and including the first one of `kind`
    pub fn skip_until(&mut self, kind: TokenKind, entities: &EntityTable) -> Result<()> {
        loop {
            let token = self.get(entities)?;
            if token.kind == kind {
                return Ok(());
            }
            if token.kind == TokenKind::Eof {
                return Err(self.lexical_error(
                    token.line,
                    token.column,
                    format!("Unexpected end of input while looking for {}", kind.describe()),
                ));
            }
        }
    }

    // ========================================================================
    // Raw character interface
    // ========================================================================

    /// Read raw characters up to `delimiter`, consuming the delimiter.
    /// No entity expansion happens here.
    pub fn get_until(&mut self, delimiter: char) -> Result<String> {
        self.discard_peeked();
        let (line, column) = self.position();
        let mut text = String::new();
        loop {
            match self.next_char() {
                Some(c) if c == delimiter => return Ok(text),
                Some(c) => text.push(c),
                None => {
                    return Err(self.lexical_error(
                        line,
                        column,
                        format!("Unexpected end of input while looking for '{}'", delimiter),
                    ))
                }
            }
        }
    }

    /// Skip raw characters through the next `delimiter`
    pub fn skip_past(&mut self, delimiter: char) -> Result<()> {
        self.get_until(delimiter).map(|_| ())
    }

    /// Consume the next raw character if it is `expected`
    pub fn next_char_is(&mut self, expected: char) -> bool {
        self.discard_peeked();
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    /// Skip the body of an IGNORE section through its matching `]]>`.
    /// Nested `<![ ... ]]>` sections are balanced.
    pub fn skip_conditional(&mut self) -> Result<()> {
        self.discard_peeked();
        let (line, column) = self.position();
        let mut depth = 0usize;
        loop {
            let c = self.next_char().ok_or_else(|| {
                self.lexical_error(line, column, "Unterminated conditional section")
            })?;
            match c {
                ']' => {
                    if self.peek_char() == Some(']') {
                        self.next_char();
                        // "]]]>" closes on the last two brackets
                        while self.peek_char() == Some(']') {
                            self.next_char();
                        }
                        if self.peek_char() == Some('>') {
                            self.next_char();
                            if depth == 0 {
                                return Ok(());
                            }
                            depth -= 1;
                        }
                    }
                }
                '<' => {
                    if self.peek_char() == Some('!') {
                        self.next_char();
                        if self.peek_char() == Some('[') {
                            self.next_char();
                            depth += 1;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Raw-character operations invalidate any lookahead token. Callers only
    /// use them right after consuming a token, so this never drops input.
    fn discard_peeked(&mut self) {
        debug_assert!(self.peeked.is_none(), "raw read with a token peeked");
        self.peeked = None;
    }

    // ========================================================================
    // Frames and characters
    // ========================================================================

    /// Drop exhausted expansion frames and return the next character
    fn peek_char(&mut self) -> Option<char> {
        while self.frames.len() > 1 && self.top().is_exhausted() {
            self.frames.pop();
        }
        self.top().remaining().chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.advance_top(c.len_utf8());
        Some(c)
    }

    #[inline]
    fn top(&self) -> &Frame {
        // frames[0] is never popped
        &self.frames[self.frames.len() - 1]
    }

    /// Advance the top frame by `len` bytes, tracking line/column when the
    /// top frame is the source
    fn advance_top(&mut self, len: usize) {
        let in_source = self.frames.len() == 1;
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        let consumed = &frame.text[frame.pos..frame.pos + len];
        if in_source {
            for c in consumed.chars() {
                if c == '\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
            }
        }
        frame.pos += len;
    }

    /// Take `len` bytes from the top frame as a String
    fn take_top(&mut self, len: usize) -> String {
        let frame = self.top();
        let text = frame.text[frame.pos..frame.pos + len].to_string();
        self.advance_top(len);
        text
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !is_whitespace(c) {
                break;
            }
            self.next_char();
        }
    }

    // ========================================================================
    // Tokenizer
    // ========================================================================

    fn read_token(&mut self, entities: &EntityTable) -> Result<Token> {
        loop {
            self.skip_whitespace();
            let (line, column) = self.position();

            let c = match self.peek_char() {
                Some(c) => c,
                None => return Ok(Token::new(TokenKind::Eof, "", line, column)),
            };

            if let Some(kind) = punctuation(c) {
                self.next_char();
                return Ok(Token::new(kind, c.to_string(), line, column));
            }

            match c {
                '<' => {
                    self.next_char();
                    return self.read_markup_open(line, column);
                }
                ']' => {
                    self.next_char();
                    if self.next_char() == Some(']') && self.next_char() == Some('>') {
                        return Ok(Token::new(TokenKind::EndConditional, "]]>", line, column));
                    }
                    return Err(self.lexical_error(line, column, "Illegal character ']' in input"));
                }
                '"' | '\'' => {
                    self.next_char();
                    return self.read_literal(c, line, column);
                }
                '%' => {
                    self.next_char();
                    if self.peek_char().is_some_and(is_whitespace) {
                        return Ok(Token::new(TokenKind::Percent, "%", line, column));
                    }
                    self.expand_reference(entities, line, column)?;
                }
                '#' => {
                    self.next_char();
                    let name = self.read_name_chars();
                    if name.is_empty() {
                        return Err(self.lexical_error(line, column, "Expected keyword after '#'"));
                    }
                    return Ok(Token::new(TokenKind::Identifier, format!("#{}", name), line, column));
                }
                c if is_name_start_char(c) => {
                    let name = self.read_name_chars();
                    return Ok(Token::new(TokenKind::Identifier, name, line, column));
                }
                c if is_name_char(c) => {
                    let name = self.read_name_chars();
                    return Ok(Token::new(TokenKind::NmToken, name, line, column));
                }
                other => {
                    return Err(self.lexical_error(
                        line,
                        column,
                        format!("Illegal character '{}' in input", other.escape_debug()),
                    ))
                }
            }
        }
    }

    /// Continue after `<`
    fn read_markup_open(&mut self, line: u32, column: u32) -> Result<Token> {
        match self.next_char() {
            Some('!') => match self.peek_char() {
                Some('-') => {
                    self.next_char();
                    if self.next_char() != Some('-') {
                        return Err(self.lexical_error(line, column, "Invalid character sequence '<!-'"));
                    }
                    self.read_comment(line, column)
                }
                Some('[') => {
                    self.next_char();
                    Ok(Token::new(TokenKind::Conditional, "<![", line, column))
                }
                _ => Ok(Token::new(TokenKind::LtBang, "<!", line, column)),
            },
            Some('?') => Ok(Token::new(TokenKind::LtQues, "<?", line, column)),
            Some(other) => Err(self.lexical_error(
                line,
                column,
                format!("Invalid character sequence '<{}'", other.escape_debug()),
            )),
            None => Err(self.lexical_error(line, column, "Unexpected end of input after '<'")),
        }
    }

    /// Comment body after `<!--`; "--" must be followed by '>'
    fn read_comment(&mut self, line: u32, column: u32) -> Result<Token> {
        let end = memmem::find(self.top().remaining().as_bytes(), b"--")
            .ok_or_else(|| self.lexical_error(line, column, "Unterminated comment"))?;
        let body = self.take_top(end);
        self.advance_top(2);
        match self.next_char() {
            Some('>') => Ok(Token::new(TokenKind::Comment, body, line, column)),
            _ => Err(self.lexical_error(line, column, "'--' not allowed inside a comment")),
        }
    }

    /// Literal body after its opening quote
    fn read_literal(&mut self, quote: char, line: u32, column: u32) -> Result<Token> {
        let end = memchr(quote as u8, self.top().remaining().as_bytes())
            .ok_or_else(|| self.lexical_error(line, column, "Unterminated literal"))?;
        let text = self.take_top(end);
        self.advance_top(1);
        Ok(Token::new(TokenKind::String, text, line, column))
    }

    fn read_name_chars(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if !is_name_char(c) {
                break;
            }
            name.push(c);
            self.next_char();
        }
        name
    }

    /// Expand `%name;` (the '%' is already consumed)
    fn expand_reference(&mut self, entities: &EntityTable, line: u32, column: u32) -> Result<()> {
        let name = self.read_name_chars();
        if name.is_empty() {
            return Err(self.lexical_error(line, column, "Expected entity name after '%'"));
        }
        if self.next_char() != Some(';') {
            return Err(self.lexical_error(
                line,
                column,
                format!("Expected ';' after parameter entity reference '%{}'", name),
            ));
        }
        let text = entities
            .resolve(EntityNamespace::Parameter, &name)
            .ok_or_else(|| {
                self.lexical_error(line, column, format!("Undefined parameter entity '%{};'", name))
            })?
            .to_string();
        if self.frames.iter().any(|f| f.entity.as_deref() == Some(name.as_str())) {
            return Err(self.lexical_error(
                line,
                column,
                format!("Parameter entity '%{};' references itself", name),
            ));
        }
        if self.expansions >= self.max_expansions {
            return Err(self.lexical_error(
                line,
                column,
                format!(
                    "Too many parameter entity expansions (limit {}) at '%{};'",
                    self.max_expansions, name
                ),
            ));
        }
        self.expansions += 1;
        self.frames.push(Frame {
            text,
            pos: 0,
            entity: Some(name),
        });
        Ok(())
    }
}

#[inline]
fn punctuation(c: char) -> Option<TokenKind> {
    match c {
        '>' => Some(TokenKind::Gt),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        ',' => Some(TokenKind::Comma),
        '|' => Some(TokenKind::Pipe),
        '?' => Some(TokenKind::Question),
        '*' => Some(TokenKind::Asterisk),
        '+' => Some(TokenKind::Plus),
        _ => None,
    }
}

#[inline]
fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Check if char is a valid XML name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII letters
#[inline]
fn is_name_start_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (!c.is_ascii() && c.is_alphabetic())
}

/// Check if char is a valid XML name character
#[inline]
fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || c.is_ascii_digit()
        || matches!(c, '-' | '.' | '\u{B7}')
        || (!c.is_ascii() && c.is_alphanumeric())
}
