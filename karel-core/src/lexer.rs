//! Tokenizer for Karel programs.

use std::fmt;

use serde::Serialize;
use tracing::trace;

/// Kind of a token produced by the tokenizer.
///
/// Indentation is not whitespace here: changes in leading width are
/// turned into `Indent`/`Dedent` tokens so the grammar can treat blocks
/// as if they were delimited explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Identifier,
    Number,
    Colon,

    // Structure
    Newline,
    Indent,
    Dedent,

    // Keywords
    Define,
    Do,
    If,
    Elif,
    Else,
    While,

    Eof,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::Colon => "COLON",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Indent => "INDENT",
            TokenKind::Dedent => "DEDENT",
            TokenKind::Define => "DEFINE",
            TokenKind::Do => "DO",
            TokenKind::If => "IF",
            TokenKind::Elif => "ELIF",
            TokenKind::Else => "ELSE",
            TokenKind::While => "WHILE",
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text for identifiers, keywords, numbers and colons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Parsed value of a `Number`; `None` if the digits overflow `u32`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    /// 0-indexed source line.
    pub line: usize,
}

impl Token {
    fn structural(kind: TokenKind, line: usize) -> Self {
        Self {
            kind,
            text: None,
            value: None,
            line,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Pull-based view over the tokens of one source string.
///
/// The whole input is scanned up front, so `get_num_tokens` can answer
/// without disturbing the cursor that `get_token` advances.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        let tokens = Scanner::default().run(source);
        trace!(tokens = tokens.len(), "tokenized source");
        Self { tokens, cursor: 0 }
    }

    /// Return the next token and advance. Once the input is exhausted this
    /// keeps returning `Eof`.
    pub fn get_token(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    /// Number of tokens the input yields before `Eof`.
    pub fn get_num_tokens(&self) -> usize {
        self.tokens.len() - 1
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    /// All tokens, terminated by `Eof`.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

#[derive(Debug)]
struct Scanner {
    tokens: Vec<Token>,
    /// Widths of the open indentation levels; the bottom `0` is never popped.
    indents: Vec<usize>,
    seen_logical_line: bool,
    pending_blank: bool,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            indents: vec![0],
            seen_logical_line: false,
            pending_blank: false,
        }
    }
}

impl Scanner {
    fn run(mut self, source: &str) -> Vec<Token> {
        let mut lines = source.split('\n').enumerate().peekable();
        let mut last_line = 0;
        while let Some((line, raw)) = lines.next() {
            last_line = line;
            let terminated = lines.peek().is_some();
            self.scan_line(line, raw, terminated);
        }

        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::structural(TokenKind::Dedent, last_line));
        }
        self.push(Token::structural(TokenKind::Eof, last_line));
        self.tokens
    }

    fn scan_line(&mut self, line: usize, raw: &str, terminated: bool) {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let (code, has_comment) = match raw.find('#') {
            Some(hash) => (&raw[..hash], true),
            None => (raw, false),
        };
        let bytes = code.as_bytes();

        let width = bytes.iter().take_while(|&&ch| is_indent(ch)).count();
        if bytes[width..].iter().all(|&ch| is_whitespace(ch)) {
            // Comment-only lines disappear; blank lines collapse into one
            // NEWLINE in front of the next logical line.
            if !has_comment && self.seen_logical_line {
                self.pending_blank = true;
            }
            return;
        }

        self.indent_to(width, line);
        if self.pending_blank {
            self.pending_blank = false;
            self.push(Token::structural(TokenKind::Newline, line));
        }

        let mut index = width;
        while index < bytes.len() {
            let ch = bytes[index];
            let start = index;
            if ch.is_ascii_digit() {
                while index < bytes.len() && bytes[index].is_ascii_digit() {
                    index += 1;
                }
                let text = &code[start..index];
                self.push(Token {
                    kind: TokenKind::Number,
                    text: Some(text.to_string()),
                    value: text.parse().ok(),
                    line,
                });
            } else if is_ident_start(ch) {
                while index < bytes.len() && is_ident_continue(bytes[index]) {
                    index += 1;
                }
                let text = &code[start..index];
                self.push(Token {
                    kind: keyword_kind(text).unwrap_or(TokenKind::Identifier),
                    text: Some(text.to_string()),
                    value: None,
                    line,
                });
            } else if ch == b':' {
                index += 1;
                self.push(Token {
                    kind: TokenKind::Colon,
                    text: Some(":".to_string()),
                    value: None,
                    line,
                });
            } else {
                // Whitespace, and anything the language has no use for,
                // only separates tokens.
                index += 1;
            }
        }

        if terminated {
            self.push(Token::structural(TokenKind::Newline, line));
        }
        self.seen_logical_line = true;
    }

    fn indent_to(&mut self, width: usize, line: usize) {
        if width > self.current_indent() {
            self.indents.push(width);
            self.push(Token::structural(TokenKind::Indent, line));
            return;
        }

        while width < self.current_indent() {
            self.indents.pop();
            self.push(Token::structural(TokenKind::Dedent, line));
        }
        // Dedented to a width no enclosing level uses: open a fresh level
        // and leave it to the parser to reject the stray INDENT.
        if width > self.current_indent() {
            self.indents.push(width);
            self.push(Token::structural(TokenKind::Indent, line));
        }
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }
}

/// Keyword kind for `text`, if it is one of the reserved words.
pub fn keyword_kind(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "define" => TokenKind::Define,
        "do" => TokenKind::Do,
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        _ => return None,
    };
    Some(kind)
}

fn is_indent(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t')
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\x0c')
}

pub(crate) fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

pub(crate) fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
