//! Lexer implementation.
//!
//! Scans source text into tokens in a single linear pass, tracking line and
//! column for error reporting. Keywords are resolved through a static `phf`
//! map.

use crate::parser::SyntaxError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    // Keywords
    Var,
    Function,
    Return,
    If,
    Else,
    While,
    Throw,
    Try,
    Catch,
    Finally,
    True,
    False,
    Null,
    Undefined,
    This,
    // Punctuation and operators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "var" => TokenKind::Var,
    "function" => TokenKind::Function,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "throw" => TokenKind::Throw,
    "try" => TokenKind::Try,
    "catch" => TokenKind::Catch,
    "finally" => TokenKind::Finally,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
    "undefined" => TokenKind::Undefined,
    "this" => TokenKind::This,
};

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Script lexer.
pub struct Lexer<'a> {
    bytes: &'a [u8],
    i: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    /// Run the lexer to completion. The token stream always ends with `Eof`.
    pub fn lex(mut self) -> Result<Vec<Token>, SyntaxError> {
        let approx = self.bytes.len().saturating_div(4).max(16);
        self.tokens.reserve(approx);
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i];
            match b {
                b' ' | b'\t' | b'\r' => self.advance(),
                b'\n' => {
                    self.i += 1;
                    self.line += 1;
                    self.col = 1;
                }
                b'/' if self.peek(1) == Some(b'/') => {
                    while self.i < self.bytes.len() && self.bytes[self.i] != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'"' | b'\'' => self.lex_string(b)?,
                b'0'..=b'9' => self.lex_number()?,
                _ if is_ident_start(b) => self.lex_ident(),
                _ => self.lex_punct()?,
            }
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn peek(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.i + off).copied()
    }

    fn advance(&mut self) {
        self.i += 1;
        self.col += 1;
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
            col: self.col,
        });
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            col: self.col,
            message: message.into(),
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), SyntaxError> {
        let start = (self.line, self.col);
        self.advance();
        self.advance();
        loop {
            match self.bytes.get(self.i) {
                None => {
                    return Err(SyntaxError {
                        line: start.0,
                        col: start.1,
                        message: "unterminated block comment".into(),
                    });
                }
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(b'\n') => {
                    self.i += 1;
                    self.line += 1;
                    self.col = 1;
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn lex_string(&mut self, quote: u8) -> Result<(), SyntaxError> {
        let (line, col) = (self.line, self.col);
        self.advance();
        let mut out = String::new();
        loop {
            match self.bytes.get(self.i).copied() {
                None | Some(b'\n') => {
                    return Err(SyntaxError {
                        line,
                        col,
                        message: "unterminated string literal".into(),
                    });
                }
                Some(b) if b == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    let esc = self
                        .bytes
                        .get(self.i)
                        .copied()
                        .ok_or_else(|| self.error("unterminated escape sequence"))?;
                    self.advance();
                    match esc {
                        b'n' => out.push('\n'),
                        b't' => out.push('\t'),
                        b'r' => out.push('\r'),
                        b'0' => out.push('\0'),
                        b'\\' => out.push('\\'),
                        b'"' => out.push('"'),
                        b'\'' => out.push('\''),
                        b'/' => out.push('/'),
                        b'u' => {
                            let mut code: u32 = 0;
                            for _ in 0..4 {
                                let h = self
                                    .bytes
                                    .get(self.i)
                                    .copied()
                                    .and_then(|c| (c as char).to_digit(16))
                                    .ok_or_else(|| self.error("invalid \\u escape"))?;
                                code = code * 16 + h;
                                self.advance();
                            }
                            let ch = char::from_u32(code)
                                .ok_or_else(|| self.error("invalid \\u escape"))?;
                            out.push(ch);
                        }
                        _ => return Err(self.error("unknown escape sequence")),
                    }
                }
                Some(b) => {
                    // Copy raw bytes; multi-byte UTF-8 sequences pass through.
                    out.push(b as char);
                    if b < 0x80 {
                        self.advance();
                    } else {
                        out.pop();
                        let start = self.i;
                        let mut end = start + 1;
                        while end < self.bytes.len() && (self.bytes[end] & 0xc0) == 0x80 {
                            end += 1;
                        }
                        let s = std::str::from_utf8(&self.bytes[start..end])
                            .map_err(|_| self.error("invalid UTF-8 in string literal"))?;
                        out.push_str(s);
                        self.i = end;
                        self.col += 1;
                    }
                }
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Str(out),
            line,
            col,
        });
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), SyntaxError> {
        let (line, col) = (self.line, self.col);
        let start = self.i;
        while self.bytes.get(self.i).is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        if self.bytes.get(self.i) == Some(&b'.')
            && self.peek(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.advance();
            while self.bytes.get(self.i).is_some_and(|b| b.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.bytes.get(self.i), Some(b'e') | Some(b'E')) {
            let mut j = self.i + 1;
            if matches!(self.bytes.get(j), Some(b'+') | Some(b'-')) {
                j += 1;
            }
            if self.bytes.get(j).is_some_and(|b| b.is_ascii_digit()) {
                while self.i < j {
                    self.advance();
                }
                while self.bytes.get(self.i).is_some_and(|b| b.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.i])
            .expect("number literal is ASCII");
        let num: f64 = text.parse().map_err(|_| SyntaxError {
            line,
            col,
            message: format!("invalid number literal `{text}`"),
        })?;
        self.tokens.push(Token {
            kind: TokenKind::Number(num),
            line,
            col,
        });
        Ok(())
    }

    fn lex_ident(&mut self) {
        let (line, col) = (self.line, self.col);
        let start = self.i;
        while self.bytes.get(self.i).copied().is_some_and(is_ident_continue) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.bytes[start..self.i]).expect("ident is ASCII");
        let kind = match KEYWORDS.get(text) {
            Some(k) => k.clone(),
            None => TokenKind::Ident(text.to_string()),
        };
        self.tokens.push(Token { kind, line, col });
    }

    fn lex_punct(&mut self) -> Result<(), SyntaxError> {
        let b = self.bytes[self.i];
        let two = self.peek(1);
        let kind = match (b, two) {
            (b'=', Some(b'=')) => {
                self.advance();
                TokenKind::EqEq
            }
            (b'!', Some(b'=')) => {
                self.advance();
                TokenKind::NotEq
            }
            (b'<', Some(b'=')) => {
                self.advance();
                TokenKind::Le
            }
            (b'>', Some(b'=')) => {
                self.advance();
                TokenKind::Ge
            }
            (b'&', Some(b'&')) => {
                self.advance();
                TokenKind::AndAnd
            }
            (b'|', Some(b'|')) => {
                self.advance();
                TokenKind::OrOr
            }
            (b'=', _) => TokenKind::Assign,
            (b'!', _) => TokenKind::Bang,
            (b'<', _) => TokenKind::Lt,
            (b'>', _) => TokenKind::Gt,
            (b'+', _) => TokenKind::Plus,
            (b'-', _) => TokenKind::Minus,
            (b'*', _) => TokenKind::Star,
            (b'/', _) => TokenKind::Slash,
            (b'%', _) => TokenKind::Percent,
            (b'(', _) => TokenKind::LParen,
            (b')', _) => TokenKind::RParen,
            (b'{', _) => TokenKind::LBrace,
            (b'}', _) => TokenKind::RBrace,
            (b'[', _) => TokenKind::LBracket,
            (b']', _) => TokenKind::RBracket,
            (b',', _) => TokenKind::Comma,
            (b';', _) => TokenKind::Semi,
            (b':', _) => TokenKind::Colon,
            (b'.', _) => TokenKind::Dot,
            _ => {
                return Err(self.error(format!("unexpected character `{}`", b as char)));
            }
        };
        self.push(kind);
        self.advance();
        Ok(())
    }
}
