// Converts SQL text into typed tokens with source positions. One character
// of lookahead, no backtracking. Quoted runs are scanned with memchr.

use std::sync::Arc;

use memchr::{memchr, memchr2};
use vsql_ast::{SourceInfo, Token, TokenKind, lookup_keyword};
use vsql_error::{ErrorLocation, Result, VsqlError};

/// Pull-style tokenizer over one SQL statement.
pub struct Tokenizer<'a> {
    sql: &'a str,
    src: &'a [u8],
    /// Current byte offset into `src`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    source: Arc<str>,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizer whose spans name the source `"<sql>"`.
    #[must_use]
    pub fn new(sql: &'a str) -> Self {
        Self::with_source(sql, Arc::from("<sql>"))
    }

    #[must_use]
    pub fn with_source(sql: &'a str, source: Arc<str>) -> Self {
        Self {
            sql,
            src: sql.as_bytes(),
            pos: 0,
            line: 1,
            source,
            finished: false,
        }
    }

    /// Produce the next token. Once input is exhausted every call returns
    /// an `Eof` token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments()?;

        let start = self.pos;
        let start_line = self.line;
        let Some(ch) = self.peek() else {
            return Ok(self.make_token(TokenKind::Eof, String::new(), start, start_line));
        };

        let (kind, text) = match ch {
            b'\'' => (TokenKind::String, self.lex_quoted(b'\'', "string literal")?),
            b'"' => (
                TokenKind::QuotedIdent,
                self.lex_quoted(b'"', "quoted identifier")?,
            ),
            b'[' => (TokenKind::QuotedIdent, self.lex_bracket_id()?),
            b'0'..=b'9' => {
                self.lex_number();
                (TokenKind::Number, self.sql[start..self.pos].to_owned())
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | 0x80..=0xFF => {
                self.lex_word();
                let word = &self.sql[start..self.pos];
                (
                    lookup_keyword(word).unwrap_or(TokenKind::Ident),
                    word.to_owned(),
                )
            }
            _ => {
                let kind = self.lex_punct(start)?;
                (kind, self.sql[start..self.pos].to_owned())
            }
        };

        Ok(self.make_token(kind, text, start, start_line))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Consume one byte, counting `\n`, `\r\n`, and lone `\r` as line breaks.
    fn advance(&mut self) {
        let ch = self.src[self.pos];
        self.pos += 1;
        if ch == b'\n' || (ch == b'\r' && self.peek() != Some(b'\n')) {
            self.line += 1;
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn location(&self, start: usize, line: u32, length: usize) -> ErrorLocation {
        ErrorLocation::new(&*self.source, line, start, length)
    }

    fn make_token(&self, kind: TokenKind, text: String, start: usize, line: u32) -> Token {
        let info = SourceInfo::new(Arc::clone(&self.source), start, self.pos - start, line);
        Token::new(kind, text, info)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.advance();
            }
            match (self.peek(), self.peek_at(1)) {
                // `-- ...` and `// ...`
                (Some(b'-'), Some(b'-')) | (Some(b'/'), Some(b'/')) => {
                    let rest = &self.src[self.pos..];
                    let len = memchr2(b'\n', b'\r', rest).unwrap_or(rest.len());
                    self.advance_by(len);
                }
                (Some(b'/'), Some(b'*')) => {
                    let (start, line) = (self.pos, self.line);
                    self.advance_by(2);
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.advance_by(2);
                                break;
                            }
                            (Some(_), _) => self.advance(),
                            (None, _) => {
                                return Err(VsqlError::Unterminated {
                                    what: "block comment",
                                    at: self.location(start, line, self.pos - start),
                                });
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Token scanners
    // -----------------------------------------------------------------------

    /// Scan a run delimited by `quote` on both sides, where a doubled quote
    /// stands for one literal quote. Returns the unescaped contents.
    fn lex_quoted(&mut self, quote: u8, what: &'static str) -> Result<String> {
        let (start, line) = (self.pos, self.line);
        self.advance();
        let mut value = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(offset) = memchr(quote, rest) else {
                return Err(VsqlError::Unterminated {
                    what,
                    at: self.location(start, line, self.src.len() - start),
                });
            };
            value.push_str(&self.sql[self.pos..self.pos + offset]);
            self.advance_by(offset + 1);
            if self.peek() == Some(quote) {
                value.push(char::from(quote));
                self.advance();
            } else {
                return Ok(value);
            }
        }
    }

    /// `[name]`: no escapes inside.
    fn lex_bracket_id(&mut self) -> Result<String> {
        let (start, line) = (self.pos, self.line);
        self.advance();
        let rest = &self.src[self.pos..];
        let Some(offset) = memchr(b']', rest) else {
            return Err(VsqlError::Unterminated {
                what: "bracketed identifier",
                at: self.location(start, line, self.src.len() - start),
            });
        };
        let value = self.sql[self.pos..self.pos + offset].to_owned();
        self.advance_by(offset + 1);
        Ok(value)
    }

    /// Digits with at most one embedded decimal point.
    fn lex_number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
    }

    fn lex_word(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80)
        {
            self.advance();
        }
    }

    fn lex_punct(&mut self, start: usize) -> Result<TokenKind> {
        let Some(ch) = self.peek() else {
            return Ok(TokenKind::Eof);
        };
        let next = self.peek_at(1);
        let (kind, len) = match (ch, next) {
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b';', _) => (TokenKind::Semicolon, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'.', _) => (TokenKind::Dot, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'?', _) => (TokenKind::Question, 1),
            (b'=', _) => (TokenKind::Eq, 1),
            (b'!', Some(b'=')) | (b'<', Some(b'>')) => (TokenKind::Ne, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'|', Some(b'|')) => (TokenKind::Concat, 2),
            (b'|', _) => (TokenKind::Pipe, 1),
            _ => {
                let ch = self.sql[start..].chars().next().unwrap_or('\u{FFFD}');
                return Err(VsqlError::InvalidCharacter {
                    ch,
                    at: self.location(start, self.line, ch.len_utf8()),
                });
            }
        };
        self.advance_by(len);
        Ok(kind)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    /// Yields every token including the final `Eof`, then `None`. Stops
    /// after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        if result.as_ref().map_or(true, Token::is_eof) {
            self.finished = true;
        }
        Some(result)
    }
}

/// Tokenize the whole statement, including the trailing `Eof` token.
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    Tokenizer::new(sql).collect()
}
