//! Lexical scanner: UTF-8 source bytes in, [`Token`] stream out.
//!
//! The scanner is an [`Iterator`] yielding `Result<Token, LoxError>` so that
//! lexical errors surface in-band: the driver reports each error through the
//! diagnostic sink and keeps pulling tokens.  Exactly one EOF token is
//! emitted after the last source byte, after which the iterator is fused.

use std::iter::FusedIterator;

use log::{debug, info};
use phf::phf_map;

use crate::error::LoxError;
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and" => TokenType::AND,
    b"class" => TokenType::CLASS,
    b"else" => TokenType::ELSE,
    b"false" => TokenType::FALSE,
    b"fun" => TokenType::FUN,
    b"for" => TokenType::FOR,
    b"if" => TokenType::IF,
    b"nil" => TokenType::NIL,
    b"or" => TokenType::OR,
    b"print" => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super" => TokenType::SUPER,
    b"this" => TokenType::THIS,
    b"true" => TokenType::TRUE,
    b"var" => TokenType::VAR,
    b"while" => TokenType::WHILE,
};

#[derive(Debug, Clone)]
pub struct Scanner {
    source: Vec<u8>,
    start: usize,
    curr_ptr: usize,
    line: usize,
    eof_emitted: bool,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        info!("Initializing Scanner with {} bytes of source", source.len());

        Self {
            source: source.as_bytes().to_vec(),
            start: 0,
            curr_ptr: 0,
            line: 1,
            eof_emitted: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Scans one lexeme starting at `self.start`.  `Ok(None)` means the
    /// lexeme produced no token (whitespace, comment, newline).
    fn scan_token(&mut self) -> Result<Option<TokenType>, LoxError> {
        let byte: u8 = self.advance();

        let token_type = match byte {
            b'(' => TokenType::LEFT_PAREN,

            b')' => TokenType::RIGHT_PAREN,

            b'{' => TokenType::LEFT_BRACE,

            b'}' => TokenType::RIGHT_BRACE,

            b',' => TokenType::COMMA,

            b'.' => TokenType::DOT,

            b'-' => TokenType::MINUS,

            b'+' => TokenType::PLUS,

            b';' => TokenType::SEMICOLON,

            b'*' => TokenType::STAR,

            b'!' => {
                if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                }
            }

            b'=' => {
                if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                }
            }

            b'<' => {
                if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                }
            }

            b'>' => {
                if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                }
            }

            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'/' => {
                if self.match_byte(b'/') {
                    debug!("Found comment on line {}, skipping", self.line);

                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }

                    return Ok(None);
                }

                TokenType::SLASH
            }

            b'"' => return self.parse_string().map(Some),

            b'0'..=b'9' => self.parse_number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.parse_identifier(),

            _ => {
                // Consume the whole rune so a multi-byte character yields a
                // single diagnostic, not one per continuation byte.
                self.advance_rune_tail(byte);

                return Err(LoxError::lex(self.line, "Unexpected character."));
            }
        };

        Ok(Some(token_type))
    }

    fn parse_string(&mut self) -> Result<TokenType, LoxError> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
            }

            self.advance();
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        // The closing quote.
        self.advance();

        // Lexeme without the surrounding quotes.
        let literal: String = self.slice(self.start + 1, self.curr_ptr - 1).to_string();

        debug!("Parsed string literal: {}", literal);

        Ok(TokenType::STRING(literal))
    }

    fn parse_number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A `.` only belongs to the number when a digit follows; otherwise it
        // is an independent DOT token.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: &str = self.slice(self.start, self.curr_ptr);
        let number: f64 = text.parse().unwrap_or(0.0);

        debug!("Parsed number: {}", number);

        TokenType::NUMBER(number)
    }

    fn parse_identifier(&mut self) -> TokenType {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        let text: &str = self.slice(self.start, self.curr_ptr);

        match KEYWORDS.get(text.as_bytes()) {
            Some(token_type) => {
                debug!("Parsed keyword: {}", text);

                token_type.clone()
            }

            None => {
                debug!("Parsed identifier: {}", text);

                TokenType::IDENTIFIER
            }
        }
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        std::str::from_utf8(&self.source[start..end])
            .expect("lexeme boundaries fall on UTF-8 char boundaries")
    }

    #[inline]
    fn advance(&mut self) -> u8 {
        let byte = self.source[self.curr_ptr];

        self.curr_ptr += 1;

        byte
    }

    /// Skips the continuation bytes of a multi-byte UTF-8 sequence whose
    /// leading byte has already been consumed.
    fn advance_rune_tail(&mut self, lead: u8) {
        if lead < 0x80 {
            return;
        }

        while !self.is_at_end() && (self.source[self.curr_ptr] & 0b1100_0000) == 0b1000_0000 {
            self.curr_ptr += 1;
        }
    }

    #[inline]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.curr_ptr] != expected {
            false
        } else {
            self.curr_ptr += 1;

            true
        }
    }

    #[inline]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.curr_ptr]
        }
    }

    #[inline]
    fn peek_next(&self) -> u8 {
        if self.curr_ptr + 1 >= self.len() {
            0
        } else {
            self.source[self.curr_ptr + 1]
        }
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.curr_ptr >= self.len()
    }
}

impl Iterator for Scanner {
    type Item = Result<Token, LoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_at_end() {
                if self.eof_emitted {
                    return None;
                }

                self.eof_emitted = true;

                info!("Reached EOF at line {}", self.line);

                return Some(Ok(Token::eof(self.line)));
            }

            self.start = self.curr_ptr;

            match self.scan_token() {
                Ok(Some(token_type)) => {
                    let lexeme: String = self.slice(self.start, self.curr_ptr).to_string();

                    return Some(Ok(Token::new(token_type, lexeme, self.line)));
                }

                // Whitespace or comment: keep scanning.
                Ok(None) => continue,

                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl FusedIterator for Scanner {}
