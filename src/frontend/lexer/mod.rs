// Mylox compiler lexer
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-05-28: Initial version
//      26-06-01: Hand-coded keyword trie
//      26-06-04: Multi-line string literals, line counting fixes

pub mod token;

use token::{Token, TokenType};

/// 按需产出 token 的单遍扫描器。start/current 是字节游标，
/// 只在确认是 ASCII 词法成分时才切源码切片，不会切坏多字节字符。
pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line: u32,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();
        match c {
            b'(' => self.make_token(TokenType::LParen),
            b')' => self.make_token(TokenType::RParen),
            b'{' => self.make_token(TokenType::LBrace),
            b'}' => self.make_token(TokenType::RBrace),
            b',' => self.make_token(TokenType::Comma),
            b'.' => self.make_token(TokenType::Dot),
            b'-' => self.make_token(TokenType::Minus),
            b'+' => self.make_token(TokenType::Plus),
            b';' => self.make_token(TokenType::Semicolon),
            b'*' => self.make_token(TokenType::Asterisk),
            b'/' => self.make_token(TokenType::Slash),
            b'!' => {
                let kind = if self.match_byte(b'=') {
                    TokenType::BangEq
                } else {
                    TokenType::Bang
                };
                self.make_token(kind)
            }
            b'=' => {
                let kind = if self.match_byte(b'=') {
                    TokenType::Eq
                } else {
                    TokenType::Assign
                };
                self.make_token(kind)
            }
            b'<' => {
                let kind = if self.match_byte(b'=') {
                    TokenType::Leq
                } else {
                    TokenType::Lt
                };
                self.make_token(kind)
            }
            b'>' => {
                let kind = if self.match_byte(b'=') {
                    TokenType::Geq
                } else {
                    TokenType::Gt
                };
                self.make_token(kind)
            }
            b'"' => self.string(),
            c if is_digit(c) => self.number(),
            c if is_alpha(c) => self.identifier(),
            _ => self.error_token("unexpected character"),
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' => {
                    if self.peek_next() != b'/' {
                        return;
                    }
                    // 行注释吃到换行符之前
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.current += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }

        if self.is_at_end() {
            return self.error_token("unterminated string");
        }

        self.current += 1; // 收尾引号
        self.make_token(TokenType::StrLit)
    }

    fn number(&mut self) -> Token<'src> {
        while is_digit(self.peek()) {
            self.current += 1;
        }

        // 小数点后面必须跟数字才算小数部分
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            self.current += 1;
            while is_digit(self.peek()) {
                self.current += 1;
            }
        }

        self.make_token(TokenType::NumLit)
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.current += 1;
        }
        self.make_token(self.identifier_kind())
    }

    /// 关键字识别：按首字母展开的手写 trie。
    fn identifier_kind(&self) -> TokenType {
        let bytes = &self.source.as_bytes()[self.start..self.current];
        match bytes[0] {
            b'a' => self.check_keyword(1, "nd", TokenType::KwAnd),
            b'c' => self.check_keyword(1, "lass", TokenType::KwClass),
            b'e' => self.check_keyword(1, "lse", TokenType::KwElse),
            b'f' if bytes.len() > 1 => match bytes[1] {
                b'a' => self.check_keyword(2, "lse", TokenType::KwFalse),
                b'o' => self.check_keyword(2, "r", TokenType::KwFor),
                b'u' => self.check_keyword(2, "n", TokenType::KwFun),
                _ => TokenType::Ident,
            },
            b'i' => self.check_keyword(1, "f", TokenType::KwIf),
            b'n' => self.check_keyword(1, "il", TokenType::KwNil),
            b'o' => self.check_keyword(1, "r", TokenType::KwOr),
            b'p' => self.check_keyword(1, "rint", TokenType::KwPrint),
            b'r' => self.check_keyword(1, "eturn", TokenType::KwReturn),
            b's' => self.check_keyword(1, "uper", TokenType::KwSuper),
            b't' if bytes.len() > 1 => match bytes[1] {
                b'h' => self.check_keyword(2, "is", TokenType::KwThis),
                b'r' => self.check_keyword(2, "ue", TokenType::KwTrue),
                _ => TokenType::Ident,
            },
            b'v' => self.check_keyword(1, "ar", TokenType::KwVar),
            b'w' => self.check_keyword(1, "hile", TokenType::KwWhile),
            _ => TokenType::Ident,
        }
    }

    fn check_keyword(&self, prefix: usize, rest: &str, kind: TokenType) -> TokenType {
        let lexeme = &self.source[self.start..self.current];
        if lexeme.len() == prefix + rest.len() && &lexeme[prefix..] == rest {
            kind
        } else {
            TokenType::Ident
        }
    }

    fn make_token(&self, kind: TokenType) -> Token<'src> {
        Token {
            kind,
            lexeme: &self.source[self.start..self.current],
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenType::Errno,
            lexeme: message,
            line: self.line,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let byte = self.source.as_bytes()[self.current];
        self.current += 1;
        byte
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source.as_bytes()[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            return 0;
        }
        self.source.as_bytes()[self.current]
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            return 0;
        }
        self.source.as_bytes()[self.current + 1]
    }
}
