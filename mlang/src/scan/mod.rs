use std::ops::Range;

use crate::token::{Punct, Token, TokenKind};

/// A pull-based source of syntax tokens.
///
/// `None` means the input is exhausted. Anything that iterates over tokens is
/// a source, including [`Scanner`] and `Vec<Token>::into_iter()`.
pub trait TokenSource {
    fn next_token(&mut self) -> Option<Token>;
}

impl<I> TokenSource for I
where
    I: Iterator<Item = Token>,
{
    fn next_token(&mut self) -> Option<Token> {
        self.next()
    }
}

/// Tokenize `text` in one go.
pub fn tokenize(text: &str) -> Vec<Token> {
    Scanner::new(text).collect()
}

/// Tokenize `text`, giving every token the same span. Used when re-tokenizing
/// computed text whose characters have no place in the source.
pub fn tokenize_at(text: &str, span: Range<usize>) -> Vec<Token> {
    Scanner::new(text)
        .map(|mut token| {
            token.span = span.clone();
            token
        })
        .collect()
}

/// Minimal scanner for command syntax.
///
/// Recognizes identifiers (including `!`-prefixed macro identifiers), numbers,
/// quoted strings, punctuators, and the end-of-command `.`.
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    /// True when the previous token can be the left operand of a binary `-`.
    after_operand: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            pos: 0,
            after_operand: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn make(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, &self.source[start..self.pos], start..self.pos)
    }

    fn scan_token(&mut self) -> Option<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let c = self.peek_char()?;

        let token = match c {
            '\'' | '"' => self.scan_string(c),

            '0'..='9' => self.scan_number(start),

            '.' => match self.peek_second() {
                Some(d) if d.is_ascii_digit() => self.scan_number(start),
                None => {
                    self.pos += 1;
                    Token::end(start..self.pos)
                }
                Some(w) if w.is_whitespace() => {
                    self.pos += 1;
                    Token::end(start..self.pos)
                }
                Some(_) => {
                    self.pos += 1;
                    self.make(TokenKind::Punct(Punct::Dot), start)
                }
            },

            '-' if !self.after_operand
                && self.peek_second().is_some_and(|d| d.is_ascii_digit()) =>
            {
                self.pos += 1;
                self.scan_number(start)
            }

            '!' if self.peek_second().is_some_and(is_identifier_char) => {
                self.pos += 1;
                self.scan_identifier(start)
            }

            c if is_identifier_start(c) => self.scan_identifier(start),

            _ => self.scan_punct(c, start),
        };

        self.after_operand = match &token.kind {
            TokenKind::Identifier => !token.text.starts_with('!'),
            TokenKind::Number(_) | TokenKind::String(_) => true,
            TokenKind::Punct(Punct::RParen) => true,
            _ => false,
        };
        Some(token)
    }

    fn scan_string(&mut self, quote: char) -> Token {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    return Token::new(
                        TokenKind::Error("unterminated string constant".to_string()),
                        &self.source[start..self.pos],
                        start..self.pos,
                    );
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    if self.peek_char() == Some(quote) {
                        value.push(quote);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        self.make(TokenKind::String(value), start)
    }

    fn scan_number(&mut self, start: usize) -> Token {
        self.eat_digits();
        if self.peek_char() == Some('.') && self.peek_second().is_some_and(|d| d.is_ascii_digit()) {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.pos += 1;
            }
            if self.peek_char().is_some_and(|d| d.is_ascii_digit()) {
                self.eat_digits();
            } else {
                self.pos = save;
            }
        }
        let text = &self.source[start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => self.make(TokenKind::Number(n), start),
            Err(_) => self.make(TokenKind::Error(format!("invalid number `{}`", text)), start),
        }
    }

    fn eat_digits(&mut self) {
        while self.peek_char().is_some_and(|d| d.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek_char() {
            if !is_identifier_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        // A trailing `.` terminates the command rather than extending the name.
        while self.source[start..self.pos].len() > 1 && self.source[..self.pos].ends_with('.') {
            self.pos -= 1;
        }
        self.make(TokenKind::Identifier, start)
    }

    fn scan_punct(&mut self, c: char, start: usize) -> Token {
        if let Some(second) = self.peek_second() {
            if let Some(punct) = Punct::from_pair(c, second) {
                self.pos += c.len_utf8() + second.len_utf8();
                return self.make(TokenKind::Punct(punct), start);
            }
        }
        self.pos += c.len_utf8();
        match Punct::from_char(c) {
            Some(punct) => self.make(TokenKind::Punct(punct), start),
            None => self.make(TokenKind::Error(format!("bad character `{}` in input", c)), start),
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.scan_token()
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '@' | '#' | '$')
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '#' | '$')
}
