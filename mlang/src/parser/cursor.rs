use std::ops::Range;

use crate::token::{Punct, Token, abbreviates};

/// Position within a slice of tokens.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    pub fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn eat_punct(&mut self, punct: Punct) -> bool {
        self.eat_if(|t| t.is_punct(punct))
    }

    /// Exact, case-insensitive keyword.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.eat_if(|t| t.matches_keyword(keyword))
    }

    /// Keyword, possibly abbreviated (see [`matches_abbreviation`]).
    pub fn eat_abbreviation(&mut self, keyword: &str) -> bool {
        self.eat_if(|t| matches_abbreviation(t, keyword))
    }

    pub fn eat_if_end(&mut self) -> bool {
        self.eat_if(Token::is_end)
    }

    fn eat_if(&mut self, pred: impl Fn(&Token) -> bool) -> bool {
        match self.peek() {
            Some(t) if pred(t) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Span of the current token, or an empty span just past the last one.
    pub fn span(&self) -> Range<usize> {
        match self.peek() {
            Some(t) => t.span.clone(),
            None => match self.tokens.last() {
                Some(t) => t.span.end..t.span.end,
                None => 0..0,
            },
        }
    }

    /// Span from the token at `start` through the token before the cursor.
    pub fn span_from(&self, start: usize) -> Range<usize> {
        let first = match self.tokens.get(start) {
            Some(t) => t.span.start,
            None => return self.span(),
        };
        let last = self.tokens[..self.pos.max(start + 1).min(self.tokens.len())]
            .last()
            .map_or(first, |t| t.span.end);
        first..last.max(first)
    }
}

/// Keyword match allowing [`abbreviates`] shortening.
pub(crate) fn matches_abbreviation(token: &Token, keyword: &str) -> bool {
    token.is_identifier() && abbreviates(&token.text, keyword)
}
