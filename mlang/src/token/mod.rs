pub mod punct;
pub mod quote;

use std::fmt;
use std::ops::Range;

pub use punct::Punct;

/// What a token is. The exact source spelling lives in [`Token::text`].
#[derive(Debug, Clone)]
pub enum TokenKind {
    Identifier,
    Number(f64),
    /// Quoted string; carries the unquoted value.
    String(String),
    Punct(Punct),
    /// End-of-command marker.
    End,
    /// Error marker, emitted where a scan or macro evaluation failed.
    Error(String),
}

/// An immutable lexical unit.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// The syntax that produced this token, e.g. `1.0` or `'it''s'`.
    pub text: String,
    /// Byte span in the source, for diagnostics.
    pub span: Range<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Range<usize>) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn identifier(text: impl Into<String>, span: Range<usize>) -> Self {
        Token::new(TokenKind::Identifier, text, span)
    }

    pub fn punct(punct: Punct, span: Range<usize>) -> Self {
        Token::new(TokenKind::Punct(punct), punct.as_str(), span)
    }

    pub fn end(span: Range<usize>) -> Self {
        Token::new(TokenKind::End, ".", span)
    }

    /// The marker emitted in place of a result that could not be produced.
    pub fn error_marker(message: impl Into<String>, span: Range<usize>) -> Self {
        Token::new(TokenKind::Error(message.into()), "!ERROR", span)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, TokenKind::End)
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error(_))
    }

    /// True for identifiers that begin with `!`, the macro language's namespace.
    pub fn is_macro_id(&self) -> bool {
        self.is_identifier() && self.text.starts_with('!') && self.text.len() > 1
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    /// Case-insensitive match of an identifier against `keyword`.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        self.is_identifier() && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            TokenKind::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The value of a number token that is a whole number.
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            TokenKind::Number(n) if n == n.floor() && n.abs() < i64::MAX as f64 => Some(n as i64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Identifiers, numbers, and strings need a space between them when rendered.
    fn is_word(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::Number(_) | TokenKind::String(_) | TokenKind::Error(_)
        )
    }
}

impl AsRef<Token> for Token {
    fn as_ref(&self) -> &Token {
        self
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (TokenKind::Identifier, TokenKind::Identifier) => {
                self.text.to_uppercase() == other.text.to_uppercase()
            }
            (TokenKind::Number(a), TokenKind::Number(b)) => a == b,
            (TokenKind::String(a), TokenKind::String(b)) => a == b,
            (TokenKind::Punct(a), TokenKind::Punct(b)) => a == b,
            (TokenKind::End, TokenKind::End) => true,
            (TokenKind::Error(a), TokenKind::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Macro keywords and function names may be shortened to their first four
/// characters (counting the `!`), so `!ELS` matches `!ELSE` and `!UPCA`
/// matches `!UPCASE`.
pub fn abbreviates(text: &str, keyword: &str) -> bool {
    let min = keyword.len().min(4);
    text.len() >= min
        && text.len() <= keyword.len()
        && keyword.is_char_boundary(text.len())
        && keyword[..text.len()].eq_ignore_ascii_case(text)
}

/// Render tokens back into syntax text.
///
/// Adjacent words get a single space; punctuation is written tight, except that
/// two punctuators in a row are separated so they cannot fuse into an operator.
pub fn render<T: AsRef<Token>>(tokens: &[T]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        let token = token.as_ref();
        if let Some(prev) = prev {
            if needs_space(prev, token) {
                out.push(' ');
            }
        }
        out.push_str(&token.text);
        prev = Some(token);
    }
    out
}

/// Render tokens one command per entry, each with its closing `.`. Tokens
/// after the last end-of-command form a final, unterminated entry.
pub fn render_commands<T: AsRef<Token>>(tokens: &[T]) -> Vec<String> {
    let mut commands = Vec::new();
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.as_ref().is_end() {
            commands.push(render(&tokens[start..=i]));
            start = i + 1;
        }
    }
    if start < tokens.len() {
        commands.push(render(&tokens[start..]));
    }
    commands
}

fn needs_space(prev: &Token, next: &Token) -> bool {
    if next.is_end() {
        return false;
    }
    if prev.is_end() {
        return true;
    }
    match (&prev.kind, &next.kind) {
        (_, TokenKind::Punct(Punct::Dot)) => true,
        (TokenKind::Punct(_), TokenKind::Punct(_)) => {
            match (prev.text.chars().last(), next.text.chars().next()) {
                (Some(a), Some(b)) => Punct::from_pair(a, b).is_some(),
                _ => false,
            }
        }
        _ => prev.is_word() && next.is_word(),
    }
}
