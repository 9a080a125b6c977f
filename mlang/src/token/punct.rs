use std::fmt;

/// Operators and punctuators.
///
/// Word operators (`EQ`, `AND`, `TO`, ...) are left as identifiers; the macro
/// language matches them by keyword where it cares about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Plus,
    Dash,
    Asterisk,
    Slash,
    Equals,
    LParen,
    RParen,
    LSquare,
    RSquare,
    LCurly,
    RCurly,
    Comma,
    Semicolon,
    Colon,
    /// `&`
    And,
    /// `|`
    Or,
    /// `~`
    Not,
    /// `~=` or `<>`
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    /// `**`
    Exp,
    /// `!` on its own.
    Bang,
    /// `!*`, all positional arguments of the macro being expanded.
    BangAsterisk,
    Percent,
    Question,
    Backtick,
    /// A `.` that does not end a command.
    Dot,
    Underscore,
}

impl Punct {
    /// Canonical spelling. Tokens keep their own source text, so `<>` stays `<>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Punct::Plus => "+",
            Punct::Dash => "-",
            Punct::Asterisk => "*",
            Punct::Slash => "/",
            Punct::Equals => "=",
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LSquare => "[",
            Punct::RSquare => "]",
            Punct::LCurly => "{",
            Punct::RCurly => "}",
            Punct::Comma => ",",
            Punct::Semicolon => ";",
            Punct::Colon => ":",
            Punct::And => "&",
            Punct::Or => "|",
            Punct::Not => "~",
            Punct::Ne => "~=",
            Punct::Ge => ">=",
            Punct::Gt => ">",
            Punct::Le => "<=",
            Punct::Lt => "<",
            Punct::Exp => "**",
            Punct::Bang => "!",
            Punct::BangAsterisk => "!*",
            Punct::Percent => "%",
            Punct::Question => "?",
            Punct::Backtick => "`",
            Punct::Dot => ".",
            Punct::Underscore => "_",
        }
    }

    /// Single-character punctuators.
    pub fn from_char(c: char) -> Option<Punct> {
        let punct = match c {
            '+' => Punct::Plus,
            '-' => Punct::Dash,
            '*' => Punct::Asterisk,
            '/' => Punct::Slash,
            '=' => Punct::Equals,
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '[' => Punct::LSquare,
            ']' => Punct::RSquare,
            '{' => Punct::LCurly,
            '}' => Punct::RCurly,
            ',' => Punct::Comma,
            ';' => Punct::Semicolon,
            ':' => Punct::Colon,
            '&' => Punct::And,
            '|' => Punct::Or,
            '~' => Punct::Not,
            '>' => Punct::Gt,
            '<' => Punct::Lt,
            '!' => Punct::Bang,
            '%' => Punct::Percent,
            '?' => Punct::Question,
            '`' => Punct::Backtick,
            '_' => Punct::Underscore,
            _ => return None,
        };
        Some(punct)
    }

    /// Two-character operators.
    pub fn from_pair(a: char, b: char) -> Option<Punct> {
        match (a, b) {
            ('<', '=') => Some(Punct::Le),
            ('>', '=') => Some(Punct::Ge),
            ('~', '=') | ('<', '>') => Some(Punct::Ne),
            ('*', '*') => Some(Punct::Exp),
            ('!', '*') => Some(Punct::BangAsterisk),
            _ => None,
        }
    }
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
