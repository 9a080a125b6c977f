use std::cmp::Ordering;

use super::function::FunctionCall;
use crate::token::{Punct, Token, TokenKind};

/// A condition or value in `!IF`, `!LET`, and `!DO`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Relational(RelOp, Box<Expr>, Box<Expr>),
    Operand(Operand),
}

/// The leaves of expressions and function arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal token, which may also name a macro variable.
    Token(Token),
    /// Index into the definition's parameters.
    Arg(usize),
    /// `!*`
    AllPositionals,
    Call(FunctionCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl RelOp {
    /// Recognizes `=`, `~=`, `<>`, `<`, `>`, `<=`, `>=` as well as `!EQ`..`!GE`
    /// and the bare words `EQ`..`GE`.
    pub fn from_token(token: &Token) -> Option<RelOp> {
        match &token.kind {
            TokenKind::Punct(Punct::Equals) => Some(RelOp::Eq),
            TokenKind::Punct(Punct::Ne) => Some(RelOp::Ne),
            TokenKind::Punct(Punct::Lt) => Some(RelOp::Lt),
            TokenKind::Punct(Punct::Gt) => Some(RelOp::Gt),
            TokenKind::Punct(Punct::Le) => Some(RelOp::Le),
            TokenKind::Punct(Punct::Ge) => Some(RelOp::Ge),
            TokenKind::Identifier => {
                let word = token.text.strip_prefix('!').unwrap_or(&token.text);
                match word.to_ascii_uppercase().as_str() {
                    "EQ" => Some(RelOp::Eq),
                    "NE" => Some(RelOp::Ne),
                    "LT" => Some(RelOp::Lt),
                    "GT" => Some(RelOp::Gt),
                    "LE" => Some(RelOp::Le),
                    "GE" => Some(RelOp::Ge),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether `ordering` (left compared to right) satisfies this operator.
    pub fn evaluate(self, ordering: Ordering) -> bool {
        match self {
            RelOp::Eq => ordering == Ordering::Equal,
            RelOp::Ne => ordering != Ordering::Equal,
            RelOp::Lt => ordering == Ordering::Less,
            RelOp::Gt => ordering == Ordering::Greater,
            RelOp::Le => ordering != Ordering::Greater,
            RelOp::Ge => ordering != Ordering::Less,
        }
    }
}
