use std::ops::{Range, RangeInclusive};

use super::expression::Operand;
use crate::token::abbreviates;

/// The built-in macro functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Blanks,
    Concat,
    Eval,
    Head,
    Index,
    Length,
    Null,
    Quote,
    Substr,
    Tail,
    Unquote,
    Upcase,
}

impl Function {
    pub const ALL: [Function; 12] = [
        Function::Blanks,
        Function::Concat,
        Function::Eval,
        Function::Head,
        Function::Index,
        Function::Length,
        Function::Null,
        Function::Quote,
        Function::Substr,
        Function::Tail,
        Function::Unquote,
        Function::Upcase,
    ];

    /// Looks up `!NAME`, case-insensitively. The `!` is required and the
    /// name may be abbreviated to four characters, as in `!UPCA`.
    pub fn from_name(name: &str) -> Option<Function> {
        Function::ALL.into_iter().find(|function| abbreviates(name, function.name()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Blanks => "!BLANKS",
            Function::Concat => "!CONCAT",
            Function::Eval => "!EVAL",
            Function::Head => "!HEAD",
            Function::Index => "!INDEX",
            Function::Length => "!LENGTH",
            Function::Null => "!NULL",
            Function::Quote => "!QUOTE",
            Function::Substr => "!SUBSTR",
            Function::Tail => "!TAIL",
            Function::Unquote => "!UNQUOTE",
            Function::Upcase => "!UPCASE",
        }
    }

    /// Accepted argument counts.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Function::Null => 0..=0,
            Function::Concat => 1..=usize::MAX,
            Function::Index => 2..=2,
            Function::Substr => 2..=3,
            _ => 1..=1,
        }
    }
}

/// A call like `!SUBSTR(!1, 2, 3)`, with arguments still unevaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: Function,
    pub args: Vec<Operand>,
    pub span: Range<usize>,
}
