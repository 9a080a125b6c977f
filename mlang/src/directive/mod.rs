pub mod expression;
pub mod function;

use std::ops::Range;

pub use expression::{Expr, Operand, RelOp};
pub use function::{Function, FunctionCall};

use crate::error::MacroError;
use crate::token::Token;

/// A compiled macro body.
pub type DirectiveTree = Vec<Directive>;

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Tokens copied to the output. Identifiers naming macro variables are
    /// replaced by the variable's value when substituted.
    Literal(Vec<Token>),
    /// Index into the definition's parameters.
    ArgRef(usize),
    /// `!*`
    AllPositionalsRef,
    FunctionCall(FunctionCall),
    If {
        condition: Expr,
        then_branch: DirectiveTree,
        else_branch: Option<DirectiveTree>,
    },
    DoRange {
        variable: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: DirectiveTree,
        span: Range<usize>,
    },
    DoIn {
        variable: String,
        list: Expr,
        body: DirectiveTree,
        span: Range<usize>,
    },
    Let {
        variable: String,
        value: Expr,
    },
    /// `!ONEXPAND` (true) or `!OFFEXPAND` (false).
    ExpandToggle(bool),
    Break,
    /// A directive that did not compile; reported when the body is expanded.
    Invalid(MacroError, Range<usize>),
}
