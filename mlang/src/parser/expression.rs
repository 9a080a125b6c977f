use crate::definition::{ParameterSpec, find_parameter};
use crate::directive::{Expr, Function, FunctionCall, Operand, RelOp};
use crate::error::{Diagnostic, MacroError};
use crate::token::Punct;

use super::cursor::Cursor;

fn expression_error(message: impl Into<String>, span: std::ops::Range<usize>) -> Diagnostic {
    Diagnostic::error(MacroError::evaluation(message), Some(span))
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Parse the longest expression starting at the cursor.
///
/// Precedence, loosest first: `!OR`/`|`, `!AND`/`&`, `!NOT`/`~`, relational
/// operators, then parenthesized groups and operands.
pub(crate) fn parse_expression(
    cursor: &mut Cursor,
    parameters: &[ParameterSpec],
) -> Result<Expr, Diagnostic> {
    parse_or(cursor, parameters)
}

fn parse_or(cursor: &mut Cursor, parameters: &[ParameterSpec]) -> Result<Expr, Diagnostic> {
    let mut lhs = parse_and(cursor, parameters)?;
    while cursor.eat_keyword("!OR") || cursor.eat_punct(Punct::Or) {
        let rhs = parse_and(cursor, parameters)?;
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(cursor: &mut Cursor, parameters: &[ParameterSpec]) -> Result<Expr, Diagnostic> {
    let mut lhs = parse_not(cursor, parameters)?;
    while cursor.eat_keyword("!AND") || cursor.eat_punct(Punct::And) {
        let rhs = parse_not(cursor, parameters)?;
        lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_not(cursor: &mut Cursor, parameters: &[ParameterSpec]) -> Result<Expr, Diagnostic> {
    let mut negations = 0;
    while cursor.eat_keyword("!NOT") || cursor.eat_punct(Punct::Not) {
        negations += 1;
    }
    let mut expr = parse_relational(cursor, parameters)?;
    for _ in 0..negations {
        expr = Expr::Not(Box::new(expr));
    }
    Ok(expr)
}

fn parse_relational(cursor: &mut Cursor, parameters: &[ParameterSpec]) -> Result<Expr, Diagnostic> {
    let lhs = parse_primary(cursor, parameters)?;
    let Some(op) = cursor.peek().and_then(RelOp::from_token) else {
        return Ok(lhs);
    };
    cursor.advance();
    let rhs = parse_primary(cursor, parameters)?;
    Ok(Expr::Relational(op, Box::new(lhs), Box::new(rhs)))
}

fn parse_primary(cursor: &mut Cursor, parameters: &[ParameterSpec]) -> Result<Expr, Diagnostic> {
    match cursor.peek() {
        None => Err(expression_error(
            "expecting literal or function invocation in macro expression",
            cursor.span(),
        )),
        Some(t) if t.is_punct(Punct::LParen) => {
            cursor.advance();
            let inner = parse_or(cursor, parameters)?;
            if !cursor.eat_punct(Punct::RParen) {
                return Err(expression_error("expecting `)` in macro expression", cursor.span()));
            }
            Ok(inner)
        }
        Some(t) if t.is_punct(Punct::RParen) || t.is_end() => Err(expression_error(
            "expecting literal or function invocation in macro expression",
            t.span.clone(),
        )),
        Some(_) => Ok(Expr::Operand(parse_operand(cursor, parameters)?)),
    }
}

// ---------------------------------------------------------------------------
// Operands and function calls
// ---------------------------------------------------------------------------

/// One restricted operand: a literal token, a parameter reference, `!*`, or a
/// function call.
pub(crate) fn parse_operand(
    cursor: &mut Cursor,
    parameters: &[ParameterSpec],
) -> Result<Operand, Diagnostic> {
    let Some(token) = cursor.peek() else {
        return Err(expression_error("expecting macro function argument", cursor.span()));
    };
    if token.is_punct(Punct::BangAsterisk) {
        cursor.advance();
        return Ok(Operand::AllPositionals);
    }
    if token.is_macro_id() {
        if let Some(index) = find_parameter(parameters, &token.text) {
            cursor.advance();
            return Ok(Operand::Arg(index));
        }
        if starts_function_call(cursor) {
            return Ok(Operand::Call(parse_function_call(cursor, parameters)?));
        }
    }
    cursor.advance();
    Ok(Operand::Token(token.clone()))
}

/// True at `!NAME(` for a built-in function, or at a bare `!NULL`.
pub(crate) fn starts_function_call(cursor: &Cursor) -> bool {
    let Some(function) = cursor.peek().and_then(|t| Function::from_name(&t.text)) else {
        return false;
    };
    function == Function::Null || cursor.peek_nth(1).is_some_and(|t| t.is_punct(Punct::LParen))
}

/// Parse `!NAME(arg, arg, ...)` and check its arity.
pub(crate) fn parse_function_call(
    cursor: &mut Cursor,
    parameters: &[ParameterSpec],
) -> Result<FunctionCall, Diagnostic> {
    let start = cursor.pos();
    let Some(name) = cursor.advance() else {
        return Err(expression_error("expecting macro function", cursor.span()));
    };
    let Some(function) = Function::from_name(&name.text) else {
        return Err(expression_error(format!("unknown macro function {}", name.text), name.span.clone()));
    };

    let mut args = Vec::new();
    if cursor.eat_punct(Punct::LParen) {
        loop {
            match cursor.peek() {
                None => {
                    return Err(expression_error(
                        format!("missing `)` in call to macro function {}", function.name()),
                        name.span.clone(),
                    ));
                }
                Some(t) if t.is_punct(Punct::RParen) => {
                    cursor.advance();
                    break;
                }
                Some(_) => {}
            }
            args.push(parse_operand(cursor, parameters)?);
            if cursor.eat_punct(Punct::Comma) {
                continue;
            }
            match cursor.peek() {
                Some(t) if t.is_punct(Punct::RParen) => {}
                Some(t) => {
                    return Err(expression_error(
                        format!("`,` or `)` expected in call to macro function {}", function.name()),
                        t.span.clone(),
                    ));
                }
                None => {}
            }
        }
    } else if function != Function::Null {
        return Err(expression_error(
            format!("expecting `(` after {}", function.name()),
            cursor.span(),
        ));
    }

    let span = cursor.span_from(start);
    if !function.arity().contains(&args.len()) {
        return Err(Diagnostic::error(
            MacroError::function(function.name(), arity_message(function, args.len())),
            Some(span),
        ));
    }
    Ok(FunctionCall {
        function,
        args,
        span,
    })
}

fn arity_message(function: Function, got: usize) -> String {
    let arity = function.arity();
    let expected = match (*arity.start(), *arity.end()) {
        (0, 0) => "no arguments".to_string(),
        (1, usize::MAX) => "at least one argument".to_string(),
        (a, b) if a == b => format!("exactly {} argument{}", a, if a == 1 { "" } else { "s" }),
        (a, b) => format!("{} or {} arguments", a, b),
    };
    format!("expecting {} but got {}", expected, got)
}
