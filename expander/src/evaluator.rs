use mlang::directive::{Expr, FunctionCall, Operand};
use mlang::error::{Diagnostic, MacroError};
use mlang::scan::tokenize;
use mlang::token::quote::unquote;
use mlang::token::render;

use crate::environment::Activation;
use crate::expander::Expander;
use crate::functions;

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Evaluate `expr` to text.
///
/// Operands are compared as unquoted strings, never as numbers. Logical
/// operators yield `1` or `0`, and only `0` is false.
pub fn evaluate(
    expr: &Expr,
    expander: &mut Expander,
    activation: &mut Activation,
) -> Result<String, Diagnostic> {
    match expr {
        Expr::Or(lhs, rhs) => {
            let lhs = truth(&evaluate(lhs, expander, activation)?);
            let rhs = truth(&evaluate(rhs, expander, activation)?);
            Ok(boolean(lhs || rhs))
        }
        Expr::And(lhs, rhs) => {
            let lhs = truth(&evaluate(lhs, expander, activation)?);
            let rhs = truth(&evaluate(rhs, expander, activation)?);
            Ok(boolean(lhs && rhs))
        }
        Expr::Not(inner) => Ok(boolean(!truth(&evaluate(inner, expander, activation)?))),
        Expr::Relational(op, lhs, rhs) => {
            let lhs = evaluate(lhs, expander, activation)?;
            let rhs = evaluate(rhs, expander, activation)?;
            Ok(boolean(op.evaluate(lhs.cmp(&rhs))))
        }
        Expr::Operand(operand) => Ok(unquote(&operand_text(operand, expander, activation)?)),
    }
}

/// Evaluate `expr` to a single number, as `!DO` bounds require.
pub fn evaluate_number(
    expr: &Expr,
    expander: &mut Expander,
    activation: &mut Activation,
) -> Result<f64, Diagnostic> {
    let text = evaluate(expr, expander, activation)?;
    let tokens = tokenize(&text);
    match tokens.as_slice() {
        [token] => token.as_number().ok_or_else(|| not_a_number(&text, activation)),
        _ => Err(not_a_number(&text, activation)),
    }
}

fn not_a_number(text: &str, activation: &Activation) -> Diagnostic {
    Diagnostic::error(
        MacroError::binding(
            activation.name(),
            format!("macro expression must evaluate to a number (not \"{}\")", text),
        ),
        None,
    )
}

fn truth(text: &str) -> bool {
    text != "0"
}

fn boolean(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

// ---------------------------------------------------------------------------
// Operands and function calls
// ---------------------------------------------------------------------------

/// The literal text an operand stands for. Parameter references give the
/// argument's syntax without expanding it.
pub fn operand_text(
    operand: &Operand,
    expander: &mut Expander,
    activation: &mut Activation,
) -> Result<String, Diagnostic> {
    match operand {
        Operand::Token(token) => {
            if token.is_macro_id() {
                if let Some(value) = activation.variables.get(&token.text) {
                    return Ok(value.to_string());
                }
            }
            Ok(token.text.clone())
        }
        Operand::Arg(index) => Ok(activation
            .bindings
            .get(*index)
            .map(|b| render(&b.tokens))
            .unwrap_or_default()),
        Operand::AllPositionals => {
            let texts: Vec<String> = activation.positionals().map(|b| render(&b.tokens)).collect();
            Ok(texts.join(" "))
        }
        Operand::Call(call) => call_function(call, expander, activation),
    }
}

/// Evaluate a function call to its textual result.
pub fn call_function(
    call: &FunctionCall,
    expander: &mut Expander,
    activation: &mut Activation,
) -> Result<String, Diagnostic> {
    let args = call
        .args
        .iter()
        .map(|arg| operand_text(arg, expander, activation))
        .collect::<Result<Vec<_>, _>>()?;

    let span = call.span.clone();
    let mut eval = |text: &str| expander.evaluate_text(text, span.clone(), activation);
    functions::apply(call.function, &args, &mut eval)
        .map_err(|error| Diagnostic::error(error, Some(call.span.clone())))
}
