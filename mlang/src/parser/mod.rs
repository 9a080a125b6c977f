mod cursor;
mod expression;
mod parameters;
mod structural;

use std::ops::Range;

use crate::definition::{MacroDefinition, ParameterSpec};
use crate::directive::DirectiveTree;
use crate::error::{Diagnostic, MacroError};
use crate::token::Token;

use cursor::Cursor;

/// Words reserved by the macro language. They cannot name a keyword
/// parameter or a `!DO`/`!LET` variable, with or without a leading `!`.
const MACRO_KEYWORDS: &[&str] = &[
    "BREAK",
    "CHAREND",
    "CMDEND",
    "DEFAULT",
    "DO",
    "DOEND",
    "ELSE",
    "ENCLOSE",
    "ENDDEFINE",
    "IF",
    "IFEND",
    "IN",
    "LET",
    "NOEXPAND",
    "OFFEXPAND",
    "ONEXPAND",
    "POSITIONAL",
    "THEN",
    "TOKENS",
];

pub fn is_macro_keyword(name: &str) -> bool {
    let name = name.strip_prefix('!').unwrap_or(name);
    MACRO_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Parse a complete `DEFINE` command.
///
/// `tokens` starts with `DEFINE` and runs through `!ENDDEFINE`, optionally
/// followed by an end-of-command token. Structural problems in the body do not
/// fail the definition; they compile to [`Directive::Invalid`] nodes.
///
/// [`Directive::Invalid`]: crate::directive::Directive::Invalid
pub fn parse_define(tokens: &[Token]) -> Result<MacroDefinition, Diagnostic> {
    let mut cursor = Cursor::new(tokens);
    let start = cursor.span();
    if !cursor.eat_keyword("DEFINE") {
        return Err(definition_error("expecting DEFINE", start));
    }

    let name = match cursor.peek() {
        Some(t) if t.is_identifier() => t,
        _ => return Err(definition_error("expecting macro name", cursor.span())),
    };
    cursor.advance();

    let parameters = parameters::parse_parameters(&mut cursor)?;

    let body_start = cursor.pos();
    let Some(body_len) = tokens[body_start..]
        .iter()
        .position(|t| t.matches_keyword("!ENDDEFINE"))
    else {
        return Err(definition_error("missing !ENDDEFINE", name.span.clone()));
    };
    let body_tokens = &tokens[body_start..body_start + body_len];
    cursor.set_pos(body_start + body_len + 1);
    cursor.eat_if_end();
    if !cursor.at_end() {
        return Err(definition_error("unexpected syntax after !ENDDEFINE", cursor.span()));
    }

    let body = compile_body(body_tokens, &parameters);
    let span = name.span.start..tokens.last().map_or(name.span.end, |t| t.span.end);
    Ok(MacroDefinition {
        name: name.text.clone(),
        span,
        parameters,
        body,
    })
}

/// Compile syntax as the body of a macro with `parameters`. Used for macro
/// bodies and for the text `!EVAL` expands.
pub fn compile_body(tokens: &[Token], parameters: &[ParameterSpec]) -> DirectiveTree {
    structural::compile_body(tokens, parameters)
}

pub(crate) fn definition_error(message: impl Into<String>, span: Range<usize>) -> Diagnostic {
    Diagnostic::error(MacroError::definition(message), Some(span))
}
