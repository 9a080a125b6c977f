use crate::definition::{CaptureMode, ParameterSpec, Role};
use crate::error::Diagnostic;
use crate::scan::tokenize;
use crate::token::{Punct, Token, TokenKind};

use super::cursor::Cursor;
use super::{definition_error, is_macro_keyword};

/// Parse `( param / param ... )`, leaving the cursor on the first body token.
pub(super) fn parse_parameters(cursor: &mut Cursor) -> Result<Vec<ParameterSpec>, Diagnostic> {
    if !cursor.eat_punct(Punct::LParen) {
        return Err(definition_error("expecting `(` after macro name", cursor.span()));
    }

    let mut parameters: Vec<ParameterSpec> = Vec::new();
    while !cursor.eat_punct(Punct::RParen) {
        if cursor.at_end() || cursor.peek().is_some_and(Token::is_end) {
            return Err(definition_error("expecting `)` to close the parameter list", cursor.span()));
        }

        let role = parse_role(cursor, &parameters)?;
        cursor.eat_punct(Punct::Equals);
        let parameter = parse_clauses(cursor, role)?;
        parameters.push(parameter);

        if !cursor.peek().is_some_and(|t| t.is_punct(Punct::RParen)) && !cursor.eat_punct(Punct::Slash) {
            return Err(definition_error("expecting `/` or `)` after parameter", cursor.span()));
        }
    }
    Ok(parameters)
}

fn parse_role(cursor: &mut Cursor, previous: &[ParameterSpec]) -> Result<Role, Diagnostic> {
    let span = cursor.span();
    if cursor.eat_abbreviation("!POSITIONAL") {
        if previous.iter().any(|p| !p.is_positional()) {
            return Err(definition_error(
                "positional parameters must precede keyword parameters",
                span,
            ));
        }
        if previous.last().is_some_and(|p| p.capture == CaptureMode::CmdEnd) {
            return Err(definition_error(
                "a positional parameter cannot follow a positional !CMDEND parameter",
                span,
            ));
        }
        return Ok(Role::Positional);
    }

    let token = match cursor.peek() {
        Some(t) if t.is_macro_id() => {
            return Err(definition_error(
                "keyword macro parameter must be named in definition without \"!\" prefix",
                span,
            ));
        }
        Some(t) if t.is_identifier() => t,
        _ => return Err(definition_error("expecting parameter name or !POSITIONAL", span)),
    };
    if is_macro_keyword(&token.text) {
        return Err(definition_error(
            format!("cannot use macro keyword \"{}\" as an argument name", token.text),
            span,
        ));
    }
    let name = token.text.to_uppercase();
    if previous.iter().any(|p| p.keyword() == Some(name.as_str())) {
        return Err(definition_error(
            format!("duplicate keyword parameter \"{}\"", token.text),
            span,
        ));
    }
    cursor.advance();
    Ok(Role::Keyword(name))
}

fn parse_clauses(cursor: &mut Cursor, role: Role) -> Result<ParameterSpec, Diagnostic> {
    let mut default: Option<Vec<Token>> = None;
    let mut no_expand = false;
    let mut capture: Option<CaptureMode> = None;

    loop {
        let span = cursor.span();
        if cursor.eat_abbreviation("!DEFAULT") {
            if default.is_some() {
                return Err(definition_error("!DEFAULT is allowed only once per argument", span));
            }
            expect_lparen(cursor, "!DEFAULT")?;
            let mut tokens = Vec::new();
            while !cursor.eat_punct(Punct::RParen) {
                match cursor.advance() {
                    Some(t) if !t.is_end() => tokens.push(t.clone()),
                    _ => {
                        return Err(definition_error("expecting `)` to close !DEFAULT", span));
                    }
                }
            }
            default = Some(tokens);
        } else if cursor.eat_abbreviation("!NOEXPAND") {
            no_expand = true;
        } else if cursor.eat_abbreviation("!TOKENS") {
            check_single_capture(&capture, span)?;
            expect_lparen(cursor, "!TOKENS")?;
            let count_span = cursor.span();
            let count = cursor
                .advance()
                .and_then(Token::as_integer)
                .filter(|n| *n >= 1)
                .ok_or_else(|| definition_error("!TOKENS requires a positive integer", count_span))?;
            expect_rparen(cursor, "!TOKENS")?;
            capture = Some(CaptureMode::Tokens(count as usize));
        } else if cursor.eat_abbreviation("!CHAREND") {
            check_single_capture(&capture, span)?;
            expect_lparen(cursor, "!CHAREND")?;
            let end = parse_quoted_token(cursor)?;
            expect_rparen(cursor, "!CHAREND")?;
            capture = Some(CaptureMode::CharEnd(end));
        } else if cursor.eat_abbreviation("!ENCLOSE") {
            check_single_capture(&capture, span)?;
            expect_lparen(cursor, "!ENCLOSE")?;
            let start = parse_quoted_token(cursor)?;
            if !cursor.eat_punct(Punct::Comma) {
                return Err(definition_error("expecting `,` between !ENCLOSE delimiters", cursor.span()));
            }
            let end = parse_quoted_token(cursor)?;
            expect_rparen(cursor, "!ENCLOSE")?;
            capture = Some(CaptureMode::Enclose(start, end));
        } else if cursor.eat_abbreviation("!CMDEND") {
            check_single_capture(&capture, span)?;
            capture = Some(CaptureMode::CmdEnd);
        } else {
            break;
        }
    }

    let Some(capture) = capture else {
        return Err(definition_error(
            "expecting !TOKENS, !CHAREND, !ENCLOSE, or !CMDEND",
            cursor.span(),
        ));
    };
    Ok(ParameterSpec {
        role,
        capture,
        default,
        no_expand,
    })
}

fn check_single_capture(
    capture: &Option<CaptureMode>,
    span: std::ops::Range<usize>,
) -> Result<(), Diagnostic> {
    match capture {
        Some(_) => Err(definition_error(
            "only one of !TOKENS, !CHAREND, !ENCLOSE, or !CMDEND is allowed",
            span,
        )),
        None => Ok(()),
    }
}

fn expect_lparen(cursor: &mut Cursor, clause: &str) -> Result<(), Diagnostic> {
    if cursor.eat_punct(Punct::LParen) {
        Ok(())
    } else {
        Err(definition_error(format!("expecting `(` after {}", clause), cursor.span()))
    }
}

fn expect_rparen(cursor: &mut Cursor, clause: &str) -> Result<(), Diagnostic> {
    if cursor.eat_punct(Punct::RParen) {
        Ok(())
    } else {
        Err(definition_error(format!("expecting `)` to close {}", clause), cursor.span()))
    }
}

/// A delimiter is written as a quoted string that must hold exactly one token.
fn parse_quoted_token(cursor: &mut Cursor) -> Result<Token, Diagnostic> {
    let span = cursor.span();
    let Some(value) = cursor.peek().and_then(Token::as_string) else {
        return Err(definition_error("expecting a quoted delimiter", span));
    };
    let mut tokens = tokenize(value);
    let token = match (tokens.pop(), tokens.is_empty()) {
        (Some(t), true) if !matches!(t.kind, TokenKind::Error(_)) => t,
        _ => return Err(definition_error("string must contain exactly one token", span)),
    };
    cursor.advance();
    Ok(Token { span, ..token })
}
