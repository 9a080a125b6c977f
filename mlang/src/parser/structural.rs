use crate::definition::{ParameterSpec, find_parameter};
use crate::directive::{Directive, DirectiveTree};
use crate::error::{Diagnostic, MacroError};
use crate::token::{Punct, Token};

use super::cursor::{Cursor, matches_abbreviation};
use super::expression::{parse_expression, parse_function_call, starts_function_call};
use super::is_macro_keyword;

/// Compile a macro body into its directive tree.
///
/// Never fails: a directive that does not parse becomes
/// [`Directive::Invalid`] and compilation picks up again right after the
/// directive's keyword.
pub(super) fn compile_body(tokens: &[Token], parameters: &[ParameterSpec]) -> DirectiveTree {
    let compiler = BodyCompiler { parameters };
    let mut cursor = Cursor::new(tokens);
    let (tree, _) = compiler.sequence(&mut cursor, false, &[]);
    tree
}

struct BodyCompiler<'p> {
    parameters: &'p [ParameterSpec],
}

enum Step {
    Literal(Token),
    Directive(Directive),
}

impl BodyCompiler<'_> {
    /// Compile until the input runs out or the next token is one of
    /// `terminators`, which is left unconsumed and returned.
    fn sequence(
        &self,
        cursor: &mut Cursor,
        in_loop: bool,
        terminators: &[&'static str],
    ) -> (DirectiveTree, Option<&'static str>) {
        let mut tree = DirectiveTree::new();
        let mut literal: Vec<Token> = Vec::new();

        let terminator = loop {
            let Some(token) = cursor.peek() else {
                break None;
            };
            if let Some(t) = terminators.iter().find(|t| matches_abbreviation(token, t)) {
                break Some(*t);
            }
            match self.step(token, cursor, in_loop) {
                Step::Literal(token) => literal.push(token),
                Step::Directive(directive) => {
                    if !literal.is_empty() {
                        tree.push(Directive::Literal(std::mem::take(&mut literal)));
                    }
                    tree.push(directive);
                }
            }
        };
        if !literal.is_empty() {
            tree.push(Directive::Literal(literal));
        }
        (tree, terminator)
    }

    /// Compile the construct that starts at `token`, the cursor's current token.
    fn step(&self, token: &Token, cursor: &mut Cursor, in_loop: bool) -> Step {
        let start = cursor.pos();
        cursor.advance();

        if token.is_punct(Punct::BangAsterisk) {
            return Step::Directive(Directive::AllPositionalsRef);
        }
        if !token.is_macro_id() {
            return Step::Literal(token.clone());
        }
        if let Some(index) = find_parameter(self.parameters, &token.text) {
            return Step::Directive(Directive::ArgRef(index));
        }

        let upper = token.text.to_ascii_uppercase();
        let result = match upper.as_str() {
            "!IF" => self.compile_if(cursor, in_loop),
            "!DO" => self.compile_do(cursor),
            "!LET" => self.compile_let(cursor),
            "!BREAK" if in_loop => Ok(Directive::Break),
            "!BREAK" => Err(Diagnostic::error(
                MacroError::evaluation("!BREAK outside !DO"),
                Some(token.span.clone()),
            )),
            "!ONEXPAND" => Ok(Directive::ExpandToggle(true)),
            "!OFFEXPAND" => Ok(Directive::ExpandToggle(false)),
            _ => {
                cursor.set_pos(start);
                if !starts_function_call(cursor) {
                    cursor.advance();
                    return Step::Literal(token.clone());
                }
                parse_function_call(cursor, self.parameters).map(Directive::FunctionCall)
            }
        };

        match result {
            Ok(directive) => Step::Directive(directive),
            Err(diagnostic) => {
                cursor.set_pos(start + 1);
                let span = diagnostic.span.unwrap_or_else(|| token.span.clone());
                Step::Directive(Directive::Invalid(diagnostic.error, span))
            }
        }
    }

    // -----------------------------------------------------------------------
    // !IF
    // -----------------------------------------------------------------------

    fn compile_if(&self, cursor: &mut Cursor, in_loop: bool) -> Result<Directive, Diagnostic> {
        let keyword_span = span_before(cursor);
        let condition = parse_expression(cursor, self.parameters)?;
        if !cursor.eat_abbreviation("!THEN") {
            return Err(error("!THEN expected in macro !IF construct", cursor.span()));
        }

        let (then_branch, terminator) = self.sequence(cursor, in_loop, &["!ELSE", "!IFEND"]);
        let else_branch = match terminator {
            None => {
                return Err(error("!ELSE or !IFEND expected in macro !IF construct", keyword_span));
            }
            Some("!ELSE") => {
                cursor.advance();
                let (else_branch, terminator) = self.sequence(cursor, in_loop, &["!IFEND"]);
                if terminator.is_none() {
                    return Err(error("!IFEND expected in macro !IF construct", keyword_span));
                }
                cursor.advance();
                Some(else_branch)
            }
            Some(_) => {
                cursor.advance();
                None
            }
        };

        Ok(Directive::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    // -----------------------------------------------------------------------
    // !DO and !LET
    // -----------------------------------------------------------------------

    fn compile_do(&self, cursor: &mut Cursor) -> Result<Directive, Diagnostic> {
        let span = span_before(cursor);
        let variable = self.variable_name(cursor, "!DO")?;

        if cursor.eat_keyword("!IN") {
            let list = parse_expression(cursor, self.parameters)?;
            let body = self.loop_body(cursor, &span)?;
            return Ok(Directive::DoIn {
                variable,
                list,
                body,
                span,
            });
        }

        if !cursor.eat_punct(Punct::Equals) {
            return Err(error("expected `=` or !IN in !DO loop", cursor.span()));
        }
        let start = parse_expression(cursor, self.parameters)?;
        if !cursor.eat_keyword("!TO") {
            return Err(error("expected !TO in numerical !DO loop", cursor.span()));
        }
        let end = parse_expression(cursor, self.parameters)?;
        let step = if cursor.eat_keyword("!BY") {
            Some(parse_expression(cursor, self.parameters)?)
        } else {
            None
        };
        let body = self.loop_body(cursor, &span)?;
        Ok(Directive::DoRange {
            variable,
            start,
            end,
            step,
            body,
            span,
        })
    }

    fn loop_body(
        &self,
        cursor: &mut Cursor,
        span: &std::ops::Range<usize>,
    ) -> Result<DirectiveTree, Diagnostic> {
        let (body, terminator) = self.sequence(cursor, true, &["!DOEND"]);
        if terminator.is_none() {
            return Err(error("missing !DOEND", span.clone()));
        }
        cursor.advance();
        Ok(body)
    }

    fn compile_let(&self, cursor: &mut Cursor) -> Result<Directive, Diagnostic> {
        let variable = self.variable_name(cursor, "!LET")?;
        if !cursor.eat_punct(Punct::Equals) {
            return Err(error("expected `=` following !LET", cursor.span()));
        }
        let value = parse_expression(cursor, self.parameters)?;
        Ok(Directive::Let { variable, value })
    }

    fn variable_name(&self, cursor: &mut Cursor, directive: &str) -> Result<String, Diagnostic> {
        let span = cursor.span();
        let token = match cursor.peek() {
            Some(t) if t.is_macro_id() => t,
            _ => {
                return Err(error(
                    format!("expected macro variable name following {}", directive),
                    span,
                ));
            }
        };
        if is_macro_keyword(&token.text) || find_parameter(self.parameters, &token.text).is_some() {
            return Err(error(
                format!(
                    "cannot use argument name or macro keyword \"{}\" as {} variable",
                    token.text, directive
                ),
                span,
            ));
        }
        cursor.advance();
        Ok(token.text.clone())
    }
}

fn error(message: impl Into<String>, span: std::ops::Range<usize>) -> Diagnostic {
    Diagnostic::error(MacroError::evaluation(message), Some(span))
}

/// Span of the token just consumed.
fn span_before(cursor: &Cursor) -> std::ops::Range<usize> {
    let mut probe = cursor.clone();
    probe.set_pos(cursor.pos().saturating_sub(1));
    probe.span()
}
