use std::ops::Range;

use mlang::MacroDefinition;
use mlang::definition::{CaptureMode, ParameterSpec};
use mlang::error::{Diagnostic, MacroError};
use mlang::token::{Punct, Token};

use crate::environment::Binding;

/// The outcome of matching a call site against a definition.
#[derive(Debug, Clone)]
pub struct BoundCall {
    /// One binding per parameter, defaults filled in.
    pub bindings: Vec<Binding>,
    /// How many tokens after the macro name belong to the call.
    pub consumed: usize,
    /// Problems found while binding. The call is still expanded.
    pub errors: Vec<Diagnostic>,
}

/// Match the tokens following a macro name against `definition`'s parameters.
///
/// Positional parameters are filled in order until the command ends or a
/// `keyword=` appears; then `keyword=value` pairs are read in any order until
/// a token that does not start one. The end-of-command token is never
/// consumed.
pub fn bind_arguments<T: AsRef<Token>>(definition: &MacroDefinition, tokens: &[T]) -> BoundCall {
    let mut binder = Binder {
        definition,
        tokens,
        pos: 0,
        values: vec![None; definition.parameters.len()],
        errors: Vec::new(),
    };
    binder.bind();

    let bindings = definition
        .parameters
        .iter()
        .zip(binder.values)
        .map(|(param, value)| {
            let tokens = value.unwrap_or_else(|| param.default_tokens().to_vec());
            Binding::new(tokens, !param.no_expand)
        })
        .collect();
    BoundCall {
        bindings,
        consumed: binder.pos,
        errors: binder.errors,
    }
}

struct Binder<'a, T> {
    definition: &'a MacroDefinition,
    tokens: &'a [T],
    pos: usize,
    values: Vec<Option<Vec<Token>>>,
    errors: Vec<Diagnostic>,
}

/// A capture that ran into trouble keeps what it read so far.
struct CaptureError {
    partial: Vec<Token>,
    message: String,
}

impl<'a, T: AsRef<Token>> Binder<'a, T> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(AsRef::as_ref).filter(|t| !t.is_end())
    }

    fn span_here(&self) -> Range<usize> {
        match self.tokens.get(self.pos).or(self.tokens.last()) {
            Some(t) => t.as_ref().span.clone(),
            None => 0..0,
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Range<usize>) {
        self.errors.push(Diagnostic::error(
            MacroError::binding(&self.definition.name, message),
            Some(span),
        ));
    }

    fn bind(&mut self) {
        if !self.bind_positionals() {
            return;
        }
        self.bind_keywords();
    }

    /// Returns false if binding must stop.
    fn bind_positionals(&mut self) -> bool {
        let definition = self.definition;
        for (index, param) in definition.parameters.iter().enumerate() {
            if !param.is_positional() {
                break;
            }
            if self.peek().is_none() || self.at_keyword_assignment() {
                return true;
            }
            if !self.capture_into(index, param) {
                return false;
            }
        }
        true
    }

    fn bind_keywords(&mut self) {
        let definition = self.definition;
        loop {
            let all_bound = definition
                .parameters
                .iter()
                .zip(&self.values)
                .all(|(p, v)| p.is_positional() || v.is_some());
            if all_bound {
                return;
            }

            let Some(token) = self.peek() else {
                return;
            };
            if !token.is_identifier() || token.is_macro_id() {
                return;
            }
            let Some(index) = definition.find_keyword(&token.text) else {
                return;
            };
            let param = &definition.parameters[index];
            let keyword_span = token.span.clone();
            let keyword_text = token.text.clone();

            if self.values[index].is_some() {
                self.error(
                    format!("argument {} specified more than once", keyword_text),
                    keyword_span.clone(),
                );
            }
            self.pos += 1;

            if !self.peek().is_some_and(|t| t.is_punct(Punct::Equals)) {
                let found = self.peek().map_or("end of command".to_string(), |t| format!("`{}`", t.text));
                let span = self.span_here();
                self.error(
                    format!("found {} while expecting `=` after argument {}", found, keyword_text),
                    span,
                );
                self.values[index].get_or_insert_with(Vec::new);
                return;
            }
            self.pos += 1;

            if !self.capture_into(index, param) {
                return;
            }
        }
    }

    /// True at `name =` where `name` is one of the keyword parameters.
    fn at_keyword_assignment(&self) -> bool {
        let Some(token) = self.peek() else {
            return false;
        };
        token.is_identifier()
            && !token.is_macro_id()
            && self.definition.find_keyword(&token.text).is_some()
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| t.as_ref().is_punct(Punct::Equals))
    }

    /// Returns false if binding must stop.
    fn capture_into(&mut self, index: usize, param: &ParameterSpec) -> bool {
        match self.capture(param) {
            Ok(value) => {
                self.values[index] = Some(value);
                true
            }
            Err(CaptureError { partial, message }) => {
                self.values[index] = Some(partial);
                let span = self.span_here();
                self.error(message, span);
                false
            }
        }
    }

    fn capture(&mut self, param: &ParameterSpec) -> Result<Vec<Token>, CaptureError> {
        let mut value = Vec::new();
        match &param.capture {
            CaptureMode::Tokens(n) => {
                while value.len() < *n {
                    let Some(token) = self.peek() else {
                        let missing = n - value.len();
                        return Err(CaptureError {
                            partial: value,
                            message: format!(
                                "reached end of command expecting {} more token{}",
                                missing,
                                if missing == 1 { "" } else { "s" }
                            ),
                        });
                    };
                    value.push(token.clone());
                    self.pos += 1;
                }
            }
            CaptureMode::CharEnd(end) => {
                while let Some(token) = self.peek() {
                    self.pos += 1;
                    if token == end {
                        break;
                    }
                    value.push(token.clone());
                }
            }
            CaptureMode::Enclose(start, end) => {
                match self.peek() {
                    Some(token) if token == start => self.pos += 1,
                    found => {
                        let found = found.map_or("end of command".to_string(), |t| format!("`{}`", t.text));
                        return Err(CaptureError {
                            partial: value,
                            message: format!("found {} while expecting `{}`", found, start.text),
                        });
                    }
                }
                loop {
                    let Some(token) = self.peek() else {
                        return Err(CaptureError {
                            partial: value,
                            message: format!("reached end of command expecting `{}`", end.text),
                        });
                    };
                    self.pos += 1;
                    if token == end {
                        break;
                    }
                    value.push(token.clone());
                }
            }
            CaptureMode::CmdEnd => {
                while let Some(token) = self.peek() {
                    value.push(token.clone());
                    self.pos += 1;
                }
            }
        }
        Ok(value)
    }
}
