use std::ops::Range;
use std::rc::Rc;

use mlang::MacroDefinition;
use mlang::directive::{Directive, Expr};
use mlang::error::{Diagnostic, MacroError};
use mlang::parser::compile_body;
use mlang::scan::{tokenize, tokenize_at};
use mlang::token::{Token, render};
use tracing::{debug, trace, warn};

use crate::binder::{BoundCall, bind_arguments};
use crate::environment::Activation;
use crate::evaluator::{call_function, evaluate, evaluate_number};
use crate::settings::Settings;
use crate::table::MacroTable;

/// A token produced by substitution, tagged with whether the call-expansion
/// pass may treat it as a macro call.
#[derive(Debug, Clone)]
pub struct Emitted {
    pub token: Token,
    pub expandable: bool,
}

impl AsRef<Token> for Emitted {
    fn as_ref(&self) -> &Token {
        &self.token
    }
}

/// Nested `!EVAL` passes recurse on the host stack.
const MAX_EVAL_NESTING: usize = 50;

/// A call whose substituted body is being scanned for further calls.
struct Frame {
    tokens: Vec<Emitted>,
    pos: usize,
    depth: usize,
    /// Where the frame's expansion starts in the shared output.
    start: usize,
    /// Call-site name to echo once the expansion is complete.
    echo: Option<String>,
}

/// Whether a `!BREAK` is unwinding to its loop.
enum Flow {
    Continue,
    Break,
}

/// Expands the macro calls in one statement.
///
/// Holds the settings snapshot for the statement; the table is only read.
pub struct Expander<'a> {
    table: &'a MacroTable,
    settings: Settings,
    diagnostics: &'a mut Vec<Diagnostic>,
    /// Names of the macros and directives being expanded, outermost first.
    stack: Vec<String>,
    /// `mprint` lines for top-level calls.
    echoes: Vec<String>,
    /// `!EVAL` passes currently running.
    eval_nesting: usize,
}

impl<'a> Expander<'a> {
    pub fn new(table: &'a MacroTable, settings: Settings, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Expander {
            table,
            settings,
            diagnostics,
            stack: Vec::new(),
            echoes: Vec::new(),
            eval_nesting: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Drain the `mprint` lines recorded so far.
    pub fn take_echoes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.echoes)
    }

    /// Expand every macro call in a top-level statement.
    pub fn expand_statement(&mut self, tokens: Vec<Token>) -> Vec<Token> {
        let expandable = self.settings.mexpand;
        let emitted: Vec<Emitted> = tokens
            .into_iter()
            .map(|token| Emitted { token, expandable })
            .collect();
        self.expand_calls(emitted, 0)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_stack(self.stack.clone());
        if diagnostic.is_warning() {
            warn!(stack = ?diagnostic.stack, "{}", diagnostic.error);
        }
        self.diagnostics.push(diagnostic);
    }

    fn report_error(&mut self, error: MacroError, span: Option<Range<usize>>) {
        self.report(Diagnostic::from_error(error, span));
    }

    // -----------------------------------------------------------------------
    // Call expansion
    // -----------------------------------------------------------------------

    /// Replace each expandable macro call in `tokens` by its expansion.
    /// `depth` is the nesting level of the activation that produced `tokens`.
    ///
    /// Nested calls are tracked on an explicit frame stack, not the host stack.
    pub fn expand_calls(&mut self, tokens: Vec<Emitted>, depth: usize) -> Vec<Token> {
        let mut out = Vec::new();
        let mut frames = vec![Frame {
            tokens,
            pos: 0,
            depth,
            start: 0,
            echo: None,
        }];

        while let Some(frame) = frames.last_mut() {
            let Some(emitted) = frame.tokens.get(frame.pos) else {
                if let Some(finished) = frames.pop() {
                    if !frames.is_empty() {
                        self.leave_call(finished, &out);
                    }
                }
                continue;
            };

            let definition = if emitted.expandable && emitted.token.is_identifier() {
                self.table.lookup(&emitted.token.text)
            } else {
                None
            };
            let Some(definition) = definition else {
                out.push(emitted.token.clone());
                frame.pos += 1;
                continue;
            };

            let name = emitted.token.clone();
            let call = bind_arguments(&definition, &frame.tokens[frame.pos + 1..]);
            frame.pos += 1 + call.consumed;
            let depth = frame.depth + 1;
            let echo = (frame.depth == 0 && self.settings.mprint).then(|| name.text.clone());
            let start = out.len();

            match self.enter_call(&definition, call, &name, depth) {
                Some(tokens) => frames.push(Frame {
                    tokens,
                    pos: 0,
                    depth,
                    start,
                    echo,
                }),
                None => {
                    if let Some(echo) = echo {
                        self.echo(&echo, &[]);
                    }
                }
            }
        }
        out
    }

    /// Bind, check the nesting limit, and substitute the body of a call.
    /// `None` means the call was dropped. Otherwise the call stays on
    /// `self.stack` until [`Expander::leave_call`].
    fn enter_call(
        &mut self,
        definition: &Rc<MacroDefinition>,
        call: BoundCall,
        name: &Token,
        depth: usize,
    ) -> Option<Vec<Emitted>> {
        self.stack.push(definition.name.clone());
        for error in call.errors {
            self.report(error);
        }

        if depth > self.settings.mnest {
            self.report_error(
                MacroError::NestingLimit {
                    macro_name: definition.name.clone(),
                    limit: self.settings.mnest,
                },
                Some(name.span.clone()),
            );
            self.stack.pop();
            return None;
        }

        debug!(macro_name = %definition.name, depth, "expanding macro call");
        let mut activation = Activation::new(Rc::clone(definition), call.bindings, depth);
        let mut emitted = Vec::new();
        self.substitute(&definition.body, &mut activation, &mut emitted);
        Some(emitted)
    }

    fn leave_call(&mut self, frame: Frame, out: &[Token]) {
        self.stack.pop();
        if let Some(name) = frame.echo {
            self.echo(&name, &out[frame.start..]);
        }
    }

    fn echo(&mut self, name: &str, expansion: &[Token]) {
        self.echoes
            .push(format!("\"{}\" expands to: {}", name, render(expansion)));
    }

    // -----------------------------------------------------------------------
    // Substitution
    // -----------------------------------------------------------------------

    fn literal_expandable(&self, activation: &Activation) -> bool {
        activation.expand_enabled && self.settings.mexpand
    }

    fn substitute(
        &mut self,
        tree: &[Directive],
        activation: &mut Activation,
        out: &mut Vec<Emitted>,
    ) -> Flow {
        for directive in tree {
            match directive {
                Directive::Literal(tokens) => {
                    let expandable = self.literal_expandable(activation);
                    for token in tokens {
                        let value = if token.is_macro_id() {
                            activation.variables.get(&token.text)
                        } else {
                            None
                        };
                        match value {
                            Some(value) => emit_inert(out, tokenize_at(value, token.span.clone())),
                            None => out.push(Emitted {
                                token: token.clone(),
                                expandable,
                            }),
                        }
                    }
                }

                Directive::ArgRef(index) => {
                    if let Some(binding) = activation.bindings.get(*index) {
                        let expandable = binding.expandable && self.literal_expandable(activation);
                        out.extend(binding.tokens.iter().map(|token| Emitted {
                            token: token.clone(),
                            expandable,
                        }));
                    }
                }

                Directive::AllPositionalsRef => {
                    let enabled = self.literal_expandable(activation);
                    for binding in activation.positionals() {
                        let expandable = binding.expandable && enabled;
                        out.extend(binding.tokens.iter().map(|token| Emitted {
                            token: token.clone(),
                            expandable,
                        }));
                    }
                }

                Directive::FunctionCall(call) => match call_function(call, self, activation) {
                    Ok(text) => emit_inert(out, tokenize_at(&text, call.span.clone())),
                    Err(diagnostic) => self.fail(diagnostic, call.span.clone(), out),
                },

                Directive::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let value = match evaluate(condition, self, activation) {
                        Ok(value) => value,
                        Err(diagnostic) => {
                            self.fail(diagnostic, 0..0, out);
                            continue;
                        }
                    };
                    let branch = if value != "0" {
                        Some(then_branch)
                    } else {
                        else_branch.as_ref()
                    };
                    if let Some(branch) = branch {
                        self.stack.push("!IF".to_string());
                        let flow = self.substitute(branch, activation, out);
                        self.stack.pop();
                        if let Flow::Break = flow {
                            return Flow::Break;
                        }
                    }
                }

                Directive::DoRange {
                    variable,
                    start,
                    end,
                    step,
                    body,
                    span,
                } => {
                    self.stack.push("!DO".to_string());
                    match self.loop_bounds(start, end, step.as_ref(), activation) {
                        Ok(bounds) => self.do_range(variable, bounds, body, span, activation, out),
                        Err(diagnostic) => self.fail(diagnostic, span.clone(), out),
                    }
                    self.stack.pop();
                }

                Directive::DoIn {
                    variable,
                    list,
                    body,
                    span,
                } => {
                    self.stack.push("!DO".to_string());
                    self.do_in(variable, list, body, span, activation, out);
                    self.stack.pop();
                }

                Directive::Let { variable, value } => match evaluate(value, self, activation) {
                    Ok(value) => activation.variables.set(variable, value),
                    Err(diagnostic) => self.fail(diagnostic, 0..0, out),
                },

                Directive::ExpandToggle(on) => activation.expand_enabled = *on,

                Directive::Break => return Flow::Break,

                Directive::Invalid(error, span) => {
                    self.report_error(error.clone(), Some(span.clone()));
                    out.push(inert(Token::error_marker(error.to_string(), span.clone())));
                }
            }
        }
        Flow::Continue
    }

    /// Report `diagnostic` and leave an error marker in the output.
    fn fail(&mut self, diagnostic: Diagnostic, fallback: Range<usize>, out: &mut Vec<Emitted>) {
        let span = diagnostic.span.clone().unwrap_or(fallback);
        let message = diagnostic.error.to_string();
        self.report(diagnostic);
        out.push(inert(Token::error_marker(message, span)));
    }

    // -----------------------------------------------------------------------
    // Loops
    // -----------------------------------------------------------------------

    /// First value, last value, and step of a numeric `!DO`.
    fn loop_bounds(
        &mut self,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        activation: &mut Activation,
    ) -> Result<(f64, f64, f64), Diagnostic> {
        let first = evaluate_number(start, self, activation)?;
        let last = evaluate_number(end, self, activation)?;
        let by = match step {
            Some(step) => evaluate_number(step, self, activation)?,
            None if first <= last => 1.0,
            None => -1.0,
        };
        if by == 0.0 {
            let error = MacroError::binding(activation.name(), "!BY value cannot be zero");
            return Err(Diagnostic::from_error(error, None));
        }
        Ok((first, last, by))
    }

    fn do_range(
        &mut self,
        variable: &str,
        (first, last, by): (f64, f64, f64),
        body: &[Directive],
        span: &Range<usize>,
        activation: &mut Activation,
        out: &mut Vec<Emitted>,
    ) {
        let mut index = first;
        let mut iterations = 0;
        while (by > 0.0 && index <= last) || (by < 0.0 && index >= last) {
            if iterations >= self.settings.miterate {
                self.report_error(
                    MacroError::IterationLimit {
                        limit: self.settings.miterate,
                    },
                    Some(span.clone()),
                );
                break;
            }
            trace!(variable, index, "!DO iteration");
            activation.variables.set(variable, index.to_string());
            if let Flow::Break = self.substitute(body, activation, out) {
                break;
            }
            iterations += 1;
            index += by;
        }
    }

    fn do_in(
        &mut self,
        variable: &str,
        list: &Expr,
        body: &[Directive],
        span: &Range<usize>,
        activation: &mut Activation,
        out: &mut Vec<Emitted>,
    ) {
        let items = match evaluate(list, self, activation) {
            Ok(text) => tokenize(&text),
            Err(diagnostic) => return self.fail(diagnostic, span.clone(), out),
        };
        for (iterations, item) in items.iter().enumerate() {
            if iterations >= self.settings.miterate {
                self.report_error(
                    MacroError::IterationLimit {
                        limit: self.settings.miterate,
                    },
                    Some(span.clone()),
                );
                break;
            }
            trace!(variable, item = %item.text, "!DO iteration");
            activation.variables.set(variable, item.text.clone());
            if let Flow::Break = self.substitute(body, activation, out) {
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // !EVAL
    // -----------------------------------------------------------------------

    /// Expand `text` fully in the context of `activation`: parameter
    /// references, variables, functions, directives, and macro calls.
    pub fn evaluate_text(&mut self, text: &str, span: Range<usize>, activation: &mut Activation) -> String {
        if self.eval_nesting >= MAX_EVAL_NESTING {
            self.report_error(
                MacroError::EvalNestingLimit {
                    limit: MAX_EVAL_NESTING,
                },
                Some(span),
            );
            return String::new();
        }
        let tokens = tokenize_at(text, span);
        let tree = compile_body(&tokens, &activation.definition.parameters);
        self.stack.push("!EVAL".to_string());
        self.eval_nesting += 1;
        let mut emitted = Vec::new();
        self.substitute(&tree, activation, &mut emitted);
        let out = self.expand_calls(emitted, activation.depth);
        self.eval_nesting -= 1;
        self.stack.pop();
        render(&out)
    }
}

fn inert(token: Token) -> Emitted {
    Emitted {
        token,
        expandable: false,
    }
}

fn emit_inert(out: &mut Vec<Emitted>, tokens: Vec<Token>) {
    out.extend(tokens.into_iter().map(inert));
}
