use std::collections::VecDeque;
use std::io::Write;

use mlang::error::Diagnostic;
use mlang::parser::parse_define;
use mlang::scan::TokenSource;
use mlang::token::Token;
use tracing::{debug, info, warn};

use crate::expander::Expander;
use crate::settings::Settings;
use crate::table::MacroTable;

/// The expanded token stream a command parser reads from.
///
/// Pulls one statement at a time from the source, registers `DEFINE`s,
/// expands macro calls, and applies macro `SET` subcommands once the
/// statement that contains them has been expanded.
pub struct MacroProcessor<S: TokenSource> {
    source: S,
    lookahead: Option<Token>,
    table: MacroTable,
    settings: Settings,
    pending: VecDeque<Token>,
    diagnostics: Vec<Diagnostic>,
    echo: Option<Box<dyn Write>>,
    /// Whether the last token queued ended a command.
    after_end: bool,
}

impl<S: TokenSource> MacroProcessor<S> {
    pub fn new(source: S) -> Self {
        MacroProcessor::with_settings(source, Settings::default())
    }

    pub fn with_settings(source: S, settings: Settings) -> Self {
        MacroProcessor {
            source,
            lookahead: None,
            table: MacroTable::new(),
            settings,
            pending: VecDeque::new(),
            diagnostics: Vec::new(),
            echo: None,
            after_end: true,
        }
    }

    /// Send `mprint` output to `sink` instead of the log.
    pub fn set_echo(&mut self, sink: Box<dyn Write>) {
        self.echo = Some(sink);
    }

    /// The live settings, as changed by `SET` commands processed so far.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn table(&self) -> &MacroTable {
        &self.table
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn next_source_token(&mut self) -> Option<Token> {
        self.lookahead.take().or_else(|| self.source.next_token())
    }

    /// Read through the next end-of-command, or for `DEFINE` through
    /// `!ENDDEFINE` and the end-of-command after it.
    fn read_statement(&mut self) -> Option<Vec<Token>> {
        let first = self.next_source_token()?;
        let is_define = first.matches_keyword("DEFINE");
        let mut statement = vec![first];
        if statement[0].is_end() {
            return Some(statement);
        }

        while let Some(token) = self.next_source_token() {
            let done = if is_define {
                token.matches_keyword("!ENDDEFINE")
            } else {
                token.is_end()
            };
            statement.push(token);
            if done {
                break;
            }
        }

        if is_define {
            match self.next_source_token() {
                Some(token) if token.is_end() => statement.push(token),
                other => self.lookahead = other,
            }
        }
        Some(statement)
    }

    fn process_statement(&mut self, statement: Vec<Token>) {
        if statement.first().is_some_and(|t| t.matches_keyword("DEFINE")) {
            self.define(&statement);
            return;
        }

        let snapshot = self.settings;
        let (output, echoes) = {
            let mut expander = Expander::new(&self.table, snapshot, &mut self.diagnostics);
            let output = expander.expand_statement(statement);
            (output, expander.take_echoes())
        };

        for line in echoes {
            match self.echo.as_mut() {
                Some(sink) => {
                    if let Err(err) = writeln!(sink, "{}", line) {
                        warn!("failed to write macro echo: {}", err);
                    }
                }
                None => info!(target: "mprint", "{}", line),
            }
        }

        self.apply_settings(&output);
        for token in output {
            if token.is_end() {
                if self.after_end {
                    continue;
                }
                self.after_end = true;
            } else {
                self.after_end = false;
            }
            self.pending.push_back(token);
        }
    }

    fn define(&mut self, statement: &[Token]) {
        match parse_define(statement) {
            Ok(definition) => {
                debug!(
                    macro_name = %definition.name,
                    parameters = definition.parameters.len(),
                    "defined macro"
                );
                if self.table.define(definition).is_some() {
                    debug!("previous definition replaced");
                }
            }
            Err(diagnostic) => self.diagnostics.push(diagnostic),
        }
    }

    /// Apply every `SET` command in an expanded statement. The new values are
    /// picked up by the next statement's snapshot.
    fn apply_settings(&mut self, output: &[Token]) {
        for command in output.split(Token::is_end) {
            if command.first().is_some_and(|t| t.matches_keyword("SET")) {
                let problems = self.settings.apply_set_command(command);
                self.diagnostics.extend(problems);
            }
        }
    }
}

impl<S: TokenSource> Iterator for MacroProcessor<S> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            let statement = self.read_statement()?;
            self.process_statement(statement);
        }
    }
}
