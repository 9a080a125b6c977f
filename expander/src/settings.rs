use mlang::error::{Diagnostic, MacroError};
use mlang::token::{Punct, Token};
use serde::Deserialize;

/// The macro-related `SET` subcommands.
///
/// Deserializes from a table such as `[settings]` in a test file or a CLI
/// config file; missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether macro calls are expanded at all.
    pub mexpand: bool,
    /// Whether expansions are echoed.
    pub mprint: bool,
    /// Maximum iterations of a single `!DO` loop.
    pub miterate: usize,
    /// Maximum nesting depth of macro calls.
    pub mnest: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mexpand: true,
            mprint: false,
            miterate: 1000,
            mnest: 50,
        }
    }
}

impl Settings {
    /// Apply the macro subcommands of one `SET` command.
    ///
    /// `tokens` is the whole command, starting with `SET`. Subcommands this
    /// engine does not own are skipped. Bad values leave the setting unchanged
    /// and are returned as diagnostics.
    pub fn apply_set_command(&mut self, tokens: &[Token]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let Some(first) = tokens.first() else {
            return diagnostics;
        };
        if !first.matches_keyword("SET") {
            return diagnostics;
        }

        let mut i = 1;
        while i < tokens.len() {
            let name = &tokens[i];
            let is_assignment = tokens.get(i + 1).is_some_and(|t| t.is_punct(Punct::Equals));
            let setting = ["MEXPAND", "MPRINT", "MITERATE", "MNEST"]
                .into_iter()
                .find(|s| name.matches_keyword(s));
            let (Some(setting), true) = (setting, is_assignment) else {
                i += 1;
                continue;
            };

            let Some(value) = tokens.get(i + 2) else {
                diagnostics.push(invalid(setting, "missing value", name));
                break;
            };
            if let Err(message) = self.apply(setting, value) {
                diagnostics.push(invalid(setting, message, value));
            }
            i += 3;
        }
        diagnostics
    }

    fn apply(&mut self, setting: &str, value: &Token) -> Result<(), String> {
        match setting {
            "MEXPAND" => self.mexpand = parse_switch(value)?,
            "MPRINT" => self.mprint = parse_switch(value)?,
            "MITERATE" => self.miterate = parse_limit(value)?,
            _ => self.mnest = parse_limit(value)?,
        }
        Ok(())
    }
}

fn parse_switch(value: &Token) -> Result<bool, String> {
    if ["ON", "YES", "TRUE"].iter().any(|k| value.matches_keyword(k)) {
        Ok(true)
    } else if ["OFF", "NO", "FALSE"].iter().any(|k| value.matches_keyword(k)) {
        Ok(false)
    } else {
        Err(format!("expecting ON or OFF, not `{}`", value.text))
    }
}

fn parse_limit(value: &Token) -> Result<usize, String> {
    match value.as_integer() {
        Some(n) if n >= 1 => Ok(n as usize),
        _ => Err(format!("expecting a positive integer, not `{}`", value.text)),
    }
}

fn invalid(setting: &str, message: impl Into<String>, at: &Token) -> Diagnostic {
    Diagnostic::error(
        MacroError::InvalidSetting {
            setting: setting.to_string(),
            message: message.into(),
        },
        Some(at.span.clone()),
    )
}
