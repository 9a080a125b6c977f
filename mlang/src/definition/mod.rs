pub mod parameter;

use std::ops::Range;

pub use parameter::{CaptureMode, ParameterSpec, Role};

use crate::directive::DirectiveTree;

/// A parsed, immutable `DEFINE`.
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    /// The name as written, with or without its leading `!`.
    pub name: String,
    pub span: Range<usize>,
    /// Positional parameters first, in declaration order, then keywords.
    pub parameters: Vec<ParameterSpec>,
    pub body: DirectiveTree,
}

impl MacroDefinition {
    /// Key the macro table stores this definition under.
    pub fn key(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn positional_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_positional()).count()
    }

    /// Index of the parameter a body reference names: `!3` for the third
    /// positional, `!name` for a keyword.
    pub fn find_parameter(&self, reference: &str) -> Option<usize> {
        find_parameter(&self.parameters, reference)
    }

    /// Index of the keyword parameter `name` (no `!`, any case).
    pub fn find_keyword(&self, name: &str) -> Option<usize> {
        find_keyword(&self.parameters, name)
    }
}

pub fn find_parameter(parameters: &[ParameterSpec], reference: &str) -> Option<usize> {
    let name = reference.strip_prefix('!')?;
    if let Ok(n) = name.parse::<usize>() {
        let positional = parameters.iter().filter(|p| p.is_positional()).count();
        return (n >= 1 && n <= positional).then(|| n - 1);
    }
    find_keyword(parameters, name)
}

pub fn find_keyword(parameters: &[ParameterSpec], name: &str) -> Option<usize> {
    parameters
        .iter()
        .position(|p| p.keyword().is_some_and(|k| k.eq_ignore_ascii_case(name)))
}
