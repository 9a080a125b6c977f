use std::collections::HashMap;
use std::rc::Rc;

use mlang::MacroDefinition;
use mlang::token::Token;

/// The value bound to one parameter for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub tokens: Vec<Token>,
    /// False for `!NOEXPAND` parameters.
    pub expandable: bool,
}

impl Binding {
    pub fn new(tokens: Vec<Token>, expandable: bool) -> Self {
        Binding { tokens, expandable }
    }
}

/// Macro variables created by `!LET` and `!DO`, keyed case-insensitively.
///
/// Values are kept as syntax text and re-tokenized where they are used.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_uppercase(), value.into());
    }
}

/// State for one macro call being expanded.
#[derive(Debug)]
pub struct Activation {
    pub definition: Rc<MacroDefinition>,
    /// One binding per parameter, in declaration order.
    pub bindings: Vec<Binding>,
    pub variables: Variables,
    /// Cleared by `!OFFEXPAND`, set by `!ONEXPAND`.
    pub expand_enabled: bool,
    /// 1 for a call made directly from a command.
    pub depth: usize,
}

impl Activation {
    pub fn new(definition: Rc<MacroDefinition>, bindings: Vec<Binding>, depth: usize) -> Self {
        Activation {
            definition,
            bindings,
            variables: Variables::default(),
            expand_enabled: true,
            depth,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The positional bindings, in order.
    pub fn positionals(&self) -> impl Iterator<Item = &Binding> {
        self.definition
            .parameters
            .iter()
            .zip(&self.bindings)
            .filter(|(p, _)| p.is_positional())
            .map(|(_, b)| b)
    }
}
