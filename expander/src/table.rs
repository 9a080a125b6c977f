use std::collections::HashMap;
use std::rc::Rc;

use mlang::MacroDefinition;

/// Every macro defined so far in the session.
///
/// Lookup ignores case. Redefining a name replaces the old definition; calls
/// already being expanded hold their own reference and are unaffected.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Rc<MacroDefinition>>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable::default()
    }

    /// Register `definition`, returning the definition it replaced.
    pub fn define(&mut self, definition: MacroDefinition) -> Option<Rc<MacroDefinition>> {
        self.macros.insert(definition.key(), Rc::new(definition))
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<MacroDefinition>> {
        self.macros.get(&name.to_uppercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(&name.to_uppercase())
    }

    /// Defined names as written in their `DEFINE`s, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.values().map(|m| m.name.as_str()).collect();
        names.sort_by_key(|name| name.to_uppercase());
        names
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}
