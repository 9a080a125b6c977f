pub mod binder;
pub mod environment;
pub mod evaluator;
pub mod expander;
pub mod functions;
pub mod processor;
pub mod settings;
pub mod table;

pub use binder::{BoundCall, bind_arguments};
pub use expander::{Emitted, Expander};
pub use processor::MacroProcessor;
pub use settings::Settings;
pub use table::MacroTable;

use mlang::error::Diagnostic;
use mlang::scan::Scanner;
use mlang::token::Token;

/// Expand all of `source` with `settings`, returning the tokens and every
/// diagnostic produced along the way.
pub fn expand_source(source: &str, settings: Settings) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut processor = MacroProcessor::with_settings(Scanner::new(source), settings);
    let tokens: Vec<Token> = processor.by_ref().collect();
    (tokens, processor.take_diagnostics())
}
