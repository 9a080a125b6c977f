pub mod definition;
pub mod directive;
pub mod error;
pub mod parser;
pub mod scan;
pub mod token;

pub use definition::MacroDefinition;
pub use error::{Diagnostic, ErrorKind, MacroError};
pub use parser::parse_define;
pub use scan::{Scanner, TokenSource, tokenize};
pub use token::{Token, TokenKind};
