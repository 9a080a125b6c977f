use crate::token::Token;

/// How a parameter is matched at the call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    /// Referenced as `!1`, `!2`, ... in declaration order.
    Positional,
    /// Declared as `name`, referenced as `!name`, passed as `name=value`.
    /// The stored name is uppercase and has no `!`.
    Keyword(String),
}

/// Which call-site tokens become the parameter's value.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureMode {
    /// Exactly `n` tokens.
    Tokens(usize),
    /// Tokens up to the delimiter, which is consumed but not captured.
    CharEnd(Token),
    /// A start token, then tokens up to the first end token.
    Enclose(Token, Token),
    /// Everything up to the end of the command.
    CmdEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub role: Role,
    pub capture: CaptureMode,
    pub default: Option<Vec<Token>>,
    /// Set by `!NOEXPAND`: the bound value is never scanned for macro calls.
    pub no_expand: bool,
}

impl ParameterSpec {
    pub fn is_positional(&self) -> bool {
        matches!(self.role, Role::Positional)
    }

    pub fn keyword(&self) -> Option<&str> {
        match &self.role {
            Role::Keyword(name) => Some(name),
            Role::Positional => None,
        }
    }

    pub fn default_tokens(&self) -> &[Token] {
        self.default.as_deref().unwrap_or(&[])
    }
}
