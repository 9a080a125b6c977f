/// If `text` is exactly one quoted string (surrounding blanks allowed), return
/// its contents with doubled quotes collapsed.
pub fn try_unquote(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let quote = chars.next().filter(|c| *c == '\'' || *c == '"')?;

    let mut value = String::new();
    let mut closed = false;
    while let Some(c) = chars.next() {
        if closed {
            return None;
        }
        if c == quote {
            let rest = chars.as_str();
            if rest.starts_with(quote) {
                value.push(quote);
                chars.next();
            } else {
                closed = true;
            }
        } else {
            value.push(c);
        }
    }
    closed.then_some(value)
}

/// Unquote `text` if it is a quoted string; otherwise return it unchanged.
pub fn unquote(text: &str) -> String {
    try_unquote(text).unwrap_or_else(|| text.to_string())
}

/// Wrap `text` in apostrophes, doubling embedded apostrophes. Text that is
/// already a quoted string is returned as is.
pub fn quote(text: &str) -> String {
    if try_unquote(text).is_some() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
