use mlang::directive::Function;
use mlang::error::MacroError;
use mlang::scan::tokenize;
use mlang::token::quote::{quote, try_unquote, unquote};
use mlang::token::render;

/// Apply a built-in function to arguments already reduced to text.
///
/// `eval` performs the full expansion `!EVAL` needs; nothing else calls it.
pub fn apply(
    function: Function,
    args: &[String],
    eval: &mut dyn FnMut(&str) -> String,
) -> Result<String, MacroError> {
    let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");

    let result = match function {
        Function::Null => String::new(),

        Function::Blanks => {
            let n = parse_integer(arg(0))
                .filter(|n| (0..=i64::from(i32::MAX)).contains(n))
                .ok_or_else(|| {
                    MacroError::function(
                        function.name(),
                        format!("argument must be a non-negative integer (not \"{}\")", arg(0)),
                    )
                })?;
            let n = n as usize;
            let mut blanks = String::new();
            blanks.try_reserve_exact(n).map_err(|_| {
                MacroError::function(function.name(), format!("cannot allocate {} blanks", n))
            })?;
            blanks.extend(std::iter::repeat_n(' ', n));
            blanks
        }

        Function::Concat => args.iter().map(|a| unquote(a)).collect(),

        Function::Eval => eval(arg(0)),

        Function::Head => {
            let tokens = tokenize(&unquote(arg(0)));
            tokens.first().map(|t| t.text.clone()).unwrap_or_default()
        }

        Function::Tail => {
            let tokens = tokenize(&unquote(arg(0)));
            render(tokens.get(1..).unwrap_or(&[]))
        }

        Function::Index => {
            let (haystack, needle) = (arg(0), arg(1));
            match haystack.find(needle) {
                Some(byte) => (haystack[..byte].chars().count() + 1).to_string(),
                None => "0".to_string(),
            }
        }

        Function::Length => arg(0).chars().count().to_string(),

        Function::Quote => quote(arg(0)),

        Function::Unquote => unquote(arg(0)),

        Function::Upcase => unquote(arg(0)).to_uppercase(),

        Function::Substr => {
            let start = parse_integer(arg(1)).filter(|n| *n >= 1).ok_or_else(|| {
                MacroError::function(
                    function.name(),
                    format!("second argument must be a positive integer (not \"{}\")", arg(1)),
                )
            })?;
            let count = match args.get(2) {
                Some(count) => Some(parse_integer(count).filter(|n| *n >= 0).ok_or_else(|| {
                    MacroError::function(
                        function.name(),
                        format!("third argument must be a non-negative integer (not \"{}\")", count),
                    )
                })?),
                None => None,
            };
            let chars = arg(0).chars().skip(start as usize - 1);
            match count {
                Some(count) => chars.take(count as usize).collect(),
                None => chars.collect(),
            }
        }
    };
    Ok(result)
}

/// Integers as the functions accept them: optional sign, digits, and
/// surrounding blanks. A quoted integer is accepted too.
fn parse_integer(text: &str) -> Option<i64> {
    let text = try_unquote(text).unwrap_or_else(|| text.to_string());
    text.trim().parse().ok()
}
