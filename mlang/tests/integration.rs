use mlang::definition::{CaptureMode, Role};
use mlang::directive::{Directive, Expr, Function, Operand};
use mlang::error::ErrorKind;
use mlang::parser::is_macro_keyword;
use mlang::token::{Punct, Token, TokenKind, render, render_commands};
use mlang::{MacroDefinition, parse_define, tokenize};

fn texts(source: &str) -> Vec<String> {
    tokenize(source).into_iter().map(|t| t.text).collect()
}

fn define(source: &str) -> MacroDefinition {
    parse_define(&tokenize(source)).expect("DEFINE failed")
}

fn define_error(source: &str) -> String {
    let diagnostic = parse_define(&tokenize(source)).expect_err("DEFINE should fail");
    assert_eq!(diagnostic.kind(), ErrorKind::Definition);
    diagnostic.error.to_string()
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[test]
fn scan_command() {
    assert_eq!(texts("X=5."), vec!["X", "=", "5", "."]);
    let tokens = tokenize("X=5.");
    assert!(tokens[0].is_identifier());
    assert!(tokens[1].is_punct(Punct::Equals));
    assert_eq!(tokens[2].as_number(), Some(5.0));
    assert!(tokens[3].is_end());
}

#[test]
fn scan_macro_identifiers() {
    let tokens = tokenize("!one !1. !* !");
    assert_eq!(texts("!one !1. !* !"), vec!["!one", "!1", ".", "!*", "!"]);
    assert!(tokens[0].is_macro_id());
    assert!(tokens[1].is_macro_id());
    assert!(tokens[2].is_end());
    assert!(tokens[3].is_punct(Punct::BangAsterisk));
    assert!(tokens[4].is_punct(Punct::Bang));
}

#[test]
fn scan_negative_numbers() {
    assert_eq!(texts("a-1"), vec!["a", "-", "1"]);
    assert_eq!(texts("(1)-1"), vec!["(", "1", ")", "-", "1"]);
    let tokens = tokenize("x = -1");
    assert_eq!(tokens[2].as_number(), Some(-1.0));
    let tokens = tokenize("!BY -2");
    assert_eq!(tokens[1].as_number(), Some(-2.0));
}

#[test]
fn scan_numbers_keep_their_syntax() {
    let tokens = tokenize("1.0 1.5e3 .5");
    assert_eq!(tokens[0].text, "1.0");
    assert_eq!(tokens[0].as_number(), Some(1.0));
    assert_eq!(tokens[1].as_number(), Some(1500.0));
    assert_eq!(tokens[2].as_number(), Some(0.5));
}

#[test]
fn scan_strings() {
    let tokens = tokenize("'it''s' \"say \"\"hi\"\"\"");
    assert_eq!(tokens[0].as_string(), Some("it's"));
    assert_eq!(tokens[0].text, "'it''s'");
    assert_eq!(tokens[1].as_string(), Some("say \"hi\""));

    let tokens = tokenize("'abc");
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_error());
}

#[test]
fn scan_dots() {
    assert_eq!(texts("x. y"), vec!["x", ".", "y"]);
    assert!(tokenize("x. y")[1].is_end());
    assert_eq!(texts("x.y"), vec!["x.y"]);
    let tokens = tokenize("a .b");
    assert!(tokens[1].is_punct(Punct::Dot));
}

#[test]
fn scan_operators() {
    let kinds: Vec<Punct> = tokenize("<= >= ~= <> ** < > ~ & |")
        .into_iter()
        .filter_map(|t| match t.kind {
            TokenKind::Punct(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            Punct::Le,
            Punct::Ge,
            Punct::Ne,
            Punct::Ne,
            Punct::Exp,
            Punct::Lt,
            Punct::Gt,
            Punct::Not,
            Punct::And,
            Punct::Or,
        ]
    );
}

#[test]
fn token_equality() {
    assert_eq!(tokenize("abc")[0], tokenize("ABC")[0]);
    assert_eq!(tokenize("1.0")[0], tokenize("1")[0]);
    assert_eq!(tokenize("'x'")[0], tokenize("\"x\"")[0]);
    assert_ne!(tokenize("x")[0], tokenize("'x'")[0]);
}

#[test]
fn render_tokens() {
    assert_eq!(render(&tokenize("X = 5 .")), "X=5.");
    assert_eq!(render(&tokenize("a b 'c' 1")), "a b 'c' 1");
    assert_eq!(render(&tokenize("FREQ x. DESC y.")), "FREQ x. DESC y.");
    assert_eq!(render(&tokenize("a < = b")), "a< =b");
}

#[test]
fn render_by_command() {
    assert_eq!(
        render_commands(&tokenize("FREQ x. DESC y. LIST")),
        vec!["FREQ x.", "DESC y.", "LIST"]
    );
    assert!(render_commands::<Token>(&[]).is_empty());
}

// ---------------------------------------------------------------------------
// DEFINE
// ---------------------------------------------------------------------------

#[test]
fn define_positional() {
    let m = define("DEFINE !one(!POSITIONAL !TOKENS(1)) X=!1. !ENDDEFINE.");
    assert_eq!(m.name, "!one");
    assert_eq!(m.key(), "!ONE");
    assert_eq!(m.parameters.len(), 1);
    assert_eq!(m.parameters[0].role, Role::Positional);
    assert_eq!(m.parameters[0].capture, CaptureMode::Tokens(1));
    assert_eq!(
        m.body,
        vec![
            Directive::Literal(tokenize("X =")),
            Directive::ArgRef(0),
            Directive::Literal(vec![Token::end(0..0)]),
        ]
    );
}

#[test]
fn define_keyword_with_default() {
    let m = define("DEFINE !k(v=!DEFAULT(ALL) !CMDEND) Y=!v. !ENDDEFINE.");
    let p = &m.parameters[0];
    assert_eq!(p.role, Role::Keyword("V".to_string()));
    assert_eq!(p.capture, CaptureMode::CmdEnd);
    assert_eq!(p.default, Some(tokenize("ALL")));
    assert!(!p.no_expand);
    assert_eq!(m.find_parameter("!v"), Some(0));
    assert_eq!(m.find_parameter("!V"), Some(0));
    assert_eq!(m.find_parameter("!1"), None);
}

#[test]
fn define_name_without_bang() {
    let m = define("DEFINE plain() FREQ x. !ENDDEFINE.");
    assert_eq!(m.name, "plain");
    assert!(m.parameters.is_empty());
}

#[test]
fn define_delimited_parameters() {
    let m = define(
        "DEFINE !d(!POSITIONAL !CHAREND('/') / !POSITIONAL !ENCLOSE('[',']') / k = !NOEXPAND !TOKENS(2)) x !ENDDEFINE.",
    );
    assert_eq!(m.positional_count(), 2);
    assert_eq!(m.parameters[0].capture, CaptureMode::CharEnd(Token::punct(Punct::Slash, 0..0)));
    assert_eq!(
        m.parameters[1].capture,
        CaptureMode::Enclose(
            Token::punct(Punct::LSquare, 0..0),
            Token::punct(Punct::RSquare, 0..0)
        )
    );
    assert!(m.parameters[2].no_expand);
    assert_eq!(m.parameters[2].capture, CaptureMode::Tokens(2));
}

#[test]
fn define_accepts_abbreviated_clauses() {
    let m = define("DEFINE !a(!POS !TOK(1) / x=!DEFA(1) !NOEX !CMDE) x !ENDDEFINE.");
    assert_eq!(m.parameters[0].capture, CaptureMode::Tokens(1));
    assert_eq!(m.parameters[1].capture, CaptureMode::CmdEnd);
    assert!(m.parameters[1].no_expand);
}

#[test]
fn define_rejections() {
    assert!(define_error("DEFINE (a=!TOKENS(1)) x !ENDDEFINE.").contains("macro name"));
    assert!(define_error("DEFINE !m a !ENDDEFINE.").contains("`(`"));
    assert!(define_error("DEFINE !m(!v=!TOKENS(1)) x !ENDDEFINE.").contains("without"));
    assert!(define_error("DEFINE !m(if=!TOKENS(1)) x !ENDDEFINE.").contains("macro keyword"));
    assert!(define_error("DEFINE !m(a=!TOKENS(1) / A=!TOKENS(1)) x !ENDDEFINE.").contains("duplicate"));
    assert!(
        define_error("DEFINE !m(a=!TOKENS(1) / !POSITIONAL !TOKENS(1)) x !ENDDEFINE.")
            .contains("precede")
    );
    assert!(
        define_error("DEFINE !m(!POSITIONAL !CMDEND / !POSITIONAL !TOKENS(1)) x !ENDDEFINE.")
            .contains("!CMDEND")
    );
    assert!(
        define_error("DEFINE !m(a=!DEFAULT(1) !DEFAULT(2) !TOKENS(1)) x !ENDDEFINE.")
            .contains("only once")
    );
    assert!(define_error("DEFINE !m(a=!DEFAULT(1)) x !ENDDEFINE.").contains("expecting !TOKENS"));
    assert!(define_error("DEFINE !m(a=!TOKENS(1) !CMDEND) x !ENDDEFINE.").contains("only one of"));
    assert!(define_error("DEFINE !m(a=!TOKENS(0)) x !ENDDEFINE.").contains("positive integer"));
    assert!(define_error("DEFINE !m(a=!CHAREND('a b')) x !ENDDEFINE.").contains("exactly one token"));
    assert!(define_error("DEFINE !m(a=!DEFAULT(1 . ) !TOKENS(1)) x !ENDDEFINE.").contains("`)`"));
    assert!(define_error("DEFINE !m(a=!TOKENS(1)) x y z.").contains("!ENDDEFINE"));
}

#[test]
fn macro_keywords() {
    assert!(is_macro_keyword("!IFEND"));
    assert!(is_macro_keyword("tokens"));
    assert!(!is_macro_keyword("!foo"));
    assert!(!is_macro_keyword("TO"));
}

// ---------------------------------------------------------------------------
// Body compilation
// ---------------------------------------------------------------------------

#[test]
fn compile_if_else() {
    let m = define("DEFINE !m() !IF (1) !THEN a !ELSE b !IFEND !ENDDEFINE.");
    assert_eq!(
        m.body,
        vec![Directive::If {
            condition: Expr::Operand(Operand::Token(tokenize("1").remove(0))),
            then_branch: vec![Directive::Literal(tokenize("a"))],
            else_branch: Some(vec![Directive::Literal(tokenize("b"))]),
        }]
    );
}

#[test]
fn compile_nested_if() {
    let m = define("DEFINE !m() !IF 1 !THEN !IF 0 !THEN a !IFEND b !IFEND c !ENDDEFINE.");
    assert_eq!(m.body.len(), 2);
    let Directive::If { then_branch, else_branch, .. } = &m.body[0] else {
        panic!("expected !IF, got {:?}", m.body[0]);
    };
    assert!(else_branch.is_none());
    assert_eq!(then_branch.len(), 2);
    assert!(matches!(then_branch[0], Directive::If { .. }));
    assert_eq!(m.body[1], Directive::Literal(tokenize("c")));
}

#[test]
fn compile_relational_precedence() {
    let m = define("DEFINE !m() !IF !NOT a = b !AND c !OR d !THEN x !IFEND !ENDDEFINE.");
    let Directive::If { condition, .. } = &m.body[0] else {
        panic!("expected !IF");
    };
    let Expr::Or(lhs, _) = condition else {
        panic!("expected !OR at the top, got {:?}", condition);
    };
    let Expr::And(not, _) = lhs.as_ref() else {
        panic!("expected !AND under !OR");
    };
    assert!(matches!(not.as_ref(), Expr::Not(inner) if matches!(inner.as_ref(), Expr::Relational(..))));
}

#[test]
fn compile_loops() {
    let m = define("DEFINE !m() !DO !i = 1 !TO 3 !i !DOEND !DO !t !IN (a) !t !DOEND !ENDDEFINE.");
    assert_eq!(m.body.len(), 2);
    match &m.body[0] {
        Directive::DoRange { variable, step, body, .. } => {
            assert_eq!(variable, "!i");
            assert!(step.is_none());
            assert_eq!(body, &vec![Directive::Literal(tokenize("!i"))]);
        }
        other => panic!("expected numeric !DO, got {:?}", other),
    }
    assert!(matches!(&m.body[1], Directive::DoIn { variable, .. } if variable == "!t"));
}

#[test]
fn compile_break_and_toggles() {
    let m = define("DEFINE !m() !DO !i = 1 !TO 2 !BREAK !DOEND !OFFEXPAND x !ONEXPAND !ENDDEFINE.");
    let Directive::DoRange { body, .. } = &m.body[0] else {
        panic!("expected !DO");
    };
    assert_eq!(body, &vec![Directive::Break]);
    assert_eq!(m.body[1], Directive::ExpandToggle(false));
    assert_eq!(m.body[3], Directive::ExpandToggle(true));
}

#[test]
fn compile_function_calls() {
    let m = define("DEFINE !m(!POSITIONAL !TOKENS(1)) !LENGTH(abc) !SUBSTR(!1, 2) !NULL !ENDDEFINE.");
    match &m.body[0] {
        Directive::FunctionCall(call) => {
            assert_eq!(call.function, Function::Length);
            assert_eq!(call.args, vec![Operand::Token(tokenize("abc").remove(0))]);
        }
        other => panic!("expected function call, got {:?}", other),
    }
    match &m.body[1] {
        Directive::FunctionCall(call) => {
            assert_eq!(call.function, Function::Substr);
            assert_eq!(call.args[0], Operand::Arg(0));
        }
        other => panic!("expected function call, got {:?}", other),
    }
    assert!(matches!(&m.body[2], Directive::FunctionCall(call) if call.function == Function::Null));
}

#[test]
fn function_names_abbreviate() {
    assert_eq!(Function::from_name("!UPCA"), Some(Function::Upcase));
    assert_eq!(Function::from_name("!upc"), Some(Function::Upcase));
    assert_eq!(Function::from_name("!NUL"), Some(Function::Null));
    assert_eq!(Function::from_name("!substr"), Some(Function::Substr));
    assert_eq!(Function::from_name("!UP"), None);
    assert_eq!(Function::from_name("!UPCASES"), None);
    assert_eq!(Function::from_name("UPCASE"), None);

    let m = define("DEFINE !m() !UPCA(ab) !LENG(abc) !ENDDEFINE.");
    assert!(matches!(&m.body[0], Directive::FunctionCall(call) if call.function == Function::Upcase));
    assert!(matches!(&m.body[1], Directive::FunctionCall(call) if call.function == Function::Length));
}

#[test]
fn malformed_directives_compile_to_invalid() {
    let m = define("DEFINE !m() !IF 1 a !IFEND !ENDDEFINE.");
    assert_eq!(m.body.len(), 2);
    assert!(matches!(&m.body[0], Directive::Invalid(e, _) if e.kind() == ErrorKind::Evaluation));
    assert_eq!(m.body[1], Directive::Literal(tokenize("1 a !IFEND")));

    let m = define("DEFINE !m() !BREAK !ENDDEFINE.");
    assert!(matches!(&m.body[0], Directive::Invalid(e, _) if e.to_string().contains("outside")));

    let m = define("DEFINE !m() !INDEX(a) !ENDDEFINE.");
    assert!(matches!(&m.body[0], Directive::Invalid(..)));

    let m = define("DEFINE !m(x=!TOKENS(1)) !LET !x = 1 !ENDDEFINE.");
    assert!(matches!(&m.body[0], Directive::Invalid(e, _) if e.to_string().contains("!LET")));
}
