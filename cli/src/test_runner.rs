use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use codespan_reporting::term::termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use serde::Deserialize;

use expander::{Settings, expand_source};
use mlang::Diagnostic;
use mlang::token::render_commands;

const TEST_SUFFIX: &str = ".test.sps";

/// One expected error or warning.
#[derive(Debug, Deserialize)]
pub struct ExpectedMessage {
    /// Substring that must appear in the message.
    pub contains: String,

    /// If set, the diagnostic's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

/// The TOML frontmatter of a `.test.sps` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub description: Option<String>,

    /// Expected expanded syntax, one command per line. Lines are compared
    /// with surrounding blanks trimmed; blank lines are ignored.
    pub expect_output: Option<String>,

    /// Expected errors, in order. When absent, any error fails the test.
    pub expect_errors: Option<Vec<ExpectedMessage>>,

    /// Expected warnings, in order. When absent, warnings are not checked.
    pub expect_warnings: Option<Vec<ExpectedMessage>>,

    /// Settings in effect at the start of the file.
    pub settings: Settings,
}

/// Split a test file into its frontmatter and the syntax after it.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    let (frontmatter, rest) = match body.strip_prefix("---") {
        Some(rest) => ("", rest),
        None => {
            let close = body
                .find("\n---")
                .ok_or("missing closing --- frontmatter delimiter")?;
            (body[..close].trim_end_matches('\r'), &body[close + 4..])
        }
    };
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config = toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    /// `None` on success, otherwise why the test failed.
    pub failure: Option<String>,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description
            .as_deref()
            .or_else(|| self.path.file_name().and_then(|n| n.to_str()))
            .map(|name| name.strip_suffix(TEST_SUFFIX).unwrap_or(name))
            .unwrap_or("?")
    }
}

pub fn run_single_test(path: &Path) -> TestResult {
    let (description, failure) = match std::fs::read_to_string(path) {
        Err(e) => (None, Some(format!("cannot read file: {}", e))),
        Ok(content) => match parse_test_file(&content) {
            Err(e) => (None, Some(format!("frontmatter error: {}", e))),
            Ok((config, source)) => (config.description.clone(), check(&config, source).err()),
        },
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        failure,
    }
}

/// Expand `source` and compare against the expectations in `config`.
fn check(config: &TestConfig, source: &str) -> Result<(), String> {
    let (tokens, diagnostics) = expand_source(source, config.settings);
    let (warnings, errors): (Vec<&Diagnostic>, Vec<&Diagnostic>) =
        diagnostics.iter().partition(|d| d.is_warning());

    match &config.expect_errors {
        Some(expected) => check_messages("error", source, &errors, expected)?,
        None if !errors.is_empty() => {
            let messages: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
            return Err(format!("unexpected error(s):\n{}", messages.join("\n")));
        }
        None => {}
    }
    if let Some(expected) = &config.expect_warnings {
        check_messages("warning", source, &warnings, expected)?;
    }

    if let Some(expected) = &config.expect_output {
        let expected = normalize(expected.lines());
        let actual = normalize(render_commands(&tokens).iter().map(String::as_str));
        if expected != actual {
            return Err(format!(
                "output mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(&expected),
                indent(&actual)
            ));
        }
    }
    Ok(())
}

fn normalize<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn indent(lines: &[String]) -> String {
    if lines.is_empty() {
        return "    (nothing)".to_string();
    }
    lines
        .iter()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a byte offset in `source` to a 1-based line number.
fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn check_messages(
    what: &str,
    source: &str,
    actual: &[&Diagnostic],
    expected: &[ExpectedMessage],
) -> Result<(), String> {
    if actual.len() != expected.len() {
        let listed: Vec<String> = actual.iter().map(|d| format!("    - {}", d)).collect();
        return Err(format!(
            "expected {} {}(s), got {}\n  actual:\n{}",
            expected.len(),
            what,
            actual.len(),
            if listed.is_empty() {
                "    (none)".to_string()
            } else {
                listed.join("\n")
            }
        ));
    }

    for (i, (diagnostic, expected)) in actual.iter().zip(expected).enumerate() {
        let message = diagnostic.to_string();
        if !message.contains(&expected.contains) {
            return Err(format!(
                "{}[{}]: expected message containing \"{}\", got: {}",
                what, i, expected.contains, message
            ));
        }
        let Some(expected_line) = expected.line else {
            continue;
        };
        match &diagnostic.span {
            Some(span) if line_of(source, span.start) == expected_line => {}
            Some(span) => {
                return Err(format!(
                    "{}[{}]: expected on line {}, but span is on line {}",
                    what,
                    i,
                    expected_line,
                    line_of(source, span.start)
                ));
            }
            None => {
                return Err(format!(
                    "{}[{}]: expected on line {}, but it has no span",
                    what, i, expected_line
                ));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Test files under `root`, keyed by their directory relative to `root`
/// ("" for files directly in `root`). Categories and files are sorted.
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect(&path, root, out);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEST_SUFFIX));
        if is_test {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// Select the requested categories, including their subcategories. An empty
/// request selects everything.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

struct Console {
    stream: StandardStream,
}

impl Console {
    fn new(no_color: bool) -> Self {
        let choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Console {
            stream: StandardStream::stderr(choice),
        }
    }

    fn styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let _ = self.stream.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        let _ = write!(self.stream, "{}", text);
        let _ = self.stream.reset();
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.stream, "{}", text);
    }

    fn result(&mut self, result: &TestResult) {
        let _ = write!(self.stream, "  ");
        match result.failure {
            None => self.styled("PASS", Some(Color::Green), false),
            Some(_) => self.styled("FAIL", Some(Color::Red), false),
        }
        self.line(&format!("  {}", result.label()));
    }

    fn summary(&mut self, passed: usize, failures: &[TestResult]) {
        if !failures.is_empty() {
            self.line("");
            self.line("failures:");
            for failure in failures {
                self.line("");
                self.line(&format!("  --- {} ---", failure.path.display()));
                for line in failure.failure.iter().flat_map(|reason| reason.lines()) {
                    self.line(&format!("  {}", line));
                }
            }
        }

        self.line("");
        let _ = write!(self.stream, "test result: ");
        if failures.is_empty() {
            self.styled("ok", Some(Color::Green), false);
            self.line(&format!(". {} passed, 0 failed", passed));
        } else {
            self.styled("FAILED", Some(Color::Red), false);
            self.line(&format!(
                ". {} passed, {} failed (of {})",
                passed,
                failures.len(),
                passed + failures.len()
            ));
        }
    }
}

/// Run every test file under `path` (or the single file `path`), limited to
/// `categories` when any are given. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let mut console = Console::new(no_color);

    let all = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover(path)
    };
    if all.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return 1;
    }
    let selected = if path.is_file() {
        select(&all, &[])
    } else {
        select(&all, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0;
    let mut failures = Vec::new();
    for (category, files) in selected {
        if !path.is_file() {
            console.line("");
            console.styled(category_label(category), None, true);
            console.line("");
        }
        for file in files {
            let result = run_single_test(file);
            console.result(&result);
            if result.failure.is_none() {
                passed += 1;
            } else {
                failures.push(result);
            }
        }
    }

    console.summary(passed, &failures);
    if failures.is_empty() { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    const PASSING: &str = "---
description = \"positional argument\"
expect_output = \"X=5.\"
---
DEFINE !one(!POSITIONAL !TOKENS(1)) X=!1. !ENDDEFINE.
!one 5.
";

    #[test]
    fn frontmatter_and_source() {
        let (config, source) = parse_test_file(PASSING).unwrap();
        assert_eq!(config.description.as_deref(), Some("positional argument"));
        assert_eq!(config.settings, Settings::default());
        assert!(source.starts_with("DEFINE"));

        assert!(parse_test_file("no frontmatter").is_err());
        assert!(parse_test_file("---\ndescription = \"x\"\n").is_err());
        assert!(parse_test_file("---\nexpect_output = \n---\n").is_err());
    }

    #[test]
    fn settings_in_frontmatter() {
        let (config, _) = parse_test_file("---\n[settings]\nmnest = 2\nmexpand = false\n---\n").unwrap();
        assert_eq!(config.settings.mnest, 2);
        assert!(!config.settings.mexpand);
        assert_eq!(config.settings.miterate, 1000);
    }

    #[test]
    fn passing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test(dir.path(), "one.test.sps", PASSING);
        let result = run_single_test(&path);
        assert!(result.failure.is_none(), "{:?}", result.failure);
        assert_eq!(result.label(), "positional argument");
    }

    #[test]
    fn output_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test(
            dir.path(),
            "wrong.test.sps",
            &PASSING.replace("X=5.", "X=6."),
        );
        let failure = run_single_test(&path).failure.unwrap();
        assert!(failure.contains("output mismatch"), "{}", failure);
    }

    #[test]
    fn errors_must_be_expected() {
        let dir = tempfile::tempdir().unwrap();
        let source = "DEFINE !bad(!x=!TOKENS(1)) x !ENDDEFINE.\n";
        let unexpected = write_test(dir.path(), "a.test.sps", &format!("---\n---\n{}", source));
        let failure = run_single_test(&unexpected).failure.unwrap();
        assert!(failure.contains("unexpected error"), "{}", failure);

        let expected = write_test(
            dir.path(),
            "b.test.sps",
            &format!("---\n[[expect_errors]]\ncontains = \"without\"\nline = 1\n---\n{}", source),
        );
        let result = run_single_test(&expected);
        assert!(result.failure.is_none(), "{:?}", result.failure);
        assert_eq!(result.label(), "b");
    }

    #[test]
    fn warnings_checked_when_listed() {
        let dir = tempfile::tempdir().unwrap();
        let source = "DEFINE !r() x !r !ENDDEFINE.\n!r.\n";
        let unchecked = write_test(
            dir.path(),
            "a.test.sps",
            &format!("---\n[settings]\nmnest = 2\n---\n{}", source),
        );
        assert!(run_single_test(&unchecked).failure.is_none());

        let missing = write_test(
            dir.path(),
            "b.test.sps",
            &format!("---\nexpect_warnings = []\n[settings]\nmnest = 2\n---\n{}", source),
        );
        let failure = run_single_test(&missing).failure.unwrap();
        assert!(failure.contains("expected 0 warning(s), got 1"), "{}", failure);

        let expected = write_test(
            dir.path(),
            "c.test.sps",
            &format!(
                "---\nexpect_output = \"x x.\"\n[[expect_warnings]]\ncontains = \"nesting\"\n[settings]\nmnest = 2\n---\n{}",
                source
            ),
        );
        let result = run_single_test(&expected);
        assert!(result.failure.is_none(), "{:?}", result.failure);
    }

    #[test]
    fn categories_by_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_test(dir.path(), "top.test.sps", PASSING);
        write_test(dir.path(), "limits/nest.test.sps", PASSING);
        write_test(dir.path(), "limits/deep/iter.test.sps", PASSING);
        write_test(dir.path(), "notes.txt", "not a test");

        let all = discover(dir.path());
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["", "limits", "limits/deep"]);

        let selected = select(&all, &["limits".to_string()]);
        assert_eq!(selected.len(), 2);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
    }

    #[test]
    fn bundled_cases_pass() {
        let cases = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/cases");
        assert_eq!(run_tests(&cases, true, &[]), 0);
    }
}
