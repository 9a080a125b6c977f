mod test_runner;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use expander::{MacroProcessor, Settings};
use mlang::token::{Token, render};
use mlang::{Diagnostic, Scanner};

const SUBCOMMANDS: &[&str] = &["expand", "test", "help"];

#[derive(Parser)]
#[command(name = "mlang", version, about = "Macro expander for statistical command syntax")]
struct Cli {
    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand the macros in a syntax file and print the result
    Expand(ExpandArgs),

    /// Run .test.sps test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ExpandArgs {
    /// Syntax file to expand
    file: String,

    /// TOML file with initial macro settings (mexpand, mprint, miterate, mnest)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum nesting depth of macro calls
    #[arg(long, value_parser = positive)]
    mnest: Option<usize>,

    /// Maximum iterations of one !DO loop
    #[arg(long, value_parser = positive)]
    miterate: Option<usize>,

    /// Echo each top-level expansion to stderr
    #[arg(long)]
    mprint: bool,

    /// Start with macro expansion turned off
    #[arg(long)]
    no_mexpand: bool,

    /// Print the names of the macros defined by the file
    #[arg(long)]
    list_macros: bool,

    /// Suppress the expanded syntax (just report problems)
    #[arg(short, long)]
    quiet: bool,

    /// Stop after this many errors
    #[arg(long, default_value_t = 100, value_parser = positive)]
    max_errors: usize,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.sps file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("expected a positive integer, not '{}'", s)),
    }
}

fn main() {
    init_logging();

    // `mlang file.sps` means `mlang expand file.sps`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_pos = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !a.starts_with('-'))
        .map(|(i, a)| (i, a.clone()));
    if let Some((pos, first)) = first_pos {
        if !SUBCOMMANDS.contains(&first.as_str()) {
            args.insert(pos, "expand".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Expand(expand_args) => do_expand(expand_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// Library events go to stderr, filtered by `MLANG_LOG` (e.g.
/// `MLANG_LOG=expander=debug`). Diagnostics are printed separately, so only
/// errors are logged by default.
fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("MLANG_LOG").unwrap_or_else(|_| "error".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn load_settings(args: &ExpandArgs) -> Result<Settings, String> {
    let mut settings = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
            toml::from_str(&text).map_err(|e| format!("invalid settings in '{}': {}", path.display(), e))?
        }
        None => Settings::default(),
    };
    if let Some(mnest) = args.mnest {
        settings.mnest = mnest;
    }
    if let Some(miterate) = args.miterate {
        settings.miterate = miterate;
    }
    if args.mprint {
        settings.mprint = true;
    }
    if args.no_mexpand {
        settings.mexpand = false;
    }
    Ok(settings)
}

fn do_expand(args: ExpandArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };
    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let mut reporter = Reporter {
        writer: &writer,
        config: &config,
        files: &files,
        file_id,
        errors: 0,
    };

    let mut processor = MacroProcessor::with_settings(Scanner::new(&source), settings);
    if settings.mprint {
        processor.set_echo(Box::new(io::stderr()));
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut command: Vec<Token> = Vec::new();

    // Diagnostics are flushed after each command so they follow the output
    // they belong to, and so the error budget is checked as we go.
    while let Some(token) = processor.next() {
        let ends_command = token.is_end();
        command.push(token);
        if !ends_command {
            continue;
        }
        print_command(&mut out, &mut command, args.quiet);
        reporter.emit(&processor.take_diagnostics());
        if reporter.errors >= args.max_errors {
            eprintln!("error: stopping after {} errors", reporter.errors);
            process::exit(1);
        }
    }
    print_command(&mut out, &mut command, args.quiet);
    reporter.emit(&processor.take_diagnostics());

    if args.list_macros {
        for name in processor.table().names() {
            let _ = writeln!(out, "{}", name);
        }
    }

    if reporter.errors > 0 {
        process::exit(1);
    }
}

fn print_command(out: &mut impl Write, command: &mut Vec<Token>, quiet: bool) {
    if command.is_empty() {
        return;
    }
    if !quiet {
        if let Err(e) = writeln!(out, "{}", render(command)) {
            eprintln!("error: cannot write output: {}", e);
            process::exit(1);
        }
    }
    command.clear();
}

struct Reporter<'a> {
    writer: &'a StandardStream,
    config: &'a term::Config,
    files: &'a SimpleFiles<String, String>,
    file_id: usize,
    /// Errors emitted so far; warnings are not counted.
    errors: usize,
}

impl Reporter<'_> {
    fn emit(&mut self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            let rendered = diagnostic.to_codespan(self.file_id);
            let _ = term::emit_to_write_style(&mut self.writer.lock(), self.config, self.files, &rendered);
            if !diagnostic.is_warning() {
                self.errors += 1;
            }
        }
    }
}
