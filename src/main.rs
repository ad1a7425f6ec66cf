//! udl - run a compiled UDL description over a file
//!
//! Prints the style runs of every line, or fold levels with `--fold`.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use udl::document::{Document, MemoryDocument};
use udl::udl::fold::{FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_NUMBER_MASK, FOLD_LEVEL_WHITE_FLAG};
use udl::udl::line_state::LineState;
use udl::udl::style;
use udl::{Config, DefinitionCache, Result, UdlError, UdlLexer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Styles,
    Fold,
    States,
}

struct Options {
    mode: Mode,
    config: Option<PathBuf>,
    lexres: String,
    file: PathBuf,
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (warnings by default)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(options) = parse_args(&args)? else {
        return Ok(());
    };

    let config = match &options.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let cache = Arc::new(DefinitionCache::with_root(config.lexres_dir.clone()));
    let lexer = UdlLexer::new(cache, config);
    let store = lexer.definition(&options.lexres)?;

    let mut doc = MemoryDocument::from_file(&options.file)?;
    let len = doc.len();
    lexer.colorize(0, len, style::M_DEFAULT, &options.lexres, &mut doc);

    match options.mode {
        Mode::Styles => {
            println!("# {} ({} states)", display_name(store.language(), &options.lexres), store.state_count());
            print_styles(&doc);
        }
        Mode::Fold => {
            lexer.fold(0, len, style::M_DEFAULT, &options.lexres, &mut doc);
            print_folds(&doc);
        }
        Mode::States => print_states(&doc),
    }
    Ok(())
}

/// `None` when the invocation only asked for help or the version
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut mode = Mode::Styles;
    let mut config = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-V" => {
                print_version();
                return Ok(None);
            }
            "--styles" => mode = Mode::Styles,
            "--fold" => mode = Mode::Fold,
            "--states" => mode = Mode::States,
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| UdlError::Config("--config needs a path".into()))?;
                config = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => {
                return Err(UdlError::Config(format!("unknown option: {other}")));
            }
            other => positional.push(other.to_string()),
        }
    }

    match <[String; 2]>::try_from(positional) {
        Ok([lexres, file]) => Ok(Some(Options {
            mode,
            config,
            lexres,
            file: PathBuf::from(file),
        })),
        Err(_) => {
            print_usage();
            Err(UdlError::Config("expected <LEXRES> <FILE>".into()))
        }
    }
}

fn display_name<'a>(language: &'a str, identifier: &'a str) -> &'a str {
    if language.is_empty() {
        identifier
    } else {
        language
    }
}

fn print_styles(doc: &MemoryDocument) {
    for line in 0..doc.line_count() {
        let start = doc.line_start(line);
        let end = doc.line_end(line);
        if start >= end {
            continue;
        }
        let mut runs = Vec::new();
        let mut pos = start;
        while pos < end {
            let run_end = doc.style_run_end(pos, end);
            let text = String::from_utf8_lossy(&doc.text()[pos..run_end]);
            runs.push(format!("{}:{:?}", style::name(doc.style_at(pos)), text.trim_end_matches('\n')));
            pos = run_end;
        }
        println!("{:>5}  {}", line + 1, runs.join(" "));
    }
}

fn print_folds(doc: &MemoryDocument) {
    for line in 0..doc.line_count() {
        let raw = doc.fold_level(line);
        let level = (raw & FOLD_LEVEL_NUMBER_MASK).saturating_sub(FOLD_LEVEL_BASE);
        let mut flags = String::new();
        if raw & FOLD_LEVEL_HEADER_FLAG != 0 {
            flags.push_str(" header");
        }
        if raw & FOLD_LEVEL_WHITE_FLAG != 0 {
            flags.push_str(" white");
        }
        println!("{:>5}  {}{}", line + 1, level, flags);
    }
}

fn print_states(doc: &MemoryDocument) {
    for line in 0..doc.line_count() {
        let state = LineState::unpack(doc.line_state(line));
        println!(
            "{:>5}  state={} delimiter={:#05x} depth={}",
            line + 1,
            state.state,
            state.delimiter_hash,
            state.depth
        );
    }
}

fn print_usage() {
    println!("udl {} - table-driven multi-language tokenizer", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: udl [OPTIONS] <LEXRES> <FILE>");
    println!();
    println!("LEXRES is a path to a .lexres file or an identifier resolved");
    println!("against lexres_dir from the config file.");
    println!();
    println!("Options:");
    println!("  -h, --help       Show this help message");
    println!("  -V, --version    Show version information");
    println!("      --styles     Print the style runs of every line (default)");
    println!("      --fold       Print fold levels");
    println!("      --states     Print stored line states");
    println!("      --config P   Read settings from P instead of ~/.udl.toml");
    println!();
    println!("Set RUST_LOG=udl=debug to trace resynchronization and loading.");
}

fn print_version() {
    println!("udl {}", env!("CARGO_PKG_VERSION"));
}
