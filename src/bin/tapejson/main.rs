//! `tapejson` CLI: validate and minify JSON documents from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memmap2::Mmap;

use tapejson::config::ParserConfig;
use tapejson::parser::Parser as JsonParser;

#[derive(Debug, Parser)]
#[command(name = "tapejson")]
#[command(about = "SIMD JSON tape parser toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a file and report whether it is valid JSON
    Validate(ValidateArgs),
    /// Parse a file and re-emit canonical minified JSON on stdout
    Minify(MinifyArgs),
}

#[derive(Debug, Parser)]
struct ValidateArgs {
    /// Path to the JSON file to check
    file: PathBuf,
}

#[derive(Debug, Parser)]
struct MinifyArgs {
    /// Path to the JSON file to minify
    file: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Validate(args) => validate(&args.file),
        Command::Minify(args) => minify(&args.file),
    }
}

/// Memory-maps `path` and returns it alongside a parser sized for its length.
fn open(path: &PathBuf) -> Result<(Mmap, JsonParser)> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping {}", path.display()))?;
    let parser = JsonParser::with_config(ParserConfig::with_capacity(mmap.len()));
    Ok((mmap, parser))
}

fn validate(path: &PathBuf) -> Result<ExitCode> {
    let (mmap, mut parser) = open(path)?;
    match parser.parse(&mmap) {
        Ok(_) => {
            println!("valid");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("invalid: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn minify(path: &PathBuf) -> Result<ExitCode> {
    let (mmap, mut parser) = open(path)?;
    let mut out = Vec::new();
    tapejson::minify::minify(&mut parser, &mmap, &mut out).with_context(|| format!("minifying {}", path.display()))?;
    std::io::Write::write_all(&mut std::io::stdout(), &out)?;
    Ok(ExitCode::SUCCESS)
}
