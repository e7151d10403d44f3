use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use karel_core::{Capabilities, Tokenizer, parse_program, read_program};
use tracing::{debug, info, trace};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Command line interface for the Karel language frontend.
#[derive(Parser, Debug)]
#[command(name = "karel", version, about, long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "JSON capability descriptor (defaults to the standard Karel robot)"
    )]
    capabilities: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        help = "Log filter directive, e.g. debug or karel_core=trace"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the token stream of a program (stdin if no file is given).
    Tokens {
        input: Option<PathBuf>,
        #[arg(long, help = "Print tokens as a JSON array")]
        json: bool,
    },
    /// Print the syntax tree of a program (stdin if no file is given).
    Parse {
        input: Option<PathBuf>,
        #[arg(long, help = "Print the tree as JSON")]
        json: bool,
    },
    /// Parse every program under the given paths; directories are searched
    /// for `.karel` files.
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List the commands and conditions programs may use.
    Vocabulary,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(io::stderr)
        .init();
    execute(cli)
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let capabilities = load_capabilities(cli.capabilities.as_deref())?;

    match cli.command {
        Command::Tokens { input, json } => {
            let source = read_source(input.as_deref())?;
            let tokenizer = Tokenizer::new(&source);
            if json {
                println!("{}", serde_json::to_string_pretty(tokenizer.tokens())?);
            } else {
                for token in tokenizer.tokens() {
                    trace!(?token, "token");
                    match &token.text {
                        Some(text) => println!("{} {} {}", token.line + 1, token.kind, text),
                        None => println!("{} {}", token.line + 1, token.kind),
                    }
                }
            }
        }
        Command::Parse { input, json } => {
            let source = read_source(input.as_deref())?;
            let name = input
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<stdin>".to_string());
            let block = parse_program(&source, &capabilities)
                .with_context(|| format!("failed to parse {name}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&block)?);
            } else {
                print!("{block}");
            }
        }
        Command::Check { paths } => {
            let files = collect_programs(&paths)?;
            info!(files = files.len(), "checking programs");
            let mut failures = 0;
            for path in &files {
                let source = read_program(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                match parse_program(&source, &capabilities) {
                    Ok(block) => {
                        println!("{}: ok", path.display());
                        for (fname, line) in block.undefined_calls() {
                            println!(
                                "{}:{}: warning: call to undefined procedure \"{fname}\"",
                                path.display(),
                                line + 1
                            );
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        println!("{}: {err}", path.display());
                    }
                }
            }
            if failures > 0 {
                eprintln!("{failures} of {} programs failed to parse", files.len());
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Vocabulary => {
            for name in capabilities.commands() {
                println!("command {name}");
            }
            for name in capabilities.conditions() {
                println!("condition {name}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_capabilities(path: Option<&Path>) -> Result<Capabilities> {
    let Some(path) = path else {
        return Ok(Capabilities::karel());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read capabilities file {}", path.display()))?;
    let capabilities = serde_json::from_str(&text)
        .with_context(|| format!("invalid capabilities file {}", path.display()))?;
    debug!(path = %path.display(), "loaded capabilities");
    Ok(capabilities)
}

fn read_source(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => read_program(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read program from stdin")?;
            Ok(buffer)
        }
    }
}

fn collect_programs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in paths {
        if !root.is_dir() {
            files.push(root.clone());
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "karel") {
                files.push(path.to_path_buf());
            }
        }
    }
    Ok(files)
}
