use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use std::io::{self, Read, Write};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Compile a JSONata expression and evaluate it against JSON input,
/// matching the library's `compile`/`Program::evaluate` surface
/// (SPEC_FULL §0.3).
#[derive(Parser)]
#[command(
    name = "jsonata-cli",
    about = "Evaluate a JSONata expression against JSON input",
    version,
    after_help = "Example:\n\n\t$ echo '{\"a\": [1,2,3]}' | jsonata-cli '$sum(a)'\n\t6"
)]
struct Cli {
    /// JSONata expression (read from -e/--expr if not given positionally)
    expression: Option<String>,

    /// Input file; defaults to stdin
    file: Option<String>,

    /// JSONata expression (alternative to the positional argument)
    #[arg(short = 'e', long = "expr")]
    expr: Option<String>,

    /// Compact output (no pretty-printing)
    #[arg(short = 'c', long = "compact")]
    compact: bool,

    /// Bind $name to a JSON value: --bind name=jsonvalue
    #[arg(short = 'b', long = "bind", value_name = "NAME=JSON")]
    bind: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let expression = cli
        .expr
        .or(cli.expression)
        .context("no JSONata expression given (positional argument or -e/--expr)")?;

    let mut input_str = String::new();
    match &cli.file {
        Some(path) => {
            input_str = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read input file '{path}'"))?;
        }
        None => {
            io::stdin()
                .read_to_string(&mut input_str)
                .context("failed to read stdin")?;
        }
    }

    let program = jsonata::compile(&expression).map_err(|e| anyhow::anyhow!(e.describe()))?;

    for binding in &cli.bind {
        let (name, json_str) = binding
            .split_once('=')
            .with_context(|| format!("--bind expects NAME=JSON, got '{binding}'"))?;
        let value: serde_json::Value = serde_json::from_str(json_str)
            .with_context(|| format!("invalid JSON for --bind {name}"))?;
        program.bind_json(name, &value);
    }

    let input: serde_json::Value =
        serde_json::from_str(input_str.trim()).context("invalid JSON input")?;

    let result = program
        .evaluate_json(&input)
        .map_err(|e| anyhow::anyhow!(e.describe()))?;

    let rendered = if cli.compact {
        serde_json::to_string(&result)
    } else {
        serde_json::to_string_pretty(&result)
    }
    .context("failed to render JSON output")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{rendered}")?;
    Ok(())
}
