/// jsonlob command-line tool: move files in and out of JSON string values.
///
/// # Command overview
///
/// ```text
/// jsonlob <COMMAND> [OPTIONS]
///
/// Commands:
///   encode   Write a file as a JSON base64 string value
///   decode   Decode a base64 string value back to bytes
///   text     Write a text file as an escaped JSON string value
///   help     Print help information
///
/// Global options:
///   -c, --config <FILE>  Adapter config (JSON, camelCase keys)
///   -v, --verbose        Log scope and field activity to stderr
///   -h, --help           Print help
///   -V, --version        Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                  |
/// |------|------------------------------------------|
/// | 0    | Success                                  |
/// | 1    | Error (I/O failure, malformed input, …)  |
///
/// Errors and logs go to stderr so stdout can be piped cleanly.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jsonlob_json::AdapterConfig;
use tracing_subscriber::EnvFilter;

mod cmd_decode;
mod cmd_encode;
mod cmd_text;

// ── CLI root ──────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "jsonlob", version, about = "Stream large payloads through JSON string values")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load adapter options from this JSON file. Flags override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Write a file as a quoted base64 JSON string.
    Encode(EncodeArgs),
    /// Decode a JSON base64 string (or bare base64) back to bytes.
    Decode(DecodeArgs),
    /// Write a text file as a quoted, escaped JSON string.
    Text(TextArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `jsonlob encode`.
///
/// ```text
/// ┌────────────────────┬──────────────────────────────────────────────────┐
/// │ Flag               │ Effect                                           │
/// ├────────────────────┼──────────────────────────────────────────────────┤
/// │ --line-length N    │ Break lines every N symbols (≤0 disables)        │
/// │ --line-separator S │ Text between lines (default "\r\n")              │
/// │ --no-padding       │ Omit trailing `=`                                │
/// │ --raw              │ Plain base64: no quotes, separator unescaped     │
/// │ -o / --output      │ Write to file instead of stdout                  │
/// └────────────────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct EncodeArgs {
    /// File to encode.
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, allow_negative_numbers = true)]
    pub line_length: Option<i64>,

    #[arg(long)]
    pub line_separator: Option<String>,

    #[arg(long)]
    pub no_padding: bool,

    #[arg(long)]
    pub raw: bool,
}

/// Arguments for `jsonlob decode`.
///
/// The input may be a JSON string literal (escapes are honoured) or bare
/// base64. Characters outside the base64 alphabet are skipped.
#[derive(clap::Args)]
pub struct DecodeArgs {
    /// File holding the encoded value.
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `jsonlob text`.
#[derive(clap::Args)]
pub struct TextArgs {
    /// UTF-8 text file to emit.
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also escape `<`, `>`, `&`, `=` and `'`.
    #[arg(long, conflicts_with = "no_html_safe")]
    pub html_safe: bool,

    /// Leave `<`, `>`, `&`, `=` and `'` unescaped.
    #[arg(long)]
    pub no_html_safe: bool,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<AdapterConfig> {
    match path {
        Some(path) => AdapterConfig::from_json_file(path)
            .with_context(|| format!("cannot load config {}", path.display())),
        None => Ok(AdapterConfig::default()),
    }
}

/// Buffered output to `path`, or stdout.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("cannot read {}", path.display()))
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Encode(args) => cmd_encode::run(&args, config),
        Commands::Decode(args) => cmd_decode::run(&args, config),
        Commands::Text(args) => cmd_text::run(&args, config),
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
