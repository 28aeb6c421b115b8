/// Implementation of `jsonlob text`.
///
/// Stages the file in a temp-file clob (stored in the configured
/// character encoding), then writes it through the JSON adapter as an
/// escaped string. `--html-safe` / `--no-html-safe` override the
/// config's `htmlSafeEscaping`.
use std::io::Write as _;

use anyhow::{Context, Result};
use jsonlob_fields::ScopeGuard;
use jsonlob_json::{AdapterConfig, FieldAdapter};

use crate::{TextArgs, open_input, open_output};

/// Run the `jsonlob text` command.
///
/// # Errors
///
/// Returns an error if the input cannot be read or is not UTF-8, or the
/// output cannot be written.
pub fn run(args: &TextArgs, mut config: AdapterConfig) -> Result<()> {
    if args.html_safe {
        config.html_safe_escaping = true;
    } else if args.no_html_safe {
        config.html_safe_escaping = false;
    }

    let adapter = FieldAdapter::new(config)?;
    let guard = ScopeGuard::enter();
    let clob = adapter
        .read_clob(Some(open_input(&args.input)?), Some(guard.scope()))
        .with_context(|| format!("cannot stage {}", args.input.display()))?;

    let mut out = open_output(args.output.as_deref())?;
    adapter.write_clob(clob.as_deref(), &mut out)?;
    out.flush()?;
    guard.close()?;
    Ok(())
}
