/// Implementation of `jsonlob encode`.
///
/// In the default mode the input is staged in a temp-file blob inside a
/// scope, then written through the JSON adapter as a quoted base64
/// string. The scope closes before the command returns, deleting the
/// temp file.
///
/// `--raw` skips the adapter and streams the file straight through the
/// encoder: no quotes, and the line separator is written unescaped.
use std::io::{self, Write as _};

use anyhow::{Context, Result};
use jsonlob_codec::{Base64Encoder, EncoderConfig};
use jsonlob_fields::{FieldFactory, ScopeGuard};
use jsonlob_json::{AdapterConfig, FieldAdapter};
use tracing::debug;

use crate::{EncodeArgs, open_input, open_output};

/// Run the `jsonlob encode` command.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the output cannot be
/// written, or the temp blob cannot be created or released.
pub fn run(args: &EncodeArgs, mut config: AdapterConfig) -> Result<()> {
    if let Some(length) = args.line_length {
        config.line_length = length;
    }
    if let Some(separator) = &args.line_separator {
        config.line_separator = Some(separator.clone());
    }
    if args.no_padding {
        config.do_padding = false;
    }

    let mut input = open_input(&args.input)?;
    let mut out = open_output(args.output.as_deref())?;

    if args.raw {
        let encoder_config = raw_encoder_config(&config);
        let mut encoder = Base64Encoder::new(&mut out, encoder_config)?;
        let bytes = io::copy(&mut input, &mut encoder).context("encoding failed")?;
        encoder.close()?;
        debug!(bytes, "raw base64 written");
    } else {
        let adapter = FieldAdapter::new(config)?;
        let guard = ScopeGuard::enter();
        let blob = adapter.factory().create_blob_in(Some(guard.scope()))?;
        let bytes = blob
            .copy_from(&mut input)
            .with_context(|| format!("cannot stage {}", args.input.display()))?;
        adapter.write_blob(Some(&blob), &mut out)?;
        guard.close()?;
        debug!(bytes, "blob value written");
    }

    out.flush()?;
    Ok(())
}

fn raw_encoder_config(config: &AdapterConfig) -> EncoderConfig {
    EncoderConfig::plain()
        .with_line_length(usize::try_from(config.line_length).unwrap_or(0))
        .with_line_separator(config.line_separator.clone())
        .with_padding(config.do_padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_keeps_separator_unescaped() {
        let config = AdapterConfig {
            line_length: 76,
            ..AdapterConfig::default()
        };
        let raw = raw_encoder_config(&config);
        assert_eq!(raw, EncoderConfig::mime().with_quote(false));
    }

    #[test]
    fn raw_config_negative_length_means_one_line() {
        let config = AdapterConfig {
            line_length: -5,
            do_padding: false,
            ..AdapterConfig::default()
        };
        let raw = raw_encoder_config(&config);
        assert_eq!(raw.line_length, None);
        assert!(!raw.padding);
    }
}
