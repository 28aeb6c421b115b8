/// Implementation of `jsonlob decode`.
///
/// The value is read into a temp-file blob registered in a scope, copied
/// to the output, and the scope is closed. A file whose first
/// significant character is `"` is parsed as a JSON string literal so
/// that escaped line separators (`\r\n`) are honoured; anything else is
/// streamed to the decoder as bare base64.
///
/// The literal path holds the unescaped value in memory once before
/// decoding it. Large payloads should be passed as bare base64, which is
/// decoded chunk by chunk straight from the file.
use std::io::{BufReader, Read, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use jsonlob_fields::ScopeGuard;
use jsonlob_json::{AdapterConfig, FieldAdapter};
use tracing::debug;

use crate::{DecodeArgs, open_input, open_output};

/// Run the `jsonlob decode` command.
///
/// # Errors
///
/// Returns an error if the input cannot be read, is not valid base64
/// (bad padding or data after padding), or the output cannot be written.
pub fn run(args: &DecodeArgs, config: AdapterConfig) -> Result<()> {
    let adapter = FieldAdapter::new(config)?;
    let guard = ScopeGuard::enter();

    let blob = if first_significant_byte(&args.input)? == Some(b'"') {
        let reader = BufReader::new(open_input(&args.input)?);
        let content: String =
            serde_json::from_reader(reader).context("input is not a JSON string literal")?;
        adapter.read_blob(Some(content.as_bytes()), Some(guard.scope()))
    } else {
        adapter.read_blob(Some(open_input(&args.input)?), Some(guard.scope()))
    }
    .with_context(|| format!("failed to decode {}", args.input.display()))?;

    let mut out = open_output(args.output.as_deref())?;
    if let Some(blob) = blob {
        let bytes = blob.copy_to(&mut out)?;
        debug!(bytes, "decoded value written");
    }
    out.flush()?;
    guard.close()?;
    Ok(())
}

fn first_significant_byte(path: &Path) -> Result<Option<u8>> {
    let reader = BufReader::new(open_input(path)?);
    for byte in reader.bytes() {
        let byte = byte?;
        if !byte.is_ascii_whitespace() {
            return Ok(Some(byte));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn decode_file(contents: &str) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let input = dir.path().join("value.json");
        let output = dir.path().join("value.bin");
        fs::write(&input, contents).unwrap();

        let config = AdapterConfig {
            temp_dir: Some(scratch.path().to_path_buf()),
            ..AdapterConfig::default()
        };
        let args = DecodeArgs {
            input,
            output: Some(output.clone()),
        };
        run(&args, config).unwrap();
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
        fs::read(output).unwrap()
    }

    #[test]
    fn json_literal_with_escaped_separators() {
        assert_eq!(decode_file(r#"  "c2Rm\r\nc2Rm\r\ncw==""#), b"sdfsdfs");
    }

    #[test]
    fn bare_base64_is_streamed() {
        assert_eq!(decode_file("c2Rm\nc2Rm\n"), b"sdfsdf");
    }

    #[test]
    fn malformed_literal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("value.json");
        fs::write(&input, "\"c2Rm").unwrap();
        let args = DecodeArgs {
            input,
            output: Some(dir.path().join("out")),
        };
        let err = run(&args, AdapterConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("not a JSON string literal"));
    }
}
