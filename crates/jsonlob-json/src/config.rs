use std::fs;
use std::path::{Path, PathBuf};

use jsonlob_codec::{EncoderConfig, ValueWriterOptions, escape_str};
use jsonlob_codec::config::DEFAULT_LINE_SEPARATOR;
use jsonlob_fields::TextEncoding;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Options recognised at the JSON boundary.
///
/// ```text
/// ┌────────────────────┬────────────┬──────────────────────────────────────┐
/// │ Key                │ Default    │ Effect                               │
/// ├────────────────────┼────────────┼──────────────────────────────────────┤
/// │ lineSeparator      │ "\r\n"     │ Inserted between base64 lines        │
/// │ lineLength         │ 0          │ Base64 symbols per line, ≤0 = one    │
/// │ doPadding          │ true       │ Trailing `=` on a partial group      │
/// │ htmlSafeEscaping   │ true       │ Also escape < > & = ' in clob text   │
/// │ characterEncoding  │ "UTF-8"    │ Storage encoding of new clobs        │
/// │ tempDir            │ system tmp │ Where temp-file fields are created   │
/// └────────────────────┴────────────┴──────────────────────────────────────┘
/// ```
///
/// Serialized with the camelCase keys above, so a config file reads like
/// `{"lineLength": 76, "doPadding": false}`. Missing keys take defaults;
/// unknown keys are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AdapterConfig {
    pub line_separator: Option<String>,
    pub line_length: i64,
    pub do_padding: bool,
    pub html_safe_escaping: bool,
    pub character_encoding: String,
    pub temp_dir: Option<PathBuf>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            line_separator: Some(DEFAULT_LINE_SEPARATOR.to_string()),
            line_length: 0,
            do_padding: true,
            html_safe_escaping: true,
            character_encoding: TextEncoding::Utf8.name().to_string(),
            temp_dir: None,
        }
    }
}

impl AdapterConfig {
    /// # Errors
    ///
    /// [`AdapterError::Io`] if the file cannot be read,
    /// [`AdapterError::InvalidConfig`] if it is not a valid config.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// # Errors
    ///
    /// [`AdapterError::InvalidConfig`] on malformed JSON, unknown keys, or
    /// an unsupported character encoding.
    pub fn from_json_str(text: &str) -> Result<Self, AdapterError> {
        let config: Self = serde_json::from_str(text).map_err(|e| AdapterError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.text_encoding()?;
        Ok(config)
    }

    /// The clob storage encoding.
    ///
    /// # Errors
    ///
    /// [`AdapterError::InvalidConfig`] if the name is not supported.
    pub fn text_encoding(&self) -> Result<TextEncoding, AdapterError> {
        TextEncoding::from_name(&self.character_encoding).map_err(|e| {
            AdapterError::InvalidConfig {
                reason: e.to_string(),
            }
        })
    }

    /// Encoder settings for a base64 value placed inside a JSON string.
    ///
    /// The line separator is JSON-escaped here, since the encoder writes
    /// it verbatim. Quoting is left to the value writer beneath the
    /// encoder, so `quote` is off.
    #[must_use]
    pub fn encoder_config(&self) -> EncoderConfig {
        let length = usize::try_from(self.line_length).unwrap_or(0);
        let separator = self
            .line_separator
            .as_deref()
            .map(|sep| escape_str(sep, self.html_safe_escaping));
        EncoderConfig::default()
            .with_line_length(length)
            .with_line_separator(separator)
            .with_padding(self.do_padding)
            .with_quote(false)
    }

    /// Value writer settings for clob text.
    #[must_use]
    pub fn clob_options(&self) -> ValueWriterOptions {
        ValueWriterOptions::json_string(self.html_safe_escaping)
    }
}
