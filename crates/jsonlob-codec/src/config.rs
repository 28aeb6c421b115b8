use std::num::NonZeroUsize;

/// Line length used by the MIME profile (RFC 2045 §6.8).
pub const MIME_LINE_LENGTH: usize = 76;

/// Separator inserted between lines when wrapping is enabled and no
/// other separator was configured.
pub const DEFAULT_LINE_SEPARATOR: &str = "\r\n";

/// Output options for [`Base64Encoder`](crate::Base64Encoder).
///
/// ```text
/// ┌────────────────┬───────────┬───────────────────────────────────────────┐
/// │ Field          │ Default   │ Effect                                    │
/// ├────────────────┼───────────┼───────────────────────────────────────────┤
/// │ line_length    │ None      │ Insert separator every N output symbols   │
/// │ line_separator │ "\r\n"    │ Text inserted at each line boundary       │
/// │ padding        │ true      │ Emit trailing `=` for a partial group     │
/// │ quote          │ true      │ Wrap the output in `"` … `"`              │
/// └────────────────┴───────────┴───────────────────────────────────────────┘
/// ```
///
/// Wrapping only happens when both a line length and a non-empty
/// separator are set. The separator is written verbatim: when the output
/// lands inside a JSON string, the caller passes an already escaped
/// separator (see [`escape_str`](crate::escape_str)).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub line_length: Option<NonZeroUsize>,
    pub line_separator: Option<String>,
    pub padding: bool,
    pub quote: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            line_length: None,
            line_separator: Some(DEFAULT_LINE_SEPARATOR.to_string()),
            padding: true,
            quote: true,
        }
    }
}

impl EncoderConfig {
    /// MIME-style output: 76-symbol lines joined by `\r\n`, padded.
    #[must_use]
    pub fn mime() -> Self {
        Self {
            line_length: NonZeroUsize::new(MIME_LINE_LENGTH),
            ..Self::default()
        }
    }

    /// Unquoted, unwrapped, padded output: plain RFC 4648 base64.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            quote: false,
            ..Self::default()
        }
    }

    /// Set the line length. Zero disables wrapping.
    #[must_use]
    pub fn with_line_length(mut self, line_length: usize) -> Self {
        self.line_length = NonZeroUsize::new(line_length);
        self
    }

    #[must_use]
    pub fn with_line_separator(mut self, separator: Option<impl Into<String>>) -> Self {
        self.line_separator = separator.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding: bool) -> Self {
        self.padding = padding;
        self
    }

    #[must_use]
    pub fn with_quote(mut self, quote: bool) -> Self {
        self.quote = quote;
        self
    }

    /// The effective wrap limit and separator, or `None` when output is
    /// a single unbroken line.
    pub(crate) fn wrap(&self) -> Option<(usize, &[u8])> {
        let limit = self.line_length?;
        match self.line_separator.as_deref() {
            Some(sep) if !sep.is_empty() => Some((limit.get(), sep.as_bytes())),
            _ => None,
        }
    }
}
