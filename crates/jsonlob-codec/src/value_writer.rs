use std::io::{self, Write};

use crate::error::CodecError;

/// UTF-8 encoding of U+2028 LINE SEPARATOR is `E2 80 A8`, U+2029
/// PARAGRAPH SEPARATOR is `E2 80 A9`.
const LS_PS_LEAD: [u8; 2] = [0xE2, 0x80];
const LS_TAIL: u8 = 0xA8;
const PS_TAIL: u8 = 0xA9;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// How a [`ValueWriter`] shapes the text passing through it.
///
/// ```text
/// ┌───────────┬──────────────────────────────────────────────────────────┐
/// │ Option    │ Effect                                                   │
/// ├───────────┼──────────────────────────────────────────────────────────┤
/// │ quote     │ `"` at construction, `"` at close                        │
/// │ escape    │ `"` `\` U+0000..U+001F U+2028 U+2029 escaped             │
/// │ html_safe │ with escape: also `<` `>` `&` `=` `'` as \u00XX          │
/// └───────────┴──────────────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueWriterOptions {
    pub quote: bool,
    pub escape: bool,
    pub html_safe: bool,
}

impl ValueWriterOptions {
    /// Pass-through, no quotes. Used beneath the base64 encoder when the
    /// encoder quotes its own output.
    pub const RAW: Self = Self {
        quote: false,
        escape: false,
        html_safe: false,
    };

    /// Quoted, unescaped: for payloads already known to be JSON-safe.
    pub const QUOTED_RAW: Self = Self {
        quote: true,
        escape: false,
        html_safe: false,
    };

    /// A complete JSON string literal.
    #[must_use]
    pub const fn json_string(html_safe: bool) -> Self {
        Self {
            quote: true,
            escape: true,
            html_safe,
        }
    }
}

/// Replacement for an ASCII byte, or `None` when it passes through.
fn replacement(byte: u8, html_safe: bool) -> Option<Replacement> {
    match byte {
        b'"' => Some(Replacement::Short(b'"')),
        b'\\' => Some(Replacement::Short(b'\\')),
        b'\t' => Some(Replacement::Short(b't')),
        0x08 => Some(Replacement::Short(b'b')),
        b'\n' => Some(Replacement::Short(b'n')),
        b'\r' => Some(Replacement::Short(b'r')),
        0x0C => Some(Replacement::Short(b'f')),
        0x00..=0x1F => Some(Replacement::Unicode(byte)),
        b'<' | b'>' | b'&' | b'=' | b'\'' if html_safe => Some(Replacement::Unicode(byte)),
        _ => None,
    }
}

enum Replacement {
    /// `\x` two-character escape.
    Short(u8),
    /// `\u00XX` six-character escape.
    Unicode(u8),
}

impl Replacement {
    fn push(self, out: &mut Vec<u8>) {
        match self {
            Replacement::Short(c) => out.extend_from_slice(&[b'\\', c]),
            Replacement::Unicode(c) => out.extend_from_slice(&[
                b'\\',
                b'u',
                b'0',
                b'0',
                HEX[usize::from(c >> 4)],
                HEX[usize::from(c & 0x0F)],
            ]),
        }
    }
}

/// Byte-level JSON string escaper.
///
/// Works on UTF-8 text delivered in arbitrary slices. The only
/// multi-byte sequences it rewrites are U+2028 and U+2029, so when a
/// slice ends partway through `E2 80`, those lead bytes are held back
/// until the next slice decides whether they start a separator.
#[derive(Clone, Copy, Debug, Default)]
struct Escaper {
    html_safe: bool,
    /// Number of bytes of `E2 80` matched and not yet emitted.
    held: usize,
}

impl Escaper {
    fn new(html_safe: bool) -> Self {
        Self { html_safe, held: 0 }
    }

    fn escape(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            loop {
                match self.held {
                    0 if byte == LS_PS_LEAD[0] => self.held = 1,
                    1 if byte == LS_PS_LEAD[1] => self.held = 2,
                    2 if byte == LS_TAIL || byte == PS_TAIL => {
                        out.extend_from_slice(if byte == LS_TAIL { b"\\u2028" } else { b"\\u2029" });
                        self.held = 0;
                    }
                    0 => match replacement(byte, self.html_safe) {
                        Some(rep) => rep.push(out),
                        None => out.push(byte),
                    },
                    _ => {
                        // Not a separator after all: release the held
                        // prefix and look at this byte again from scratch.
                        self.flush(out);
                        continue;
                    }
                }
                break;
            }
        }
    }

    fn flush(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&LS_PS_LEAD[..self.held]);
        self.held = 0;
    }
}

/// Escape `text` as the contents of a JSON string (without quotes).
///
/// ```rust
/// use jsonlob_codec::escape_str;
///
/// assert_eq!(escape_str("a\"b\n", false), "a\\\"b\\n");
/// assert_eq!(escape_str("<x>", true), "\\u003cx\\u003e");
/// ```
#[must_use]
pub fn escape_str(text: &str, html_safe: bool) -> String {
    let mut escaper = Escaper::new(html_safe);
    let mut out = Vec::with_capacity(text.len());
    escaper.escape(text.as_bytes(), &mut out);
    escaper.flush(&mut out);
    // Escaping only rewrites ASCII bytes and whole U+2028/U+2029
    // sequences, so valid UTF-8 in gives valid UTF-8 out.
    String::from_utf8_lossy(&out).into_owned()
}

/// Text filter that writes a JSON string value into a sink.
///
/// Wraps the raw character sink at the current JSON value position. The
/// opening quote (if any) is written by [`new`](Self::new), the closing
/// quote by [`close`](Self::close), which is idempotent. Text can be
/// written as `&str` or, through the [`Write`] impl, as UTF-8 bytes in
/// any slicing.
///
/// ```text
///   clob text ──▶ ValueWriter { quote, escape, html_safe } ──▶ "…\n…\u2028…"
///   base64    ──▶ ValueWriter { quote, no escape }         ──▶ "c2Rm…"
/// ```
#[derive(Debug)]
pub struct ValueWriter<W: Write> {
    out: W,
    options: ValueWriterOptions,
    escaper: Escaper,
    buf: Vec<u8>,
    closed: bool,
}

impl<W: Write> ValueWriter<W> {
    /// Create a writer; emits the opening quote when `options.quote`.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the opening quote cannot be written.
    pub fn new(mut out: W, options: ValueWriterOptions) -> io::Result<Self> {
        if options.quote {
            out.write_all(b"\"")?;
        }
        Ok(Self {
            out,
            options,
            escaper: Escaper::new(options.html_safe),
            buf: Vec::new(),
            closed: false,
        })
    }

    /// Write a piece of text, escaping it if configured.
    ///
    /// # Errors
    ///
    /// Fails after [`close`](Self::close) or when the sink fails.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.write_all(text.as_bytes())
    }

    fn write_text(&mut self, text: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(CodecError::StreamClosed.into());
        }
        if !self.options.escape {
            return self.out.write_all(text);
        }
        self.buf.clear();
        self.escaper.escape(text, &mut self.buf);
        self.out.write_all(&self.buf)
    }

    /// Emit held bytes and the closing quote, then flush. A second call
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the sink's error.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buf.clear();
        self.escaper.flush(&mut self.buf);
        if self.options.quote {
            self.buf.push(b'"');
        }
        self.out.write_all(&self.buf)?;
        self.out.flush()
    }

    /// Close and hand back the sink.
    ///
    /// # Errors
    ///
    /// Same as [`close`](Self::close).
    pub fn finish(mut self) -> io::Result<W> {
        self.close()?;
        Ok(self.out)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn options(&self) -> ValueWriterOptions {
        self.options
    }
}

impl<W: Write> Write for ValueWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_text(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_value(text: &str, options: ValueWriterOptions) -> String {
        let mut writer = ValueWriter::new(Vec::new(), options).unwrap();
        writer.write_str(text).unwrap();
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn raw_passes_through() {
        assert_eq!(write_value("test value", ValueWriterOptions::RAW), "test value");
        assert_eq!(write_value("a\"b", ValueWriterOptions::RAW), "a\"b");
    }

    #[test]
    fn raw_quoted() {
        assert_eq!(write_value("test value", ValueWriterOptions::QUOTED_RAW), "\"test value\"");
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        insta::assert_snapshot!(
            write_value("\"test\" \"value\" \\", ValueWriterOptions::json_string(false)),
            @r#""\"test\" \"value\" \\""#
        );
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(
            write_value("\t\u{8}\n\r\u{c}\u{0}\u{1f}", ValueWriterOptions::json_string(false)),
            "\"\\t\\b\\n\\r\\f\\u0000\\u001f\""
        );
    }

    #[test]
    fn escapes_line_and_paragraph_separators() {
        assert_eq!(
            write_value("test value \u{2028}\u{2029}", ValueWriterOptions::json_string(false)),
            "\"test value \\u2028\\u2029\""
        );
    }

    #[test]
    fn html_safe_mode_escapes_markup() {
        let options = ValueWriterOptions::json_string(true);
        assert_eq!(write_value("<a href='x'>&=", options), "\"\\u003ca href\\u003d\\u0027x\\u0027\\u003e\\u0026\\u003d\"");
        assert_eq!(write_value("<", ValueWriterOptions::json_string(false)), "\"<\"");
    }

    #[test]
    fn non_ascii_passes_through() {
        assert_eq!(write_value("héllo ✓ \u{2027}", ValueWriterOptions::json_string(false)), "\"héllo ✓ \u{2027}\"");
    }

    #[test]
    fn separator_split_across_writes_is_still_escaped() {
        let text = "x\u{2028}y\u{2029}€";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut writer = ValueWriter::new(Vec::new(), ValueWriterOptions::json_string(false)).unwrap();
            for chunk in [&bytes[..split], &bytes[split..]] {
                writer.write_all(chunk).unwrap();
            }
            let out = String::from_utf8(writer.finish().unwrap()).unwrap();
            assert_eq!(out, "\"x\\u2028y\\u2029€\"", "split at {split}");
        }
    }

    #[test]
    fn held_lead_bytes_flush_at_close() {
        // "€" is E2 82 AC: shares the first lead byte with U+2028.
        let mut writer = ValueWriter::new(Vec::new(), ValueWriterOptions::RAW).unwrap();
        writer.write_str("€").unwrap();
        assert_eq!(writer.finish().unwrap(), "€".as_bytes());

        let mut escaping = ValueWriter::new(Vec::new(), ValueWriterOptions::json_string(false)).unwrap();
        escaping.write_all(&[0xE2]).unwrap();
        escaping.write_all(&[0x82, 0xAC]).unwrap();
        assert_eq!(escaping.finish().unwrap(), "\"€\"".as_bytes());
    }

    #[test]
    fn close_is_idempotent_and_gates_writes() {
        let mut writer = ValueWriter::new(Vec::new(), ValueWriterOptions::QUOTED_RAW).unwrap();
        writer.write_str("v").unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(writer.write_str("late").is_err());
        assert_eq!(writer.finish().unwrap(), b"\"v\"");
    }

    #[test]
    fn escape_str_matches_writer() {
        let text = "tab\there \"q\" \u{2029} <b>";
        assert_eq!(
            format!("\"{}\"", escape_str(text, true)),
            write_value(text, ValueWriterOptions::json_string(true))
        );
    }
}
