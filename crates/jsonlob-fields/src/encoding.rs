//! Character encodings for clob storage.
//!
//! A clob keeps its text as bytes in one of a small set of encodings.
//! Encoding is done a whole `&str` at a time; decoding is incremental,
//! since stored bytes arrive from the backing store in arbitrary chunks
//! that can split a multi-byte sequence.
//!
//! ```text
//! ┌────────────┬───────────────────────────────┬─────────────────────────┐
//! │ Encoding   │ Accepted names                │ Unmappable on encode    │
//! ├────────────┼───────────────────────────────┼─────────────────────────┤
//! │ UTF-8      │ utf-8, utf8                   │ n/a                     │
//! │ UTF-16LE   │ utf-16le, utf16le             │ n/a                     │
//! │ UTF-16BE   │ utf-16be, utf16be, utf-16     │ n/a                     │
//! │ ISO-8859-1 │ iso-8859-1, latin1, l1        │ replaced with `?`       │
//! │ US-ASCII   │ us-ascii, ascii               │ replaced with `?`       │
//! └────────────┴───────────────────────────────┴─────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::FieldError;

const REPLACEMENT: u8 = b'?';

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

impl TextEncoding {
    /// Look up an encoding by name. Case, `-` and `_` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnsupportedEncoding`] for any other name.
    pub fn from_name(name: &str) -> Result<Self, FieldError> {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "utf8" => Ok(Self::Utf8),
            "utf16le" => Ok(Self::Utf16Le),
            "utf16be" | "utf16" => Ok(Self::Utf16Be),
            "iso88591" | "latin1" | "l1" => Ok(Self::Latin1),
            "usascii" | "ascii" => Ok(Self::Ascii),
            _ => Err(FieldError::UnsupportedEncoding {
                name: name.to_string(),
            }),
        }
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Append the encoded form of `text` to `out`.
    pub fn encode_into(self, text: &str, out: &mut Vec<u8>) {
        match self {
            Self::Utf8 => out.extend_from_slice(text.as_bytes()),
            Self::Utf16Le => text
                .encode_utf16()
                .for_each(|unit| out.extend_from_slice(&unit.to_le_bytes())),
            Self::Utf16Be => text
                .encode_utf16()
                .for_each(|unit| out.extend_from_slice(&unit.to_be_bytes())),
            Self::Latin1 => out.extend(
                text.chars()
                    .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT)),
            ),
            Self::Ascii => out.extend(text.chars().map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(u8::is_ascii)
                    .unwrap_or(REPLACEMENT)
            })),
        }
    }

    #[must_use]
    pub fn decoder(self) -> TextDecoder {
        TextDecoder::new(self)
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Incremental decoder from stored bytes to text.
///
/// Bytes that end mid-sequence are carried into the next call; `finish`
/// reports a sequence that never completed.
#[derive(Clone, Debug)]
pub struct TextDecoder {
    encoding: TextEncoding,
    carry: Vec<u8>,
}

impl TextDecoder {
    #[must_use]
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            carry: Vec::new(),
        }
    }

    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Decode `input` and append the text to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::MalformedText`] on a byte sequence that is
    /// invalid in this encoding. Text decoded before the bad sequence is
    /// already in `out`.
    pub fn decode(&mut self, input: &[u8], out: &mut String) -> Result<(), FieldError> {
        match self.encoding {
            TextEncoding::Utf8 => self.decode_utf8(input, out),
            TextEncoding::Utf16Le => self.decode_utf16(input, out, u16::from_le_bytes),
            TextEncoding::Utf16Be => self.decode_utf16(input, out, u16::from_be_bytes),
            TextEncoding::Latin1 => {
                out.extend(input.iter().copied().map(char::from));
                Ok(())
            }
            TextEncoding::Ascii => {
                for &b in input {
                    if !b.is_ascii() {
                        return Err(self.malformed());
                    }
                    out.push(char::from(b));
                }
                Ok(())
            }
        }
    }

    /// End of input.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::MalformedText`] if a partial sequence is
    /// still carried.
    pub fn finish(&mut self) -> Result<(), FieldError> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            self.carry.clear();
            Err(self.malformed())
        }
    }

    fn decode_utf8(&mut self, input: &[u8], out: &mut String) -> Result<(), FieldError> {
        let joined;
        let work: &[u8] = if self.carry.is_empty() {
            input
        } else {
            joined = [self.carry.as_slice(), input].concat();
            &joined
        };

        match std::str::from_utf8(work) {
            Ok(text) => {
                out.push_str(text);
                self.carry.clear();
                Ok(())
            }
            Err(e) => {
                let (valid, rest) = work.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).map_err(|_| self.malformed())?);
                if e.error_len().is_some() {
                    self.carry.clear();
                    return Err(self.malformed());
                }
                self.carry = rest.to_vec();
                Ok(())
            }
        }
    }

    fn decode_utf16(
        &mut self,
        input: &[u8],
        out: &mut String,
        unit: fn([u8; 2]) -> u16,
    ) -> Result<(), FieldError> {
        let mut work = std::mem::take(&mut self.carry);
        work.extend_from_slice(input);

        let mut units: Vec<u16> = work
            .chunks_exact(2)
            .map(|pair| unit([pair[0], pair[1]]))
            .collect();
        let mut keep = work.len() % 2;
        if units
            .last()
            .is_some_and(|u| (0xD800..=0xDBFF).contains(u))
        {
            units.pop();
            keep += 2;
        }
        self.carry = work[work.len() - keep..].to_vec();

        for decoded in char::decode_utf16(units) {
            match decoded {
                Ok(c) => out.push(c),
                Err(_) => {
                    self.carry.clear();
                    return Err(self.malformed());
                }
            }
        }
        Ok(())
    }

    fn malformed(&self) -> FieldError {
        FieldError::MalformedText {
            encoding: self.encoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_chunked(encoding: TextEncoding, bytes: &[u8], chunk: usize) -> String {
        let mut decoder = encoding.decoder();
        let mut out = String::new();
        for piece in bytes.chunks(chunk) {
            decoder.decode(piece, &mut out).unwrap();
        }
        decoder.finish().unwrap();
        out
    }

    #[test]
    fn names_are_case_and_punctuation_insensitive() {
        assert_eq!(TextEncoding::from_name("UTF-8").unwrap(), TextEncoding::Utf8);
        assert_eq!(TextEncoding::from_name("utf_16le").unwrap(), TextEncoding::Utf16Le);
        assert_eq!(TextEncoding::from_name("Latin1").unwrap(), TextEncoding::Latin1);
        assert_eq!("US-ASCII".parse::<TextEncoding>().unwrap(), TextEncoding::Ascii);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = TextEncoding::from_name("EBCDIC").unwrap_err();
        assert!(matches!(err, FieldError::UnsupportedEncoding { ref name } if name == "EBCDIC"));
    }

    #[test]
    fn utf8_survives_any_chunking() {
        let text = "héllo wörld ✓ 🦀";
        for chunk in 1..6 {
            assert_eq!(decode_chunked(TextEncoding::Utf8, text.as_bytes(), chunk), text);
        }
    }

    #[test]
    fn utf16_survives_any_chunking() {
        let text = "a🦀b";
        for encoding in [TextEncoding::Utf16Le, TextEncoding::Utf16Be] {
            let mut bytes = Vec::new();
            encoding.encode_into(text, &mut bytes);
            assert_eq!(bytes.len(), 8);
            for chunk in 1..5 {
                assert_eq!(decode_chunked(encoding, &bytes, chunk), text);
            }
        }
    }

    #[test]
    fn latin1_replaces_unmappable() {
        let mut bytes = Vec::new();
        TextEncoding::Latin1.encode_into("é✓", &mut bytes);
        assert_eq!(bytes, [0xE9, b'?']);
        assert_eq!(decode_chunked(TextEncoding::Latin1, &bytes, 1), "é?");
    }

    #[test]
    fn ascii_rejects_high_bytes() {
        let mut out = String::new();
        let err = TextEncoding::Ascii.decoder().decode(&[b'a', 0x80], &mut out);
        assert!(matches!(err, Err(FieldError::MalformedText { .. })));
        assert_eq!(out, "a");
    }

    #[test]
    fn truncated_utf8_fails_on_finish() {
        let mut decoder = TextEncoding::Utf8.decoder();
        let mut out = String::new();
        decoder.decode(&[b'x', 0xE2, 0x9C], &mut out).unwrap();
        assert_eq!(out, "x");
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn invalid_utf8_fails_immediately() {
        let mut out = String::new();
        let err = TextEncoding::Utf8.decoder().decode(&[b'o', b'k', 0xFF], &mut out);
        assert!(err.is_err());
        assert_eq!(out, "ok");
    }

    #[test]
    fn lone_low_surrogate_is_malformed() {
        let mut out = String::new();
        let err = TextEncoding::Utf16Be.decoder().decode(&[0xDC, 0x00], &mut out);
        assert!(err.is_err());
    }
}
