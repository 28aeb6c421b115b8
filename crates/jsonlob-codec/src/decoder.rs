use std::io::{self, Write};

use crate::alphabet::{self, Symbol};
use crate::error::{CodecError, DecodeError};

/// Bit offset of the first symbol of a 4-symbol unit.
const UNIT_START: i8 = 18;

/// Cross-call state of the streaming base64 decoder.
///
/// Symbols are packed into a 24-bit accumulator from the top down. The
/// `shift` field is the left shift the *next* symbol will receive, so it
/// also encodes how many symbols of the current unit have been seen:
///
/// ```text
/// ┌───────┬──────────────────┬──────────────────────────────┐
/// │ shift │ symbols in unit  │ meaning at a unit boundary   │
/// ├───────┼──────────────────┼──────────────────────────────┤
/// │ 18    │ 0                │ aligned, nothing pending     │
/// │ 12    │ 1                │ dangling symbol (error)      │
/// │ 6     │ 2                │ one byte pending             │
/// │ 0     │ 3                │ two bytes pending            │
/// └───────┴──────────────────┴──────────────────────────────┘
/// ```
///
/// After the fourth symbol `shift` drops below zero, the three bytes are
/// emitted, and the accumulator resets. `terminated` latches once padding
/// is seen; from then on only padding and non-alphabet bytes are accepted.
///
/// The state is independent of how the input is chunked: feeding a text
/// one byte at a time produces the same output as feeding it whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderState {
    bits: u32,
    shift: i8,
    terminated: bool,
    position: u64,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: 0,
            shift: UNIT_START,
            terminated: false,
            position: 0,
        }
    }

    /// Accumulated bits of the unit in progress.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Shift for the next symbol: 18, 12, 6, or 0.
    #[must_use]
    pub const fn shift(&self) -> i8 {
        self.shift
    }

    /// `true` once padding (or finalization) ended the value.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of text bytes consumed so far, across all chunks.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Decode one chunk of base64 text, appending complete bytes to `out`.
    ///
    /// Bytes outside the alphabet are skipped. Bytes produced before an
    /// error are left in `out`.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::DanglingSymbol`] when padding arrives after a
    ///   single symbol of a unit.
    /// - [`DecodeError::TrailingData`] when an alphabet symbol follows
    ///   padding.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeError> {
        for &byte in input {
            let offset = self.position;
            self.position += 1;

            match alphabet::classify(byte) {
                Symbol::Invalid => {}
                Symbol::Padding => {
                    if !self.terminated {
                        self.finalize(offset, out)?;
                        self.terminated = true;
                    }
                }
                Symbol::Value(value) => {
                    if self.terminated {
                        return Err(DecodeError::TrailingData { position: offset });
                    }
                    self.bits |= u32::from(value) << self.shift;
                    self.shift -= 6;
                    if self.shift < 0 {
                        out.extend_from_slice(&[
                            (self.bits >> 16) as u8,
                            (self.bits >> 8) as u8,
                            self.bits as u8,
                        ]);
                        self.bits = 0;
                        self.shift = UNIT_START;
                    }
                }
            }
        }
        Ok(())
    }

    /// Flush the final partial unit at end of input.
    ///
    /// A no-op when padding already terminated the value.
    ///
    /// # Errors
    ///
    /// [`DecodeError::DanglingSymbol`] when the text ends one symbol into
    /// a unit.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        if self.terminated {
            return Ok(());
        }
        self.finalize(self.position, out)?;
        self.terminated = true;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn finalize(&mut self, position: u64, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        match self.shift {
            6 => out.push((self.bits >> 16) as u8),
            0 => out.extend_from_slice(&[(self.bits >> 16) as u8, (self.bits >> 8) as u8]),
            12 => return Err(DecodeError::DanglingSymbol { position }),
            _ => {}
        }
        self.bits = 0;
        self.shift = UNIT_START;
        Ok(())
    }
}

/// Streaming base64 decoder writing raw bytes into a byte sink.
///
/// Text arrives in arbitrary chunks through [`write_str`](Self::write_str)
/// or [`write_text`](Self::write_text) (or through [`Write`], treating the
/// incoming bytes as base64 text). Every complete 3-byte group is passed
/// to the sink before the call returns; [`close`](Self::close) flushes the
/// last partial group.
///
/// ```text
///   "c2" ──▶ ┌──────────────┐
///   "Rm" ──▶ │ DecoderState │ ──▶ sink: 73 64 66
///   "cw" ──▶ │ bits / shift │ ──▶ sink: 73        (on "==" or close)
///   "==" ──▶ └──────────────┘
/// ```
///
/// Unknown symbols, including whitespace and line breaks, are skipped.
/// Wrapped or noisy base64 therefore decodes without pre-filtering.
///
/// # Example
///
/// ```rust
/// use jsonlob_codec::Base64Decoder;
///
/// let mut decoder = Base64Decoder::new(Vec::new());
/// decoder.write_str("c2").unwrap();
/// decoder.write_str("Rm").unwrap();
/// assert_eq!(decoder.finish().unwrap(), b"sdf");
/// ```
#[derive(Debug)]
pub struct Base64Decoder<W: Write> {
    sink: W,
    state: DecoderState,
    buf: Vec<u8>,
    closed: bool,
}

impl<W: Write> Base64Decoder<W> {
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: DecoderState::new(),
            buf: Vec::new(),
            closed: false,
        }
    }

    /// Decode a chunk of base64 text.
    ///
    /// # Errors
    ///
    /// See [`write_text`](Self::write_text).
    pub fn write_str(&mut self, text: &str) -> Result<(), CodecError> {
        self.write_text(text.as_bytes())
    }

    /// Decode a chunk of base64 text given as bytes.
    ///
    /// Bytes decoded before a [`DecodeError`] are still written to the
    /// sink; the error is returned afterwards.
    ///
    /// # Errors
    ///
    /// - [`CodecError::StreamClosed`] after [`close`](Self::close).
    /// - [`CodecError::Decode`] for malformed padding.
    /// - [`CodecError::Io`] when the sink fails.
    pub fn write_text(&mut self, text: &[u8]) -> Result<(), CodecError> {
        if self.closed {
            return Err(CodecError::StreamClosed);
        }
        self.buf.clear();
        let result = self.state.decode(text, &mut self.buf);
        if !self.buf.is_empty() {
            self.sink.write_all(&self.buf)?;
        }
        tracing::trace!(input = text.len(), output = self.buf.len(), "base64 decode chunk");
        result.map_err(CodecError::from)
    }

    /// Finalize the value: emit any pending partial group and flush the
    /// sink. Calling `close` again is a no-op.
    ///
    /// # Errors
    ///
    /// [`CodecError::Decode`] for a dangling final symbol, or
    /// [`CodecError::Io`] when the sink fails.
    pub fn close(&mut self) -> Result<(), CodecError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buf.clear();
        self.state.finish(&mut self.buf)?;
        self.sink.write_all(&self.buf)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Close the decoder and hand back the sink.
    ///
    /// # Errors
    ///
    /// Same as [`close`](Self::close).
    pub fn finish(mut self) -> Result<W, CodecError> {
        self.close()?;
        Ok(self.sink)
    }

    #[must_use]
    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.sink
    }
}

impl<W: Write> Write for Base64Decoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_text(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Decode a complete base64 string in one call.
///
/// # Errors
///
/// Returns a [`DecodeError`] for malformed padding or trailing data.
pub fn decode_str(text: &str) -> Result<Vec<u8>, DecodeError> {
    let mut state = DecoderState::new();
    let mut out = Vec::with_capacity(text.len() / 4 * 3 + 2);
    state.decode(text.as_bytes(), &mut out)?;
    state.finish(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `text` in chunks of `size` bytes and close.
    fn decode_chunked(text: &str, size: usize) -> Result<Vec<u8>, CodecError> {
        let mut decoder = Base64Decoder::new(Vec::new());
        for chunk in text.as_bytes().chunks(size) {
            decoder.write_text(chunk)?;
        }
        decoder.finish()
    }

    #[test]
    fn decodes_unpadded_aligned_input() {
        assert_eq!(decode_str("MjM0NTIz").unwrap(), b"234523");
        assert_eq!(decode_str("NDgzOTA0OGRh").unwrap(), b"4839048da");
    }

    #[test]
    fn decodes_single_and_double_padding() {
        assert_eq!(decode_str("cw==").unwrap(), [0x73]);
        assert_eq!(decode_str("MQ==").unwrap(), b"1");
        assert_eq!(decode_str("NTQyNA==").unwrap(), b"5424");
        assert_eq!(decode_str("c2RmZ2RmZ3M=").unwrap(), b"sdfgdfgs");
    }

    #[test]
    fn decodes_missing_padding_at_close() {
        assert_eq!(decode_str("cw").unwrap(), [0x73]);
        assert_eq!(decode_str("c2Q").unwrap(), b"sd");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(decode_str("").unwrap().is_empty());
        assert!(decode_chunked("", 1).unwrap().is_empty());
    }

    #[test]
    fn one_byte_chunks_match_whole_input() {
        for text in ["c2RmZ2RmZ3M=", "c2Rmc2Fkc2ZkZg==", "MjM0NTIz", "cw=="] {
            let whole = decode_str(text).unwrap();
            for size in 1..=text.len() {
                assert_eq!(decode_chunked(text, size).unwrap(), whole, "{text} / {size}");
            }
        }
    }

    #[test]
    fn skips_whitespace_and_noise() {
        assert_eq!(decode_str("c2\r\nRm").unwrap(), b"sdf");
        assert_eq!(decode_str(" c*2R!m ").unwrap(), b"sdf");
        assert_eq!(decode_str("cw=*=").unwrap(), [0x73]);
    }

    #[test]
    fn url_safe_alphabet_decodes() {
        assert_eq!(decode_str("-_-_").unwrap(), decode_str("+/+/").unwrap());
    }

    #[test]
    fn trailing_data_after_padding_is_an_error() {
        assert_eq!(
            decode_str("cw==43"),
            Err(DecodeError::TrailingData { position: 4 })
        );
        assert!(matches!(
            decode_chunked("NTQyNA==43", 3),
            Err(CodecError::Decode(DecodeError::TrailingData { position: 8 }))
        ));
    }

    #[test]
    fn whitespace_after_padding_is_accepted() {
        assert_eq!(decode_str("cw==\r\n  ").unwrap(), [0x73]);
    }

    #[test]
    fn dangling_symbol_before_padding_is_an_error() {
        assert_eq!(
            decode_str("c2Rmc==="),
            Err(DecodeError::DanglingSymbol { position: 5 })
        );
    }

    #[test]
    fn dangling_symbol_at_close_is_an_error() {
        assert!(matches!(
            decode_chunked("c2Rmc", 2),
            Err(CodecError::Decode(DecodeError::DanglingSymbol { position: 5 }))
        ));
    }

    #[test]
    fn bytes_before_error_reach_the_sink() {
        let mut decoder = Base64Decoder::new(Vec::new());
        assert!(decoder.write_str("c2Rm=x").is_err());
        assert_eq!(decoder.get_ref(), b"sdf");
    }

    #[test]
    fn shift_tracks_unit_progress() {
        let mut state = DecoderState::new();
        let mut out = Vec::new();
        assert_eq!(state.shift(), 18);
        state.decode(b"c", &mut out).unwrap();
        assert_eq!(state.shift(), 12);
        state.decode(b"2R", &mut out).unwrap();
        assert_eq!(state.shift(), 0);
        assert!(out.is_empty());
        state.decode(b"m", &mut out).unwrap();
        assert_eq!(state.shift(), 18);
        assert_eq!(state.bits(), 0);
        assert_eq!(out, b"sdf");
        assert_eq!(state.position(), 4);
    }

    #[test]
    fn write_after_close_is_rejected() {
        let mut decoder = Base64Decoder::new(Vec::new());
        decoder.close().unwrap();
        decoder.close().unwrap();
        assert!(matches!(decoder.write_str("AA"), Err(CodecError::StreamClosed)));
    }

    #[test]
    fn io_copy_into_decoder() {
        let mut source: &[u8] = b"c2Rmc2Fkc2ZkZg==";
        let mut decoder = Base64Decoder::new(Vec::new());
        io::copy(&mut source, &mut decoder).unwrap();
        assert_eq!(decoder.finish().unwrap(), b"sdfsadsfdf");
    }
}
