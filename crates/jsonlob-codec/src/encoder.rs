use std::io::{self, Write};

use crate::alphabet::{PAD, encode_symbol};
use crate::config::EncoderConfig;
use crate::error::CodecError;

/// Raw bytes encoded per sink write. A multiple of 3 so that no partial
/// group is produced between slices of one `write` call.
const ENCODE_SLICE: usize = 3 * 1024;

/// Cross-call state of the streaming base64 encoder.
///
/// Input is consumed in 3-byte groups. Up to two bytes that do not yet
/// complete a group are parked in `pending` until the next call (or
/// [`finish`](Self::finish)). `line_pos` counts symbols written on the
/// current output line.
///
/// ```text
///   call 1: [73 64 66 61]   → "c2Rm"         pending = [61]      leftover = 1
///   call 2: [64]            → ""             pending = [61 64]   leftover = 2
///   call 3: [73 ...]        → "YWRz" ...     pending drained first
///   finish                  → tail + "="/"==" when padding is on
/// ```
///
/// Output is independent of how the input is chunked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncoderState {
    pending: [u8; 2],
    leftover: u8,
    line_pos: usize,
}

impl EncoderState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: [0; 2],
            leftover: 0,
            line_pos: 0,
        }
    }

    /// Bytes carried into the next call: 0, 1, or 2.
    #[must_use]
    pub const fn leftover(&self) -> usize {
        self.leftover as usize
    }

    /// Symbols written on the current output line.
    #[must_use]
    pub const fn line_position(&self) -> usize {
        self.line_pos
    }

    /// Encode one chunk of raw bytes, appending symbols (and line
    /// separators) to `out`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&mut self, config: &EncoderConfig, mut input: &[u8], out: &mut Vec<u8>) {
        if input.is_empty() {
            return;
        }

        if self.leftover > 0 {
            let have = usize::from(self.leftover);
            let need = 3 - have;
            if input.len() < need {
                // Only reachable with one byte parked and one arriving.
                self.pending[have] = input[0];
                self.leftover += 1;
                return;
            }
            let mut group = [0u8; 3];
            group[..have].copy_from_slice(&self.pending[..have]);
            group[have..].copy_from_slice(&input[..need]);
            self.push_group(config, group, out);
            self.leftover = 0;
            input = &input[need..];
        }

        let mut groups = input.chunks_exact(3);
        for group in &mut groups {
            self.push_group(config, [group[0], group[1], group[2]], out);
        }

        let rest = groups.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.leftover = rest.len() as u8;
    }

    /// Encode the parked tail bytes per RFC 4648 §4 and reset.
    ///
    /// ```text
    ///   leftover 1 → 2 symbols + "==" (if padding)
    ///   leftover 2 → 3 symbols + "="  (if padding)
    /// ```
    pub fn finish(&mut self, config: &EncoderConfig, out: &mut Vec<u8>) {
        match self.leftover {
            1 => {
                let b0 = u32::from(self.pending[0]);
                self.push_symbol(config, encode_symbol(b0 >> 2), out);
                self.push_symbol(config, encode_symbol(b0 << 4), out);
                if config.padding {
                    self.push_symbol(config, PAD, out);
                    self.push_symbol(config, PAD, out);
                }
            }
            2 => {
                let b0 = u32::from(self.pending[0]);
                let b1 = u32::from(self.pending[1]);
                self.push_symbol(config, encode_symbol(b0 >> 2), out);
                self.push_symbol(config, encode_symbol((b0 << 4) | (b1 >> 4)), out);
                self.push_symbol(config, encode_symbol(b1 << 2), out);
                if config.padding {
                    self.push_symbol(config, PAD, out);
                }
            }
            _ => {}
        }
        self.leftover = 0;
    }

    fn push_group(&mut self, config: &EncoderConfig, group: [u8; 3], out: &mut Vec<u8>) {
        let bits = u32::from(group[0]) << 16 | u32::from(group[1]) << 8 | u32::from(group[2]);
        for shift in [18, 12, 6, 0] {
            self.push_symbol(config, encode_symbol(bits >> shift), out);
        }
    }

    fn push_symbol(&mut self, config: &EncoderConfig, symbol: u8, out: &mut Vec<u8>) {
        if let Some((limit, separator)) = config.wrap() {
            if self.line_pos == limit {
                out.extend_from_slice(separator);
                self.line_pos = 0;
            }
        }
        out.push(symbol);
        self.line_pos += 1;
    }
}

/// Streaming base64 encoder writing symbols into a text sink.
///
/// Raw bytes arrive through [`write_bytes`](Self::write_bytes) or the
/// [`Write`] impl (so `io::copy` from any reader works). Symbols go to
/// the sink as soon as whole groups are available. [`close`](Self::close)
/// flushes the last one or two bytes, then the closing quote when
/// quoting is on; the opening quote is written by [`new`](Self::new).
///
/// ```text
///   reader ──bytes──▶ Base64Encoder ──"c2Rm…"──▶ sink (JSON value position)
/// ```
///
/// # Example
///
/// ```rust
/// use jsonlob_codec::{Base64Encoder, EncoderConfig};
///
/// let mut encoder = Base64Encoder::new(Vec::new(), EncoderConfig::default()).unwrap();
/// encoder.write_bytes(b"s").unwrap();
/// encoder.write_bytes(b"df").unwrap();
/// assert_eq!(encoder.finish().unwrap(), b"\"c2Rm\"");
/// ```
#[derive(Debug)]
pub struct Base64Encoder<W: Write> {
    sink: W,
    config: EncoderConfig,
    state: EncoderState,
    buf: Vec<u8>,
    closed: bool,
}

impl<W: Write> Base64Encoder<W> {
    /// Create an encoder; writes the opening quote if `config.quote`.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the opening quote cannot be written.
    pub fn new(mut sink: W, config: EncoderConfig) -> io::Result<Self> {
        if config.quote {
            sink.write_all(b"\"")?;
        }
        Ok(Self {
            sink,
            config,
            state: EncoderState::new(),
            buf: Vec::new(),
            closed: false,
        })
    }

    /// Encode a chunk of raw bytes.
    ///
    /// # Errors
    ///
    /// [`CodecError::StreamClosed`] after [`close`](Self::close), or
    /// [`CodecError::Io`] when the sink fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if self.closed {
            return Err(CodecError::StreamClosed);
        }
        for slice in bytes.chunks(ENCODE_SLICE) {
            self.buf.clear();
            self.state.encode(&self.config, slice, &mut self.buf);
            if !self.buf.is_empty() {
                self.sink.write_all(&self.buf)?;
            }
        }
        tracing::trace!(input = bytes.len(), leftover = self.state.leftover(), "base64 encode chunk");
        Ok(())
    }

    /// Emit the final partial group and the closing quote, then flush
    /// the sink. Calling `close` again is a no-op.
    ///
    /// # Errors
    ///
    /// [`CodecError::Io`] when the sink fails.
    pub fn close(&mut self) -> Result<(), CodecError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buf.clear();
        self.state.finish(&self.config, &mut self.buf);
        if self.config.quote {
            self.buf.push(b'"');
        }
        self.sink.write_all(&self.buf)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Close the encoder and hand back the sink.
    ///
    /// # Errors
    ///
    /// Same as [`close`](Self::close).
    pub fn finish(mut self) -> Result<W, CodecError> {
        self.close()?;
        Ok(self.sink)
    }

    #[must_use]
    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<W: Write> Write for Base64Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Encode `bytes` in one call with the given configuration.
#[must_use]
pub fn encode_to_string(bytes: &[u8], config: &EncoderConfig) -> String {
    let mut state = EncoderState::new();
    let mut out = Vec::with_capacity(bytes.len().div_ceil(3) * 4 + 2);
    if config.quote {
        out.push(b'"');
    }
    state.encode(config, bytes, &mut out);
    state.finish(config, &mut out);
    if config.quote {
        out.push(b'"');
    }
    // Symbols, quotes, and a caller-supplied `String` separator: always UTF-8.
    String::from_utf8_lossy(&out).into_owned()
}
