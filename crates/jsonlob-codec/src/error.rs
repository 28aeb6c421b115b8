use std::io;

/// Malformed base64 text detected while decoding.
///
/// Unknown symbols are skipped and never produce one of these. Only the
/// two structural faults below abort a decode:
///
/// ```text
///   DecodeError
///   ├── DanglingSymbol ← a lone 6-bit symbol that cannot form a byte
///   └── TrailingData   ← an alphabet symbol after the padding marker
/// ```
///
/// `position` is the zero-based offset into the text stream, counted
/// across every chunk fed to the decoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The final unit holds a single symbol (6 bits), which is not
    /// enough to produce a byte. Raised at the padding marker or at
    /// close, whichever ends the unit.
    #[error("last unit does not have enough valid bits (offset {position})")]
    DanglingSymbol { position: u64 },

    /// A base64 symbol appeared after padding terminated the value.
    #[error("trailing data after padding at offset {position}")]
    TrailingData { position: u64 },
}

/// Errors raised by the streaming encoder, decoder, and value writer.
///
/// ```text
///   CodecError
///   ├── Decode(DecodeError) ← malformed base64 input
///   ├── StreamClosed        ← write after close
///   └── Io(std::io::Error)  ← from the underlying sink
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("stream is closed")]
    StreamClosed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Decode(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::StreamClosed => io::Error::other(CodecError::StreamClosed),
        }
    }
}
