//! Shared fixtures for the integration tests and benchmarks.

use jsonlob_codec::{Base64Decoder, Base64Encoder, CodecError, EncoderConfig};

/// Deterministic bytes covering every value, in a pattern with no
/// period that lines up with base64 groups.
#[must_use]
pub fn sample_bytes(len: usize) -> Vec<u8> {
    let mut x: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x.to_le_bytes()[0]
        })
        .collect()
}

/// Encode `data` in slices of `chunk` bytes.
///
/// # Panics
///
/// Panics if the encoder fails, which a `Vec` sink never causes.
#[must_use]
pub fn encode_chunked(data: &[u8], chunk: usize, config: EncoderConfig) -> String {
    let mut encoder = Base64Encoder::new(Vec::new(), config).expect("vec sink");
    for piece in data.chunks(chunk.max(1)) {
        encoder.write_bytes(piece).expect("vec sink");
    }
    String::from_utf8(encoder.finish().expect("vec sink")).expect("base64 is ascii")
}

/// Decode `text` in slices of `chunk` bytes.
///
/// # Errors
///
/// Whatever the decoder reports.
pub fn decode_chunked(text: &[u8], chunk: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoder = Base64Decoder::new(Vec::new());
    for piece in text.chunks(chunk.max(1)) {
        decoder.write_text(piece)?;
    }
    decoder.finish()
}
