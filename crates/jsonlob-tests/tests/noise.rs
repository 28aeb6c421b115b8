//! Decoding tolerates bytes outside the base64 alphabet.
//!
//! Skipping unknown symbols is a compatibility behaviour of the decoder:
//! wrapped, indented or otherwise decorated base64 decodes without a
//! cleanup pass. Padding is the only non-symbol byte with meaning.

use jsonlob_codec::{CodecError, DecodeError, EncoderConfig, decode_str, encode_to_string};
use jsonlob_tests::{decode_chunked, sample_bytes};

const NOISE: &[u8] = b" \t\r\n!#$%*.,;:\"\\{}[]~`?@^\x00\x7f\xc3\xa9";

/// Insert noise byte `i % NOISE.len()` after every `every` bytes.
fn interleave(text: &[u8], every: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for (i, chunk) in text.chunks(every).enumerate() {
        out.push(NOISE[i % NOISE.len()]);
        out.extend_from_slice(chunk);
        out.push(NOISE[(i * 7 + 3) % NOISE.len()]);
    }
    out
}

#[test]
fn noise_does_not_change_output() {
    for len in [0, 1, 2, 3, 10, 31, 200] {
        let data = sample_bytes(len);
        let clean = encode_to_string(&data, &EncoderConfig::plain());
        for every in [1, 2, 3, 5] {
            let noisy = interleave(clean.as_bytes(), every);
            for chunk in [1, 4, noisy.len().max(1)] {
                assert_eq!(
                    decode_chunked(&noisy, chunk).unwrap(),
                    data,
                    "len {len}, every {every}, chunk {chunk}"
                );
            }
        }
    }
}

#[test]
fn noise_after_padding_is_still_skipped() {
    assert_eq!(decode_str("cw==\r\n  \"").unwrap(), b"s");
    assert_eq!(decode_str("cw====").unwrap(), b"s");
}

#[test]
fn symbols_after_padding_are_rejected_even_behind_noise() {
    let err = decode_chunked(b"cw== \n!4", 1).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::TrailingData { position: 7 })
    ));
}

#[test]
fn only_noise_decodes_to_nothing() {
    assert_eq!(decode_str(" \r\n\t!!").unwrap(), b"");
}
