#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use jsonlob_codec::{decode_str, Base64Encoder, EncoderConfig};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    chunk_sizes: Vec<u8>,
    line_length: u8,
    separator: String,
    padding: bool,
}

// Fuzz target: encode with arbitrary options and chunking, then decode.
//
// Separators made only of non-alphabet characters are skipped by the
// decoder, so those configurations must roundtrip exactly.
fuzz_target!(|input: FuzzInput| {
    let config = EncoderConfig::plain()
        .with_line_length(usize::from(input.line_length))
        .with_line_separator(Some(input.separator.clone()))
        .with_padding(input.padding);

    let mut encoder = Base64Encoder::new(Vec::new(), config.clone()).unwrap();
    let mut rest = input.data.as_slice();
    let mut sizes = input.chunk_sizes.iter().cycle();
    while !rest.is_empty() {
        let size = sizes.next().map_or(rest.len(), |&s| usize::from(s).max(1));
        let take = size.min(rest.len());
        encoder.write_bytes(&rest[..take]).unwrap();
        rest = &rest[take..];
    }
    let encoded = String::from_utf8(encoder.finish().unwrap()).unwrap();

    let whole = jsonlob_codec::encode_to_string(&input.data, &config);
    assert_eq!(encoded, whole, "chunking changed the encoding");

    let separator_is_noise = input
        .separator
        .bytes()
        .all(|b| !(b.is_ascii_alphanumeric() || b"+/-_=".contains(&b)));
    if separator_is_noise {
        assert_eq!(decode_str(&encoded).unwrap(), input.data);
    }
});
