#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use jsonlob_fields::TextEncoding;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    text: String,
    encoding: u8,
    chunk: u8,
}

// Fuzz target: clob text encode → incremental decode.
//
// Unicode encodings must roundtrip any text under any chunking. The
// single-byte encodings replace unmappable characters, so they only
// check that decoding never fails on their own output.
fuzz_target!(|input: FuzzInput| {
    let encoding = match input.encoding % 5 {
        0 => TextEncoding::Utf8,
        1 => TextEncoding::Utf16Le,
        2 => TextEncoding::Utf16Be,
        3 => TextEncoding::Latin1,
        _ => TextEncoding::Ascii,
    };
    let mut bytes = Vec::new();
    encoding.encode_into(&input.text, &mut bytes);

    let mut decoder = encoding.decoder();
    let mut out = String::new();
    for piece in bytes.chunks(usize::from(input.chunk).max(1)) {
        decoder.decode(piece, &mut out).unwrap();
    }
    decoder.finish().unwrap();

    if matches!(
        encoding,
        TextEncoding::Utf8 | TextEncoding::Utf16Le | TextEncoding::Utf16Be
    ) {
        assert_eq!(out, input.text);
    }
});
