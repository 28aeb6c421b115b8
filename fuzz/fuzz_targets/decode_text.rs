#![no_main]

use libfuzzer_sys::fuzz_target;
use jsonlob_codec::{decode_str, Base64Decoder};

// Fuzz target: arbitrary text through the streaming decoder.
//
// Must never panic. The first byte picks a chunk size; decoding the rest
// in chunks of that size must agree with decoding it in one call, both
// on success and on the error reported.
fuzz_target!(|data: &[u8]| {
    let Some((&size, text)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(size).max(1);

    let mut decoder = Base64Decoder::new(Vec::new());
    let mut chunked = Ok(());
    for piece in text.chunks(chunk) {
        chunked = decoder.write_text(piece);
        if chunked.is_err() {
            break;
        }
    }
    let chunked = chunked.and_then(|()| decoder.finish());

    let Ok(text) = std::str::from_utf8(text) else {
        return;
    };
    match (decode_str(text), chunked) {
        (Ok(whole), Ok(parts)) => assert_eq!(whole, parts),
        (Err(whole), Err(parts)) => assert_eq!(whole.to_string(), parts.to_string()),
        (whole, parts) => panic!("chunking changed the outcome: {whole:?} vs {parts:?}"),
    }
});
