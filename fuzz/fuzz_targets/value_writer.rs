#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use jsonlob_codec::{escape_str, ValueWriter, ValueWriterOptions};
use std::io::Write;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    text: String,
    split_points: Vec<u16>,
    html_safe: bool,
}

// Fuzz target: JSON string escaping over arbitrary byte splits.
//
// Writing the UTF-8 bytes of `text` in arbitrary slices must produce the
// same value as escaping it whole, and the result must contain no raw
// control characters or line/paragraph separators.
fuzz_target!(|input: FuzzInput| {
    let bytes = input.text.as_bytes();
    let mut writer =
        ValueWriter::new(Vec::new(), ValueWriterOptions::json_string(input.html_safe)).unwrap();

    let mut cuts: Vec<usize> = input
        .split_points
        .iter()
        .map(|&p| usize::from(p) % (bytes.len() + 1))
        .collect();
    cuts.push(bytes.len());
    cuts.sort_unstable();
    let mut start = 0;
    for cut in cuts {
        writer.write_all(&bytes[start..cut]).unwrap();
        start = cut;
    }
    let out = String::from_utf8(writer.finish().unwrap()).unwrap();

    let expected = format!("\"{}\"", escape_str(&input.text, input.html_safe));
    assert_eq!(out, expected);
    assert!(!out.chars().any(|c| c < ' ' || c == '\u{2028}' || c == '\u{2029}'));
});
