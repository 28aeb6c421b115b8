//! Concrete encode/decode scenarios and malformed input.

use jsonlob_codec::{
    Base64Decoder, CodecError, DecodeError, EncoderConfig, decode_str, encode_to_string,
};

#[test]
fn sdf_encodes_to_quoted_c2rm() {
    insta::assert_snapshot!(encode_to_string(b"sdf", &EncoderConfig::default()), @r#""c2Rm""#);
}

#[test]
fn single_byte_encodes_with_double_padding() {
    insta::assert_snapshot!(encode_to_string(&[0x73], &EncoderConfig::default()), @r#""cw==""#);
}

#[test]
fn single_byte_without_padding() {
    let config = EncoderConfig::default().with_padding(false);
    assert_eq!(encode_to_string(&[0x73], &config), "\"cw\"");
}

#[test]
fn empty_input_gives_empty_string_value() {
    assert_eq!(encode_to_string(&[], &EncoderConfig::default()), "\"\"");
    assert_eq!(decode_str("").unwrap(), b"");
}

#[test]
fn padded_single_byte_decodes() {
    assert_eq!(decode_str("cw==").unwrap(), [0x73]);
}

#[test]
fn data_after_padding_is_an_error() {
    assert_eq!(
        decode_str("cw==43"),
        Err(DecodeError::TrailingData { position: 4 })
    );
}

#[test]
fn data_after_padding_across_calls_is_an_error() {
    let mut decoder = Base64Decoder::new(Vec::new());
    decoder.write_str("cw==").unwrap();
    let err = decoder.write_str("43").unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::TrailingData { position: 4 })
    ));
}

#[test]
fn padding_after_single_symbol_is_dangling() {
    assert_eq!(
        decode_str("c2Rmc==="),
        Err(DecodeError::DanglingSymbol { position: 5 })
    );
}

#[test]
fn single_symbol_at_close_is_dangling() {
    assert_eq!(
        decode_str("c2Rmc"),
        Err(DecodeError::DanglingSymbol { position: 5 })
    );
}

#[test]
fn decode_error_messages() {
    insta::assert_snapshot!(
        DecodeError::DanglingSymbol { position: 5 }.to_string(),
        @"last unit does not have enough valid bits (offset 5)"
    );
    insta::assert_snapshot!(
        DecodeError::TrailingData { position: 4 }.to_string(),
        @"trailing data after padding at offset 4"
    );
}

#[test]
fn write_after_close_is_rejected() {
    let mut decoder = Base64Decoder::new(Vec::new());
    decoder.write_str("c2Rm").unwrap();
    decoder.close().unwrap();
    decoder.close().unwrap();
    assert!(matches!(decoder.write_str("cw=="), Err(CodecError::StreamClosed)));
    assert_eq!(decoder.get_ref(), b"sdf");
}

#[test]
fn bytes_before_an_error_reach_the_sink() {
    let mut decoder = Base64Decoder::new(Vec::new());
    assert!(decoder.write_str("c2Rmcw==x").is_err());
    assert_eq!(decoder.get_ref(), b"sdfs");
}
