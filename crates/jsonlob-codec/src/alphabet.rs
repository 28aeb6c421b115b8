//! Base64 symbol tables (RFC 4648 §4).
//!
//! Encoding always uses the standard alphabet with `+` and `/`. Decoding
//! additionally accepts the URL-safe symbols `-` and `_` (RFC 4648 §5)
//! for values 62 and 63, so either flavour round-trips.
//!
//! ```text
//! ┌─────────┬──────────────┬────────────────────────────┐
//! │ Value   │ Encode       │ Decode accepts             │
//! ├─────────┼──────────────┼────────────────────────────┤
//! │ 0..=25  │ A..Z         │ A..Z                       │
//! │ 26..=51 │ a..z         │ a..z                       │
//! │ 52..=61 │ 0..9         │ 0..9                       │
//! │ 62      │ +            │ + or -                     │
//! │ 63      │ /            │ / or _                     │
//! │ pad     │ =            │ =                          │
//! │ other   │ n/a          │ skipped (never an error)   │
//! └─────────┴──────────────┴────────────────────────────┘
//! ```

/// The 64 output symbols, indexed by 6-bit value.
pub const ENCODE_TABLE: [u8; 64] =
    *b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// The padding symbol.
pub const PAD: u8 = b'=';

const INVALID: i8 = -1;
const PADDING: i8 = -2;

/// Reverse lookup: byte → 6-bit value, [`PADDING`], or [`INVALID`].
///
/// Covers all 256 byte values so non-ASCII bytes (any byte of a
/// multi-byte UTF-8 sequence) land on `INVALID` and are skipped.
static DECODE_TABLE: [i8; 256] = build_decode_table();

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn build_decode_table() -> [i8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ENCODE_TABLE.len() {
        table[ENCODE_TABLE[i] as usize] = i as i8;
        i += 1;
    }
    table[b'-' as usize] = 62;
    table[b'_' as usize] = 63;
    table[PAD as usize] = PADDING;
    table
}

/// Classification of one input byte during decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// A data symbol carrying 6 bits.
    Value(u8),
    /// The `=` padding marker.
    Padding,
    /// Anything outside the alphabet (whitespace, line breaks, noise).
    Invalid,
}

/// Classify a single byte of base64 text.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn classify(byte: u8) -> Symbol {
    match DECODE_TABLE[byte as usize] {
        PADDING => Symbol::Padding,
        INVALID => Symbol::Invalid,
        value => Symbol::Value(value as u8),
    }
}

/// Map the low 6 bits of `value` to its output symbol.
#[must_use]
pub fn encode_symbol(value: u32) -> u8 {
    ENCODE_TABLE[(value & 0x3F) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_encode_symbol_decodes_to_its_index() {
        for (i, &sym) in ENCODE_TABLE.iter().enumerate() {
            assert_eq!(classify(sym), Symbol::Value(u8::try_from(i).unwrap()));
        }
    }

    #[test]
    fn url_safe_symbols_alias_62_and_63() {
        assert_eq!(classify(b'-'), Symbol::Value(62));
        assert_eq!(classify(b'_'), Symbol::Value(63));
        assert_eq!(classify(b'+'), Symbol::Value(62));
        assert_eq!(classify(b'/'), Symbol::Value(63));
    }

    #[test]
    fn padding_and_noise() {
        assert_eq!(classify(b'='), Symbol::Padding);
        for byte in [b' ', b'\n', b'\r', b'\t', b'*', b'"', 0x00, 0x80, 0xE2, 0xFF] {
            assert_eq!(classify(byte), Symbol::Invalid, "byte {byte:#04x}");
        }
    }

    #[test]
    fn encode_symbol_masks_high_bits() {
        assert_eq!(encode_symbol(0), b'A');
        assert_eq!(encode_symbol(63), b'/');
        assert_eq!(encode_symbol(64), b'A');
    }
}
