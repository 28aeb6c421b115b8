#![warn(clippy::pedantic)]

pub mod alphabet;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod value_writer;

pub use config::EncoderConfig;
pub use decoder::{Base64Decoder, DecoderState, decode_str};
pub use encoder::{Base64Encoder, EncoderState, encode_to_string};
pub use error::{CodecError, DecodeError};
pub use value_writer::{ValueWriter, ValueWriterOptions, escape_str};
