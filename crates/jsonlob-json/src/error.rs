use std::io;

use jsonlob_codec::CodecError;
use jsonlob_fields::FieldError;

/// Errors from the JSON value boundary.
///
/// ```text
///   AdapterError
///   ├── Codec(CodecError)   ← base64 decode failure, write after close
///   ├── Field(FieldError)   ← backing store or clob text failure
///   ├── Io(std::io::Error)  ← JSON-side source or sink failure
///   └── InvalidConfig       ← unknown encoding, unparseable config file
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid adapter config: {reason}")]
    InvalidConfig { reason: String },
}
