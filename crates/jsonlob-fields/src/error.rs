use std::io;

use crate::encoding::TextEncoding;
use crate::field::FieldKind;

/// Errors raised by blob/clob fields and their backing stores.
///
/// ```text
///   FieldError
///   ├── Closed              ← stream access after the field was released
///   ├── UnsupportedEncoding ← clob encoding name not recognised
///   ├── MalformedText       ← stored bytes are not valid in the clob encoding
///   └── Io(std::io::Error)  ← backing store open/read/write/delete failure
/// ```
///
/// Nothing here is retried. A store that wants retries does them itself.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("{kind} field is closed")]
    Closed { kind: FieldKind },

    #[error("unsupported character encoding: {name}")]
    UnsupportedEncoding { name: String },

    #[error("text is not valid {encoding}")]
    MalformedText { encoding: TextEncoding },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Every release failure from one scope close (or one `close_all`).
///
/// Closing a scope attempts to release every member even when some
/// fail; the failures are gathered here and reported once at the end.
#[derive(Debug, Default, thiserror::Error)]
#[error("failed to release {} of {attempted} resources", .failures.len())]
pub struct ReleaseError {
    /// Number of release attempts made.
    pub attempted: usize,
    /// The errors, in the order the releases were attempted.
    pub failures: Vec<FieldError>,
}

impl ReleaseError {
    pub(crate) fn record(&mut self, result: Result<(), FieldError>) {
        self.attempted += 1;
        if let Err(e) = result {
            self.failures.push(e);
        }
    }

    pub(crate) fn merge(&mut self, other: ReleaseError) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }

    pub(crate) fn into_result(self) -> Result<(), ReleaseError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
