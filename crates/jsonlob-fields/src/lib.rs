#![warn(clippy::pedantic)]

pub mod encoding;
pub mod error;
pub mod factory;
pub mod field;
pub mod scope;
pub mod store;

pub use encoding::{TextDecoder, TextEncoding};
pub use error::{FieldError, ReleaseError};
pub use factory::{FieldFactory, MemoryFactory, TempFileFactory};
pub use field::{BlobField, ClobField, ClobReader, ClobWriter, FieldKind, StreamingField};
pub use scope::{
    Scope, ScopeGuard, ScopeStack, close_all, close_scope, create_scope, current_or_new_scope,
    current_scope, register_current,
};
pub use store::{BackingStore, FileStore, MemoryStore};
