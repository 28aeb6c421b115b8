use std::path::PathBuf;
use std::sync::Arc;

use crate::encoding::TextEncoding;
use crate::error::FieldError;
use crate::field::{BlobField, ClobField, StreamingField};
use crate::scope::{self, Scope};

/// Creates fields for values read off the wire.
///
/// The provided `*_in` methods register the new field in a scope: the
/// one given, or else the calling thread's current scope. A field
/// created with no scope in reach is left to its caller.
pub trait FieldFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns the error from allocating the backing store.
    fn create_blob(&self) -> Result<BlobField, FieldError>;

    /// # Errors
    ///
    /// Returns the error from allocating the backing store.
    fn create_clob(&self, encoding: TextEncoding) -> Result<ClobField, FieldError>;

    /// # Errors
    ///
    /// Returns the error from allocating the backing store.
    fn create_blob_in(&self, scope: Option<&Scope>) -> Result<Arc<BlobField>, FieldError> {
        Ok(register(scope, Arc::new(self.create_blob()?)))
    }

    /// # Errors
    ///
    /// Returns the error from allocating the backing store.
    fn create_clob_in(
        &self,
        scope: Option<&Scope>,
        encoding: TextEncoding,
    ) -> Result<Arc<ClobField>, FieldError> {
        Ok(register(scope, Arc::new(self.create_clob(encoding)?)))
    }
}

fn register<F: StreamingField + 'static>(target: Option<&Scope>, field: Arc<F>) -> Arc<F> {
    match target {
        Some(scope) => scope.register(field),
        None => scope::register_current(field),
    }
}

/// Fields backed by `jsonfield_*` temp files.
#[derive(Clone, Debug, Default)]
pub struct TempFileFactory {
    dir: Option<PathBuf>,
}

impl TempFileFactory {
    /// Temp files go in the system temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl FieldFactory for TempFileFactory {
    fn create_blob(&self) -> Result<BlobField, FieldError> {
        BlobField::temp_file(self.dir.as_deref())
    }

    fn create_clob(&self, encoding: TextEncoding) -> Result<ClobField, FieldError> {
        ClobField::temp_file(self.dir.as_deref(), encoding)
    }
}

/// Fields backed by memory buffers.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryFactory;

impl FieldFactory for MemoryFactory {
    fn create_blob(&self) -> Result<BlobField, FieldError> {
        Ok(BlobField::in_memory())
    }

    fn create_clob(&self, encoding: TextEncoding) -> Result<ClobField, FieldError> {
        Ok(ClobField::in_memory(encoding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_scope_wins() {
        scope::close_all().unwrap();
        let ambient = scope::create_scope();
        let explicit = Scope::new();

        let blob = MemoryFactory.create_blob_in(Some(&explicit)).unwrap();
        assert!(explicit.contains(&blob));
        assert!(!ambient.contains(&blob));
        scope::close_all().unwrap();
    }

    #[test]
    fn falls_back_to_current_scope() {
        scope::close_all().unwrap();
        let ambient = scope::create_scope();
        let clob = MemoryFactory
            .create_clob_in(None, TextEncoding::Utf8)
            .unwrap();
        assert!(ambient.contains(&clob));

        scope::close_scope(&ambient).unwrap();
        assert!(clob.is_closed());
    }

    #[test]
    fn temp_file_factory_uses_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let factory = TempFileFactory::in_dir(dir.path());
        let blob = factory.create_blob().unwrap();
        let clob = factory.create_clob(TextEncoding::Utf8).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_by_key(|n| n.ends_with(".clob"));
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("jsonfield_") && names[0].ends_with(".blob"));
        assert!(names[1].starts_with("jsonfield_") && names[1].ends_with(".clob"));

        blob.close().unwrap();
        clob.close().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
