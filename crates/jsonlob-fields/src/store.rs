use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Prefix of temporary files created by [`FileStore::create_temp`].
pub const TEMP_FILE_PREFIX: &str = "jsonfield_";

/// Byte storage behind a blob or clob field.
///
/// A store owns one resource (a file, a buffer) that outlives any single
/// reader or writer opened on it. Opening a writer truncates the content.
/// Readers and writers must not overlap; the store does not arbitrate.
///
/// `release` frees the resource. It is attempted once: a second call
/// succeeds without touching the resource, even if the first failed. A
/// resource that already vanished counts as released.
pub trait BackingStore: Send + Sync + fmt::Debug {
    /// Open a writer that replaces the stored content.
    fn open_write(&self) -> io::Result<Box<dyn Write + '_>>;

    /// Open a reader over the stored content, from the start.
    fn open_read(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Stored length in bytes.
    fn length(&self) -> io::Result<u64>;

    /// Free the underlying resource.
    fn release(&self) -> io::Result<()>;
}

fn released_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "backing store was released")
}

// ── File store ─────────────────────────────────────────────────────────

/// A store backed by a single file on disk.
///
/// Release deletes the file. A file that is already gone counts as
/// released.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    released: AtomicBool,
}

impl FileStore {
    /// Wrap an existing (or yet to be written) path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: AtomicBool::new(false),
        }
    }

    /// Create an empty temporary file named `jsonfield_*<suffix>`, in
    /// `dir` or the system temp directory.
    ///
    /// The file is not deleted on drop; it lives until [`release`].
    ///
    /// [`release`]: BackingStore::release
    ///
    /// # Errors
    ///
    /// Returns the I/O error from creating the file.
    pub fn create_temp(dir: Option<&Path>, suffix: &str) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(suffix);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let path = file.into_temp_path().keep()?;
        debug!(path = %path.display(), "created temp file store");
        Ok(Self::new(path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_live(&self) -> io::Result<()> {
        if self.released.load(Ordering::Acquire) {
            Err(released_error())
        } else {
            Ok(())
        }
    }
}

impl BackingStore for FileStore {
    fn open_write(&self) -> io::Result<Box<dyn Write + '_>> {
        self.ensure_live()?;
        Ok(Box::new(BufWriter::new(File::create(&self.path)?)))
    }

    fn open_read(&self) -> io::Result<Box<dyn Read + '_>> {
        self.ensure_live()?;
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn length(&self) -> io::Result<u64> {
        self.ensure_live()?;
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn release(&self) -> io::Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "deleted file store");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ── Memory store ───────────────────────────────────────────────────────

/// A store backed by an in-memory buffer.
///
/// Useful for tests and for small values that never need to touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
    released: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(bytes),
            released: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> io::Result<()> {
        if self.released.load(Ordering::Acquire) {
            Err(released_error())
        } else {
            Ok(())
        }
    }
}

struct MemoryWriter<'a> {
    guard: RwLockWriteGuard<'a, Vec<u8>>,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MemoryReader<'a> {
    guard: RwLockReadGuard<'a, Vec<u8>>,
    pos: usize,
}

impl Read for MemoryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rest = &self.guard[self.pos..];
        let n = rest.read(buf)?;
        self.pos += n;
        Ok(n)
    }
}

impl BackingStore for MemoryStore {
    fn open_write(&self) -> io::Result<Box<dyn Write + '_>> {
        self.ensure_live()?;
        let mut guard = self.data.write();
        guard.clear();
        Ok(Box::new(MemoryWriter { guard }))
    }

    fn open_read(&self) -> io::Result<Box<dyn Read + '_>> {
        self.ensure_live()?;
        Ok(Box::new(MemoryReader {
            guard: self.data.read(),
            pos: 0,
        }))
    }

    fn length(&self) -> io::Result<u64> {
        self.ensure_live()?;
        Ok(self.data.read().len() as u64)
    }

    fn release(&self) -> io::Result<()> {
        if !self.released.swap(true, Ordering::AcqRel) {
            let mut data = self.data.write();
            data.clear();
            data.shrink_to_fit();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all(store: &dyn BackingStore, bytes: &[u8]) {
        let mut w = store.open_write().unwrap();
        w.write_all(bytes).unwrap();
        w.flush().unwrap();
    }

    fn read_all(store: &dyn BackingStore) -> Vec<u8> {
        let mut out = Vec::new();
        store.open_read().unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        write_all(&store, b"hello");
        assert_eq!(read_all(&store), b"hello");
        assert_eq!(store.length().unwrap(), 5);
    }

    #[test]
    fn memory_store_write_truncates() {
        let store = MemoryStore::with_bytes(b"old content".to_vec());
        write_all(&store, b"new");
        assert_eq!(read_all(&store), b"new");
    }

    #[test]
    fn memory_store_release_is_idempotent() {
        let store = MemoryStore::with_bytes(vec![1, 2, 3]);
        store.release().unwrap();
        store.release().unwrap();
        assert!(store.open_read().is_err());
        assert!(store.length().is_err());
    }

    #[test]
    fn temp_file_store_naming_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::create_temp(Some(dir.path()), ".blob").unwrap();
        let name = store.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_FILE_PREFIX));
        assert!(name.ends_with(".blob"));

        write_all(&store, b"payload");
        assert_eq!(store.length().unwrap(), 7);
        assert_eq!(read_all(&store), b"payload");

        store.release().unwrap();
        assert!(!store.path().exists());
        store.release().unwrap();
    }

    #[test]
    fn release_of_missing_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("never-written.clob"));
        store.release().unwrap();
    }

    #[test]
    fn failed_release_is_attempted_once() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("not-a-file");
        fs::create_dir(&blocked).unwrap();

        let store = FileStore::new(&blocked);
        assert!(store.release().is_err());
        store.release().unwrap();
        assert!(blocked.exists());
        assert!(store.open_read().is_err());
    }

    #[test]
    fn temp_file_survives_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let store = FileStore::create_temp(Some(dir.path()), ".clob").unwrap();
            store.path().to_path_buf()
        };
        assert!(path.exists());
    }
}
