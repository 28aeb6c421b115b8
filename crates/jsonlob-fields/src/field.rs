use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::encoding::{TextDecoder, TextEncoding};
use crate::error::FieldError;
use crate::store::{BackingStore, FileStore, MemoryStore};

const COPY_CHUNK: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Blob,
    Clob,
}

impl FieldKind {
    /// File suffix for temp-file backed fields of this kind.
    #[must_use]
    pub fn temp_suffix(self) -> &'static str {
        match self {
            Self::Blob => ".blob",
            Self::Clob => ".clob",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => f.write_str("blob"),
            Self::Clob => f.write_str("clob"),
        }
    }
}

/// A value whose content lives in a releasable backing store.
///
/// This is the capability a [`Scope`](crate::Scope) needs from its
/// members: tell what you are, and release on request. `close` is
/// idempotent; after it, every stream-returning operation on the field
/// fails with [`FieldError::Closed`].
pub trait StreamingField: Send + Sync + fmt::Debug {
    fn kind(&self) -> FieldKind;

    fn is_closed(&self) -> bool;

    /// Release the backing store.
    ///
    /// # Errors
    ///
    /// Returns the store's release error. The field counts as closed
    /// either way.
    fn close(&self) -> Result<(), FieldError>;
}

/// Open/closed flag plus the store, shared by both field kinds.
#[derive(Debug)]
struct Backing {
    kind: FieldKind,
    store: Box<dyn BackingStore>,
    closed: AtomicBool,
}

impl Backing {
    fn new(kind: FieldKind, store: Box<dyn BackingStore>) -> Self {
        Self {
            kind,
            store,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<&dyn BackingStore, FieldError> {
        if self.closed.load(Ordering::Acquire) {
            Err(FieldError::Closed { kind: self.kind })
        } else {
            Ok(self.store.as_ref())
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<(), FieldError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.store.release()?;
        debug!(kind = %self.kind, "field released");
        Ok(())
    }
}

// ── Blob ───────────────────────────────────────────────────────────────

/// Binary content of unbounded size.
#[derive(Debug)]
pub struct BlobField {
    backing: Backing,
}

impl BlobField {
    pub fn new(store: impl BackingStore + 'static) -> Self {
        Self::from_boxed(Box::new(store))
    }

    #[must_use]
    pub fn from_boxed(store: Box<dyn BackingStore>) -> Self {
        Self {
            backing: Backing::new(FieldKind::Blob, store),
        }
    }

    /// A blob backed by a fresh `jsonfield_*.blob` temp file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from creating the file.
    pub fn temp_file(dir: Option<&Path>) -> Result<Self, FieldError> {
        let store = FileStore::create_temp(dir, FieldKind::Blob.temp_suffix())?;
        Ok(Self::new(store))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Stored length in bytes.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn length(&self) -> Result<u64, FieldError> {
        Ok(self.backing.ensure_open()?.length()?)
    }

    /// Open a writer that replaces the content. Callers should flush
    /// before dropping it.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn writer(&self) -> Result<Box<dyn Write + '_>, FieldError> {
        Ok(self.backing.ensure_open()?.open_write()?)
    }

    /// Open a reader over the content.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn reader(&self) -> Result<Box<dyn Read + '_>, FieldError> {
        Ok(self.backing.ensure_open()?.open_read()?)
    }

    /// Replace the content with `bytes`.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn set_bytes(&self, bytes: &[u8]) -> Result<&Self, FieldError> {
        let mut w = self.writer()?;
        w.write_all(bytes)?;
        w.flush()?;
        Ok(self)
    }

    /// Replace the content with everything `source` yields. Returns the
    /// number of bytes copied.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or an I/O error on either side.
    pub fn copy_from(&self, source: &mut dyn Read) -> Result<u64, FieldError> {
        let mut w = self.writer()?;
        let n = io::copy(source, &mut w)?;
        w.flush()?;
        Ok(n)
    }

    /// Write the content to `sink`. Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or an I/O error on either side.
    pub fn copy_to(&self, sink: &mut dyn Write) -> Result<u64, FieldError> {
        let mut r = self.reader()?;
        Ok(io::copy(&mut r, sink)?)
    }

    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FieldError> {
        let mut out = Vec::new();
        self.reader()?.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl StreamingField for BlobField {
    fn kind(&self) -> FieldKind {
        FieldKind::Blob
    }

    fn is_closed(&self) -> bool {
        self.backing.is_closed()
    }

    fn close(&self) -> Result<(), FieldError> {
        self.backing.close()
    }
}

// ── Clob ───────────────────────────────────────────────────────────────

/// Text content of unbounded size, stored in a fixed character encoding.
#[derive(Debug)]
pub struct ClobField {
    backing: Backing,
    encoding: TextEncoding,
}

impl ClobField {
    pub fn new(store: impl BackingStore + 'static, encoding: TextEncoding) -> Self {
        Self::from_boxed(Box::new(store), encoding)
    }

    #[must_use]
    pub fn from_boxed(store: Box<dyn BackingStore>, encoding: TextEncoding) -> Self {
        Self {
            backing: Backing::new(FieldKind::Clob, store),
            encoding,
        }
    }

    /// A clob backed by a fresh `jsonfield_*.clob` temp file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from creating the file.
    pub fn temp_file(dir: Option<&Path>, encoding: TextEncoding) -> Result<Self, FieldError> {
        let store = FileStore::create_temp(dir, FieldKind::Clob.temp_suffix())?;
        Ok(Self::new(store, encoding))
    }

    #[must_use]
    pub fn in_memory(encoding: TextEncoding) -> Self {
        Self::new(MemoryStore::new(), encoding)
    }

    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Stored length in bytes of the encoded text, not in characters.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn length(&self) -> Result<u64, FieldError> {
        Ok(self.backing.ensure_open()?.length()?)
    }

    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn writer(&self) -> Result<ClobWriter<'_>, FieldError> {
        let inner = self.backing.ensure_open()?.open_write()?;
        Ok(ClobWriter {
            inner,
            encoding: self.encoding,
            buf: Vec::new(),
        })
    }

    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn reader(&self) -> Result<ClobReader<'_>, FieldError> {
        let inner = self.backing.ensure_open()?.open_read()?;
        Ok(ClobReader {
            inner,
            decoder: TextDecoder::new(self.encoding),
            raw: vec![0; COPY_CHUNK],
            done: false,
        })
    }

    /// Replace the content with `text`.
    ///
    /// # Errors
    ///
    /// [`FieldError::Closed`] after close, or the store's I/O error.
    pub fn set_text(&self, text: &str) -> Result<&Self, FieldError> {
        let mut w = self.writer()?;
        w.write_str(text)?;
        w.finish()?;
        Ok(self)
    }

    /// Replace the content with the UTF-8 text `source` yields. Returns
    /// the number of characters copied.
    ///
    /// # Errors
    ///
    /// [`FieldError::MalformedText`] if `source` is not UTF-8, plus the
    /// errors of [`writer`](Self::writer).
    pub fn copy_text_from(&self, source: &mut dyn Read) -> Result<u64, FieldError> {
        let mut w = self.writer()?;
        let mut decoder = TextDecoder::new(TextEncoding::Utf8);
        let mut raw = vec![0; COPY_CHUNK];
        let mut text = String::new();
        let mut chars = 0u64;
        loop {
            let n = match source.read(&mut raw) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            text.clear();
            decoder.decode(&raw[..n], &mut text)?;
            chars += text.chars().count() as u64;
            w.write_str(&text)?;
        }
        decoder.finish()?;
        w.finish()?;
        Ok(chars)
    }

    /// Write the content to `sink` as UTF-8. Returns the number of
    /// characters copied.
    ///
    /// # Errors
    ///
    /// [`FieldError::MalformedText`] if the stored bytes are not valid in
    /// this clob's encoding, plus the errors of [`reader`](Self::reader).
    pub fn copy_text_to(&self, sink: &mut dyn Write) -> Result<u64, FieldError> {
        let mut r = self.reader()?;
        let mut text = String::new();
        let mut chars = 0u64;
        loop {
            text.clear();
            if r.read_chunk(&mut text)? == 0 {
                break;
            }
            chars += text.chars().count() as u64;
            sink.write_all(text.as_bytes())?;
        }
        Ok(chars)
    }

    /// # Errors
    ///
    /// Same as [`copy_text_to`](Self::copy_text_to).
    pub fn to_text(&self) -> Result<String, FieldError> {
        let mut r = self.reader()?;
        let mut out = String::new();
        while r.read_chunk(&mut out)? > 0 {}
        Ok(out)
    }
}

impl StreamingField for ClobField {
    fn kind(&self) -> FieldKind {
        FieldKind::Clob
    }

    fn is_closed(&self) -> bool {
        self.backing.is_closed()
    }

    fn close(&self) -> Result<(), FieldError> {
        self.backing.close()
    }
}

/// Text writer into a clob. Encodes on the way in.
pub struct ClobWriter<'a> {
    inner: Box<dyn Write + 'a>,
    encoding: TextEncoding,
    buf: Vec<u8>,
}

impl ClobWriter<'_> {
    /// # Errors
    ///
    /// Returns the store's I/O error.
    pub fn write_str(&mut self, text: &str) -> Result<(), FieldError> {
        self.buf.clear();
        self.encoding.encode_into(text, &mut self.buf);
        self.inner.write_all(&self.buf)?;
        Ok(())
    }

    /// Flush and drop the writer.
    ///
    /// # Errors
    ///
    /// Returns the store's I/O error.
    pub fn finish(mut self) -> Result<(), FieldError> {
        self.inner.flush()?;
        Ok(())
    }
}

impl fmt::Debug for ClobWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClobWriter")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

/// Text reader over a clob. Decodes on the way out.
pub struct ClobReader<'a> {
    inner: Box<dyn Read + 'a>,
    decoder: TextDecoder,
    raw: Vec<u8>,
    done: bool,
}

impl ClobReader<'_> {
    /// Append the next run of decoded text to `out` and return its length
    /// in bytes. Zero means end of content.
    ///
    /// # Errors
    ///
    /// [`FieldError::MalformedText`] on bytes invalid in the encoding,
    /// or the store's I/O error.
    pub fn read_chunk(&mut self, out: &mut String) -> Result<usize, FieldError> {
        let start = out.len();
        while !self.done && out.len() == start {
            match self.inner.read(&mut self.raw) {
                Ok(0) => {
                    self.done = true;
                    self.decoder.finish()?;
                }
                Ok(n) => self.decoder.decode(&self.raw[..n], out)?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out.len() - start)
    }
}

impl fmt::Debug for ClobReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClobReader")
            .field("encoding", &self.decoder.encoding())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_set_and_read_back() {
        let blob = BlobField::in_memory();
        blob.set_bytes(b"\x00\x01binary\xff").unwrap();
        assert_eq!(blob.to_bytes().unwrap(), b"\x00\x01binary\xff");
        assert_eq!(blob.length().unwrap(), 9);
    }

    #[test]
    fn blob_copy_from_and_to() {
        let blob = BlobField::in_memory();
        let copied = blob.copy_from(&mut &b"stream me"[..]).unwrap();
        assert_eq!(copied, 9);

        let mut sink = Vec::new();
        assert_eq!(blob.copy_to(&mut sink).unwrap(), 9);
        assert_eq!(sink, b"stream me");
    }

    #[test]
    fn closed_blob_rejects_streams() {
        let blob = BlobField::in_memory();
        blob.set_bytes(b"x").unwrap();
        blob.close().unwrap();
        assert!(blob.is_closed());
        assert!(matches!(
            blob.reader(),
            Err(FieldError::Closed { kind: FieldKind::Blob })
        ));
        assert!(matches!(blob.writer(), Err(FieldError::Closed { .. })));
        assert!(matches!(blob.length(), Err(FieldError::Closed { .. })));
    }

    #[test]
    fn close_is_idempotent() {
        let clob = ClobField::in_memory(TextEncoding::Utf8);
        clob.close().unwrap();
        clob.close().unwrap();
        assert!(clob.is_closed());
    }

    #[test]
    fn failed_close_still_closes_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("not-a-file");
        std::fs::create_dir(&blocked).unwrap();

        let blob = BlobField::new(FileStore::new(&blocked));
        assert!(matches!(blob.close(), Err(FieldError::Io(_))));
        assert!(blob.is_closed());
        blob.close().unwrap();
        assert!(matches!(blob.to_bytes(), Err(FieldError::Closed { .. })));
    }

    #[test]
    fn temp_file_blob_deleted_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let blob = BlobField::temp_file(Some(dir.path())).unwrap();
        blob.set_bytes(b"on disk").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        blob.close().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn clob_text_round_trip_in_each_encoding() {
        for encoding in [
            TextEncoding::Utf8,
            TextEncoding::Utf16Le,
            TextEncoding::Utf16Be,
        ] {
            let clob = ClobField::in_memory(encoding);
            clob.set_text("grüße 🦀").unwrap();
            assert_eq!(clob.to_text().unwrap(), "grüße 🦀", "{encoding}");
        }
    }

    #[test]
    fn clob_length_is_in_stored_bytes() {
        let clob = ClobField::in_memory(TextEncoding::Utf16Le);
        clob.set_text("abc").unwrap();
        assert_eq!(clob.length().unwrap(), 6);
    }

    #[test]
    fn clob_copy_text_counts_characters() {
        let clob = ClobField::in_memory(TextEncoding::Latin1);
        let copied = clob.copy_text_from(&mut "café".as_bytes()).unwrap();
        assert_eq!(copied, 4);
        assert_eq!(clob.length().unwrap(), 4);

        let mut sink = Vec::new();
        assert_eq!(clob.copy_text_to(&mut sink).unwrap(), 4);
        assert_eq!(sink, "café".as_bytes());
    }

    #[test]
    fn clob_copy_text_from_rejects_invalid_utf8() {
        let clob = ClobField::in_memory(TextEncoding::Utf8);
        let err = clob.copy_text_from(&mut &[0x61, 0xFF][..]).unwrap_err();
        assert!(matches!(err, FieldError::MalformedText { .. }));
    }

    #[test]
    fn clob_reader_spans_many_chunks() {
        let text = "ü".repeat(COPY_CHUNK);
        let clob = ClobField::in_memory(TextEncoding::Utf8);
        clob.set_text(&text).unwrap();
        assert_eq!(clob.to_text().unwrap(), text);
    }
}
