//! Blob and clob values at the JSON text boundary.
//!
//! The surrounding JSON writer positions its output at a value and hands
//! the raw sink to [`FieldAdapter::write_blob`] or
//! [`FieldAdapter::write_clob`], which emit one complete JSON value:
//! a quoted base64 string, a quoted escaped string, or `null`.
//!
//! On the way in, the JSON reader hands over the unescaped content of a
//! string token as a byte source (or `None` for a JSON `null`).
//! [`FieldAdapter::read_blob`] and [`FieldAdapter::read_clob`] create a
//! new field, register it in a scope, and stream the content into it.
//!
//! ```text
//!   write:  BlobField ─▶ Base64Encoder ─▶ ValueWriter(quoted, raw)    ─▶ sink
//!           ClobField ─▶ ClobReader    ─▶ ValueWriter(quoted, escape) ─▶ sink
//!   read:   source    ─▶ Base64Decoder ─▶ BlobField writer
//!           source    ─▶ UTF-8 decode  ─▶ ClobField writer
//! ```

use std::io::{self, Read, Write};
use std::sync::Arc;

use jsonlob_codec::{Base64Decoder, Base64Encoder, EncoderConfig, ValueWriter, ValueWriterOptions};
use jsonlob_fields::{
    BlobField, ClobField, FieldFactory, Scope, StreamingField, TempFileFactory, TextEncoding,
};
use tracing::debug;

use crate::config::AdapterConfig;
use crate::error::AdapterError;

const CHUNK: usize = 8 * 1024;

const NULL: &[u8] = b"null";

fn read_chunk(source: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            result => return result,
        }
    }
}

/// Reads and writes blob/clob values under one [`AdapterConfig`].
#[derive(Debug)]
pub struct FieldAdapter<F = TempFileFactory> {
    config: AdapterConfig,
    encoder: EncoderConfig,
    encoding: TextEncoding,
    factory: F,
}

impl FieldAdapter<TempFileFactory> {
    /// An adapter whose fields are temp files in `config.temp_dir`.
    ///
    /// # Errors
    ///
    /// [`AdapterError::InvalidConfig`] for an unsupported encoding.
    pub fn new(config: AdapterConfig) -> Result<Self, AdapterError> {
        let factory = match &config.temp_dir {
            Some(dir) => TempFileFactory::in_dir(dir),
            None => TempFileFactory::new(),
        };
        Self::with_factory(config, factory)
    }
}

impl<F: FieldFactory> FieldAdapter<F> {
    /// # Errors
    ///
    /// [`AdapterError::InvalidConfig`] for an unsupported encoding.
    pub fn with_factory(config: AdapterConfig, factory: F) -> Result<Self, AdapterError> {
        let encoding = config.text_encoding()?;
        let encoder = config.encoder_config();
        Ok(Self {
            config,
            encoder,
            encoding,
            factory,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    // ── Write path ─────────────────────────────────────────────────────

    /// Write `blob` as a quoted base64 string, or `null`.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Field`] if the blob is closed or its store fails,
    /// otherwise the sink's error.
    pub fn write_blob<W: Write>(&self, blob: Option<&BlobField>, mut out: W) -> Result<(), AdapterError> {
        let Some(blob) = blob else {
            out.write_all(NULL)?;
            return Ok(());
        };

        let mut source = blob.reader()?;
        let value = ValueWriter::new(out, ValueWriterOptions::QUOTED_RAW)?;
        let mut encoder = Base64Encoder::new(value, self.encoder.clone())?;
        let mut buf = vec![0; CHUNK];
        let mut total = 0usize;
        loop {
            let n = read_chunk(&mut source, &mut buf)?;
            if n == 0 {
                break;
            }
            encoder.write_bytes(&buf[..n])?;
            total += n;
        }
        encoder.finish()?.finish()?;
        debug!(bytes = total, "blob value written");
        Ok(())
    }

    /// Write `clob` as a quoted, escaped JSON string, or `null`.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Field`] if the clob is closed, its store fails, or
    /// its bytes are not valid in its encoding; otherwise the sink's error.
    pub fn write_clob<W: Write>(&self, clob: Option<&ClobField>, mut out: W) -> Result<(), AdapterError> {
        let Some(clob) = clob else {
            out.write_all(NULL)?;
            return Ok(());
        };

        let mut source = clob.reader()?;
        let mut value = ValueWriter::new(out, self.config.clob_options())?;
        let mut text = String::new();
        loop {
            text.clear();
            if source.read_chunk(&mut text)? == 0 {
                break;
            }
            value.write_str(&text)?;
        }
        value.close()?;
        debug!(encoding = %clob.encoding(), "clob value written");
        Ok(())
    }

    // ── Read path ──────────────────────────────────────────────────────

    /// Decode base64 string content into a new blob.
    ///
    /// `None` (a JSON `null`) creates nothing. Otherwise the blob is
    /// registered in `scope`, or the thread's current scope when `scope`
    /// is `None`. A blob whose content fails to decode is released before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Codec`] for malformed base64, [`AdapterError::Field`]
    /// when the blob cannot be created or written, [`AdapterError::Io`]
    /// when `value` fails.
    pub fn read_blob<R: Read>(
        &self,
        value: Option<R>,
        scope: Option<&Scope>,
    ) -> Result<Option<Arc<BlobField>>, AdapterError> {
        let Some(mut source) = value else {
            return Ok(None);
        };
        let blob = self.factory.create_blob_in(scope)?;
        match fill_blob(&blob, &mut source) {
            Ok(()) => {
                debug!(bytes = blob.length().unwrap_or(0), "blob value read");
                Ok(Some(blob))
            }
            Err(e) => Err(discard(blob.as_ref(), e)),
        }
    }

    /// Store string content in a new clob, in the configured encoding.
    ///
    /// Null handling, registration, and cleanup on failure follow
    /// [`read_blob`](Self::read_blob).
    ///
    /// # Errors
    ///
    /// [`AdapterError::Field`] when the clob cannot be created or written,
    /// or when `value` is not UTF-8.
    pub fn read_clob<R: Read>(
        &self,
        value: Option<R>,
        scope: Option<&Scope>,
    ) -> Result<Option<Arc<ClobField>>, AdapterError> {
        let Some(mut source) = value else {
            return Ok(None);
        };
        let clob = self.factory.create_clob_in(scope, self.encoding)?;
        match clob.copy_text_from(&mut source) {
            Ok(chars) => {
                debug!(chars, encoding = %self.encoding, "clob value read");
                Ok(Some(clob))
            }
            Err(e) => Err(discard(clob.as_ref(), e.into())),
        }
    }
}

fn fill_blob(blob: &BlobField, source: &mut dyn Read) -> Result<(), AdapterError> {
    let mut decoder = Base64Decoder::new(blob.writer()?);
    let mut buf = vec![0; CHUNK];
    loop {
        let n = read_chunk(source, &mut buf)?;
        if n == 0 {
            break;
        }
        decoder.write_text(&buf[..n])?;
    }
    decoder.close()?;
    Ok(())
}

/// Release a half-filled field and pass the original error on.
fn discard(field: &dyn StreamingField, error: AdapterError) -> AdapterError {
    if let Err(release) = field.close() {
        tracing::warn!(kind = %field.kind(), error = %release, "failed to release partial field");
    }
    error
}
