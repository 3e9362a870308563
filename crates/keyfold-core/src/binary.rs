//! Encrypted attachment payload storage.
//!
//! A [`BinaryStore`] owns a handle to one externally-allocated file and keeps
//! the bytes in it encrypted at rest, optionally zstd-compressed. Reads and
//! writes are streaming: compression is the inner (logical) layer, the
//! XChaCha20 keystream the outer (physical) layer, so physical bytes decrypt
//! first and decompress second, and writes mirror that order.
//!
//! Toggling compression rewrites the whole payload into a sibling staging
//! file and atomically renames it over the original. The original is never
//! deleted before its replacement is in place.
//!
//! Callers must serialize access per store: no two streams or transforms may
//! run against the same backing file at once.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

use crate::error::StoreError;
use crate::keys::BinaryKey;
use crate::stream::{copy_with_buffer, CipherReader, CipherWriter};

pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
pub const COMPRESSION_LEVEL: i32 = 3;

const STAGING_SUFFIX: &str = ".staging";

// ── Store ───────────────────────────────────────────────────────────────────

/// One encrypted binary payload on disk.
///
/// `compressed` describes the persisted encoding: true iff the plaintext
/// produced by decryption is a zstd frame. `protected` is a display and
/// handling hint; `corrupted` is a sticky advisory flag set after failed
/// verification. Neither changes how bytes are transformed.
///
/// Equality covers the full attribute tuple, with an unbound store (`file ==
/// None`) an explicit state, so it is total and symmetric. Two stores over
/// distinct files are unequal even when their contents match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryStore {
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    compressed: bool,
    #[serde(default)]
    protected: bool,
    #[serde(default)]
    corrupted: bool,
}

impl BinaryStore {
    /// An empty store with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store bound to a caller-allocated file path. The file need not
    /// exist yet; the first write creates it.
    pub fn with_file(path: impl Into<PathBuf>, compressed: bool, protected: bool) -> Self {
        Self {
            file: Some(path.into()),
            compressed,
            protected,
            corrupted: false,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Flag the payload as failing integrity verification. Sticky: there is
    /// no way to clear it short of rebuilding the store.
    pub fn mark_corrupted(&mut self) {
        self.corrupted = true;
    }

    /// Physical size of the backing file in bytes; 0 when unbound or the
    /// file does not exist. Never fails.
    pub fn len(&self) -> u64 {
        self.file
            .as_ref()
            .and_then(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Streams ─────────────────────────────────────────────────────────────

    /// Decrypting read stream over the physical bytes. An empty or unbound
    /// store yields an immediately-exhausted stream, not an error.
    pub fn open_reader(&self, key: &BinaryKey) -> Result<Box<dyn Read>, StoreError> {
        match &self.file {
            Some(path) if self.len() > 0 => {
                let file = File::open(path)?;
                Ok(Box::new(CipherReader::new(file, key)))
            }
            _ => Ok(Box::new(io::empty())),
        }
    }

    /// Decrypting read stream that additionally decompresses when the
    /// persisted encoding is compressed, yielding logical payload bytes.
    pub fn open_plain_reader(&self, key: &BinaryKey) -> Result<Box<dyn Read>, StoreError> {
        let reader = self.open_reader(key)?;
        if self.compressed && self.len() > 0 {
            Ok(Box::new(Decoder::new(reader)?))
        } else {
            Ok(reader)
        }
    }

    /// Encrypting write stream over the backing file. Requires a bound file;
    /// the file is created or truncated.
    pub fn open_writer(&self, key: &BinaryKey) -> Result<Box<dyn Write>, StoreError> {
        let path = self.file.as_ref().ok_or(StoreError::Unbound)?;
        let file = File::create(path)?;
        Ok(Box::new(CipherWriter::new(file, key)))
    }

    /// Encrypting write stream that first compresses the caller's bytes when
    /// the store's encoding is compressed. The compression frame is finished
    /// when the stream is dropped.
    pub fn open_plain_writer(&self, key: &BinaryKey) -> Result<Box<dyn Write>, StoreError> {
        let writer = self.open_writer(key)?;
        if self.compressed {
            Ok(Box::new(Encoder::new(writer, COMPRESSION_LEVEL)?.auto_finish()))
        } else {
            Ok(writer)
        }
    }

    // ── Transforms ──────────────────────────────────────────────────────────

    /// Re-encode the payload as compressed. No-op when already compressed or
    /// unbound. The file keeps its path identity; only its physical bytes
    /// change.
    pub fn compress(&mut self, key: &BinaryKey, buffer_size: usize) -> Result<(), StoreError> {
        if self.compressed || self.file.is_none() {
            return Ok(());
        }
        debug!(file = ?self.file, "compressing attachment payload");
        self.rewrite(key, true, buffer_size)
    }

    /// Re-encode the payload as uncompressed. No-op when not compressed or
    /// unbound.
    pub fn decompress(&mut self, key: &BinaryKey, buffer_size: usize) -> Result<(), StoreError> {
        if !self.compressed || self.file.is_none() {
            return Ok(());
        }
        debug!(file = ?self.file, "decompressing attachment payload");
        self.rewrite(key, false, buffer_size)
    }

    /// Delete the backing file. No-op when unbound; deletion failure is an
    /// error the caller must handle.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        if let Some(path) = &self.file {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    // ── Staged rewrite ──────────────────────────────────────────────────────

    /// Stream the current logical payload into a sibling staging file using
    /// the target encoding, then atomically rename it over the original.
    /// The compression flag changes only after the rename succeeds, so a
    /// failed transform leaves both the payload and its metadata untouched.
    fn rewrite(
        &mut self,
        key: &BinaryKey,
        make_compressed: bool,
        buffer_size: usize,
    ) -> Result<(), StoreError> {
        let path = match self.file.clone() {
            Some(path) => path,
            None => return Ok(()),
        };
        let staging = staging_path(&path);

        if let Err(err) = self.write_staging(key, &staging, make_compressed, buffer_size) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }

        if let Err(source) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(StoreError::Swap { path, source });
        }
        sync_parent_dir(&path)?;
        self.compressed = make_compressed;
        Ok(())
    }

    fn write_staging(
        &self,
        key: &BinaryKey,
        staging: &Path,
        make_compressed: bool,
        buffer_size: usize,
    ) -> Result<(), StoreError> {
        let mut reader = self.open_plain_reader(key)?;
        let cipher = CipherWriter::new(File::create(staging)?, key);
        let file = if make_compressed {
            let mut encoder = Encoder::new(cipher, COMPRESSION_LEVEL)?;
            copy_with_buffer(&mut reader, &mut encoder, buffer_size)?;
            encoder.finish()?.into_inner()
        } else {
            let mut cipher = cipher;
            copy_with_buffer(&mut reader, &mut cipher, buffer_size)?;
            cipher.into_inner()
        };
        file.sync_all()?;
        Ok(())
    }
}

// ── Staging housekeeping ────────────────────────────────────────────────────

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}{}", Uuid::new_v4(), STAGING_SUFFIX));
    path.with_file_name(name)
}

/// Remove leftover `*.staging` files from a rewrite interrupted by a crash.
/// Run this over an attachment directory before reusing it.
pub fn reclaim_staging(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(STAGING_SUFFIX)
            {
                warn!(path = %entry.path().display(), "removing orphaned staging file");
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        let dir = OpenOptions::new().read(true).open(parent)?;
        dir.sync_all()?;
    }
    Ok(())
}
