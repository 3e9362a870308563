//! Session key material for the binary cipher suite.
//!
//! Attachments are encrypted with XChaCha20 (32-byte key, 24-byte IV). The
//! key pair lives for one unlocked session: the application loads it into a
//! [`KeySession`] after unlock and unloads it on lock, which zeroizes the key
//! bytes. Store operations borrow a [`BinaryKey`] per call and never keep it.

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::StoreError;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 24;

/// One (key, IV) pair for the attachment cipher.
#[derive(Clone)]
pub struct BinaryKey {
    key: Zeroizing<[u8; KEY_LEN]>,
    iv: [u8; IV_LEN],
}

impl BinaryKey {
    /// Generate a fresh random key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    pub fn from_parts(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv,
        }
    }

    pub(crate) fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub(crate) fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}

impl fmt::Debug for BinaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryKey").finish_non_exhaustive()
    }
}

/// Process-wide holder for the session's binary key.
///
/// Clone to share across components. Locking the session drops the key,
/// zeroizing it in memory.
#[derive(Clone, Default)]
pub struct KeySession {
    inner: Arc<RwLock<Option<BinaryKey>>>,
}

impl KeySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, key: BinaryKey) {
        *self.inner.write() = Some(key);
    }

    pub fn unload(&self) {
        *self.inner.write() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }

    /// The current session key, or [`StoreError::SessionLocked`] when the
    /// session has not been unlocked.
    pub fn binary_key(&self) -> Result<BinaryKey, StoreError> {
        self.inner.read().clone().ok_or(StoreError::SessionLocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_session_yields_error() {
        let session = KeySession::new();
        assert!(matches!(
            session.binary_key(),
            Err(StoreError::SessionLocked)
        ));
    }

    #[test]
    fn load_unload_lifecycle() {
        let session = KeySession::new();
        session.load(BinaryKey::generate());
        assert!(session.is_loaded());
        assert!(session.binary_key().is_ok());
        session.unload();
        assert!(!session.is_loaded());
        assert!(session.binary_key().is_err());
    }

    #[test]
    fn from_parts_is_deterministic() {
        let a = BinaryKey::from_parts([0x42; KEY_LEN], [0x24; IV_LEN]);
        let b = BinaryKey::from_parts([0x42; KEY_LEN], [0x24; IV_LEN]);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.iv(), b.iv());
    }

    #[test]
    fn generated_keys_are_distinct() {
        let a = BinaryKey::generate();
        let b = BinaryKey::generate();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.iv(), b.iv());
    }
}
