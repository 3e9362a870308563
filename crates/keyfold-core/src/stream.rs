//! Cipher stream adapters.
//!
//! [`CipherReader`] and [`CipherWriter`] wrap any `Read`/`Write` and apply an
//! XChaCha20 keystream to bytes as they pass through. Every adapter owns its
//! own cipher instance, constructed from the session key at creation, so
//! concurrent streams never share transform state.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{Key, XChaCha20, XNonce};
use std::io::{self, Read, Write};

use crate::keys::BinaryKey;

fn cipher_for(key: &BinaryKey) -> XChaCha20 {
    XChaCha20::new(Key::from_slice(key.key()), XNonce::from_slice(key.iv()))
}

/// Decrypts bytes pulled from the inner reader.
pub struct CipherReader<R> {
    inner: R,
    cipher: XChaCha20,
}

impl<R: Read> CipherReader<R> {
    pub fn new(inner: R, key: &BinaryKey) -> Self {
        Self {
            inner,
            cipher: cipher_for(key),
        }
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

/// Encrypts bytes before handing them to the inner writer.
pub struct CipherWriter<W> {
    inner: W,
    cipher: XChaCha20,
}

impl<W: Write> CipherWriter<W> {
    pub fn new(inner: W, key: &BinaryKey) -> Self {
        Self {
            inner,
            cipher: cipher_for(key),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut chunk = buf.to_vec();
        self.cipher.apply_keystream(&mut chunk);
        self.inner.write_all(&chunk)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy `reader` into `writer` with a caller-sized buffer.
pub(crate) fn copy_with_buffer<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn keystream_roundtrip() {
        let key = BinaryKey::generate();
        let plaintext = b"the quick brown fox jumps over the lazy dog";

        let mut writer = CipherWriter::new(Vec::new(), &key);
        writer.write_all(plaintext).unwrap();
        let ciphertext = writer.into_inner();
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let mut reader = CipherReader::new(Cursor::new(ciphertext), &key);
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn fresh_context_per_adapter() {
        // Two writers over the same key must produce identical ciphertext:
        // each starts its keystream from the beginning.
        let key = BinaryKey::generate();
        let mut first = CipherWriter::new(Vec::new(), &key);
        first.write_all(b"payload").unwrap();
        let mut second = CipherWriter::new(Vec::new(), &key);
        second.write_all(b"payload").unwrap();
        assert_eq!(first.into_inner(), second.into_inner());
    }

    #[test]
    fn wrong_key_garbles_output() {
        let mut writer = CipherWriter::new(Vec::new(), &BinaryKey::generate());
        writer.write_all(b"attachment bytes").unwrap();
        let ciphertext = writer.into_inner();

        let mut reader = CipherReader::new(Cursor::new(ciphertext), &BinaryKey::generate());
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();
        assert_ne!(&decrypted[..], b"attachment bytes");
    }

    #[test]
    fn copy_honors_tiny_buffers() {
        let data: Vec<u8> = (0..=255).collect();
        let mut out = Vec::new();
        let copied = copy_with_buffer(&mut Cursor::new(&data), &mut out, 3).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }
}
