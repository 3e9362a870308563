//! Keyfold core: encrypted attachment storage and credential records.
//!
//! Attachments are kept encrypted at rest and optionally compressed, read
//! and written as streams rather than resident buffers. Credential records
//! own the attachments and custom fields and carry the merge policies that
//! keep field names unique.

pub mod binary;
pub mod entry;
pub mod error;
pub mod keys;
pub mod protected;
pub mod stream;

pub use binary::{reclaim_staging, BinaryStore, COMPRESSION_LEVEL, DEFAULT_BUFFER_SIZE};
pub use entry::{
    Attachment, EntryRecord, Field, OtpConfig, OtpKind, SearchInfo, APPLICATION_ID_FIELD,
    OTP_TOKEN_FIELD, WEB_DOMAIN_FIELD,
};
pub use error::StoreError;
pub use keys::{BinaryKey, KeySession, IV_LEN, KEY_LEN};
pub use protected::ProtectedValue;
pub use stream::{CipherReader, CipherWriter};
