//! Credential records: the aggregate owning custom fields and attachments.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::binary::BinaryStore;
use crate::error::StoreError;
use crate::protected::ProtectedValue;

/// Reserved field name for an automatically captured web domain.
pub const WEB_DOMAIN_FIELD: &str = "WebDomain";
/// Reserved field name for an automatically captured application identifier.
pub const APPLICATION_ID_FIELD: &str = "ApplicationId";
/// Field name under which a generated one-time-password token is surfaced.
pub const OTP_TOKEN_FIELD: &str = "OTP";

// ── Fields ──────────────────────────────────────────────────────────────────

/// A named value attached to a record.
///
/// Name uniqueness within a record is a policy enforced by
/// [`EntryRecord::add_unique_field`], not by this type; constructing a
/// duplicate-named field is allowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    name: String,
    value: ProtectedValue,
}

impl Field {
    /// Create a field. An empty name is a contract violation and is
    /// rejected here rather than surfacing later during merge.
    pub fn new(name: impl Into<String>, value: ProtectedValue) -> Result<Self, StoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::EmptyFieldName);
        }
        Ok(Self { name, value })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ProtectedValue {
        &self.value
    }
}

// ── Attachments ─────────────────────────────────────────────────────────────

/// A named binary payload carried by a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub binary: BinaryStore,
}

impl Attachment {
    pub fn new(name: impl Into<String>, binary: BinaryStore) -> Self {
        Self {
            name: name.into(),
            binary,
        }
    }
}

// ── One-time passwords ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpKind {
    Totp,
    Hotp,
}

/// One-time-password configuration carried by a record. Token generation is
/// handled elsewhere; this is configuration only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OtpConfig {
    pub kind: OtpKind,
    pub secret: ProtectedValue,
    #[serde(default = "default_otp_digits")]
    pub digits: u32,
    #[serde(default = "default_otp_period")]
    pub period_secs: u32,
    #[serde(default)]
    pub counter: u64,
}

fn default_otp_digits() -> u32 {
    6
}

fn default_otp_period() -> u32 {
    30
}

// ── Search metadata ─────────────────────────────────────────────────────────

/// Match metadata captured outside the record (form fill, app association).
/// At most one of `web_domain` / `application_id` is expected per capture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchInfo {
    pub web_domain: Option<String>,
    pub web_scheme: Option<String>,
    pub application_id: Option<String>,
}

// ── Record ──────────────────────────────────────────────────────────────────

/// One stored secret: credentials, notes, ordered custom fields and
/// attachments. Decoding tolerates missing fields by falling back to type
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon_id: u32,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub expires: bool,
    #[serde(default = "default_expiry")]
    pub expiry_time: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub custom_fields: Vec<Field>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub otp: Option<OtpConfig>,
}

fn default_expiry() -> DateTime<Utc> {
    Utc::now() + Months::new(1)
}

impl Default for EntryRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            icon_id: 0,
            username: String::new(),
            password: String::new(),
            expires: false,
            expiry_time: default_expiry(),
            url: String::new(),
            notes: String::new(),
            custom_fields: Vec::new(),
            attachments: Vec::new(),
            otp: None,
        }
    }
}

impl EntryRecord {
    /// A fresh record with a generated identity.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    pub fn has_protected_fields(&self) -> bool {
        self.custom_fields.iter().any(|f| f.value.is_protected())
    }

    pub fn has_unprotected_fields(&self) -> bool {
        self.custom_fields.iter().any(|f| !f.value.is_protected())
    }

    /// True for fields whose value is produced by the record itself rather
    /// than entered by the user.
    pub fn is_auto_generated(field: &Field) -> bool {
        field.name == OTP_TOKEN_FIELD
    }

    /// Value of the last field with the given label, if any.
    pub fn field_value(&self, label: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .rev()
            .find(|f| f.name == label)
            .map(|f| f.value.value())
    }

    /// Merge a field into the record without clobbering existing data.
    ///
    /// Probes `name`, `name1`, `name2`, ... and appends the field under the
    /// first unused name. An existing field holding the same value under a
    /// probed name ends the merge with no change. The probe count is bounded
    /// by the current field count plus one: names along the probe sequence
    /// are unique, so a free slot must occur within that range.
    pub fn add_unique_field(&mut self, field: Field) {
        let Field { name, value } = field;
        let max_probe = self.custom_fields.len() + 1;
        for suffix in 0..=max_probe {
            let candidate = if suffix == 0 {
                name.clone()
            } else {
                format!("{name}{suffix}")
            };
            match self.custom_fields.iter().find(|f| f.name == candidate) {
                Some(existing) => {
                    if existing.value == value {
                        return;
                    }
                }
                None => {
                    self.custom_fields.push(Field {
                        name: candidate,
                        value,
                    });
                    return;
                }
            }
        }
    }

    /// Fold captured search metadata into the record. A web domain lands in
    /// the URL when custom fields are disallowed or the URL is still empty,
    /// and in a reserved custom field otherwise. An application identifier
    /// only ever lands in a reserved custom field. The domain branch wins
    /// when both happen to be supplied.
    pub fn save_search_metadata(&mut self, allow_custom_fields: bool, info: &SearchInfo) {
        if let Some(domain) = info.web_domain.as_deref() {
            if !allow_custom_fields || self.url.is_empty() {
                let scheme = info
                    .web_scheme
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .unwrap_or("http");
                self.url = format!("{scheme}://{domain}");
            } else {
                self.add_unique_field(reserved_field(WEB_DOMAIN_FIELD, domain));
            }
        } else if let Some(app_id) = info.application_id.as_deref() {
            if allow_custom_fields {
                self.add_unique_field(reserved_field(APPLICATION_ID_FIELD, app_id));
            }
        }
    }

    // ── Transport ───────────────────────────────────────────────────────────

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn reserved_field(name: &str, value: &str) -> Field {
    Field {
        name: name.to_string(),
        value: ProtectedValue::plain(value),
    }
}
