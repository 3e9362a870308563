use serde::{Deserialize, Serialize};
use std::fmt;

/// A string value tagged with a sensitivity flag.
///
/// The flag classifies the value for calling code (UI masking, clipboard
/// handling). It does not change how the value is persisted; encryption of
/// stored bytes is handled by the binary store regardless of this flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtectedValue {
    #[serde(default)]
    protected: bool,
    #[serde(default)]
    value: String,
}

impl ProtectedValue {
    pub fn new(protected: bool, value: impl Into<String>) -> Self {
        Self {
            protected,
            value: value.into(),
        }
    }

    /// A non-sensitive value.
    pub fn plain(value: impl Into<String>) -> Self {
        Self::new(false, value)
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ProtectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
