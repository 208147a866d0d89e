use serde::{Deserialize, Serialize};

/// Opaque identifier selecting a stimulus variant (clip name, scene number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(String);

impl Condition {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Self(s)
    }
}
