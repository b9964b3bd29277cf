use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Alias Drive accepts for the top-level folder of "My Drive".
pub const ROOT_ALIAS: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    pub fn root() -> DriveId {
        DriveId(ROOT_ALIAS.to_string())
    }
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ALIAS
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
}

impl DriveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<String> for DriveId {
    fn from(value: String) -> Self {
        DriveId(value)
    }
}
impl From<&str> for DriveId {
    fn from(s: &str) -> Self {
        DriveId(s.to_string())
    }
}
impl From<&DriveId> for DriveId {
    fn from(id: &DriveId) -> Self {
        id.clone()
    }
}
impl From<DriveId> for String {
    fn from(value: DriveId) -> Self {
        value.0
    }
}

impl AsRef<str> for DriveId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for DriveId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
