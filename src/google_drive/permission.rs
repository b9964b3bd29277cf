use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::google_drive::DriveId;

/// Roles a user can be granted through sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Commenter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Reader
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(Role::Reader),
            "writer" => Ok(Role::Writer),
            "commenter" => Ok(Role::Commenter),
            other => Err(anyhow!("unknown role: {}", other)),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sharing grant on an entry.
///
/// `role` stays a string here: listings also contain grants this crate never
/// creates itself (`owner`, `organizer`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    #[serde(rename = "type")]
    pub grantee_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub file_id: DriveId,
    pub email_address: String,
    pub role: Role,
    pub send_notification: bool,
}
