use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in Google account together with its Drive access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When `access_token` stops being accepted. Tokens are not refreshed;
    /// past this point the user has to sign in again.
    pub expires_at: DateTime<Utc>,
}

impl GoogleUser {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        access_token: impl Into<String>,
        valid_for: Duration,
    ) -> Self {
        GoogleUser {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            picture: String::new(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: Utc::now() + valid_for,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

#[cfg(test)]
impl GoogleUser {
    pub(crate) fn for_tests() -> Self {
        GoogleUser::new(
            "test-user-id-123",
            "test.user@example.com",
            "Test User",
            "mock-access-token",
            Duration::hours(1),
        )
    }
}

impl Debug for GoogleUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// What `GET /api/auth/user` returns. Tokens never leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}
