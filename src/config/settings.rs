use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_SESSION_SECRET: &str = "google-drive-manager-secret";
/// Upper bound for `--session-ttl-secs`: one year.
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Server configuration. Every option can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "drive_manager", about = "Browse and manage a Google Drive over HTTP")]
pub struct Settings {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:5000")]
    pub bind_address: SocketAddr,

    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Where Google redirects after consent
    #[arg(
        long,
        env = "GOOGLE_CALLBACK_URL",
        default_value = "http://localhost:5000/api/auth/google/callback"
    )]
    pub google_callback_url: String,

    /// Key used to sign session cookies
    #[arg(long, env = "SESSION_SECRET", default_value = DEFAULT_SESSION_SECRET, hide_env_values = true)]
    pub session_secret: String,

    /// How long a session stays valid, in seconds
    #[arg(
        long,
        env = "SESSION_TTL_SECS",
        default_value_t = 86_400,
        value_parser = clap::value_parser!(u64).range(..=MAX_SESSION_TTL_SECS)
    )]
    pub session_ttl_secs: u64,
}

impl Settings {
    pub fn oauth_configured(&self) -> bool {
        matches!(
            (&self.google_client_id, &self.google_client_secret),
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty()
        )
    }
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

impl Display for Settings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Settings {{ bind: {}, oauth: {}, session_ttl: {}s }}",
            self.bind_address,
            self.oauth_configured(),
            self.session_ttl_secs
        )
    }
}
