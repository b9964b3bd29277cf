use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum_extra::extract::cookie::{Cookie, SameSite};
use cookie::time::Duration as CookieDuration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::auth::GoogleUser;
use crate::config::MAX_SESSION_TTL_SECS;

pub const SESSION_COOKIE: &str = "drive_manager.sid";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
struct SessionEntry {
    user: GoogleUser,
    expires_at: Instant,
}

/// In-memory sessions, addressed by a signed cookie value of the form
/// `<uuid>.<hex hmac-sha256>`.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl SessionStore {
    /// `ttl` is capped at [`MAX_SESSION_TTL_SECS`].
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            secret: Arc::from(secret.as_ref()),
            ttl: ttl.min(Duration::from_secs(MAX_SESSION_TTL_SECS)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `user` under a fresh session and returns the signed cookie value.
    pub async fn create(&self, user: GoogleUser) -> String {
        let id = Uuid::new_v4().to_string();
        debug!("create session for {}", user.email);
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            id.clone(),
            SessionEntry {
                user,
                expires_at: now + self.ttl,
            },
        );
        self.sign(&id)
    }

    /// The user behind a cookie value, if the signature holds and the session is live.
    pub async fn user(&self, cookie_value: &str) -> Option<GoogleUser> {
        let id = self.verify(cookie_value)?;
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.user.clone());
                }
                None => return None,
                Some(_) => {}
            }
        }
        trace!("session expired, pruning");
        self.sessions.write().await.remove(id);
        None
    }

    pub async fn destroy(&self, cookie_value: &str) {
        if let Some(id) = self.verify(cookie_value) {
            self.sessions.write().await.remove(id);
        }
    }

    pub fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(
                i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX),
            ))
            .build()
    }

    pub fn removal_cookie() -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE).path("/").build()
    }
}

impl SessionStore {
    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length")
    }

    fn sign(&self, id: &str) -> String {
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        format!("{}.{}", id, hex::encode(mac.finalize().into_bytes()))
    }

    fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (id, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id)
    }
}
