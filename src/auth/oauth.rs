use anyhow::{anyhow, Context};
use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::GoogleUser;
use crate::config::Settings;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &str = "profile email https://www.googleapis.com/auth/drive";
/// Used when Google does not say how long the access token lives.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

/// The authorization-code flow against Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleOAuth {
    client_id: String,
    client_secret: String,
    callback_url: String,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        GoogleOAuth {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: callback_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// `None` unless both client id and secret are configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        if !settings.oauth_configured() {
            return None;
        }
        Some(GoogleOAuth::new(
            settings.google_client_id.clone()?,
            settings.google_client_secret.clone()?,
            settings.google_callback_url.clone(),
        ))
    }

    /// Consent page URL. Offline access with a forced consent prompt, so
    /// Google hands out a refresh token every time.
    pub fn authorize_url(&self, state: &str) -> anyhow::Result<Url> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> anyhow::Result<GoogleUser> {
        let tokens: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("token request failed")?
            .error_for_status()
            .context("token endpoint rejected the code")?
            .json()
            .await
            .context("could not parse token response")?;
        debug!("exchange_code: got tokens, expires_in: {:?}", tokens.expires_in);

        let info: UserInfo = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .context("userinfo request failed")?
            .error_for_status()?
            .json()
            .await
            .context("could not parse userinfo")?;
        if info.sub.is_empty() {
            return Err(anyhow!("userinfo has no subject"));
        }

        let lifetime = tokens.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let mut user = GoogleUser::new(
            info.sub,
            info.email,
            info.name,
            tokens.access_token,
            Duration::seconds(lifetime),
        );
        user.picture = info.picture;
        user.refresh_token = tokens.refresh_token;
        Ok(user)
    }
}
