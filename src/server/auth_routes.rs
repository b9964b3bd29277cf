use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{SessionStore, UserProfile, SESSION_COOKIE};
use crate::server::{ApiError, AppState, AuthUser};

const STATE_COOKIE: &str = "drive_manager.oauth_state";
const STATE_COOKIE_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /api/auth/google`
#[instrument(skip_all)]
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let oauth = state.oauth.as_ref().ok_or(ApiError::OAuthUnavailable)?;
    let csrf = Uuid::new_v4().to_string();
    let url = oauth
        .authorize_url(&csrf)
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    let cookie = Cookie::build((STATE_COOKIE, csrf))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::minutes(STATE_COOKIE_MINUTES))
        .build();
    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

/// `GET /api/auth/google/callback`
#[instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(oauth) = state.oauth.as_ref() else {
        return Redirect::to("/?error=oauth_not_configured").into_response();
    };
    if let Some(error) = &query.error {
        warn!("google_callback: consent failed: {}", error);
        return Redirect::to("/").into_response();
    }
    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/").build());
    let (Some(code), Some(returned)) = (&query.code, &query.state) else {
        warn!("google_callback: missing code or state");
        return (jar, Redirect::to("/")).into_response();
    };
    if expected.as_deref() != Some(returned.as_str()) {
        warn!("google_callback: state mismatch");
        return (jar, Redirect::to("/")).into_response();
    }

    match oauth.exchange_code(code).await {
        Ok(user) => {
            info!("signed in: {}", user.email);
            let value = state.sessions.create(user).await;
            let jar = jar.add(state.sessions.cookie(value));
            (jar, Redirect::to("/")).into_response()
        }
        Err(e) => {
            warn!("google_callback: code exchange failed: {:#}", e);
            (jar, Redirect::to("/")).into_response()
        }
    }
}

/// `GET /api/auth/user`
pub async fn current_user(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user.profile())
}

/// `GET /api/auth/logout`
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await;
    }
    (jar.remove(SessionStore::removal_cookie()), Redirect::to("/"))
}
