use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::auth::{GoogleUser, SESSION_COOKIE};
use crate::server::{ApiError, AppState};

/// The session's user. Rejects with 401 when there is no valid session, so
/// listing it first in a handler gates the whole route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub GoogleUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let value = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(ApiError::unauthorized)?;
        let user = state
            .sessions
            .user(&value)
            .await
            .ok_or_else(ApiError::unauthorized)?;
        Ok(AuthUser(user))
    }
}

/// JSON request body whose failures answer `400 {"message"}` like every
/// other validation error. A missing or blank body reads as `{}`, so the
/// handler reports which field is required. The content type is not checked.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let parsed = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_slice(b"{}")
        } else {
            serde_json::from_slice(&bytes)
        };
        parsed
            .map(JsonBody)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
    }
}
