use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{
    AppState,
    entities::user,
    error::{AppError, AppResult},
};

pub const SESSION_COOKIE: &str = "session";

/// Whoever is making the request: a signed-in user or nobody.
///
/// Pages authenticate with the `session` cookie, API clients with
/// `Authorization: Bearer <token>`; both carry the same session token.
#[derive(Clone, Debug)]
pub struct Viewer(pub Option<user::Model>);

impl Viewer {
    pub fn id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.id)
    }

    pub fn user(&self) -> Option<&user::Model> {
        self.0.as_ref()
    }

    pub fn require(&self) -> AppResult<&user::Model> {
        self.0.as_ref().ok_or_else(AppError::login_required)
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers).get(SESSION_COOKIE).map(|c| c.value().to_string())
}

impl FromRequestParts<Arc<AppState>> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(Viewer(None));
        };
        Ok(Viewer(state.accounts.session_user(&token).await?))
    }
}
