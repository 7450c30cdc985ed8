//! Cookie sessions and the extractors that resolve them.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use url::form_urlencoded;

use crate::{
    application::{
        auth::{AuthError, IssuedSession},
        error::HttpError,
    },
    domain::entities::UserRecord,
    presentation::views::LayoutChrome,
};

use super::{HttpState, found};

pub const LOGIN_PATH: &str = "/auth/login/";

/// Name and flags of the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for SessionCookieSettings {
    fn default() -> Self {
        Self {
            name: "yatube_session".to_string(),
            secure: false,
        }
    }
}

impl SessionCookieSettings {
    pub fn issue(
        &self,
        jar: CookieJar,
        session: &IssuedSession,
        max_age: time::Duration,
    ) -> CookieJar {
        let cookie = Cookie::build((self.name.clone(), session.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(max_age);
        jar.add(cookie)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(self.name.clone()).path("/"))
    }
}

/// A logged-in user together with the cookie token that identified them.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: UserRecord,
    pub token: String,
}

/// Any visitor; `session` is set when the cookie resolves to an active user.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub session: Option<AuthenticatedUser>,
    pub path: String,
}

impl Visitor {
    pub fn user(&self) -> Option<&UserRecord> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome::new(self.user(), &self.path)
    }
}

/// A visitor that must be logged in; anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: AuthenticatedUser,
    pub path: String,
}

impl SignedIn {
    pub fn user(&self) -> &UserRecord {
        &self.session.user
    }

    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome::new(Some(&self.session.user), &self.path)
    }
}

impl FromRequestParts<HttpState> for Visitor {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session = match jar.get(&state.session_cookie.name) {
            Some(cookie) => {
                let token = cookie.value().to_string();
                state
                    .auth
                    .authenticate(&token)
                    .await
                    .map_err(session_lookup_failed)?
                    .map(|user| AuthenticatedUser { user, token })
            }
            None => None,
        };

        Ok(Self {
            session,
            path: parts.uri.path().to_string(),
        })
    }
}

impl FromRequestParts<HttpState> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let visitor = Visitor::from_request_parts(parts, state).await?;
        match visitor.session {
            Some(session) => Ok(Self {
                session,
                path: visitor.path,
            }),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(found(&login_redirect_target(next)))
            }
        }
    }
}

fn session_lookup_failed(err: AuthError) -> Response {
    HttpError::from_error(
        "infra::http::session::Visitor",
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        &err,
    )
    .into_response()
}

/// `/auth/login/?next=...`, keeping slashes readable.
pub fn login_redirect_target(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

/// Accept only local absolute paths as post-login destinations.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    // Browsers drop tabs and newlines inside URLs, so `/\t/host` would become `//host`.
    let is_local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.chars().any(|c| c.is_ascii_control());
    is_local.then(|| next.to_string())
}
