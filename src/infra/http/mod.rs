mod about;
mod middleware;
mod posts;
pub mod session;
mod users;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header::LOCATION},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use sqlx::Error as SqlxError;

use crate::{
    application::{
        auth::{AuthError, AuthService},
        error::{ErrorReport, HttpError},
        posts::{PostError, PostService},
        repos::RepoError,
    },
    infra::db::PostgresRepositories,
    presentation::views::render_not_found_response,
};

use self::{
    middleware::{log_responses, set_request_context},
    session::{SessionCookieSettings, Visitor},
};

/// Liveness probe for the backing database.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn ping(&self) -> Result<(), SqlxError>;
}

#[async_trait]
impl DatabaseProbe for PostgresRepositories {
    async fn ping(&self) -> Result<(), SqlxError> {
        self.health_check().await
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    pub auth: Arc<AuthService>,
    pub db: Arc<dyn DatabaseProbe>,
    pub session_cookie: SessionCookieSettings,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .merge(posts::routes())
        .merge(users::routes())
        .merge(about::routes())
        .route("/_health/db", get(db_health))
        .route("/static/{*path}", get(crate::infra::assets::serve_static))
        .fallback(fallback)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.ping().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Every page route, used to decide whether a slashless path deserves a redirect.
const PAGE_ROUTES: &[&str] = &[
    "/",
    "/group/{slug}/",
    "/profile/{username}/",
    "/posts/{post_id}/",
    "/create/",
    "/posts/{post_id}/edit/",
    "/auth/signup/",
    "/auth/login/",
    "/auth/logout/",
    "/auth/password_change/",
    "/auth/password_change/done/",
    "/auth/password_reset/",
    "/auth/password_reset/done/",
    "/auth/reset/{uidb64}/{token}/",
    "/auth/reset/done/",
    "/about/author/",
    "/about/tech/",
];

/// Unknown routes: paths that only miss their trailing slash are redirected,
/// everything else gets the 404 page.
async fn fallback(visitor: Visitor, request: Request<Body>) -> Response {
    let method = request.method();
    if (method == Method::GET || method == Method::HEAD)
        && let Some(target) = slashed_location(request.uri().path(), request.uri().query())
    {
        return redirect_with(StatusCode::MOVED_PERMANENTLY, &target);
    }
    render_not_found_response(visitor.chrome())
}

fn slashed_location(path: &str, query: Option<&str>) -> Option<String> {
    if path.ends_with('/') {
        return None;
    }
    let slashed = format!("{path}/");
    if !PAGE_ROUTES
        .iter()
        .any(|pattern| route_matches(pattern, &slashed))
    {
        return None;
    }
    Some(match query {
        Some(query) => format!("{slashed}?{query}"),
        None => slashed,
    })
}

/// Segment-wise match where `{name}` stands for any non-empty segment.
fn route_matches(pattern: &str, path: &str) -> bool {
    let mut expected = pattern.split('/');
    let mut actual = path.split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(want), Some(got)) => {
                let placeholder = want.starts_with('{') && want.ends_with('}');
                if (placeholder && got.is_empty()) || (!placeholder && want != got) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// 302 redirect.
pub(crate) fn found(location: &str) -> Response {
    redirect_with(StatusCode::FOUND, location)
}

fn redirect_with(status: StatusCode, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = status.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(err) => HttpError::from_error(
            "infra::http::redirect",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Failures that the handlers do not turn into pages of their own.
pub(crate) fn post_error_to_http(source: &'static str, err: PostError) -> HttpError {
    match err {
        PostError::Repo(err) => repo_error_to_http(source, err),
        other => HttpError::internal(source, &other),
    }
}

pub(crate) fn auth_error_to_http(source: &'static str, err: AuthError) -> HttpError {
    match err {
        AuthError::Repo(err) => repo_error_to_http(source, err),
        other => HttpError::internal(source, &other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_is_appended_to_page_paths() {
        assert_eq!(slashed_location("/about/tech", None).as_deref(), Some("/about/tech/"));
        assert_eq!(
            slashed_location("/group/cats", Some("page=2")).as_deref(),
            Some("/group/cats/?page=2")
        );
        assert_eq!(
            slashed_location("/profile/anna.k", None).as_deref(),
            Some("/profile/anna.k/")
        );
        assert_eq!(slashed_location("/favicon.ico", None), None);
        assert_eq!(slashed_location("/create/", None), None);
    }

    #[test]
    fn unknown_paths_are_not_redirected() {
        assert_eq!(slashed_location("/no-such-page", None), None);
        assert_eq!(slashed_location("/group", None), None);
        assert_eq!(slashed_location("/posts/1/comments", None), None);
    }

    #[test]
    fn placeholders_need_a_segment() {
        assert!(route_matches("/posts/{post_id}/edit/", "/posts/7/edit/"));
        assert!(!route_matches("/posts/{post_id}/edit/", "/posts//edit/"));
        assert!(!route_matches("/posts/{post_id}/", "/posts/7/edit/"));
        assert!(route_matches("/", "/"));
    }

    #[test]
    fn db_health_maps_errors_to_503() {
        assert_eq!(db_health_response(Ok(())).status(), StatusCode::NO_CONTENT);
        let response = db_health_response(Err(SqlxError::PoolTimedOut));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
