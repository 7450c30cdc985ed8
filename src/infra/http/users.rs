//! Signup, login/logout, password change and password reset pages.

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::{
    application::auth::{AuthError, PasswordChange},
    domain::forms::{FormErrors, SignupInput},
    presentation::views::{
        LayoutChrome, LayoutContext, LoggedOutTemplate, LoginFormView, LoginTemplate,
        PasswordChangeDoneTemplate, PasswordChangeFormView, PasswordChangeTemplate,
        PasswordResetCompleteTemplate, PasswordResetConfirmTemplate, PasswordResetConfirmView,
        PasswordResetDoneTemplate, PasswordResetFormView, PasswordResetTemplate, SignupFormView,
        SignupTemplate, render_template_response,
    },
};

use super::{
    HttpState, auth_error_to_http, found,
    session::{SignedIn, Visitor, safe_next},
};

const PASSWORD_CHANGE_DONE_PATH: &str = "/auth/password_change/done/";
const PASSWORD_RESET_DONE_PATH: &str = "/auth/password_reset/done/";
const PASSWORD_RESET_COMPLETE_PATH: &str = "/auth/reset/done/";

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/auth/signup/", get(signup_form).post(signup_submit))
        .route("/auth/login/", get(login_form).post(login_submit))
        .route("/auth/logout/", get(logout).post(logout))
        .route(
            "/auth/password_change/",
            get(password_change_form).post(password_change_submit),
        )
        .route(PASSWORD_CHANGE_DONE_PATH, get(password_change_done))
        .route(
            "/auth/password_reset/",
            get(password_reset_form).post(password_reset_submit),
        )
        .route(PASSWORD_RESET_DONE_PATH, get(password_reset_done))
        .route(
            "/auth/reset/{uidb64}/{token}/",
            get(password_reset_confirm_form).post(password_reset_confirm_submit),
        )
        .route(PASSWORD_RESET_COMPLETE_PATH, get(password_reset_complete))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignupForm {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password1: String,
    password2: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PasswordChangeForm {
    old_password: String,
    new_password1: String,
    new_password2: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PasswordResetForm {
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SetPasswordForm {
    new_password1: String,
    new_password2: String,
}

async fn signup_form(visitor: Visitor) -> Response {
    render_signup(visitor.chrome(), SignupFormView::default())
}

async fn signup_submit(
    State(state): State<HttpState>,
    visitor: Visitor,
    Form(form): Form<SignupForm>,
) -> Response {
    let input = SignupInput {
        first_name: &form.first_name,
        last_name: &form.last_name,
        username: &form.username,
        email: &form.email,
        password1: &form.password1,
        password2: &form.password2,
    };

    match state.auth.signup(input).await {
        Ok(_) => found("/"),
        Err(AuthError::Invalid(errors)) => {
            let content = SignupFormView {
                first_name: form.first_name,
                last_name: form.last_name,
                username: form.username,
                email: form.email,
                errors,
            };
            render_signup(visitor.chrome(), content)
        }
        Err(err) => auth_error_to_http("infra::http::users::signup_submit", err).into_response(),
    }
}

fn render_signup(chrome: LayoutChrome, content: SignupFormView) -> Response {
    let view = LayoutContext::new(chrome, "Sign up", content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

async fn login_form(visitor: Visitor, Query(query): Query<NextQuery>) -> Response {
    let content = LoginFormView {
        next: safe_next(query.next.as_deref()),
        ..LoginFormView::default()
    };
    render_login(visitor.chrome(), content)
}

async fn login_submit(
    State(state): State<HttpState>,
    visitor: Visitor,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref());

    match state.auth.login(&form.username, &form.password).await {
        Ok(session) => {
            let jar = state
                .session_cookie
                .issue(jar, &session, state.auth.session_ttl());
            let target = next.as_deref().unwrap_or("/");
            (jar, found(target)).into_response()
        }
        Err(AuthError::Invalid(errors)) => {
            let content = LoginFormView {
                username: form.username,
                next,
                errors,
            };
            render_login(visitor.chrome(), content)
        }
        Err(err) => auth_error_to_http("infra::http::users::login_submit", err).into_response(),
    }
}

fn render_login(chrome: LayoutChrome, content: LoginFormView) -> Response {
    let view = LayoutContext::new(chrome, "Log in", content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

async fn logout(State(state): State<HttpState>, visitor: Visitor, jar: CookieJar) -> Response {
    if let Some(session) = &visitor.session
        && let Err(err) = state.auth.logout(&session.token).await
    {
        return auth_error_to_http("infra::http::users::logout", err).into_response();
    }

    let jar = state.session_cookie.clear(jar);
    let view = LayoutContext::new(LayoutChrome::new(None, &visitor.path), "Logged out", ());
    (
        jar,
        render_template_response(LoggedOutTemplate { view }, StatusCode::OK),
    )
        .into_response()
}

async fn password_change_form(signed_in: SignedIn) -> Response {
    render_password_change(signed_in.chrome(), FormErrors::new())
}

async fn password_change_submit(
    State(state): State<HttpState>,
    signed_in: SignedIn,
    Form(form): Form<PasswordChangeForm>,
) -> Response {
    let change = PasswordChange {
        old_password: &form.old_password,
        new_password1: &form.new_password1,
        new_password2: &form.new_password2,
    };

    match state
        .auth
        .change_password(signed_in.user(), &signed_in.session.token, change)
        .await
    {
        Ok(()) => found(PASSWORD_CHANGE_DONE_PATH),
        Err(AuthError::Invalid(errors)) => render_password_change(signed_in.chrome(), errors),
        Err(err) => {
            auth_error_to_http("infra::http::users::password_change_submit", err).into_response()
        }
    }
}

fn render_password_change(chrome: LayoutChrome, errors: FormErrors) -> Response {
    let view = LayoutContext::new(chrome, "Change password", PasswordChangeFormView { errors });
    render_template_response(PasswordChangeTemplate { view }, StatusCode::OK)
}

async fn password_change_done(signed_in: SignedIn) -> Response {
    let view = LayoutContext::new(signed_in.chrome(), "Password changed", ());
    render_template_response(PasswordChangeDoneTemplate { view }, StatusCode::OK)
}

async fn password_reset_form(visitor: Visitor) -> Response {
    render_password_reset(visitor.chrome(), PasswordResetFormView::default())
}

async fn password_reset_submit(
    State(state): State<HttpState>,
    visitor: Visitor,
    Form(form): Form<PasswordResetForm>,
) -> Response {
    match state.auth.request_password_reset(&form.email).await {
        Ok(_) => found(PASSWORD_RESET_DONE_PATH),
        Err(AuthError::Invalid(errors)) => {
            let content = PasswordResetFormView {
                email: form.email,
                errors,
            };
            render_password_reset(visitor.chrome(), content)
        }
        Err(err) => {
            auth_error_to_http("infra::http::users::password_reset_submit", err).into_response()
        }
    }
}

fn render_password_reset(chrome: LayoutChrome, content: PasswordResetFormView) -> Response {
    let view = LayoutContext::new(chrome, "Reset password", content);
    render_template_response(PasswordResetTemplate { view }, StatusCode::OK)
}

async fn password_reset_done(visitor: Visitor) -> Response {
    let view = LayoutContext::new(visitor.chrome(), "Password reset sent", ());
    render_template_response(PasswordResetDoneTemplate { view }, StatusCode::OK)
}

async fn password_reset_confirm_form(
    State(state): State<HttpState>,
    visitor: Visitor,
    Path((uidb64, token)): Path<(String, String)>,
) -> Response {
    match state.auth.check_reset_link(&uidb64, &token).await {
        Ok(user) => render_reset_confirm(visitor.chrome(), user.is_some(), FormErrors::new()),
        Err(err) => auth_error_to_http("infra::http::users::password_reset_confirm_form", err)
            .into_response(),
    }
}

async fn password_reset_confirm_submit(
    State(state): State<HttpState>,
    visitor: Visitor,
    Path((uidb64, token)): Path<(String, String)>,
    Form(form): Form<SetPasswordForm>,
) -> Response {
    match state
        .auth
        .reset_password(&uidb64, &token, &form.new_password1, &form.new_password2)
        .await
    {
        Ok(_) => found(PASSWORD_RESET_COMPLETE_PATH),
        Err(AuthError::InvalidLink) => {
            render_reset_confirm(visitor.chrome(), false, FormErrors::new())
        }
        Err(AuthError::Invalid(errors)) => render_reset_confirm(visitor.chrome(), true, errors),
        Err(err) => auth_error_to_http("infra::http::users::password_reset_confirm_submit", err)
            .into_response(),
    }
}

fn render_reset_confirm(chrome: LayoutChrome, valid_link: bool, errors: FormErrors) -> Response {
    let content = PasswordResetConfirmView { valid_link, errors };
    let view = LayoutContext::new(chrome, "Enter new password", content);
    render_template_response(PasswordResetConfirmTemplate { view }, StatusCode::OK)
}

async fn password_reset_complete(visitor: Visitor) -> Response {
    let view = LayoutContext::new(visitor.chrome(), "Password reset complete", ());
    render_template_response(PasswordResetCompleteTemplate { view }, StatusCode::OK)
}
