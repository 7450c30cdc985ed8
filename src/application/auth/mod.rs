//! Accounts, sessions and password recovery.

pub mod password;
pub mod tokens;

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use url::Url;

use crate::{
    application::{
        mail::{MailError, Mailer, OutgoingMail},
        repos::{
            CreatePasswordResetParams, CreateSessionParams, CreateUserParams,
            PasswordResetsRepo, RepoError, SessionsRepo, UsersRepo,
        },
    },
    domain::{
        entities::UserRecord,
        forms::{
            DUPLICATE_USERNAME, FormErrors, INCORRECT_OLD_PASSWORD, INVALID_LOGIN, REQUIRED,
            SignupInput, clean_login, clean_new_password, clean_reset_email, clean_signup,
        },
        password_policy::UserAttributes,
    },
    infra::telemetry::{
        METRIC_LOGIN_FAILURES, METRIC_LOGINS, METRIC_PASSWORD_RESETS_REQUESTED,
        METRIC_SESSIONS_PURGED, METRIC_USERS_REGISTERED,
    },
};

use self::{
    password::{PasswordHashError, hash_password_blocking, verify_password_blocking},
    tokens::{decode_uid, digests_match, encode_uid, generate_token, hash_token},
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hash(#[from] PasswordHashError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("submitted form is invalid")]
    Invalid(FormErrors),
    #[error("password reset link is invalid or has expired")]
    InvalidLink,
}

/// Lifetimes and addresses the auth workflows depend on.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
    pub site_url: Url,
}

/// A freshly started session. `token` goes into the cookie.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user: UserRecord,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub sessions: u64,
    pub resets: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChange<'a> {
    pub old_password: &'a str,
    pub new_password1: &'a str,
    pub new_password2: &'a str,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    resets: Arc<dyn PasswordResetsRepo>,
    mailer: Arc<dyn Mailer>,
    policy: AuthPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        resets: Arc<dyn PasswordResetsRepo>,
        mailer: Arc<dyn Mailer>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            resets,
            mailer,
            policy,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.policy.session_ttl
    }

    /// Register a new account. The visitor is not logged in afterwards.
    pub async fn signup(&self, input: SignupInput<'_>) -> Result<UserRecord, AuthError> {
        let fields = clean_signup(input).map_err(AuthError::Invalid)?;

        if self
            .users
            .find_user_by_username(&fields.username)
            .await?
            .is_some()
        {
            return Err(duplicate_username());
        }

        let password_hash = hash_password_blocking(fields.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: fields.username,
                first_name: fields.first_name,
                last_name: fields.last_name,
                email: fields.email,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => duplicate_username(),
                other => AuthError::Repo(other),
            })?;

        counter!(METRIC_USERS_REGISTERED).increment(1);
        info!(
            target = "application::auth::signup",
            user_id = user.id,
            username = %user.username,
            "user registered"
        );
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let (username, password) = clean_login(username, password).map_err(AuthError::Invalid)?;

        let user = self.users.find_user_by_username(&username).await?;
        let verified = match &user {
            Some(user) if user.is_active => {
                verify_password_blocking(password, user.password_hash.clone()).await?
            }
            _ => false,
        };
        let Some(user) = user.filter(|_| verified) else {
            counter!(METRIC_LOGIN_FAILURES).increment(1);
            warn!(
                target = "application::auth::login",
                username = %username,
                "login rejected"
            );
            return Err(AuthError::Invalid(FormErrors::non_field_only(INVALID_LOGIN)));
        };

        let session = self.start_session(user).await?;
        self.users
            .record_login(session.user.id, OffsetDateTime::now_utc())
            .await?;

        counter!(METRIC_LOGINS).increment(1);
        Ok(session)
    }

    /// Resolve a session cookie to its active user.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, AuthError> {
        let digest = hash_token(token);
        let Some(session) = self.sessions.find_session(&digest).await? else {
            return Ok(None);
        };
        if !digests_match(&session.token_hash, &digest) {
            return Ok(None);
        }
        if session.expires_at <= OffsetDateTime::now_utc() {
            self.sessions.delete_session(&digest).await?;
            return Ok(None);
        }

        let user = self.users.find_user_by_id(session.user_id).await?;
        Ok(user.filter(|user| user.is_active))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete_session(&hash_token(token)).await?;
        Ok(())
    }

    /// Change the password of a logged-in user, keeping only the current session.
    pub async fn change_password(
        &self,
        user: &UserRecord,
        current_token: &str,
        change: PasswordChange<'_>,
    ) -> Result<(), AuthError> {
        let mut errors = FormErrors::new();
        if change.old_password.is_empty() {
            errors.add("old_password", REQUIRED);
        } else if !verify_password_blocking(
            change.old_password.to_string(),
            user.password_hash.clone(),
        )
        .await?
        {
            errors.add("old_password", INCORRECT_OLD_PASSWORD);
        }

        let new_password = match clean_new_password(
            change.new_password1,
            change.new_password2,
            &attributes_of(user),
        ) {
            Ok(password) => Some(password),
            Err(new_errors) => {
                errors.merge(new_errors);
                None
            }
        };

        let Some(new_password) = new_password.filter(|_| errors.is_empty()) else {
            return Err(AuthError::Invalid(errors));
        };

        let password_hash = hash_password_blocking(new_password).await?;
        self.users.set_password(user.id, &password_hash).await?;
        let keep = hash_token(current_token);
        let revoked = self
            .sessions
            .delete_user_sessions(user.id, Some(keep.as_slice()))
            .await?;

        info!(
            target = "application::auth::change_password",
            user_id = user.id,
            revoked_sessions = revoked,
            "password changed"
        );
        Ok(())
    }

    /// Mail a reset link to every active account registered with the address.
    ///
    /// Returns the number of messages sent; unknown addresses send nothing.
    pub async fn request_password_reset(&self, email: &str) -> Result<usize, AuthError> {
        let email = clean_reset_email(email).map_err(AuthError::Invalid)?;
        let users = self.users.list_active_users_by_email(&email).await?;

        let mut sent = 0;
        for user in users {
            let token = generate_token();
            self.resets
                .create_reset(CreatePasswordResetParams {
                    token_hash: hash_token(&token),
                    user_id: user.id,
                    expires_at: OffsetDateTime::now_utc() + self.policy.reset_ttl,
                })
                .await?;

            self.mailer.send(self.reset_mail(&user, &token)).await?;
            sent += 1;
        }

        counter!(METRIC_PASSWORD_RESETS_REQUESTED).increment(1);
        info!(
            target = "application::auth::request_password_reset",
            messages = sent,
            "password reset requested"
        );
        Ok(sent)
    }

    /// The account a reset link belongs to, if the link is still usable.
    pub async fn check_reset_link(
        &self,
        uidb64: &str,
        token: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let Some(user_id) = decode_uid(uidb64) else {
            return Ok(None);
        };
        let digest = hash_token(token);
        let Some(reset) = self.resets.find_reset(&digest).await? else {
            return Ok(None);
        };
        if reset.user_id != user_id
            || !digests_match(&reset.token_hash, &digest)
            || reset.expires_at <= OffsetDateTime::now_utc()
        {
            return Ok(None);
        }

        let user = self.users.find_user_by_id(user_id).await?;
        Ok(user.filter(|user| user.is_active))
    }

    /// Set a new password through a reset link. The link and all sessions are revoked.
    pub async fn reset_password(
        &self,
        uidb64: &str,
        token: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> Result<UserRecord, AuthError> {
        let user = self
            .check_reset_link(uidb64, token)
            .await?
            .ok_or(AuthError::InvalidLink)?;

        let new_password = clean_new_password(new_password1, new_password2, &attributes_of(&user))
            .map_err(AuthError::Invalid)?;

        let password_hash = hash_password_blocking(new_password).await?;
        self.users.set_password(user.id, &password_hash).await?;
        self.resets.delete_user_resets(user.id).await?;
        self.sessions.delete_user_sessions(user.id, None).await?;

        info!(
            target = "application::auth::reset_password",
            user_id = user.id,
            "password reset completed"
        );
        Ok(user)
    }

    /// Drop expired sessions and reset links.
    pub async fn purge_expired(&self, now: OffsetDateTime) -> Result<PurgeReport, AuthError> {
        let sessions = self.sessions.purge_expired_sessions(now).await?;
        let resets = self.resets.purge_expired_resets(now).await?;
        counter!(METRIC_SESSIONS_PURGED).increment(sessions);
        Ok(PurgeReport { sessions, resets })
    }

    async fn start_session(&self, user: UserRecord) -> Result<IssuedSession, AuthError> {
        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + self.policy.session_ttl;
        self.sessions
            .create_session(CreateSessionParams {
                token_hash: hash_token(&token),
                user_id: user.id,
                expires_at,
            })
            .await?;
        Ok(IssuedSession {
            token,
            user,
            expires_at,
        })
    }

    fn reset_mail(&self, user: &UserRecord, token: &str) -> OutgoingMail {
        let site = self.policy.site_url.host_str().unwrap_or("yatube");
        let link = format!(
            "{}/auth/reset/{}/{}/",
            self.policy.site_url.as_str().trim_end_matches('/'),
            encode_uid(user.id),
            token
        );
        let body = format!(
            "You're receiving this email because you requested a password reset for your user account at {site}.\n\n\
             Please go to the following page and choose a new password:\n\n\
             {link}\n\n\
             Your username, in case you've forgotten: {username}\n\n\
             Thanks for using our site!\n\n\
             The {site} team\n",
            username = user.username,
        );
        OutgoingMail {
            to: user.email.clone(),
            subject: format!("Password reset on {site}"),
            body,
        }
    }
}

fn duplicate_username() -> AuthError {
    let mut errors = FormErrors::new();
    errors.add("username", DUPLICATE_USERNAME);
    AuthError::Invalid(errors)
}

fn attributes_of(user: &UserRecord) -> UserAttributes<'_> {
    UserAttributes {
        username: &user.username,
        first_name: &user.first_name,
        last_name: &user.last_name,
        email: &user.email,
    }
}
