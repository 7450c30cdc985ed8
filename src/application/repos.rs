//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::pagination::PageWindow;
use crate::domain::entities::{
    GroupRecord, PasswordResetRecord, PostListItem, PostRecord, SessionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreatePasswordResetParams {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;

    /// Active accounts registered with the given email, compared case-insensitively.
    async fn list_active_users_by_email(&self, email: &str) -> Result<Vec<UserRecord>, RepoError>;

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), RepoError>;

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError>;

    /// Posts newest first, restricted to the requested window.
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostListItem>, RepoError>;

    async fn find_post(&self, id: i64) -> Result<Option<PostListItem>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn find_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), RepoError>;

    /// Remove every session of the user except the one matching `keep`.
    async fn delete_user_sessions(
        &self,
        user_id: i64,
        keep: Option<&[u8]>,
    ) -> Result<u64, RepoError>;

    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait PasswordResetsRepo: Send + Sync {
    async fn create_reset(
        &self,
        params: CreatePasswordResetParams,
    ) -> Result<PasswordResetRecord, RepoError>;

    async fn find_reset(&self, token_hash: &[u8])
    -> Result<Option<PasswordResetRecord>, RepoError>;

    async fn delete_user_resets(&self, user_id: i64) -> Result<u64, RepoError>;

    async fn purge_expired_resets(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}
