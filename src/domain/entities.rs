//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

/// Number of characters shown when a post is rendered as a short label.
pub const POST_PREVIEW_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

impl UserRecord {
    /// First and last name joined by a space, or the username when both are blank.
    pub fn full_name(&self) -> String {
        display_name(&self.username, &self.first_name, &self.last_name)
    }
}

/// Name shown for an author: first and last name, else the username.
pub fn display_name(username: &str, first_name: &str, last_name: &str) -> String {
    let joined = format!("{} {}", first_name.trim(), last_name.trim());
    let joined = joined.trim();
    if joined.is_empty() {
        username.to_string()
    } else {
        joined.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub group_id: Option<i64>,
}

impl PostRecord {
    pub fn preview(&self) -> String {
        self.text.chars().take(POST_PREVIEW_CHARS).collect()
    }
}

/// Author columns joined onto a post listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostAuthor {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

/// Group columns joined onto a post listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostGroup {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

/// A post together with the records it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListItem {
    pub post: PostRecord,
    pub author: PostAuthor,
    pub group: Option<PostGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PasswordResetRecord {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
