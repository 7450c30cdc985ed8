//! Post listings, detail pages and the create/edit workflow.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::{
    application::{
        pagination::{Page, Paginator, SHOW_POSTS},
        repos::{
            CreatePostParams, GroupsRepo, PostFilter, PostsRepo, PostsWriteRepo, RepoError,
            UpdatePostParams, UsersRepo,
        },
    },
    domain::{
        entities::{GroupRecord, PostListItem, PostRecord, UserRecord},
        forms::{FormErrors, clean_post},
    },
    infra::telemetry::{METRIC_POSTS_CREATED, METRIC_POSTS_EDITED},
};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("post form is invalid")]
    Invalid(FormErrors),
    #[error("post not found")]
    NotFound,
    #[error("only the author may edit this post")]
    NotAuthor,
}

/// Posts of one group.
#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostListItem>,
}

/// Posts of one author.
#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: UserRecord,
    pub posts_count: u64,
    pub page: Page<PostListItem>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostListItem,
    /// Number of posts written by the post's author.
    pub posts_count: u64,
}

/// Raw values submitted through the post form.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group: String,
}

impl PostDraft {
    pub fn from_post(post: &PostRecord) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    per_page: u32,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            users,
            per_page: SHOW_POSTS,
        }
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Every post, newest first.
    pub async fn index(&self, page: Option<&str>) -> Result<Page<PostListItem>, PostError> {
        self.paginate(PostFilter::All, page).await
    }

    pub async fn group_posts(
        &self,
        slug: &str,
        page: Option<&str>,
    ) -> Result<Option<GroupListing>, PostError> {
        let Some(group) = self.groups.find_group_by_slug(slug).await? else {
            return Ok(None);
        };
        let page = self.paginate(PostFilter::Group(group.id), page).await?;
        Ok(Some(GroupListing { group, page }))
    }

    pub async fn profile(
        &self,
        username: &str,
        page: Option<&str>,
    ) -> Result<Option<ProfileListing>, PostError> {
        let Some(author) = self.users.find_user_by_username(username).await? else {
            return Ok(None);
        };
        let page = self.paginate(PostFilter::Author(author.id), page).await?;
        Ok(Some(ProfileListing {
            posts_count: page.count(),
            author,
            page,
        }))
    }

    pub async fn post_detail(&self, id: i64) -> Result<Option<PostDetail>, PostError> {
        let Some(post) = self.posts.find_post(id).await? else {
            return Ok(None);
        };
        let posts_count = self
            .posts
            .count_posts(PostFilter::Author(post.author.id))
            .await?;
        Ok(Some(PostDetail { post, posts_count }))
    }

    /// Groups offered as choices in the post form.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        draft: &PostDraft,
    ) -> Result<PostRecord, PostError> {
        let groups = self.groups.list_groups().await?;
        let fields = clean_post(&draft.text, &draft.group, &groups).map_err(PostError::Invalid)?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                text: fields.text,
                author_id: author.id,
                group_id: fields.group_id,
            })
            .await?;

        counter!(METRIC_POSTS_CREATED).increment(1);
        info!(
            target = "application::posts::create_post",
            post_id = post.id,
            author = %author.username,
            "post created"
        );
        Ok(post)
    }

    /// Load a post for editing, refusing anyone but its author.
    pub async fn editable_post(&self, id: i64, editor: &UserRecord) -> Result<PostRecord, PostError> {
        let post = self.posts.find_post(id).await?.ok_or(PostError::NotFound)?;
        if post.author.id != editor.id {
            return Err(PostError::NotAuthor);
        }
        Ok(post.post)
    }

    /// Replace text and group; author and publication date stay as they were.
    pub async fn update_post(
        &self,
        id: i64,
        editor: &UserRecord,
        draft: &PostDraft,
    ) -> Result<PostRecord, PostError> {
        let existing = self.editable_post(id, editor).await?;
        let groups = self.groups.list_groups().await?;
        let fields = clean_post(&draft.text, &draft.group, &groups).map_err(PostError::Invalid)?;

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: existing.id,
                text: fields.text,
                group_id: fields.group_id,
            })
            .await?;

        counter!(METRIC_POSTS_EDITED).increment(1);
        info!(
            target = "application::posts::update_post",
            post_id = post.id,
            "post edited"
        );
        Ok(post)
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        raw_page: Option<&str>,
    ) -> Result<Page<PostListItem>, PostError> {
        let count = self.posts.count_posts(filter).await?;
        let paginator = Paginator::new(count, self.per_page);
        let number = paginator.resolve(raw_page);
        let items = if count == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(filter, paginator.window(number)).await?
        };
        Ok(paginator.page(number, items))
    }
}
