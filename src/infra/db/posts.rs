use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::{
        pagination::PageWindow,
        repos::{
            CreatePostParams, PostFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
        },
    },
    domain::entities::{PostAuthor, PostGroup, PostListItem, PostRecord, display_name},
};

use super::{PostgresRepositories, map_sqlx_error};

const POST_LIST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, p.group_id, \
        u.username AS author_username, u.first_name AS author_first_name, \
        u.last_name AS author_last_name, \
        g.title AS group_title, g.slug AS group_slug \
    FROM posts p \
    INNER JOIN users u ON u.id = p.author_id \
    LEFT JOIN groups g ON g.id = p.group_id";

const POST_ORDER: &str = " ORDER BY p.pub_date DESC, p.id DESC";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            group_id: row.group_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostListRow {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostListRow> for PostListItem {
    fn from(row: PostListRow) -> Self {
        let full_name = display_name(
            &row.author_username,
            &row.author_first_name,
            &row.author_last_name,
        );
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(PostGroup { id, title, slug }),
            _ => None,
        };
        Self {
            post: PostRecord {
                id: row.id,
                text: row.text,
                pub_date: row.pub_date,
                author_id: row.author_id,
                group_id: row.group_id,
            },
            author: PostAuthor {
                id: row.author_id,
                username: row.author_username,
                full_name,
            },
            group,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        Self::push_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostListItem>, RepoError> {
        let offset = i64::try_from(window.offset)
            .map_err(|_| RepoError::from_persistence("offset exceeds supported range"))?;

        let mut qb = QueryBuilder::<Postgres>::new(POST_LIST_SELECT);
        Self::push_post_filter(&mut qb, filter);
        qb.push(POST_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostListRow>()
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(rows.into_iter().map(PostListItem::from).collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostListItem>, RepoError> {
        let row = sqlx::query_as::<_, PostListRow>(&format!("{POST_LIST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(row.map(PostListItem::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (text, author_id, group_id)
            VALUES ($1, $2, $3)
            RETURNING id, text, pub_date, author_id, group_id
            "#,
        )
        .bind(params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3
            WHERE id = $1
            RETURNING id, text, pub_date, author_id, group_id
            "#,
        )
        .bind(params.id)
        .bind(params.text)
        .bind(params.group_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
