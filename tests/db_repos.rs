//! Repository checks against a real Postgres.
//!
//! - Requires `DATABASE_URL` pointing at a server where databases may be created.
//! - Marked `#[ignore]`; run with `cargo test --test db_repos -- --ignored`.

use std::collections::HashSet;

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use yatube::{
    application::{
        pagination::PageWindow,
        repos::{
            CreateGroupParams, CreatePasswordResetParams, CreatePostParams, CreateSessionParams,
            CreateUserParams, GroupsRepo, PasswordResetsRepo, PostFilter, PostsRepo,
            PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    domain::entities::UserRecord,
    infra::db::PostgresRepositories,
};

async fn create_user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{username}@Example.com"),
            password_hash: "argon2-placeholder".to_string(),
        })
        .await
        .expect("create user")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn post_indexes_exist(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'posts'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch post indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    for name in ["posts_pub_date_idx", "posts_author_idx", "posts_group_idx"] {
        assert!(indexes.contains(name), "missing {name}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn usernames_are_unique(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    create_user(&repos, "auth").await;

    let err = repos
        .create_user(CreateUserParams {
            username: "auth".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password_hash: "x".to_string(),
        })
        .await
        .expect_err("duplicate username rejected");
    assert!(matches!(err, RepoError::Duplicate { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn email_lookup_ignores_case(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let user = create_user(&repos, "auth").await;

    let found = repos
        .list_active_users_by_email("auth@example.com")
        .await
        .expect("lookup by email");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, user.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn posts_are_listed_newest_first_with_filters(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = create_user(&repos, "auth").await;
    let other = create_user(&repos, "other").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Test group".to_string(),
            slug: "test-slug".to_string(),
            description: "Test description".to_string(),
        })
        .await
        .expect("create group");

    let mut ids = Vec::new();
    for (index, (user, group_id)) in [
        (&author, Some(group.id)),
        (&author, None),
        (&other, Some(group.id)),
    ]
    .into_iter()
    .enumerate()
    {
        let post = repos
            .create_post(CreatePostParams {
                text: format!("post {index}"),
                author_id: user.id,
                group_id,
            })
            .await
            .expect("create post");
        ids.push(post.id);
    }

    let window = PageWindow {
        limit: 10,
        offset: 0,
    };
    let all = repos
        .list_posts(PostFilter::All, window)
        .await
        .expect("list posts");
    let listed: Vec<i64> = all.iter().map(|item| item.post.id).collect();
    assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);
    assert_eq!(all[0].author.username, "other");
    assert_eq!(all[0].group.as_ref().map(|g| g.slug.as_str()), Some("test-slug"));
    assert!(all[1].group.is_none());

    assert_eq!(
        repos.count_posts(PostFilter::Group(group.id)).await.expect("count"),
        2
    );
    assert_eq!(
        repos
            .count_posts(PostFilter::Author(author.id))
            .await
            .expect("count"),
        2
    );

    let second_page = repos
        .list_posts(
            PostFilter::All,
            PageWindow {
                limit: 2,
                offset: 2,
            },
        )
        .await
        .expect("second page");
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].post.id, ids[0]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn updating_post_keeps_author_and_date(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = create_user(&repos, "auth").await;
    let post = repos
        .create_post(CreatePostParams {
            text: "before".to_string(),
            author_id: author.id,
            group_id: None,
        })
        .await
        .expect("create post");

    let updated = repos
        .update_post(UpdatePostParams {
            id: post.id,
            text: "after".to_string(),
            group_id: None,
        })
        .await
        .expect("update post");
    assert_eq!(updated.text, "after");
    assert_eq!(updated.author_id, author.id);
    assert_eq!(updated.pub_date, post.pub_date);

    let missing = repos
        .update_post(UpdatePostParams {
            id: post.id + 1000,
            text: "nope".to_string(),
            group_id: None,
        })
        .await;
    assert!(matches!(missing, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deleting_author_removes_their_posts(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = create_user(&repos, "auth").await;
    let other = create_user(&repos, "other").await;
    for user in [&author, &other] {
        repos
            .create_post(CreatePostParams {
                text: format!("by {}", user.username),
                author_id: user.id,
                group_id: None,
            })
            .await
            .expect("create post");
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(author.id)
        .execute(&pool)
        .await
        .expect("delete author");

    assert_eq!(repos.count_posts(PostFilter::All).await.expect("count"), 1);
    assert_eq!(
        repos
            .count_posts(PostFilter::Author(author.id))
            .await
            .expect("count"),
        0
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deleting_group_keeps_its_posts_ungrouped(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = create_user(&repos, "auth").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Test group".to_string(),
            slug: "test-slug".to_string(),
            description: String::new(),
        })
        .await
        .expect("create group");
    let post = repos
        .create_post(CreatePostParams {
            text: "grouped".to_string(),
            author_id: author.id,
            group_id: Some(group.id),
        })
        .await
        .expect("create post");

    sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(group.id)
        .execute(&pool)
        .await
        .expect("delete group");

    let item = repos
        .find_post(post.id)
        .await
        .expect("find post")
        .expect("post survives");
    assert_eq!(item.post.group_id, None);
    assert!(item.group.is_none());
    assert_eq!(item.post.text, "grouped");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn sessions_can_be_revoked_and_purged(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let user = create_user(&repos, "auth").await;
    let now = OffsetDateTime::now_utc();

    for (token, expires_at) in [
        (b"keep".to_vec(), now + Duration::days(1)),
        (b"drop".to_vec(), now + Duration::days(1)),
        (b"stale".to_vec(), now - Duration::minutes(1)),
    ] {
        repos
            .create_session(CreateSessionParams {
                token_hash: token,
                user_id: user.id,
                expires_at,
            })
            .await
            .expect("create session");
    }

    assert_eq!(repos.purge_expired_sessions(now).await.expect("purge"), 1);
    let revoked = repos
        .delete_user_sessions(user.id, Some(b"keep".as_slice()))
        .await
        .expect("revoke");
    assert_eq!(revoked, 1);
    assert!(repos.find_session(b"keep").await.expect("find").is_some());
    assert!(repos.find_session(b"drop").await.expect("find").is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn reset_tokens_are_removed_per_user(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let user = create_user(&repos, "auth").await;

    repos
        .create_reset(CreatePasswordResetParams {
            token_hash: b"reset".to_vec(),
            user_id: user.id,
            expires_at: OffsetDateTime::now_utc() + Duration::days(3),
        })
        .await
        .expect("create reset");
    assert!(repos.find_reset(b"reset").await.expect("find").is_some());

    assert_eq!(repos.delete_user_resets(user.id).await.expect("delete"), 1);
    assert!(repos.find_reset(b"reset").await.expect("find").is_none());
}
