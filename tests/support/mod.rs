//! In-memory fakes and request helpers shared by the router tests.
#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        HeaderMap, Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use http_body_util::BodyExt;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use url::Url;

use yatube::{
    application::{
        auth::{AuthPolicy, AuthService, password::hash_password},
        mail::{MailError, Mailer, OutgoingMail},
        pagination::PageWindow,
        posts::PostService,
        repos::{
            CreateGroupParams, CreatePasswordResetParams, CreatePostParams, CreateSessionParams,
            CreateUserParams, GroupsRepo, PasswordResetsRepo, PostFilter, PostsRepo,
            PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    domain::entities::{
        GroupRecord, PasswordResetRecord, PostAuthor, PostGroup, PostListItem, PostRecord,
        SessionRecord, UserRecord,
    },
    infra::http::{self, DatabaseProbe, HttpState, session::SessionCookieSettings},
};

pub const PASSWORD: &str = "Unusual-Passphrase-42";
pub const COOKIE_NAME: &str = "yatube_session";

fn shared_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).expect("hash test password"))
}

fn base_time() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
}

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    sessions: Vec<SessionRecord>,
    resets: Vec<PasswordResetRecord>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn list_item(&self, post: &PostRecord) -> Option<PostListItem> {
        let author = self.users.iter().find(|user| user.id == post.author_id)?;
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id))
            .map(|group| PostGroup {
                id: group.id,
                title: group.title.clone(),
                slug: group.slug.clone(),
            });
        Some(PostListItem {
            post: post.clone(),
            author: PostAuthor {
                id: author.id,
                username: author.username.clone(),
                full_name: author.full_name(),
            },
            group,
        })
    }

    fn filtered(&self, filter: PostFilter) -> Vec<&PostRecord> {
        let mut posts: Vec<&PostRecord> = self
            .posts
            .iter()
            .filter(|post| match filter {
                PostFilter::All => true,
                PostFilter::Group(id) => post.group_id == Some(id),
                PostFilter::Author(id) => post.author_id == id,
            })
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// All repositories backed by vectors behind one lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub async fn add_user(&self, username: &str) -> UserRecord {
        self.add_user_with(username, "", "", &format!("{username}@example.com"))
            .await
    }

    pub async fn add_user_with(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> UserRecord {
        let mut tables = self.tables.lock().await;
        let user = UserRecord {
            id: tables.next_id(),
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash: shared_password_hash().to_string(),
            is_active: true,
            date_joined: base_time(),
            last_login: None,
        };
        tables.users.push(user.clone());
        user
    }

    pub async fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.tables.lock().await;
        let group = GroupRecord {
            id: tables.next_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        tables.groups.push(group.clone());
        group
    }

    /// Each new post is one minute younger than the previous one.
    pub async fn add_post(&self, author: &UserRecord, group: Option<&GroupRecord>, text: &str) -> PostRecord {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let post = PostRecord {
            id,
            text: text.to_string(),
            pub_date: base_time() + Duration::minutes(id),
            author_id: author.id,
            group_id: group.map(|group| group.id),
        };
        tables.posts.push(post.clone());
        post
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        let tables = self.tables.lock().await;
        tables.posts.iter().find(|post| post.id == id).cloned()
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.tables.lock().await.posts.last().cloned()
    }

    pub async fn posts_count(&self) -> usize {
        self.tables.lock().await.posts.len()
    }

    pub async fn user(&self, username: &str) -> Option<UserRecord> {
        let tables = self.tables.lock().await;
        tables
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }

    pub async fn sessions_of(&self, user_id: i64) -> usize {
        let tables = self.tables.lock().await;
        tables
            .sessions
            .iter()
            .filter(|session| session.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: tables.next_id(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            is_active: true,
            date_joined: OffsetDateTime::now_utc(),
            last_login: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_active_users_by_email(&self, email: &str) -> Result<Vec<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|user| user.is_active && user.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|user| user.id == id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let mut groups = tables.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: tables.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.filtered(filter).len() as u64)
    }

    async fn list_posts(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostListItem>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .filtered(filter)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .filter_map(|post| tables.list_item(post))
            .collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostListItem>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| tables.list_item(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let post = PostRecord {
            id,
            text: params.text,
            pub_date: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        Ok(post.clone())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let session = SessionRecord {
            token_hash: params.token_hash,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| session.token_hash == token_hash)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables
            .sessions
            .retain(|session| session.token_hash != token_hash);
        Ok(())
    }

    async fn delete_user_sessions(
        &self,
        user_id: i64,
        keep: Option<&[u8]>,
    ) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| {
            session.user_id != user_id || keep.is_some_and(|keep| session.token_hash == keep)
        });
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl PasswordResetsRepo for MemoryStore {
    async fn create_reset(
        &self,
        params: CreatePasswordResetParams,
    ) -> Result<PasswordResetRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let reset = PasswordResetRecord {
            token_hash: params.token_hash,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        tables.resets.push(reset.clone());
        Ok(reset)
    }

    async fn find_reset(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<PasswordResetRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .resets
            .iter()
            .find(|reset| reset.token_hash == token_hash)
            .cloned())
    }

    async fn delete_user_resets(&self, user_id: i64) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.resets.len();
        tables.resets.retain(|reset| reset.user_id != user_id);
        Ok((before - tables.resets.len()) as u64)
    }

    async fn purge_expired_resets(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.resets.len();
        tables.resets.retain(|reset| reset.expires_at > now);
        Ok((before - tables.resets.len()) as u64)
    }
}

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

pub struct HealthyProbe;

#[async_trait]
impl DatabaseProbe for HealthyProbe {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|value| value.to_str().ok())
    }

    /// Which template rendered the page, read from the `<body data-template>` marker.
    pub fn template(&self) -> Option<&str> {
        let marker = "data-template=\"";
        let start = self.body.find(marker)? + marker.len();
        let end = self.body[start..].find('"')? + start;
        Some(&self.body[start..end])
    }

    /// Number of rendered post cards.
    pub fn post_cards(&self) -> usize {
        self.body.matches("class=\"post-card\"").count()
    }

    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(&format!("{COOKIE_NAME}=")))
            .map(|value| value.split(';').next().unwrap_or_default().to_string())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub auth: Arc<AuthService>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());

        let users: Arc<dyn UsersRepo> = store.clone();
        let sessions: Arc<dyn SessionsRepo> = store.clone();
        let resets: Arc<dyn PasswordResetsRepo> = store.clone();
        let posts_repo: Arc<dyn PostsRepo> = store.clone();
        let writer: Arc<dyn PostsWriteRepo> = store.clone();
        let groups: Arc<dyn GroupsRepo> = store.clone();
        let mail: Arc<dyn Mailer> = mailer.clone();

        let auth = Arc::new(AuthService::new(
            users.clone(),
            sessions,
            resets,
            mail,
            AuthPolicy {
                session_ttl: Duration::days(14),
                reset_ttl: Duration::days(3),
                site_url: Url::parse("http://testserver").expect("valid url"),
            },
        ));
        let posts = Arc::new(PostService::new(posts_repo, writer, groups, users));

        let router = http::build_router(HttpState {
            posts,
            auth: auth.clone(),
            db: Arc::new(HealthyProbe),
            session_cookie: SessionCookieSettings::default(),
        });

        Self {
            router,
            store,
            mailer,
            auth,
        }
    }

    /// Start a session for `username` and return the `Cookie` header value.
    pub async fn login(&self, username: &str) -> String {
        let session = self
            .auth
            .login(username, PASSWORD)
            .await
            .expect("login succeeds");
        format!("{COOKIE_NAME}={}", session.token)
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)], cookie: Option<&str>) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).expect("request")).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("response body")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
