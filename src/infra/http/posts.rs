//! Post listings and the create/edit forms.

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        pagination::PageQuery,
        posts::{PostDraft, PostError},
    },
    domain::forms::FormErrors,
    presentation::views::{
        GroupListTemplate, GroupListView, GroupView, IndexTemplate, IndexView, LayoutChrome,
        LayoutContext, PostCardView, PostDetailTemplate, PostDetailView, PostFormTemplate,
        PostFormView, PostPageView, ProfileTemplate, ProfileView, render_not_found_response,
        render_template_response,
    },
};

use super::{
    HttpState, found, post_error_to_http,
    session::{SignedIn, Visitor},
};

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/create/", get(create_form).post(create_submit))
        .route("/posts/{post_id}/edit/", get(edit_form).post(edit_submit))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostForm {
    text: String,
    group: String,
}

impl From<PostForm> for PostDraft {
    fn from(form: PostForm) -> Self {
        Self {
            text: form.text,
            group: form.group,
        }
    }
}

async fn index(
    State(state): State<HttpState>,
    visitor: Visitor,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.posts.index(query.page.as_deref()).await {
        Ok(page) => {
            let content = IndexView {
                page_obj: PostPageView::from_page(&page),
            };
            let view = LayoutContext::new(visitor.chrome(), "Latest posts", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_to_http("infra::http::posts::index", err).into_response(),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    visitor: Visitor,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.posts.group_posts(&slug, query.page.as_deref()).await {
        Ok(Some(listing)) => {
            let title = format!("Posts of the group {}", listing.group.title);
            let content = GroupListView {
                group: GroupView::from(&listing.group),
                page_obj: PostPageView::from_page(&listing.page),
            };
            let view = LayoutContext::new(visitor.chrome(), title, content);
            render_template_response(GroupListTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(visitor.chrome()),
        Err(err) => post_error_to_http("infra::http::posts::group_posts", err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    visitor: Visitor,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.posts.profile(&username, query.page.as_deref()).await {
        Ok(Some(listing)) => {
            let title = format!("Profile of {}", listing.author.full_name());
            let content = ProfileView {
                author: (&listing.author).into(),
                posts_count: listing.posts_count,
                page_obj: PostPageView::from_page(&listing.page),
            };
            let view = LayoutContext::new(visitor.chrome(), title, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(visitor.chrome()),
        Err(err) => post_error_to_http("infra::http::posts::profile", err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    visitor: Visitor,
    Path(post_id): Path<String>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(visitor.chrome());
    };

    match state.posts.post_detail(post_id).await {
        Ok(Some(detail)) => {
            let can_edit = visitor
                .user()
                .is_some_and(|user| user.id == detail.post.author.id);
            let title = format!("Post {}", detail.post.post.preview());
            let content = PostDetailView {
                post: PostCardView::from_item(&detail.post),
                posts_count: detail.posts_count,
                can_edit,
                edit_href: format!("/posts/{post_id}/edit/"),
            };
            let view = LayoutContext::new(visitor.chrome(), title, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(visitor.chrome()),
        Err(err) => post_error_to_http("infra::http::posts::post_detail", err).into_response(),
    }
}

async fn create_form(State(state): State<HttpState>, signed_in: SignedIn) -> Response {
    render_post_form(&state, signed_in.chrome(), None, PostDraft::default(), FormErrors::new())
        .await
}

async fn create_submit(
    State(state): State<HttpState>,
    signed_in: SignedIn,
    Form(form): Form<PostForm>,
) -> Response {
    let draft = PostDraft::from(form);
    match state.posts.create_post(signed_in.user(), &draft).await {
        Ok(_) => found(&format!("/profile/{}/", signed_in.user().username)),
        Err(PostError::Invalid(errors)) => {
            render_post_form(&state, signed_in.chrome(), None, draft, errors).await
        }
        Err(err) => post_error_to_http("infra::http::posts::create_submit", err).into_response(),
    }
}

async fn edit_form(
    State(state): State<HttpState>,
    signed_in: SignedIn,
    Path(post_id): Path<String>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(signed_in.chrome());
    };

    match state.posts.editable_post(post_id, signed_in.user()).await {
        Ok(post) => {
            let draft = PostDraft::from_post(&post);
            render_post_form(&state, signed_in.chrome(), Some(post_id), draft, FormErrors::new())
                .await
        }
        Err(err) => edit_rejection(&signed_in, post_id, err, "infra::http::posts::edit_form"),
    }
}

async fn edit_submit(
    State(state): State<HttpState>,
    signed_in: SignedIn,
    Path(post_id): Path<String>,
    Form(form): Form<PostForm>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(signed_in.chrome());
    };

    let draft = PostDraft::from(form);
    match state
        .posts
        .update_post(post_id, signed_in.user(), &draft)
        .await
    {
        Ok(post) => found(&format!("/posts/{}/", post.id)),
        Err(PostError::Invalid(errors)) => {
            render_post_form(&state, signed_in.chrome(), Some(post_id), draft, errors).await
        }
        Err(err) => edit_rejection(&signed_in, post_id, err, "infra::http::posts::edit_submit"),
    }
}

/// Non-authors are bounced to the post page; missing posts get a 404.
fn edit_rejection(
    signed_in: &SignedIn,
    post_id: i64,
    err: PostError,
    source: &'static str,
) -> Response {
    match err {
        PostError::NotAuthor => found(&format!("/posts/{post_id}/")),
        PostError::NotFound => render_not_found_response(signed_in.chrome()),
        other => post_error_to_http(source, other).into_response(),
    }
}

async fn render_post_form(
    state: &HttpState,
    chrome: LayoutChrome,
    post_id: Option<i64>,
    draft: PostDraft,
    errors: FormErrors,
) -> Response {
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => {
            return post_error_to_http("infra::http::posts::render_post_form", err)
                .into_response();
        }
    };

    let title = if post_id.is_some() {
        "Edit post"
    } else {
        "New post"
    };
    let content = PostFormView::new(post_id, &draft.text, &draft.group, &groups, errors);
    let view = LayoutContext::new(chrome, title, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

/// Post ids in URLs are positive integers; anything else is a missing page.
fn parse_post_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::parse_post_id;

    #[test]
    fn post_ids_must_be_plain_integers() {
        assert_eq!(parse_post_id("42"), Some(42));
        assert_eq!(parse_post_id("0"), None);
        assert_eq!(parse_post_id("-1"), None);
        assert_eq!(parse_post_id("+1"), None);
        assert_eq!(parse_post_id("abc"), None);
        assert_eq!(parse_post_id("99999999999999999999"), None);
    }
}
