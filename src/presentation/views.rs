use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Page;
use crate::domain::entities::{GroupRecord, PostListItem, UserRecord};
use crate::domain::forms::FormErrors;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const POST_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:long] [year]");

/// Render a template, turning askama failures into a 500 with the error chain attached.
pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        HttpError::from_error(
            "presentation::views::render_template",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Template rendering failed",
            &err,
        )
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, "Page not found", NotFoundView);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The visitor shown in the header.
#[derive(Clone)]
pub struct CurrentUserView {
    pub username: String,
    pub full_name: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: &'static str,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

/// Header and navigation shared by every page.
#[derive(Clone)]
pub struct LayoutChrome {
    pub user: Option<CurrentUserView>,
    pub navigation: NavigationView,
}

impl LayoutChrome {
    pub fn new(user: Option<&UserRecord>, current_path: &str) -> Self {
        let mut links: Vec<(&'static str, String)> = vec![
            ("Home", "/".to_string()),
            ("About the author", "/about/author/".to_string()),
            ("Technologies", "/about/tech/".to_string()),
        ];
        match user {
            Some(_) => links.extend([
                ("New post", "/create/".to_string()),
                ("Change password", "/auth/password_change/".to_string()),
                ("Log out", "/auth/logout/".to_string()),
            ]),
            None => links.extend([
                ("Log in", "/auth/login/".to_string()),
                ("Sign up", "/auth/signup/".to_string()),
            ]),
        }

        let entries = links
            .into_iter()
            .map(|(label, href)| NavigationLinkView {
                is_active: href == current_path,
                label,
                href,
            })
            .collect();

        Self {
            user: user.map(|user| CurrentUserView {
                username: user.username.clone(),
                full_name: user.full_name(),
            }),
            navigation: NavigationView { entries },
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub user: Option<CurrentUserView>,
    pub navigation: NavigationView,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        Self {
            user: chrome.user,
            navigation: chrome.navigation,
            title: title.into(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupLinkView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub published: String,
    pub iso_date: String,
    pub author_username: String,
    pub author_name: String,
    pub author_href: String,
    pub group: Option<GroupLinkView>,
    pub detail_href: String,
}

impl PostCardView {
    pub fn from_item(item: &PostListItem) -> Self {
        Self {
            id: item.post.id,
            text: item.post.text.clone(),
            published: format_date(item.post.pub_date),
            iso_date: item.post.pub_date.date().to_string(),
            author_username: item.author.username.clone(),
            author_name: item.author.full_name.clone(),
            author_href: format!("/profile/{}/", item.author.username),
            group: item.group.as_ref().map(|group| GroupLinkView {
                title: group.title.clone(),
                href: format!("/group/{}/", group.slug),
            }),
            detail_href: format!("/posts/{}/", item.post.id),
        }
    }
}

fn format_date(value: OffsetDateTime) -> String {
    value
        .format(POST_DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

/// Navigation widget under a paginated listing.
#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub first_href: String,
    pub last_href: String,
    pub links: Vec<PageLinkView>,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        let href = |number: u32| format!("?page={number}");
        Self {
            number: page.number(),
            num_pages: page.num_pages(),
            previous_href: page.previous_page_number().map(href),
            next_href: page.next_page_number().map(href),
            first_href: href(1),
            last_href: href(page.num_pages()),
            links: page
                .page_range()
                .into_iter()
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == page.number(),
                })
                .collect(),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

/// The `page_obj` of a listing: cards plus the paginator.
#[derive(Clone)]
pub struct PostPageView {
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

impl PostPageView {
    pub fn from_page(page: &Page<PostListItem>) -> Self {
        Self {
            posts: page.items().iter().map(PostCardView::from_item).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

pub struct IndexView {
    pub page_obj: PostPageView,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl From<&GroupRecord> for GroupView {
    fn from(group: &GroupRecord) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        }
    }
}

pub struct GroupListView {
    pub group: GroupView,
    pub page_obj: PostPageView,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub view: LayoutContext<GroupListView>,
}

pub struct AuthorView {
    pub username: String,
    pub full_name: String,
}

impl From<&UserRecord> for AuthorView {
    fn from(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            full_name: user.full_name(),
        }
    }
}

pub struct ProfileView {
    pub author: AuthorView,
    pub posts_count: u64,
    pub page_obj: PostPageView,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct PostDetailView {
    pub post: PostCardView,
    pub posts_count: u64,
    pub can_edit: bool,
    pub edit_href: String,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct ChoiceView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Post form; `post_id` is set in edit mode.
pub struct PostFormView {
    pub post_id: Option<i64>,
    pub action: String,
    pub text: String,
    pub groups: Vec<ChoiceView>,
    pub errors: FormErrors,
}

impl PostFormView {
    pub fn new(
        post_id: Option<i64>,
        text: &str,
        group: &str,
        groups: &[GroupRecord],
        errors: FormErrors,
    ) -> Self {
        let selected = group.trim();
        Self {
            action: match post_id {
                Some(id) => format!("/posts/{id}/edit/"),
                None => "/create/".to_string(),
            },
            post_id,
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|record| {
                    let value = record.id.to_string();
                    ChoiceView {
                        selected: value == selected,
                        label: record.title.clone(),
                        value,
                    }
                })
                .collect(),
            errors,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.post_id.is_some()
    }

    pub fn no_group_selected(&self) -> bool {
        !self.groups.iter().any(|choice| choice.selected)
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Default)]
pub struct SignupFormView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupFormView>,
}

#[derive(Default)]
pub struct LoginFormView {
    pub username: String,
    pub next: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginFormView>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Default)]
pub struct PasswordChangeFormView {
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub view: LayoutContext<PasswordChangeFormView>,
}

#[derive(Template)]
#[template(path = "users/password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Default)]
pub struct PasswordResetFormView {
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_form.html")]
pub struct PasswordResetTemplate {
    pub view: LayoutContext<PasswordResetFormView>,
}

#[derive(Template)]
#[template(path = "users/password_reset_done.html")]
pub struct PasswordResetDoneTemplate {
    pub view: LayoutContext<()>,
}

pub struct PasswordResetConfirmView {
    pub valid_link: bool,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub view: LayoutContext<PasswordResetConfirmView>,
}

#[derive(Template)]
#[template(path = "users/password_reset_complete.html")]
pub struct PasswordResetCompleteTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}

pub struct NotFoundView;

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}
