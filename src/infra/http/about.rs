use axum::{Router, http::StatusCode, response::Response, routing::get};

use crate::presentation::views::{
    AboutAuthorTemplate, AboutTechTemplate, LayoutContext, render_template_response,
};

use super::{HttpState, session::Visitor};

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/about/author/", get(author))
        .route("/about/tech/", get(tech))
}

async fn author(visitor: Visitor) -> Response {
    let view = LayoutContext::new(visitor.chrome(), "About the author", ());
    render_template_response(AboutAuthorTemplate { view }, StatusCode::OK)
}

async fn tech(visitor: Visitor) -> Response {
    let view = LayoutContext::new(visitor.chrome(), "Technologies", ());
    render_template_response(AboutTechTemplate { view }, StatusCode::OK)
}
