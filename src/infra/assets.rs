//! Embedded static asset serving.

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::Mime;

use crate::application::error::ErrorReport;

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Serve a file from the embedded `static/` tree.
pub async fn serve_static(path: Option<Path<String>>) -> Response {
    let captured = path.map(|Path(value)| value).unwrap_or_default();
    match resolve_asset(&STATIC_ASSETS, &captured) {
        Some(asset) => asset.into_response(),
        None => {
            let mut response = StatusCode::NOT_FOUND.into_response();
            ErrorReport::from_message(
                "infra::assets::serve_static",
                StatusCode::NOT_FOUND,
                format!("Static asset `{captured}` not found"),
            )
            .attach(&mut response);
            response
        }
    }
}

struct Asset {
    contents: &'static [u8],
    mime: Mime,
}

fn resolve_asset(bundle: &'static Dir<'static>, path: &str) -> Option<Asset> {
    let candidate = path.trim_start_matches('/');
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        return None;
    }

    let file = bundle.get_file(candidate)?;
    Some(Asset {
        contents: file.contents(),
        mime: mime_guess::from_path(candidate).first_or_octet_stream(),
    })
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let len = self.contents.len();
        let mut response = Response::new(Body::from(Bytes::from_static(self.contents)));
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(self.mime.as_ref()) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_stylesheet() {
        let asset = resolve_asset(&STATIC_ASSETS, "/css/main.css").expect("stylesheet");
        assert_eq!(asset.mime.essence_str(), "text/css");
        assert!(!asset.contents.is_empty());
    }

    #[test]
    fn rejects_traversal_and_directories() {
        assert!(resolve_asset(&STATIC_ASSETS, "../Cargo.toml").is_none());
        assert!(resolve_asset(&STATIC_ASSETS, "css/").is_none());
        assert!(resolve_asset(&STATIC_ASSETS, "").is_none());
    }
}
