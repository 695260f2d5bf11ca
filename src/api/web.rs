use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

const ROOT_PAGE: &str = "index.html";

/// Serve an embedded static asset by name.
pub(super) fn asset(path: &str) -> axum::response::Response {
    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_text_plain().to_string();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub(super) fn root_page() -> axum::response::Response {
    asset(ROOT_PAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FILE_FIELD, UPLOAD_PATH};

    #[test]
    fn root_page_is_embedded() {
        assert!(Assets::get(ROOT_PAGE).is_some(), "assets/index.html should be embedded");
    }

    #[test]
    fn root_page_form_matches_upload_route() {
        let file = Assets::get(ROOT_PAGE).unwrap();
        let content = std::str::from_utf8(&file.data).unwrap();
        assert!(content.contains(&format!("action=\"{}\"", UPLOAD_PATH)));
        assert!(content.contains(&format!("name=\"{}\"", FILE_FIELD)));
        assert!(content.contains("multipart/form-data"));
    }

    #[test]
    fn root_page_is_html() {
        let resp = root_page();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");
    }
}
