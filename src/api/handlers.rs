use std::path::Path;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Request, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::adapter::{render_profile, RenderError};
use crate::config::{FILE_FIELD, NAMESPACE_ROOT};

use super::error::ApiError;
use super::web;
use super::AppState;

/// `/` and every path nothing else claims.
pub(super) async fn root(method: Method, uri: Uri) -> Result<Response, ApiError> {
    tracing::info!(%method, %uri, "root");
    if method != Method::GET {
        return Err(ApiError::WrongMethod);
    }
    if uri.path() != "/" {
        return Err(ApiError::NotFound);
    }
    Ok(web::root_page())
}

pub(super) async fn upload(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Redirect, ApiError> {
    tracing::info!(%method, %uri, "upload");
    if method != Method::POST {
        return Err(ApiError::WrongMethod);
    }
    match load_upload(&state, multipart).await {
        Ok(generation) => {
            tracing::info!(generation, "profile uploaded");
            Ok(Redirect::to(NAMESPACE_ROOT))
        }
        Err(e) => {
            tracing::error!(code = e.code(), "upload error: {}", e);
            Err(e)
        }
    }
}

/// Read the upload, persist it, render it, install it. Nothing is written to
/// disk until the whole file field has been received within the body limit.
async fn load_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<u64, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::Upload(e.body_text()))?;
    let data = read_file_field(&mut multipart).await?;

    // One upload at a time owns the profile file until its render finishes,
    // even if the request itself is dropped while the render is running.
    let guard = state.upload_lock.clone().lock_owned().await;

    let path = state.config.profile_path.clone();
    persist(&path, &data)
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "profile written");

    let engine = state.engine.clone();
    let session = state.session.clone();
    tokio::task::spawn_blocking(move || {
        let rendered = render_profile(engine.as_ref(), &path, NAMESPACE_ROOT, &session);
        drop(guard);
        rendered
    })
    .await
    .map_err(RenderError::from)
    .and_then(|rendered| rendered)
    .map_err(|e| ApiError::Upload(e.to_string()))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Upload(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            return field.bytes().await.map_err(|e| ApiError::Upload(e.body_text()));
        }
    }
    Err(ApiError::Upload(format!(
        "no file field named {:?} in upload",
        FILE_FIELD
    )))
}

/// Overwrite `path` with `data` and wait until it is on disk.
async fn persist(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut opts = tokio::fs::OpenOptions::new();
    opts.create(true).truncate(true).write(true);
    #[cfg(unix)]
    opts.mode(0o600);
    let mut file = opts.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Everything under the namespace goes to the live session.
pub(super) async fn serve_session(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, ApiError> {
    state.session.dispatch(req).await
}

/// The bare namespace (no trailing slash) redirects to the namespace root.
pub(super) async fn namespace_redirect() -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, NAMESPACE_ROOT)],
    )
        .into_response()
}
