mod debug;
pub mod error;
mod handlers;
mod web;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    routing::{any, get},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use std::sync::Arc;

use crate::config::{ServerConfig, NAMESPACE_ROOT, UPLOAD_PATH};
use crate::engine::Engine;
use crate::session::Session;

use handlers::*;

#[derive(Clone)]
pub struct AppState {
    /// The one live profile session.
    pub session: Session,
    /// Renderer invoked once per upload.
    pub engine: Arc<dyn Engine>,
    pub config: Arc<ServerConfig>,
    /// Serializes uploads: held from the file write until the render is done.
    pub upload_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(engine: Arc<dyn Engine>, config: ServerConfig) -> Self {
        Self {
            session: Session::new(),
            engine,
            config: Arc::new(config),
            upload_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let namespace_subtree = format!("{}{{*rest}}", NAMESPACE_ROOT);
    let namespace_bare = NAMESPACE_ROOT.trim_end_matches('/');

    Router::new()
        .route("/", any(root))
        .route(UPLOAD_PATH, any(upload).layer(upload_limit))
        .route(namespace_bare, any(namespace_redirect))
        .route(NAMESPACE_ROOT, any(serve_session))
        .route(&namespace_subtree, any(serve_session))
        .route("/debug/pprof/", get(debug::index))
        .route("/debug/pprof/cmdline", get(debug::cmdline))
        .route("/debug/pprof/profile", get(debug::profile))
        .route(
            "/debug/pprof/symbol",
            get(debug::unsupported).post(debug::unsupported),
        )
        .route("/debug/pprof/trace", get(debug::unsupported))
        .route("/debug/pprof/{name}", get(debug::named))
        .fallback(root)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
}
