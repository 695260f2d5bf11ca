//! Bridges a rendering [`Engine`] into the host's session.
//!
//! The engine expects a command line and wants to run its own HTTP server.
//! [`render_profile`] hands it a fixed configuration instead
//! ([`FixedFlagSet`]) and intercepts the server start: the reported handlers
//! are rewritten under the namespace ([`remap_handlers`]) and installed as
//! the live [`Session`] once the engine returns successfully.

pub mod flags;
pub mod remap;

use std::path::Path;

use axum::Router;
use thiserror::Error;

use crate::engine::{Engine, EngineError, EngineOptions, HttpServerArgs};
use crate::session::Session;

pub use flags::FixedFlagSet;
pub use remap::{join_pattern, remap_handlers};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("rendering engine returned without reporting its handlers")]
    NoHandlers,

    #[error("render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run `engine` once over the profile at `profile` and install the resulting
/// handler set under `namespace`. Blocks for the whole engine run.
///
/// Returns the generation of the installed session. On any error the
/// session is left as it was.
pub fn render_profile(
    engine: &dyn Engine,
    profile: &Path,
    namespace: &str,
    session: &Session,
) -> Result<u64, RenderError> {
    let mut flagset = FixedFlagSet::for_profile(profile);
    let mut staged: Option<Router> = None;
    let mut http_server = |args: HttpServerArgs| -> Result<(), EngineError> {
        tracing::debug!(?args, "engine reported handlers");
        staged = Some(remap_handlers(namespace, args.handlers));
        Ok(())
    };

    engine.run(EngineOptions {
        flagset: &mut flagset,
        http_server: &mut http_server,
    })?;

    let handlers = staged.ok_or(RenderError::NoHandlers)?;
    Ok(session.install(handlers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FlagSet;
    use axum::{body::Body, http::Request, routing::get};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Records the options it saw and reports a fixed handler set.
    #[derive(Default)]
    struct RecordingEngine {
        seen: Arc<Mutex<Vec<(String, bool, Vec<String>)>>>,
        fail_after_callback: bool,
        skip_callback: bool,
    }

    impl Engine for RecordingEngine {
        fn run(&self, mut options: EngineOptions<'_>) -> Result<(), EngineError> {
            let http = options.flagset.string("http", "", "listen address");
            let no_browser = options.flagset.bool("no_browser", false, "skip browser");
            let sources = options.flagset.parse(&mut || {})?;
            self.seen.lock().push((http.get(), no_browser.get(), sources.clone()));

            if !self.skip_callback {
                (options.http_server)(HttpServerArgs {
                    hostport: http.get(),
                    host: "localhost".into(),
                    port: 0,
                    handlers: vec![
                        ("/".into(), get(|| async { "root" })),
                        ("/top".into(), get(|| async { "top" })),
                    ],
                })?;
            }
            if self.fail_after_callback {
                return Err(EngineError::Malformed("late failure".into()));
            }
            Ok(())
        }
    }

    async fn get_text(router: Router, uri: &str) -> String {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn installs_rewritten_handlers() {
        let engine = RecordingEngine::default();
        let session = Session::new();

        let generation =
            render_profile(&engine, Path::new("/tmp/cpu.pb"), "/pprofweb/", &session).unwrap();
        assert_eq!(generation, 1);

        let seen = engine.seen.lock().clone();
        assert_eq!(
            seen,
            vec![("localhost:0".to_string(), true, vec!["/tmp/cpu.pb".to_string()])]
        );

        let handlers = session.snapshot().unwrap().handlers;
        assert_eq!(get_text(handlers.clone(), "/pprofweb/").await, "root");
        assert_eq!(get_text(handlers, "/pprofweb/top").await, "top");
    }

    #[test]
    fn engine_error_leaves_session_untouched() {
        let engine = RecordingEngine {
            fail_after_callback: true,
            ..Default::default()
        };
        let session = Session::new();
        let err = render_profile(&engine, Path::new("/tmp/cpu.pb"), "/pprofweb/", &session)
            .unwrap_err();
        assert_eq!(err.to_string(), "malformed profile: late failure");
        assert!(!session.is_loaded());
    }

    #[test]
    fn engine_that_never_reports_is_an_error() {
        let engine = RecordingEngine {
            skip_callback: true,
            ..Default::default()
        };
        let session = Session::new();
        let err = render_profile(&engine, Path::new("/tmp/cpu.pb"), "/pprofweb/", &session)
            .unwrap_err();
        assert!(matches!(err, RenderError::NoHandlers));
        assert!(!session.is_loaded());
    }
}
