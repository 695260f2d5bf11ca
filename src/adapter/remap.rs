//! Rewrites an engine's handler set under the host's namespace.

use std::collections::BTreeMap;

use axum::{http::StatusCode, routing::MethodRouter, Router};
use tower_http::compression::CompressionLayer;

/// Mount point for `pattern` below `root`.
///
/// The engine's own root (`/`) maps to `root` exactly. Anything else is
/// joined onto it with `.`/`..` resolved, duplicate separators collapsed,
/// and no trailing slash.
pub fn join_pattern(root: &str, pattern: &str) -> String {
    if pattern == "/" {
        return root.to_string();
    }
    let mut segments: Vec<&str> = Vec::new();
    for seg in root.split('/').chain(pattern.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Compose the engine's handlers into one router whose routes already carry
/// the namespace prefix, so requests can be forwarded to it unmodified.
///
/// Colliding mount points keep the last registration. A mount point ending
/// in `/` also answers every otherwise unmatched path beneath it. Responses
/// are gzip-compressed when the client accepts it.
pub fn remap_handlers<I>(root: &str, handlers: I) -> Router
where
    I: IntoIterator<Item = (String, MethodRouter)>,
{
    let mut routes: BTreeMap<String, MethodRouter> = BTreeMap::new();
    for (pattern, handler) in handlers {
        let mounted = join_pattern(root, &pattern);
        tracing::debug!(%pattern, %mounted, "mounting engine handler");
        if routes.insert(mounted.clone(), handler).is_some() {
            tracing::warn!(%mounted, "duplicate handler pattern, keeping the last one");
        }
    }

    let mut router = Router::new();
    for (path, handler) in routes {
        let path = escape_route(&path);
        if path.ends_with('/') {
            router = router.route(&format!("{path}{{*rest}}"), handler.clone());
        }
        router = router.route(&path, handler);
    }
    router
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .layer(CompressionLayer::new())
}

/// Braces are route parameters to the router; engine patterns are literal.
fn escape_route(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
        routing::get,
    };
    use tower::ServiceExt;

    const ROOT: &str = "/pprofweb/";

    async fn body_of(router: &Router, uri: &str) -> (StatusCode, String) {
        let resp = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[test]
    fn root_pattern_maps_to_namespace_root() {
        assert_eq!(join_pattern(ROOT, "/"), "/pprofweb/");
    }

    #[test]
    fn other_patterns_are_joined_without_duplicate_separators() {
        assert_eq!(join_pattern(ROOT, "/top"), "/pprofweb/top");
        assert_eq!(join_pattern(ROOT, "top"), "/pprofweb/top");
        assert_eq!(join_pattern(ROOT, "//flamegraph//"), "/pprofweb/flamegraph");
        assert_eq!(join_pattern(ROOT, "/a/./b/../c"), "/pprofweb/a/c");
        assert_eq!(join_pattern("/pprofweb", "/top"), "/pprofweb/top");
    }

    #[test]
    fn empty_pattern_collapses_onto_namespace() {
        assert_eq!(join_pattern(ROOT, ""), "/pprofweb");
    }

    #[test]
    fn braces_are_escaped() {
        assert_eq!(escape_route("/pprofweb/{x}"), "/pprofweb/{{x}}");
    }

    #[tokio::test]
    async fn serves_rewritten_paths() {
        let router = remap_handlers(
            ROOT,
            vec![
                ("/".to_string(), get(|| async { "index" })),
                ("/top".to_string(), get(|| async { "top" })),
            ],
        );
        assert_eq!(body_of(&router, "/pprofweb/").await, (StatusCode::OK, "index".into()));
        assert_eq!(body_of(&router, "/pprofweb/top").await, (StatusCode::OK, "top".into()));
        // Unprefixed engine paths are not reachable once rewritten.
        assert_eq!(body_of(&router, "/top").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_answers_unmatched_subpaths() {
        let router = remap_handlers(ROOT, vec![("/".to_string(), get(|| async { "index" }))]);
        assert_eq!(
            body_of(&router, "/pprofweb/some/deep/path").await,
            (StatusCode::OK, "index".into())
        );
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let router = remap_handlers(
            ROOT,
            vec![
                ("/top".to_string(), get(|| async { "first" })),
                ("top".to_string(), get(|| async { "second" })),
            ],
        );
        assert_eq!(body_of(&router, "/pprofweb/top").await.1, "second");
    }

    #[tokio::test]
    async fn compresses_when_accepted() {
        let big = "x".repeat(4096);
        let router = remap_handlers(
            ROOT,
            vec![("/".to_string(), get(move || async move { big }))],
        );
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/pprofweb/")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.headers().get(header::CONTENT_ENCODING).unwrap(), "gzip");
    }
}
