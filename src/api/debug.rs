//! `/debug/pprof/` diagnostics for the server process itself.
//!
//! `profile` samples this process with a signal-based CPU profiler and
//! answers with a gzipped pprof protobuf, the same format the upload form
//! accepts. `symbol` and `trace` have no equivalent here and answer 501.

use std::io::Write;
use std::time::Duration;

use askama::Template;
use axum::{
    extract::{Path, Query},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use flate2::{write::GzEncoder, Compression};
use pprof::protos::Message;
use serde::Deserialize;

use super::error::ApiError;

const DEFAULT_PROFILE_SECONDS: u64 = 30;
const PROFILE_FREQUENCY: i32 = 100;

struct Endpoint {
    name: &'static str,
    description: &'static str,
}

const ENDPOINTS: [Endpoint; 4] = [
    Endpoint {
        name: "cmdline",
        description: "The command line invoking the current program",
    },
    Endpoint {
        name: "profile",
        description: "CPU profile. Set the duration with the seconds GET parameter.",
    },
    Endpoint {
        name: "symbol",
        description: "Symbol lookup (unsupported)",
    },
    Endpoint {
        name: "trace",
        description: "Execution trace (unsupported)",
    },
];

#[derive(Template)]
#[template(path = "debug_index.html")]
struct IndexPage<'a> {
    pid: u32,
    endpoints: &'a [Endpoint],
}

pub(super) async fn index() -> Response {
    let page = IndexPage {
        pid: std::process::id(),
        endpoints: &ENDPOINTS,
    };
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("template render failed: {}", e),
        )
            .into_response(),
    }
}

/// Unknown names under `/debug/pprof/`.
pub(super) async fn named(Path(name): Path<String>) -> ApiError {
    tracing::debug!(%name, "unknown debug profile");
    ApiError::NotFound
}

/// Command-line arguments separated by NUL bytes.
pub(super) async fn cmdline() -> String {
    std::env::args().collect::<Vec<_>>().join("\0")
}

#[derive(Debug, Deserialize)]
pub(super) struct ProfileParams {
    seconds: Option<String>,
}

impl ProfileParams {
    /// Missing, unparsable and non-positive durations fall back to 30s.
    fn duration(&self) -> Duration {
        let seconds = self
            .seconds
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PROFILE_SECONDS);
        Duration::from_secs(seconds)
    }
}

/// CPU profile of this process over `seconds`.
pub(super) async fn profile(Query(params): Query<ProfileParams>) -> Result<Response, ApiError> {
    let duration = params.duration();
    tracing::info!(?duration, "cpu profile requested");
    let body = tokio::task::spawn_blocking(move || cpu_profile(duration))
        .await
        .map_err(|e| ApiError::Profiling(e.to_string()))??;
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"profile\""),
        ],
        body,
    )
        .into_response())
}

fn cpu_profile(duration: Duration) -> Result<Vec<u8>, ApiError> {
    let guard = pprof::ProfilerGuardBuilder::default()
        .frequency(PROFILE_FREQUENCY)
        .blocklist(&["libc", "libgcc", "pthread", "vdso"])
        .build()
        .map_err(|e| ApiError::Profiling(format!("could not enable CPU profiling: {}", e)))?;
    std::thread::sleep(duration);

    let profile = guard
        .report()
        .build()
        .and_then(|report| report.pprof())
        .map_err(|e| ApiError::Profiling(e.to_string()))?;
    drop(guard);

    let mut encoded = Vec::new();
    profile
        .encode(&mut encoded)
        .map_err(|e| ApiError::Profiling(e.to_string()))?;
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(&encoded)
        .map_err(|e| ApiError::Profiling(e.to_string()))?;
    gz.finish().map_err(|e| ApiError::Profiling(e.to_string()))
}

pub(super) async fn unsupported(uri: Uri) -> Response {
    ApiError::NotImplemented(uri.path().to_string()).into_response()
}
