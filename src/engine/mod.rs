//! Profile rendering engine interface.
//!
//! An engine takes a configuration source and a "server start" callback,
//! parses the profile named by the positional arguments, builds the handlers
//! for its web UI, and hands them to the callback instead of serving them
//! itself. The host decides where those handlers end up.

mod driver;
pub mod flags;
pub mod profile;
pub mod report;
mod web;

use axum::routing::MethodRouter;
use thiserror::Error;

pub use driver::PprofEngine;
pub use flags::{Flag, FlagError, FlagSet};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Flags(#[from] FlagError),

    #[error("failed to read profile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress profile: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("failed to decode profile: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("malformed profile: {0}")]
    Malformed(String),

    #[error("unknown sample index {0:?}")]
    SampleIndex(String),

    #[error("invalid regexp {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to resolve listen address {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render flame graph: {0}")]
    FlameGraph(#[source] std::io::Error),

    #[error("{0}")]
    Callback(String),
}

/// What the engine reports when it would start its HTTP server.
pub struct HttpServerArgs {
    /// The address as given on the `http` option.
    pub hostport: String,
    pub host: String,
    pub port: u16,
    /// URL pattern to handler, in registration order.
    pub handlers: Vec<(String, MethodRouter)>,
}

impl std::fmt::Debug for HttpServerArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerArgs")
            .field("hostport", &self.hostport)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "patterns",
                &self.handlers.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

pub type HttpServerFn<'a> = dyn FnMut(HttpServerArgs) -> Result<(), EngineError> + 'a;

pub struct EngineOptions<'a> {
    pub flagset: &'a mut dyn FlagSet,
    pub http_server: &'a mut HttpServerFn<'a>,
}

/// A profile renderer driven entirely through [`EngineOptions`].
///
/// `run` is synchronous and may take as long as parsing and rendering need.
/// A successful run calls `http_server` exactly once; an error from the
/// callback aborts the run and is returned unchanged.
pub trait Engine: Send + Sync + 'static {
    fn run(&self, options: EngineOptions<'_>) -> Result<(), EngineError>;
}
