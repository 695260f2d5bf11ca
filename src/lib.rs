//! pprofweb - explore an uploaded profile in the browser.
//!
//! One profile at a time: an upload is written to a fixed path, rendered by
//! an [`engine::Engine`], and the engine's web UI is mounted under
//! [`config::NAMESPACE_ROOT`] until the next upload replaces it.

pub mod adapter;
pub mod api;
pub mod config;
pub mod engine;
pub mod session;
