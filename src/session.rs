//! The single live profile session.
//!
//! A process has exactly one [`Session`]. It starts unloaded and holds, after
//! the first successful render, the handler set of the most recently loaded
//! profile. Every later render replaces that set wholesale; there is no way
//! back to unloaded.

use std::sync::Arc;

use axum::{body::Body, extract::Request, response::Response, Router};
use parking_lot::RwLock;
use tower::ServiceExt;

use crate::api::error::ApiError;

/// Handler set of one successfully rendered profile.
#[derive(Clone)]
pub struct LoadedSession {
    pub handlers: Router,
    /// 1 for the first install, incremented on every replacement.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loaded { generation: u64 },
}

/// Shared handle to the live handler set.
///
/// Clones refer to the same session. Readers take a snapshot of the current
/// [`LoadedSession`] under a short read lock; [`Session::install`] swaps the
/// whole value under the write lock, so a request sees either the previous
/// set or the new one, never a mix.
#[derive(Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<LoadedSession>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live handler set. Returns the new generation.
    pub fn install(&self, handlers: Router) -> u64 {
        let mut current = self.current.write();
        let generation = current.as_ref().map_or(0, |s| s.generation) + 1;
        let previous = current.replace(LoadedSession {
            handlers,
            generation,
        });
        drop(current);
        match previous {
            Some(prev) => tracing::info!(
                generation,
                replaced = prev.generation,
                "profile session replaced"
            ),
            None => tracing::info!(generation, "profile session loaded"),
        }
        generation
    }

    pub fn snapshot(&self) -> Option<LoadedSession> {
        self.current.read().clone()
    }

    pub fn state(&self) -> SessionState {
        match &*self.current.read() {
            Some(loaded) => SessionState::Loaded {
                generation: loaded.generation,
            },
            None => SessionState::Unloaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Forward `req` unchanged to the live handler set, which owns the
    /// response entirely. Fails with [`ApiError::NotReady`] while unloaded.
    pub async fn dispatch(&self, req: Request<Body>) -> Result<Response, ApiError> {
        let loaded = self.snapshot().ok_or(ApiError::NotReady)?;
        match loaded.handlers.oneshot(req).await {
            Ok(resp) => Ok(resp),
            Err(never) => match never {},
        }
    }
}
