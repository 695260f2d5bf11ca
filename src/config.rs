use std::path::PathBuf;

/// Environment variable selecting the listen port.
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8080;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 32 << 20;

/// Multipart field carrying the profile.
pub const FILE_FIELD: &str = "file";
pub const UPLOAD_PATH: &str = "/upload";

/// Where the rendered profile UI is mounted.
pub const NAMESPACE_ROOT: &str = "/pprofweb/";

/// Runtime settings shared by every request handler.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The single on-disk copy of the most recent upload.
    pub profile_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            profile_path: default_profile_path(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

pub fn default_profile_path() -> PathBuf {
    std::env::temp_dir().join("pprofweb-temp")
}

/// Resolve the listen port, falling back to [`DEFAULT_PORT`] with a warning.
pub fn resolve_port(port: Option<u16>) -> u16 {
    match port {
        Some(port) => port,
        None => {
            tracing::warn!(
                "{} not specified; using default {}",
                PORT_ENV,
                DEFAULT_PORT
            );
            DEFAULT_PORT
        }
    }
}
