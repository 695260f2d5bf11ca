use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Error type for every front-door handler.
///
/// Each variant maps to an HTTP status code and a plain-text body. Upload
/// failures carry the underlying error text verbatim.
#[derive(Debug)]
pub enum ApiError {
    /// 405 - Route exists but not for this method.
    WrongMethod,
    /// 404 - No such page.
    NotFound,
    /// 500 - The namespace was hit before any profile was loaded.
    NotReady,
    /// 500 - Reading, persisting or rendering an upload failed.
    Upload(String),
    /// 500 - The CPU profiler could not be started or read out.
    Profiling(String),
    /// 501 - Diagnostic endpoint with no equivalent in this runtime.
    NotImplemented(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::WrongMethod => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NotReady => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Profiling(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Machine-readable code, used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::WrongMethod => "wrong_method",
            ApiError::NotFound => "not_found",
            ApiError::NotReady => "not_ready",
            ApiError::Upload(_) => "upload_failed",
            ApiError::Profiling(_) => "profiling_failed",
            ApiError::NotImplemented(_) => "not_implemented",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::WrongMethod => "wrong method".to_string(),
            ApiError::NotFound => "not found".to_string(),
            ApiError::NotReady => "must upload profile first".to_string(),
            ApiError::Upload(detail) => detail.clone(),
            ApiError::Profiling(detail) => detail.clone(),
            ApiError::NotImplemented(what) => format!("{} is not supported", what),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            self.message(),
        )
            .into_response()
    }
}
