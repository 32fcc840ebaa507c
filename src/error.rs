use thiserror::Error;

use crate::format::supported_formats_repr;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid format '{format}'.\n    Supported formats: {}", supported_formats_repr())]
    InvalidFormat { format: String },

    #[error("Transform failed with error code {code}: {}", .message.as_deref().unwrap_or("None"))]
    RendererError { code: i64, message: Option<String> },

    #[error("failed to decode renderer payload: {0}")]
    DecodingError(#[from] base64::DecodeError),

    #[error("failed to start renderer subprocess: {message}\n{stderr}")]
    Startup { message: String, stderr: String },

    #[error("renderer executable '{name}' not found on PATH")]
    RendererNotFound { name: String },

    #[error("renderer closed its output channel")]
    ClosedChannel,

    #[error("renderer I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("figure cannot be serialized as JSON: {0}")]
    Figure(#[source] serde_json::Error),

    #[error("malformed renderer message: {0}")]
    Protocol(#[from] serde_json::Error),
}
