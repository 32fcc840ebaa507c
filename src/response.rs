use base64::Engine as _;
use serde::Deserialize;

use crate::error::{ExportError, ExportResult};
use crate::format::ImageFormat;

/// A single JSON message from the renderer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Turn a renderer response into the final artifact bytes.
///
/// Text formats come back verbatim as UTF-8; everything else is base64.
pub fn interpret(raw: RawResponse, format: ImageFormat) -> ExportResult<Vec<u8>> {
    if raw.code != 0 {
        return Err(ExportError::RendererError {
            code: raw.code,
            message: raw.message,
        });
    }

    let result = raw.result.ok_or_else(|| ExportError::RendererError {
        code: raw.code,
        message: Some("renderer reported success without a result".to_string()),
    })?;

    if format.is_text() {
        return Ok(result.into_bytes());
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(result.as_bytes())?)
}
