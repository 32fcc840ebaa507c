use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ExportError, ExportResult};

/// Every format name accepted from callers, aliases included.
pub const SUPPORTED_FORMATS: [&str; 8] = ["png", "jpg", "jpeg", "webp", "svg", "pdf", "eps", "json"];

/// Formats whose renderer payload is plain text rather than base64.
pub const TEXT_FORMATS: [&str; 3] = ["svg", "json", "eps"];

/// Normalized export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Svg,
    Pdf,
    Eps,
    Json,
}

impl ImageFormat {
    /// Parse a user supplied format name.
    ///
    /// Case is ignored and `jpg` is accepted as an alias of `jpeg`. On failure
    /// the error carries the input exactly as given.
    pub fn parse(input: &str) -> ExportResult<Self> {
        let normalized = input.to_lowercase();
        let format = match normalized.as_str() {
            "png" => ImageFormat::Png,
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "webp" => ImageFormat::Webp,
            "svg" => ImageFormat::Svg,
            "pdf" => ImageFormat::Pdf,
            "eps" => ImageFormat::Eps,
            "json" => ImageFormat::Json,
            _ => {
                return Err(ExportError::InvalidFormat {
                    format: input.to_string(),
                })
            }
        };
        Ok(format)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
            ImageFormat::Eps => "eps",
            ImageFormat::Json => "json",
        }
    }

    /// True when the renderer returns this format as UTF-8 text.
    pub fn is_text(self) -> bool {
        TEXT_FORMATS.contains(&self.as_str())
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::parse(s)
    }
}

/// Supported format list rendered as `['png', 'jpg', ...]` for error messages.
pub(crate) fn supported_formats_repr() -> String {
    let quoted: Vec<String> = SUPPORTED_FORMATS.iter().map(|f| format!("'{}'", f)).collect();
    format!("[{}]", quoted.join(", "))
}
