use serde::Serialize;
use serde_json::Value;

use crate::config::ExportConfig;
use crate::error::ExportResult;
use crate::format::ImageFormat;

/// Per-call overrides of the config defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions {
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
}

impl TransformOptions {
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Effective export parameters for one transform call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedRequest {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

/// Resolve format, size and scale for `chart`.
///
/// Width and height fall back from the explicit option to `layout`, then to
/// `layout.template.layout`, then to the config default. Zero, `null` and
/// non-numeric values count as absent. Fractional layout sizes are rounded to
/// whole pixels; values that round below 1 or exceed `u32::MAX` (negative or
/// oversized sizes included) also fall through to the next source.
pub fn resolve(chart: &Value, options: &TransformOptions, config: &ExportConfig) -> ExportResult<ResolvedRequest> {
    let format = options.format.as_deref().unwrap_or(&config.default_format);
    let scale = options.scale.unwrap_or(config.default_scale);

    let layout = chart.get("layout");
    let template_layout = layout
        .and_then(|l| l.get("template"))
        .and_then(|t| t.get("layout"));

    let width = options
        .width
        .filter(|w| *w > 0)
        .or_else(|| dimension(layout, "width"))
        .or_else(|| dimension(template_layout, "width"))
        .unwrap_or(config.default_width);
    let height = options
        .height
        .filter(|h| *h > 0)
        .or_else(|| dimension(layout, "height"))
        .or_else(|| dimension(template_layout, "height"))
        .unwrap_or(config.default_height);

    let format = ImageFormat::parse(format)?;

    Ok(ResolvedRequest {
        format,
        width,
        height,
        scale,
    })
}

fn dimension(layout: Option<&Value>, key: &str) -> Option<u32> {
    let value = layout?.get(key)?;
    let pixels = match value.as_u64() {
        Some(n) => n as f64,
        None => value.as_f64()?.round(),
    };
    if pixels >= 1.0 && pixels <= u32::MAX as f64 {
        Some(pixels as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeFlags;
    use crate::error::ExportError;
    use serde_json::json;

    fn config() -> ExportConfig {
        ExportConfig::with_resolved_flags(ScopeFlags::default())
    }

    #[test]
    fn test_resolve_defaults_for_empty_chart() {
        let req = resolve(&json!({}), &TransformOptions::default(), &config()).unwrap();
        assert_eq!(req.format, ImageFormat::Png);
        assert_eq!(req.width, 700);
        assert_eq!(req.height, 500);
        assert_eq!(req.scale, 1.0);
    }

    #[test]
    fn test_layout_overrides_default() {
        let mut cfg = config();
        cfg.default_width = 1200;
        let chart = json!({"layout": {"width": 300}});
        let req = resolve(&chart, &TransformOptions::default(), &cfg).unwrap();
        assert_eq!(req.width, 300);
        assert_eq!(req.height, 500);
    }

    #[test]
    fn test_template_layout_fallback() {
        let chart = json!({
            "layout": {
                "height": 250,
                "template": {"layout": {"width": 640, "height": 480}}
            }
        });
        let req = resolve(&chart, &TransformOptions::default(), &config()).unwrap();
        assert_eq!(req.width, 640);
        assert_eq!(req.height, 250);
    }

    #[test]
    fn test_explicit_beats_layout() {
        let chart = json!({"layout": {"width": 300, "height": 200}});
        let options = TransformOptions::default().size(800, 600).scale(2.0);
        let req = resolve(&chart, &options, &config()).unwrap();
        assert_eq!((req.width, req.height), (800, 600));
        assert_eq!(req.scale, 2.0);
    }

    #[test]
    fn test_null_and_zero_dimensions_fall_through() {
        let chart = json!({
            "layout": {
                "width": null,
                "height": 0,
                "template": {"layout": {"width": 410.6}}
            }
        });
        let options = TransformOptions { width: Some(0), ..Default::default() };
        let req = resolve(&chart, &options, &config()).unwrap();
        assert_eq!(req.width, 411);
        assert_eq!(req.height, 500);
    }

    #[test]
    fn test_out_of_range_layout_sizes_fall_through() {
        let chart = json!({
            "layout": {
                "width": -300,
                "height": 1e12,
                "template": {"layout": {"width": 0.4, "height": 250.5}}
            }
        });
        let req = resolve(&chart, &TransformOptions::default(), &config()).unwrap();
        assert_eq!(req.width, 700);
        assert_eq!(req.height, 251);
    }

    #[test]
    fn test_format_normalization() {
        let chart = json!({});
        for (input, expected) in [("JPG", ImageFormat::Jpeg), ("jpg", ImageFormat::Jpeg), ("Svg", ImageFormat::Svg)] {
            let options = TransformOptions::default().format(input);
            let req = resolve(&chart, &options, &config()).unwrap();
            assert_eq!(req.format, expected);
        }
    }

    #[test]
    fn test_config_default_format() {
        let mut cfg = config();
        cfg.default_format = "PDF".to_string();
        let req = resolve(&json!({}), &TransformOptions::default(), &cfg).unwrap();
        assert_eq!(req.format, ImageFormat::Pdf);
    }

    #[test]
    fn test_invalid_format_keeps_original_text() {
        let options = TransformOptions::default().format("Tiff");
        let err = resolve(&json!({}), &options, &config()).unwrap_err();
        assert!(matches!(err, ExportError::InvalidFormat { .. }));
        assert!(err.to_string().contains("'Tiff'"));
        assert!(err.to_string().contains("'webp'"));
    }

    #[test]
    fn test_request_serializes_for_renderer() {
        let req = ResolvedRequest { format: ImageFormat::Jpeg, width: 10, height: 20, scale: 1.5 };
        assert_eq!(
            serde_json::to_value(req).unwrap(),
            json!({"format": "jpeg", "width": 10, "height": 20, "scale": 1.5})
        );
    }
}
