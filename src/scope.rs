use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{ExportConfig, ScopeFlags};
use crate::error::{ExportError, ExportResult};
use crate::process::SubprocessRenderer;
use crate::renderer::Renderer;
use crate::request::{resolve, TransformOptions};
use crate::response::interpret;

/// Static image export for chart figures.
///
/// Owns the export defaults and the renderer. Changing any renderer resource
/// shuts the renderer down so the next export starts it with the new flags.
pub struct ExportScope<R: Renderer = SubprocessRenderer> {
    config: ExportConfig,
    renderer: R,
}

impl ExportScope<SubprocessRenderer> {
    /// Scope using the renderer executable found on `PATH`.
    pub fn locate(config: ExportConfig) -> ExportResult<Self> {
        Ok(Self::new(config, SubprocessRenderer::locate()?))
    }
}

impl<R: Renderer> ExportScope<R> {
    pub fn new(config: ExportConfig, renderer: R) -> Self {
        Self { config, renderer }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Mutable access to the export defaults. Does not restart the renderer.
    pub fn config_mut(&mut self) -> &mut ExportConfig {
        &mut self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Export any serializable figure.
    pub fn transform<T: Serialize + ?Sized>(&mut self, figure: &T, options: &TransformOptions) -> ExportResult<Vec<u8>> {
        let chart = serde_json::to_value(figure).map_err(ExportError::Figure)?;
        self.transform_value(&chart, options)
    }

    /// Export a chart given as JSON.
    pub fn transform_value(&mut self, chart: &Value, options: &TransformOptions) -> ExportResult<Vec<u8>> {
        let request = resolve(chart, options, &self.config)?;
        let raw = self.renderer.submit(chart, &request, &self.config.flags)?;
        let bytes = interpret(raw, request.format)?;
        debug!(format = %request.format, bytes = bytes.len(), "chart exported");
        Ok(bytes)
    }

    pub fn set_script_bundle(&mut self, value: Option<String>) {
        self.config.flags.script_bundle = value;
        self.renderer.shutdown();
    }

    pub fn set_math_bundle(&mut self, value: Option<String>) {
        self.config.flags.math_bundle = value;
        self.renderer.shutdown();
    }

    pub fn set_geo_bundle(&mut self, value: Option<String>) {
        self.config.flags.geo_bundle = value;
        self.renderer.shutdown();
    }

    pub fn set_access_token(&mut self, value: Option<String>) {
        self.config.flags.access_token = value;
        self.renderer.shutdown();
    }

    /// Apply a partial flag update, shutting the renderer down once if
    /// anything was set.
    pub fn configure(&mut self, update: ScopeFlags) {
        if self.config.flags.configure(update) {
            self.renderer.shutdown();
        }
    }

    /// Stop the renderer now instead of on drop.
    pub fn shutdown(&mut self) {
        self.renderer.shutdown();
    }
}
