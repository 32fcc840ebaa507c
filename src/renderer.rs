use serde_json::Value;

use crate::config::ScopeFlags;
use crate::error::ExportResult;
use crate::request::ResolvedRequest;
use crate::response::RawResponse;

/// The process that actually draws charts.
pub trait Renderer {
    /// Render `chart` with the resolved parameters.
    ///
    /// `flags` are the resources the renderer should be started with if it is
    /// not already running.
    fn submit(&mut self, chart: &Value, request: &ResolvedRequest, flags: &ScopeFlags) -> ExportResult<RawResponse>;

    /// Discard any running process so the next `submit` starts fresh.
    /// Must be safe to call when nothing is running.
    fn shutdown(&mut self);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn submit(&mut self, chart: &Value, request: &ResolvedRequest, flags: &ScopeFlags) -> ExportResult<RawResponse> {
        (**self).submit(chart, request, flags)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
