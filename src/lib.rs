// Library exports for plotscope

pub mod config;
pub mod error;
pub mod format;
pub mod math_bundle;
pub mod process;
pub mod renderer;
pub mod request;
pub mod response;
pub mod scope;
pub mod telemetry;

pub use config::{ExportConfig, ScopeFlags};
pub use error::{ExportError, ExportResult};
pub use format::{ImageFormat, SUPPORTED_FORMATS, TEXT_FORMATS};
pub use math_bundle::{resolve_math_bundle, MathBundleLocator};
pub use process::SubprocessRenderer;
pub use renderer::Renderer;
pub use request::{resolve, ResolvedRequest, TransformOptions};
pub use response::{interpret, RawResponse};
pub use scope::ExportScope;
