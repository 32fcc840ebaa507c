use serde::{Deserialize, Serialize};

use crate::math_bundle::{resolve_math_bundle_with, MathBundleLocator};

/// Resource locators handed to the renderer at startup.
///
/// Changing any of them requires the renderer process to be restarted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFlags {
    /// URL or local path of the plotting script bundle. Renderer default when unset.
    #[serde(default)]
    pub script_bundle: Option<String>,
    /// URL of a MathJax bundle. LaTeX rendering is disabled when unset.
    #[serde(default)]
    pub math_bundle: Option<String>,
    /// URL of the topojson files used by geographic traces.
    #[serde(default)]
    pub geo_bundle: Option<String>,
    /// Map tile access token.
    #[serde(default)]
    pub access_token: Option<String>,
}

impl ScopeFlags {
    /// Apply a partial update. `None` fields in `update` are left untouched.
    ///
    /// Returns true if at least one field was set.
    pub fn configure(&mut self, update: ScopeFlags) -> bool {
        let mut touched = false;
        for (slot, value) in [
            (&mut self.script_bundle, update.script_bundle),
            (&mut self.math_bundle, update.math_bundle),
            (&mut self.geo_bundle, update.geo_bundle),
            (&mut self.access_token, update.access_token),
        ] {
            if value.is_some() {
                *slot = value;
                touched = true;
            }
        }
        touched
    }

    /// Renderer command line flags for the fields that are set.
    pub fn to_args(&self) -> Vec<String> {
        [
            ("plotlyjs", &self.script_bundle),
            ("mathjax", &self.math_bundle),
            ("topojson", &self.geo_bundle),
            ("mapbox-access-token", &self.access_token),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("--{}={}", name, v)))
        .collect()
    }
}

/// Export defaults and renderer resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_width")]
    pub default_width: u32,
    #[serde(default = "default_height")]
    pub default_height: u32,
    #[serde(default = "default_scale")]
    pub default_scale: f64,
    #[serde(flatten)]
    pub(crate) flags: ScopeFlags,
}

fn default_format() -> String { "png".to_string() }
fn default_width() -> u32 { 700 }
fn default_height() -> u32 { 500 }
fn default_scale() -> f64 { 1.0 }

impl Default for ExportConfig {
    fn default() -> Self {
        Self::new(ScopeFlags::default())
    }
}

impl ExportConfig {
    /// Build a config from explicit flags, discovering a math bundle next to
    /// the renderer on `PATH` if none is given.
    pub fn new(flags: ScopeFlags) -> Self {
        Self::with_locator(flags, &MathBundleLocator::from_env())
    }

    /// Like `new`, but discovery uses `locator`.
    pub fn with_locator(flags: ScopeFlags, locator: &MathBundleLocator) -> Self {
        Self::with_resolved_flags(ScopeFlags {
            math_bundle: resolve_math_bundle_with(flags.math_bundle.clone(), locator),
            ..flags
        })
    }

    /// Build a config using `flags` exactly as given, without discovery.
    pub fn with_resolved_flags(flags: ScopeFlags) -> Self {
        Self {
            default_format: default_format(),
            default_width: default_width(),
            default_height: default_height(),
            default_scale: default_scale(),
            flags,
        }
    }

    /// Parse a JSON config file body. Missing keys take their defaults and a
    /// missing math bundle is discovered.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        Self::from_json_with(text, ScopeFlags::default(), &MathBundleLocator::from_env())
    }

    /// Parse a JSON config file body, then apply `overrides` on top of the
    /// file's flags before discovering a math bundle with `locator`.
    pub fn from_json_with(text: &str, overrides: ScopeFlags, locator: &MathBundleLocator) -> serde_json::Result<Self> {
        let mut config: ExportConfig = serde_json::from_str(text)?;
        config.flags.configure(overrides);
        let explicit = config.flags.math_bundle.take();
        config.flags.math_bundle = resolve_math_bundle_with(explicit, locator);
        Ok(config)
    }

    pub fn flags(&self) -> &ScopeFlags {
        &self.flags
    }

    pub fn script_bundle(&self) -> Option<&str> {
        self.flags.script_bundle.as_deref()
    }

    pub fn math_bundle(&self) -> Option<&str> {
        self.flags.math_bundle.as_deref()
    }

    pub fn geo_bundle(&self) -> Option<&str> {
        self.flags.geo_bundle.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.flags.access_token.as_deref()
    }
}
