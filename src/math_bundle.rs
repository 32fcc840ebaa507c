//! Discovery of a local math-typesetting bundle.
//!
//! The renderer can typeset LaTeX labels when it is pointed at a MathJax
//! bundle. A bundle vendored next to the renderer executable wins; otherwise a
//! `mathjax-path` helper on `PATH` (shipped by some package managers) is asked
//! where its copy lives. Discovery is best effort: any failure means LaTeX
//! support is simply unavailable.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::process::RENDERER_NAME;

pub const MATH_HELPER_NAME: &str = "mathjax-path";

#[derive(Debug, Error)]
pub enum MathBundleDiscoveryError {
    #[error("no vendored bundle and no '{0}' helper on PATH")]
    NotFound(String),

    #[error("failed to run helper: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("helper exited with {0}")]
    HelperExit(ExitStatus),

    #[error("helper output is not UTF-8: {0}")]
    NonUtf8(#[from] FromUtf8Error),

    #[error("helper printed an empty path")]
    EmptyOutput,

    #[error("cannot make path absolute: {0}")]
    Absolute(#[source] std::io::Error),

    #[error("cannot express {0:?} as a file URI")]
    Uri(PathBuf),
}

/// Where to look for a math bundle.
#[derive(Debug, Clone)]
pub struct MathBundleLocator {
    pub vendored: Option<PathBuf>,
    pub helper: String,
    pub search_path: Option<OsString>,
}

impl MathBundleLocator {
    /// Locator for the running installation, rooted at the renderer found on
    /// the process `PATH`.
    pub fn from_env() -> Self {
        Self::from_search_path(env::var_os("PATH"))
    }

    /// Locator rooted at the renderer found on `search_path`, which is also
    /// where the helper is looked up.
    pub fn from_search_path(search_path: Option<OsString>) -> Self {
        let renderer = find_executable(RENDERER_NAME, search_path.as_deref());
        Self {
            search_path,
            ..Self::for_renderer(renderer.as_deref())
        }
    }

    /// Locator for a known renderer executable: the vendored bundle lives at
    /// `<renderer dir>/etc/mathjax/MathJax.js`. Without a renderer the running
    /// executable's directory is used instead.
    pub fn for_renderer(renderer: Option<&Path>) -> Self {
        let vendored = renderer
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(vendored_bundle_path)
            .or_else(|| {
                env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(vendored_bundle_path))
            });
        Self {
            vendored,
            helper: MATH_HELPER_NAME.to_string(),
            search_path: env::var_os("PATH"),
        }
    }

    /// Find the bundle and return it as a `file://` URI.
    pub fn locate(&self) -> Result<String, MathBundleDiscoveryError> {
        let path = match self.vendored.as_deref().filter(|p| p.is_file()) {
            Some(vendored) => vendored.to_path_buf(),
            None => self.ask_helper()?,
        };
        path_to_uri(&path)
    }

    fn ask_helper(&self) -> Result<PathBuf, MathBundleDiscoveryError> {
        let helper = find_executable(&self.helper, self.search_path.as_deref())
            .ok_or_else(|| MathBundleDiscoveryError::NotFound(self.helper.clone()))?;

        let output = Command::new(&helper)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(MathBundleDiscoveryError::Spawn)?;
        if !output.status.success() {
            return Err(MathBundleDiscoveryError::HelperExit(output.status));
        }

        let text = String::from_utf8(output.stdout)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(MathBundleDiscoveryError::EmptyOutput);
        }
        Ok(PathBuf::from(trimmed))
    }
}

pub fn vendored_bundle_path(root: &Path) -> PathBuf {
    root.join("etc").join("mathjax").join("MathJax.js")
}

/// Resolve the math bundle location. Never fails.
///
/// An explicit value is returned verbatim; otherwise discovery runs against
/// the renderer on `PATH` and any error is downgraded to `None`.
pub fn resolve_math_bundle(explicit: Option<String>) -> Option<String> {
    resolve_math_bundle_with(explicit, &MathBundleLocator::from_env())
}

pub fn resolve_math_bundle_with(explicit: Option<String>, locator: &MathBundleLocator) -> Option<String> {
    if explicit.is_some() {
        return explicit;
    }
    match locator.locate() {
        Ok(uri) => {
            debug!(%uri, "found math bundle");
            Some(uri)
        }
        Err(err) => {
            debug!(error = %err, "math bundle unavailable, LaTeX rendering disabled");
            None
        }
    }
}

fn path_to_uri(path: &Path) -> Result<String, MathBundleDiscoveryError> {
    let absolute = std::path::absolute(path).map_err(MathBundleDiscoveryError::Absolute)?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| MathBundleDiscoveryError::Uri(absolute))
}

/// Look `name` up in a `PATH`-style list of directories.
pub fn find_executable(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let search_path = search_path?;
    env::split_paths(search_path)
        .flat_map(|dir| candidates(&dir, name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name), dir.join(format!("{}.exe", name)), dir.join(format!("{}.cmd", name))]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scratch_dir, PROCESS_LOCK};
    use std::fs;

    fn locator(dir: &Path) -> MathBundleLocator {
        MathBundleLocator {
            vendored: Some(vendored_bundle_path(dir)),
            helper: MATH_HELPER_NAME.to_string(),
            search_path: Some(dir.as_os_str().to_os_string()),
        }
    }

    #[test]
    fn test_explicit_is_verbatim() {
        let dir = scratch_dir("math-explicit");
        let resolved = resolve_math_bundle_with(Some("https://cdn/mathjax.js".to_string()), &locator(&dir));
        assert_eq!(resolved.as_deref(), Some("https://cdn/mathjax.js"));
    }

    #[test]
    fn test_nothing_found_is_unset() {
        let dir = scratch_dir("math-none");
        assert!(matches!(locator(&dir).locate(), Err(MathBundleDiscoveryError::NotFound(_))));
        assert_eq!(resolve_math_bundle_with(None, &locator(&dir)), None);
    }

    #[test]
    fn test_no_search_path_is_unset() {
        let locator = MathBundleLocator {
            vendored: None,
            helper: MATH_HELPER_NAME.to_string(),
            search_path: None,
        };
        assert_eq!(resolve_math_bundle_with(None, &locator), None);
    }

    #[test]
    fn test_vendored_bundle_becomes_file_uri() {
        let dir = scratch_dir("math-vendored");
        let bundle = vendored_bundle_path(&dir);
        fs::create_dir_all(bundle.parent().unwrap()).unwrap();
        fs::write(&bundle, "// mathjax").unwrap();

        let uri = resolve_math_bundle_with(None, &locator(&dir)).unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("/etc/mathjax/MathJax.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_on_path() {
        let _guard = PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = scratch_dir("math-helper");
        crate::test_support::write_script(&dir, MATH_HELPER_NAME, "echo /opt/mathjax/MathJax.js\n");

        let uri = resolve_math_bundle_with(None, &locator(&dir)).unwrap();
        assert_eq!(uri, "file:///opt/mathjax/MathJax.js");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_helper_is_unset() {
        let _guard = PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = scratch_dir("math-helper-fail");
        crate::test_support::write_script(&dir, MATH_HELPER_NAME, "exit 3\n");

        assert!(matches!(locator(&dir).locate(), Err(MathBundleDiscoveryError::HelperExit(_))));
        assert_eq!(resolve_math_bundle_with(None, &locator(&dir)), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_helper_output_is_unset() {
        let _guard = PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = scratch_dir("math-helper-empty");
        crate::test_support::write_script(&dir, MATH_HELPER_NAME, "echo\n");

        assert!(matches!(locator(&dir).locate(), Err(MathBundleDiscoveryError::EmptyOutput)));
    }

    #[test]
    fn test_vendored_wins_over_helper() {
        let _guard = PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = scratch_dir("math-order");
        let bundle = vendored_bundle_path(&dir);
        fs::create_dir_all(bundle.parent().unwrap()).unwrap();
        fs::write(&bundle, "// mathjax").unwrap();
        #[cfg(unix)]
        crate::test_support::write_script(&dir, MATH_HELPER_NAME, "echo /opt/mathjax/MathJax.js\n");

        let uri = locator(&dir).locate().unwrap();
        assert!(uri.ends_with("/etc/mathjax/MathJax.js"));
        assert_ne!(uri, "file:///opt/mathjax/MathJax.js");
    }

    #[test]
    fn test_vendored_bundle_next_to_renderer() {
        let dir = scratch_dir("math-renderer-dir");
        let bundle = vendored_bundle_path(&dir);
        fs::create_dir_all(bundle.parent().unwrap()).unwrap();
        fs::write(&bundle, "// mathjax").unwrap();

        let mut locator = MathBundleLocator::for_renderer(Some(&dir.join(RENDERER_NAME)));
        locator.search_path = None;
        assert_eq!(locator.vendored.as_deref(), Some(bundle.as_path()));
        let uri = locator.locate().unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("/etc/mathjax/MathJax.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_roots_at_renderer() {
        let _guard = PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = scratch_dir("math-renderer-path");
        crate::test_support::write_script(&dir, RENDERER_NAME, "exit 0\n");
        let bundle = vendored_bundle_path(&dir);
        fs::create_dir_all(bundle.parent().unwrap()).unwrap();
        fs::write(&bundle, "// mathjax").unwrap();

        let locator = MathBundleLocator::from_search_path(Some(dir.as_os_str().to_os_string()));
        assert_eq!(locator.vendored.as_deref(), Some(bundle.as_path()));
        assert!(resolve_math_bundle_with(None, &locator).unwrap().ends_with("/etc/mathjax/MathJax.js"));
    }

    #[test]
    fn test_find_executable_skips_missing() {
        let dir = scratch_dir("find-exe");
        assert_eq!(find_executable("no-such-tool", Some(dir.as_os_str())), None);
        assert_eq!(find_executable("no-such-tool", None), None);
    }
}
