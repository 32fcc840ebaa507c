//! Renderer backed by a long-lived subprocess.
//!
//! The renderer executable is started lazily with the scope flags on its
//! command line. It announces readiness with one JSON line on stdout, then
//! answers every JSON request line with one JSON response line.

use std::env;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ScopeFlags;
use crate::error::{ExportError, ExportResult};
use crate::math_bundle::find_executable;
use crate::renderer::Renderer;
use crate::request::ResolvedRequest;
use crate::response::RawResponse;

pub const RENDERER_NAME: &str = "kaleido";
pub const DEFAULT_SCOPE_NAME: &str = "plotly";
pub const DEFAULT_CHROMIUM_ARGS: [&str; 5] = [
    "--disable-gpu",
    "--allow-file-access-from-files",
    "--disable-breakpad",
    "--disable-dev-shm-usage",
    "--no-sandbox",
];

const STDERR_LIMIT: usize = 64 * 1024;

#[derive(Serialize)]
struct RenderMessage<'a> {
    data: &'a Value,
    #[serde(flatten)]
    request: &'a ResolvedRequest,
}

pub struct SubprocessRenderer {
    executable: PathBuf,
    scope_name: String,
    chromium_args: Vec<String>,
    running: Option<RunningRenderer>,
}

impl SubprocessRenderer {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            scope_name: DEFAULT_SCOPE_NAME.to_string(),
            chromium_args: DEFAULT_CHROMIUM_ARGS.iter().map(|s| s.to_string()).collect(),
            running: None,
        }
    }

    /// Find the renderer executable on `PATH`.
    pub fn locate() -> ExportResult<Self> {
        find_executable(RENDERER_NAME, env::var_os("PATH").as_deref())
            .map(Self::new)
            .ok_or_else(|| ExportError::RendererNotFound {
                name: RENDERER_NAME.to_string(),
            })
    }

    pub fn with_chromium_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chromium_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn ensure_running(&mut self, flags: &ScopeFlags) -> ExportResult<&mut RunningRenderer> {
        if let Some(running) = self.running.as_mut() {
            if let Ok(Some(status)) = running.child.try_wait() {
                warn!(%status, "renderer exited, restarting");
                if let Some(dead) = self.running.take() {
                    dead.stop();
                }
            }
        }

        let running = match self.running.take() {
            Some(running) => running,
            None => self.start(flags)?,
        };
        Ok(self.running.insert(running))
    }

    fn start(&self, flags: &ScopeFlags) -> ExportResult<RunningRenderer> {
        let mut args = vec![self.scope_name.clone()];
        args.extend(self.chromium_args.iter().cloned());
        args.extend(flags.to_args());

        info!(executable = %self.executable.display(), "starting renderer");
        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = Arc::new(Mutex::new(Vec::new()));
        let drain = child
            .stderr
            .take()
            .map(|pipe| spawn_stderr_drain(pipe, Arc::clone(&stderr)));
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, BufReader::new(stdout)),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExportError::ClosedChannel);
            }
        };

        let mut running = RunningRenderer {
            child,
            stdin,
            stdout,
            stderr,
            drain,
        };

        let failure = match running.read_response() {
            Ok(Some(ready)) if ready.code == 0 => {
                debug!("renderer ready");
                return Ok(running);
            }
            Ok(Some(ready)) => ready
                .message
                .unwrap_or_else(|| format!("renderer reported code {}", ready.code)),
            Ok(None) => "renderer exited before reporting readiness".to_string(),
            Err(err) => err.to_string(),
        };
        Err(ExportError::Startup {
            message: failure,
            stderr: running.stop_and_collect(),
        })
    }
}

impl Renderer for SubprocessRenderer {
    fn submit(&mut self, chart: &Value, request: &ResolvedRequest, flags: &ScopeFlags) -> ExportResult<RawResponse> {
        debug!(
            format = %request.format,
            width = request.width,
            height = request.height,
            scale = request.scale,
            "submitting chart"
        );
        let message = RenderMessage { data: chart, request };
        let outcome = {
            let running = self.ensure_running(flags)?;
            running.exchange(&message)
        };
        match outcome {
            Ok(response) => Ok(response),
            Err(err) => {
                self.shutdown();
                Err(err)
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(running) = self.running.take() {
            debug!("stopping renderer");
            running.stop();
        }
    }
}

impl Drop for SubprocessRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RunningRenderer {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: Arc<Mutex<Vec<u8>>>,
    drain: Option<JoinHandle<()>>,
}

impl RunningRenderer {
    fn exchange(&mut self, message: &RenderMessage<'_>) -> ExportResult<RawResponse> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.stdin.write_all(&line)?;
        self.stdin.flush()?;
        self.read_response()?.ok_or(ExportError::ClosedChannel)
    }

    fn read_response(&mut self) -> ExportResult<Option<RawResponse>> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line.trim())?))
    }

    fn stop(self) {
        let RunningRenderer { child, stdin, stdout, .. } = self;
        drop(stdin);
        drop(stdout);
        reap(child);
    }

    /// Stop the process and return whatever it wrote to stderr.
    fn stop_and_collect(self) -> String {
        let RunningRenderer { child, stdin, stdout, stderr, drain } = self;
        drop(stdin);
        drop(stdout);
        reap(child);

        // Grandchildren may hold the pipe open, so the drain only gets a bounded wait.
        if let Some(handle) = drain {
            for _ in 0..100 {
                if handle.is_finished() {
                    let _ = handle.join();
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }

        let captured = stderr.lock().map(|buf| String::from_utf8_lossy(&buf).into_owned());
        captured.unwrap_or_default()
    }
}

fn reap(mut child: Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
    }
    let _ = child.wait();
}

fn spawn_stderr_drain(mut pipe: ChildStderr, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(&chunk[..n]);
                        if buf.len() > STDERR_LIMIT {
                            let excess = buf.len() - STDERR_LIMIT;
                            buf.drain(..excess);
                        }
                    }
                }
            }
        }
    })
}
