// ABOUTME: Sandbox runtime backed by a host directory and child processes
// ABOUTME: Detects the dev server URL from process output to emit server-ready events

use async_stream::stream;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::runtime::{SandboxProcess, SandboxRuntime};
use crate::transform::MountMap;
use crate::types::{CommandSpec, ServerReady};
use crate::{Result, SandboxError};

/// Capacity of the server-ready broadcast channel
const READY_CHANNEL_CAPACITY: usize = 16;

static ANSI_ESCAPE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").ok());

/// Full URLs printed by dev servers, e.g. Vite's "Local:   http://localhost:5173/"
static URL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(https?://(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1?\]):(\d+))").ok()
});

/// Port-only announcements, resolved against localhost
static PORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)server running on port (\d+)",    // Express: "Express server running on port 8476"
        r"(?i)listening on port (\d+)",         // "Listening on port 3000"
        r"(?i)ready - started server on.*:(\d+)", // Next.js: "ready - started server on 0.0.0.0:3000"
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extract a server-ready notification from one line of process output
pub fn detect_server_ready(line: &str) -> Option<ServerReady> {
    let line = match ANSI_ESCAPE.as_ref() {
        Some(ansi) => ansi.replace_all(line, "").into_owned(),
        None => line.to_string(),
    };

    if let Some(captures) = URL_PATTERN.as_ref().and_then(|re| re.captures(&line)) {
        let url = captures.get(1)?.as_str().to_string();
        let port = captures.get(2)?.as_str().parse::<u16>().ok()?;
        return Some(ServerReady { port, url });
    }

    for pattern in PORT_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&line) {
            if let Some(port) = captures.get(1).and_then(|m| m.as_str().parse::<u16>().ok()) {
                return Some(ServerReady {
                    port,
                    url: format!("http://localhost:{}", port),
                });
            }
        }
    }

    None
}

/// Runtime that mirrors the project into a directory on the host
pub struct LocalRuntime {
    root: PathBuf,
    ready_tx: broadcast::Sender<ServerReady>,
}

impl LocalRuntime {
    /// Use `root` as the sandbox filesystem root; it is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (ready_tx, _) = broadcast::channel(READY_CHANNEL_CAPACITY);
        Self {
            root: root.into(),
            ready_tx,
        }
    }

    /// Create the root directory up front
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let runtime = Self::new(root);
        fs::create_dir_all(&runtime.root).await?;
        info!("Local sandbox ready at {}", runtime.root.display());
        Ok(runtime)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a sandbox path onto the host, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(SandboxError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(SandboxError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    async fn write_resolved(&self, target: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(target, content).await
    }
}

#[async_trait]
impl SandboxRuntime for LocalRuntime {
    async fn mount(&self, files: &MountMap) -> Result<()> {
        debug!("Mounting {} files into {}", files.len(), self.root.display());

        for dir in files.directories() {
            let target = self.resolve(dir)?;
            fs::create_dir_all(&target)
                .await
                .map_err(|e| SandboxError::MountFailed(format!("{}: {}", dir, e)))?;
        }

        for (path, content) in files.files() {
            let target = self.resolve(path)?;
            self.write_resolved(&target, content)
                .await
                .map_err(|e| SandboxError::MountFailed(format!("{}: {}", path, e)))?;
        }

        Ok(())
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let target = self.resolve(path)?;
        self.write_resolved(&target, content)
            .await
            .map_err(|e| SandboxError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let target = self.resolve(path)?;
        match fs::read_to_string(&target).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SandboxError::Io(e)),
        }
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        fs::create_dir_all(&target).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        let metadata = match fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Nothing to remove at {}", path);
                return Ok(());
            }
            Err(e) => return Err(SandboxError::Io(e)),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&target).await?;
        } else {
            fs::remove_file(&target).await?;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::rename(&source, &target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SandboxError::FileNotFound(from.to_string())),
            Err(e) => Err(SandboxError::Io(e)),
        }
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<SandboxProcess> {
        info!("Spawning '{}' in {}", command, self.root.display());

        let spawn_error = |reason: String| SandboxError::ProcessSpawnFailed {
            command: command.to_string(),
            reason,
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("Failed to capture stderr".to_string()))?;

        let ready_tx = self.ready_tx.clone();
        let output = stream! {
            let mut stdout_lines = BufReader::new(stdout).lines();
            let mut stderr_lines = BufReader::new(stderr).lines();
            let mut stdout_open = true;
            let mut stderr_open = true;

            while stdout_open || stderr_open {
                let (line, from_stdout) = tokio::select! {
                    line = stdout_lines.next_line(), if stdout_open => (line, true),
                    line = stderr_lines.next_line(), if stderr_open => (line, false),
                };

                match line {
                    Ok(Some(line)) => {
                        if let Some(ready) = detect_server_ready(&line) {
                            debug!("Detected server ready at {}", ready.url);
                            // No subscribers simply means nobody is waiting
                            let _ = ready_tx.send(ready);
                        }
                        yield line;
                    }
                    Ok(None) => {
                        if from_stdout { stdout_open = false } else { stderr_open = false }
                    }
                    Err(e) => {
                        warn!("Failed to read process output: {}", e);
                        if from_stdout { stdout_open = false } else { stderr_open = false }
                    }
                }
            }
        };

        let exit = async move {
            let status = child.wait().await?;
            Ok(status.code().unwrap_or(-1))
        };

        Ok(SandboxProcess::new(Box::pin(output), Box::pin(exit)))
    }

    fn server_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.ready_tx.subscribe()
    }
}
