// ABOUTME: In-memory sandbox runtime with scripted processes
// ABOUTME: Records mounts, writes and spawned commands so callers can assert on them

use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify, RwLock};
use tracing::debug;

use crate::runtime::{SandboxProcess, SandboxRuntime};
use crate::transform::MountMap;
use crate::types::{CommandSpec, ServerReady};
use crate::{Result, SandboxError};

/// Pause point inside a runtime call, for exercising interleavings.
///
/// The paused call signals `reached` and then waits for `open`. Both sides
/// keep a permit, so either may happen first.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the gated call is parked at the gate
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the gated call continue
    pub fn open(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

/// Canned behaviour for one command
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcess {
    pub output: Vec<String>,
    pub exit_code: i32,
    /// Announced once all output lines have been consumed
    pub ready: Option<ServerReady>,
    /// Held before the first output line
    pub gate: Option<Gate>,
}

impl ScriptedProcess {
    pub fn succeeding<I, S>(output: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output: output.into_iter().map(Into::into).collect(),
            exit_code: 0,
            ready: None,
            gate: None,
        }
    }

    pub fn failing(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn serving(port: u16) -> Self {
        Self {
            output: vec![format!("Server listening on port {}", port)],
            exit_code: 0,
            ready: Some(ServerReady {
                port,
                url: format!("http://localhost:{}", port),
            }),
            gate: None,
        }
    }

    /// Park the process at `gate` before it produces anything
    pub fn gated(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[derive(Default)]
struct MemoryFs {
    files: BTreeMap<String, String>,
    directories: BTreeSet<String>,
}

/// Sandbox held entirely in memory
pub struct MemoryRuntime {
    fs: RwLock<MemoryFs>,
    scripts: RwLock<HashMap<String, ScriptedProcess>>,
    spawned: RwLock<Vec<CommandSpec>>,
    failing_writes: RwLock<HashSet<String>>,
    held_writes: RwLock<HashMap<String, Gate>>,
    fail_mount: AtomicBool,
    mounts: AtomicUsize,
    ready_tx: broadcast::Sender<ServerReady>,
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuntime {
    pub fn new() -> Self {
        let (ready_tx, _) = broadcast::channel(16);
        Self {
            fs: RwLock::new(MemoryFs::default()),
            scripts: RwLock::new(HashMap::new()),
            spawned: RwLock::new(Vec::new()),
            failing_writes: RwLock::new(HashSet::new()),
            held_writes: RwLock::new(HashMap::new()),
            fail_mount: AtomicBool::new(false),
            mounts: AtomicUsize::new(0),
            ready_tx,
        }
    }

    /// Script the behaviour of `command`; unscripted commands exit 0 silently
    pub async fn script(&self, command: &CommandSpec, process: ScriptedProcess) {
        self.scripts.write().await.insert(command.to_string(), process);
    }

    /// Make every later write to `path` fail
    pub async fn fail_writes_to(&self, path: impl Into<String>) {
        self.failing_writes.write().await.insert(path.into());
    }

    pub async fn clear_write_failures(&self) {
        self.failing_writes.write().await.clear();
    }

    /// Park the next write to `path` at the returned gate
    pub async fn hold_next_write(&self, path: impl Into<String>) -> Gate {
        let gate = Gate::new();
        self.held_writes.write().await.insert(path.into(), gate.clone());
        gate
    }

    pub fn set_mount_failure(&self, fail: bool) {
        self.fail_mount.store(fail, Ordering::SeqCst);
    }

    /// Emit a server-ready notification as if a process had printed one
    pub fn announce_ready(&self, ready: ServerReady) {
        let _ = self.ready_tx.send(ready);
    }

    /// Number of batch mounts performed
    pub fn mount_count(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub async fn file(&self, path: &str) -> Option<String> {
        self.fs.read().await.files.get(path).cloned()
    }

    pub async fn has_dir(&self, path: &str) -> bool {
        self.fs.read().await.directories.contains(path)
    }

    pub async fn file_paths(&self) -> Vec<String> {
        self.fs.read().await.files.keys().cloned().collect()
    }

    pub async fn spawned(&self) -> Vec<CommandSpec> {
        self.spawned.read().await.clone()
    }

    /// Seed a file without counting it as a mount, e.g. a warm sandbox
    pub async fn insert_file(&self, path: impl Into<String>, content: impl Into<String>) {
        let mut fs = self.fs.write().await;
        let path = path.into();
        add_parents(&mut fs.directories, &path);
        fs.files.insert(path, content.into());
    }
}

fn add_parents(directories: &mut BTreeSet<String>, path: &str) {
    let mut end = 0;
    while let Some(offset) = path[end..].find('/') {
        end += offset;
        directories.insert(path[..end].to_string());
        end += 1;
    }
}

fn normalize(path: &str) -> Result<String> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| segment == "..") {
        return Err(SandboxError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}

fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl SandboxRuntime for MemoryRuntime {
    async fn mount(&self, files: &MountMap) -> Result<()> {
        // Let concurrent callers interleave the way a real mount would
        tokio::task::yield_now().await;

        if self.fail_mount.load(Ordering::SeqCst) {
            return Err(SandboxError::MountFailed("mount rejected".to_string()));
        }

        let mut fs = self.fs.write().await;
        for dir in files.directories() {
            fs.directories.insert(dir.to_string());
        }
        for (path, content) in files.files() {
            add_parents(&mut fs.directories, path);
            fs.files.insert(path.to_string(), content.to_string());
        }
        self.mounts.fetch_add(1, Ordering::SeqCst);
        debug!("Mounted {} files in memory", files.len());
        Ok(())
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let path = normalize(path)?;
        let held = self.held_writes.write().await.remove(&path);
        if let Some(gate) = held {
            gate.pass().await;
        }
        if self.failing_writes.read().await.contains(&path) {
            return Err(SandboxError::WriteFailed {
                path,
                reason: "write rejected".to_string(),
            });
        }

        let mut fs = self.fs.write().await;
        add_parents(&mut fs.directories, &path);
        fs.files.insert(path, content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let path = normalize(path)?;
        Ok(self.fs.read().await.files.get(&path).cloned())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        let mut fs = self.fs.write().await;
        add_parents(&mut fs.directories, &path);
        fs.directories.insert(path);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        let mut fs = self.fs.write().await;
        fs.files.retain(|file, _| !is_under(file, &path));
        fs.directories.retain(|dir| !is_under(dir, &path));
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let mut fs = self.fs.write().await;

        let moved_files: Vec<(String, String)> = fs
            .files
            .iter()
            .filter(|(path, _)| is_under(path, &from))
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect();
        let moved_dirs: Vec<String> = fs.directories.iter().filter(|dir| is_under(dir, &from)).cloned().collect();

        if moved_files.is_empty() && moved_dirs.is_empty() {
            return Err(SandboxError::FileNotFound(from));
        }

        for (path, content) in moved_files {
            fs.files.remove(&path);
            let target = format!("{}{}", to, &path[from.len()..]);
            add_parents(&mut fs.directories, &target);
            fs.files.insert(target, content);
        }
        for dir in moved_dirs {
            fs.directories.remove(&dir);
            fs.directories.insert(format!("{}{}", to, &dir[from.len()..]));
        }
        Ok(())
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<SandboxProcess> {
        self.spawned.write().await.push(command.clone());
        let script = self
            .scripts
            .read()
            .await
            .get(&command.to_string())
            .cloned()
            .unwrap_or_default();
        debug!("Spawning scripted '{}' (exit {})", command, script.exit_code);

        let ready_tx = self.ready_tx.clone();
        let ScriptedProcess {
            output,
            exit_code,
            ready,
            gate,
        } = script;
        let output = stream! {
            if let Some(gate) = gate {
                gate.pass().await;
            }
            for line in output {
                yield line;
            }
            if let Some(ready) = ready {
                let _ = ready_tx.send(ready);
            }
        };

        Ok(SandboxProcess::new(Box::pin(output), Box::pin(async move { Ok(exit_code) })))
    }

    fn server_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.ready_tx.subscribe()
    }
}
