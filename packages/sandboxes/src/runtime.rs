// ABOUTME: Boundary between the engine and an execution sandbox
// ABOUTME: Filesystem operations, process spawning and the server-ready event

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use tokio::sync::broadcast;

use crate::transform::MountMap;
use crate::types::{CommandSpec, FsChange, ServerReady};
use crate::Result;

/// Process running inside a sandbox.
///
/// `output` yields stdout and stderr lines as they arrive. `exit` resolves
/// to the exit code; dropping it before completion may stop the process.
pub struct SandboxProcess {
    pub output: BoxStream<'static, String>,
    pub exit: BoxFuture<'static, Result<i32>>,
}

impl SandboxProcess {
    pub fn new(output: BoxStream<'static, String>, exit: BoxFuture<'static, Result<i32>>) -> Self {
        Self { output, exit }
    }
}

/// Execution environment the project is mirrored into
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Write the whole map in one batch, creating directories as needed
    async fn mount(&self, files: &MountMap) -> Result<()>;

    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// Read a file, `Ok(None)` when it does not exist
    async fn read_file(&self, path: &str) -> Result<Option<String>>;

    async fn create_dir(&self, path: &str) -> Result<()>;

    /// Remove a file or a directory tree; missing paths are not an error
    async fn remove(&self, path: &str) -> Result<()>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    async fn spawn(&self, command: &CommandSpec) -> Result<SandboxProcess>;

    /// Subscribe to server-ready notifications. Subscribe before spawning the
    /// command that is expected to emit one.
    fn server_ready(&self) -> broadcast::Receiver<ServerReady>;

    /// Replay one structural change
    async fn apply(&self, change: &FsChange) -> Result<()> {
        match change {
            FsChange::WriteFile { path, content } => self.write_file(path, content).await,
            FsChange::CreateDir { path } => self.create_dir(path).await,
            FsChange::Remove { path } => self.remove(path).await,
            FsChange::Rename { from, to } => self.rename(from, to).await,
        }
    }
}
