// ABOUTME: Editing session owning the current snapshot, the open buffers and the sandbox link
// ABOUTME: Applies edits optimistically, then persists the full tree and mirrors changes into the sandbox

use futures::future::join_all;
use playground_core::{FileId, ItemPath, TemplateFile, TemplateFolder, TreeError, TreeResult};
use playground_sandboxes::{resolve_file_path, BootstrapOutcome, FsChange, SandboxBootstrap, SandboxRuntime};
use playground_storage::TreeStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::buffers::{BufferManager, OpenBuffer};
use crate::error::{SessionError, SessionResult};
use crate::mutator::{Mutation, TreeMutator};

/// Result of one buffer's save within `save_all`
#[derive(Debug)]
pub struct SaveReport {
    pub id: FileId,
    pub result: SessionResult<()>,
}

impl SaveReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

struct SessionState {
    snapshot: Arc<TemplateFolder>,
    buffers: BufferManager,
}

/// One user's editing session over one project.
///
/// State transitions on the snapshot and buffers happen under a lock that is
/// never held across persistence or sandbox I/O; async work runs on copies.
/// Persistence failures do not roll the snapshot back; `reload` re-reads the
/// stored tree instead.
///
/// Every snapshot replacement and the sandbox writes that follow it happen
/// under `mirror_lock`, so the sandbox sees changes in snapshot order. Lock
/// order is `mirror_lock`, then `persist_lock`, then `state`.
pub struct EditorSession {
    project_id: String,
    store: Arc<dyn TreeStore>,
    bootstrap: Option<Arc<SandboxBootstrap>>,
    state: RwLock<SessionState>,
    mirror_lock: Mutex<()>,
    persist_lock: Mutex<()>,
}

impl EditorSession {
    /// Start a session over `snapshot` without reading the store
    pub fn new(project_id: impl Into<String>, store: Arc<dyn TreeStore>, snapshot: TemplateFolder) -> Self {
        Self {
            project_id: project_id.into(),
            store,
            bootstrap: None,
            state: RwLock::new(SessionState {
                snapshot: Arc::new(snapshot),
                buffers: BufferManager::new(),
            }),
            mirror_lock: Mutex::new(()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Start a session from the stored tree
    pub async fn load(project_id: impl Into<String>, store: Arc<dyn TreeStore>) -> SessionResult<Self> {
        let project_id = project_id.into();
        let snapshot = store
            .load(&project_id)
            .await
            .map_err(|source| SessionError::PersistenceFailure {
                operation: "load",
                source,
            })?;
        info!("Loaded project {} ({} files)", project_id, snapshot.file_count());
        Ok(Self::new(project_id, store, snapshot))
    }

    /// Mirror edits into the sandbox driven by `bootstrap`
    pub fn with_sandbox(mut self, bootstrap: Arc<SandboxBootstrap>) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn bootstrap(&self) -> Option<&Arc<SandboxBootstrap>> {
        self.bootstrap.as_ref()
    }

    pub async fn snapshot(&self) -> Arc<TemplateFolder> {
        self.state.read().await.snapshot.clone()
    }

    // Buffers

    pub async fn open_file(&self, path: &ItemPath) -> SessionResult<OpenBuffer> {
        let mut state = self.state.write().await;
        let state = &mut *state;
        let buffer = state.buffers.open_at(path, &state.snapshot)?;
        Ok(buffer.clone())
    }

    pub async fn close_file(&self, id: &FileId) -> bool {
        self.state.write().await.buffers.close(id)
    }

    pub async fn close_all(&self) {
        self.state.write().await.buffers.close_all();
    }

    /// Keystroke path: replace a buffer's live content
    pub async fn update_content(&self, id: &FileId, content: impl Into<String>) -> SessionResult<()> {
        self.state.write().await.buffers.update_content(id, content)?;
        Ok(())
    }

    pub async fn set_active(&self, id: &FileId) -> SessionResult<()> {
        self.state.write().await.buffers.set_active(id)?;
        Ok(())
    }

    pub async fn buffer(&self, id: &FileId) -> Option<OpenBuffer> {
        self.state.read().await.buffers.get(id).cloned()
    }

    pub async fn active_buffer(&self) -> Option<OpenBuffer> {
        self.state.read().await.buffers.active().cloned()
    }

    pub async fn buffers(&self) -> Vec<OpenBuffer> {
        self.state.read().await.buffers.iter().cloned().collect()
    }

    // Structural edits

    pub async fn add_file(&self, file: TemplateFile, parent: &ItemPath) -> SessionResult<()> {
        self.mutate("add file", |snapshot, _| TreeMutator::add_file(snapshot, file, parent))
            .await
    }

    pub async fn add_folder(&self, folder: TemplateFolder, parent: &ItemPath) -> SessionResult<()> {
        self.mutate("add folder", |snapshot, _| TreeMutator::add_folder(snapshot, folder, parent))
            .await
    }

    pub async fn delete_file(&self, name: &str, parent: &ItemPath) -> SessionResult<()> {
        self.mutate("delete file", |snapshot, buffers| {
            TreeMutator::delete_file(snapshot, buffers, name, parent)
        })
        .await
    }

    pub async fn delete_folder(&self, name: &str, parent: &ItemPath) -> SessionResult<()> {
        self.mutate("delete folder", |snapshot, buffers| {
            TreeMutator::delete_folder(snapshot, buffers, name, parent)
        })
        .await
    }

    pub async fn rename_file(
        &self,
        name: &str,
        new_name: &str,
        new_extension: &str,
        parent: &ItemPath,
    ) -> SessionResult<()> {
        self.mutate("rename file", |snapshot, buffers| {
            TreeMutator::rename_file(snapshot, buffers, name, new_name, new_extension, parent)
        })
        .await
    }

    pub async fn rename_folder(&self, name: &str, new_name: &str, parent: &ItemPath) -> SessionResult<()> {
        self.mutate("rename folder", |snapshot, buffers| {
            TreeMutator::rename_folder(snapshot, buffers, name, new_name, parent)
        })
        .await
    }

    /// Swap in the new snapshot, persist it, then replay the changes into the sandbox
    async fn mutate<F>(&self, operation: &'static str, edit: F) -> SessionResult<()>
    where
        F: FnOnce(&TemplateFolder, &mut BufferManager) -> TreeResult<Mutation>,
    {
        let _mirror = self.mirror_lock.lock().await;
        let changes = {
            let mut state = self.state.write().await;
            let state = &mut *state;
            let Mutation { snapshot, changes } = edit(state.snapshot.as_ref(), &mut state.buffers)?;
            state.snapshot = Arc::new(snapshot);
            changes
        };

        self.persist(operation).await?;
        self.apply_changes(operation, &changes).await
    }

    async fn persist(&self, operation: &'static str) -> SessionResult<()> {
        let _guard = self.persist_lock.lock().await;
        // Read under the persist lock so the last writer always stores the newest tree
        let snapshot = self.snapshot().await;
        self.store
            .save(&self.project_id, &snapshot)
            .await
            .map_err(|source| SessionError::PersistenceFailure { operation, source })?;
        debug!("Persisted project {} after {}", self.project_id, operation);
        Ok(())
    }

    /// Runtime to mirror edits into once it holds the project.
    ///
    /// Call with `mirror_lock` held. Until the mount, edits only change the
    /// snapshot, which the bootstrap reads under the same lock.
    fn live_sandbox(&self) -> Option<&Arc<dyn SandboxRuntime>> {
        self.bootstrap
            .as_ref()
            .filter(|bootstrap| bootstrap.is_mounted())
            .map(|bootstrap| bootstrap.runtime())
    }

    async fn apply_changes(&self, operation: &'static str, changes: &[FsChange]) -> SessionResult<()> {
        let Some(runtime) = self.live_sandbox() else {
            return Ok(());
        };
        for change in changes {
            runtime
                .apply(change)
                .await
                .map_err(|source| SessionError::SandboxFailure {
                    operation,
                    path: Some(change.path().to_string()),
                    source,
                })?;
        }
        Ok(())
    }

    // Saving

    /// Save one buffer: sandbox write, snapshot update, persistence, then mark saved.
    ///
    /// The content is captured when the call starts. Edits arriving while the
    /// save is in flight leave the buffer dirty. The file is looked up again
    /// once no structural edit can interleave, so a file deleted or renamed
    /// in the meantime is never written back into the sandbox.
    pub async fn save_file(&self, id: &FileId) -> SessionResult<()> {
        let content = self
            .state
            .read()
            .await
            .buffers
            .get(id)
            .map(|buffer| buffer.content.clone())
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;

        let path = {
            let _mirror = self.mirror_lock.lock().await;
            let path = resolve_file_path(id, self.snapshot().await.as_ref())?;

            if let Some(runtime) = self.live_sandbox() {
                runtime
                    .write_file(&path, &content)
                    .await
                    .map_err(|source| SessionError::SandboxFailure {
                        operation: "save",
                        path: Some(path.clone()),
                        source,
                    })?;
            }

            let mut state = self.state.write().await;
            let next = TreeMutator::update_file_content(&state.snapshot, &id.to_path(), &content)?;
            state.snapshot = Arc::new(next);
            path
        };

        self.persist("save").await?;

        let mut state = self.state.write().await;
        if state.buffers.mark_saved(id, content).is_err() {
            debug!("Buffer {} was closed before its save finished", id);
        }
        info!("Saved {}", path);
        Ok(())
    }

    /// Save the active buffer (the save shortcut)
    pub async fn save_active(&self) -> SessionResult<()> {
        let id = self
            .state
            .read()
            .await
            .buffers
            .active_id()
            .cloned()
            .ok_or(SessionError::NoActiveBuffer)?;
        self.save_file(&id).await
    }

    /// Save every dirty buffer concurrently; one failure does not stop the others
    pub async fn save_all(&self) -> Vec<SaveReport> {
        let dirty = self.state.read().await.buffers.dirty_ids();
        let saves = dirty.into_iter().map(|id| async move {
            let result = self.save_file(&id).await;
            if let Err(e) = &result {
                warn!("Failed to save {}: {}", id, e);
            }
            SaveReport { id, result }
        });
        join_all(saves).await
    }

    /// Replace the snapshot with the stored tree.
    ///
    /// Clean buffers take the stored content; dirty buffers keep their edits.
    pub async fn reload(&self) -> SessionResult<()> {
        let snapshot = self
            .store
            .load(&self.project_id)
            .await
            .map_err(|source| SessionError::PersistenceFailure {
                operation: "reload",
                source,
            })?;

        let _mirror = self.mirror_lock.lock().await;
        let mut state = self.state.write().await;
        let state = &mut *state;

        let mut refreshed = Vec::new();
        let mut orphaned = 0;
        for buffer in state.buffers.iter() {
            match snapshot.file_at(&buffer.id.to_path()) {
                Some(file) if !buffer.has_unsaved_changes() && file.content != buffer.content => {
                    refreshed.push((buffer.id.clone(), file.content.clone()));
                }
                Some(_) => {}
                None => orphaned += 1,
            }
        }
        for (id, content) in refreshed {
            state.buffers.update_content(&id, content.as_str())?;
            state.buffers.mark_saved(&id, content)?;
        }
        if orphaned > 0 {
            warn!("{} open buffers no longer match a file after reload", orphaned);
        }

        state.snapshot = Arc::new(snapshot);
        info!("Reloaded project {}", self.project_id);
        Ok(())
    }

    // Sandbox

    /// Provision the attached sandbox from the current snapshot.
    ///
    /// Edits wait while the snapshot is mounted; afterwards they are written
    /// straight into the sandbox, even while dependencies install.
    pub async fn bootstrap_sandbox(&self) -> SessionResult<BootstrapOutcome> {
        let bootstrap = self.bootstrap.as_ref().ok_or(SessionError::NoSandbox)?;
        bootstrap
            .run_with(move || async move {
                let mirror = self.mirror_lock.lock().await;
                (self.snapshot().await, mirror)
            })
            .await
            .map_err(|source| SessionError::SandboxFailure {
                operation: "bootstrap",
                path: None,
                source,
            })
    }

    /// Release sandbox subscriptions and drop all buffers
    pub async fn shutdown(&self) {
        if let Some(bootstrap) = &self.bootstrap {
            bootstrap.shutdown().await;
        }
        self.close_all().await;
        info!("Closed session for project {}", self.project_id);
    }
}
