// ABOUTME: Brings a sandbox from empty to a running dev server exactly once
// ABOUTME: Transform, mount, install and start, guarded against re-entrant runs

use futures_util::StreamExt;
use playground_core::TemplateFolder;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::runtime::{SandboxProcess, SandboxRuntime};
use crate::transform::to_mount_map;
use crate::types::{BootstrapOutcome, BootstrapState, BootstrapStatus, CommandSpec, LogEntry, LogSource};
use crate::{Result, SandboxError};

/// Commands and files the bootstrap relies on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Presence of this file marks a sandbox that was already provisioned
    pub manifest: String,
    pub install: CommandSpec,
    pub start: CommandSpec,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            manifest: "package.json".to_string(),
            install: CommandSpec::new("npm", ["install"]),
            start: CommandSpec::new("npm", ["run", "start"]),
        }
    }
}

/// Background tasks tied to one started server; aborted when dropped
struct ReadySubscription {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ReadySubscription {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Clears the in-progress flag however the run ends, cancellation included
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct Reporter {
    status_tx: Arc<watch::Sender<BootstrapStatus>>,
    log_sink: Option<mpsc::UnboundedSender<LogEntry>>,
}

impl Reporter {
    fn log(&self, source: LogSource, message: impl Into<String>) {
        if let Some(sink) = &self.log_sink {
            let _ = sink.send(LogEntry::new(source, message));
        }
    }

    fn enter(&self, state: BootstrapState) {
        debug!("Bootstrap state -> {}", state);
        self.status_tx.send_modify(|status| {
            status.state = state;
            if let Some(step) = state.step() {
                status.step = step;
            }
            if state != BootstrapState::Error {
                status.error = None;
            }
        });
    }

    fn fail(&self, message: String) {
        self.status_tx.send_modify(|status| {
            status.state = BootstrapState::Error;
            status.error = Some(message);
        });
    }
}

/// Sandbox bootstrap state machine.
///
/// A completion flag and an in-progress flag make [`SandboxBootstrap::run`]
/// idempotent: concurrent or repeated calls never mount or install twice.
/// A separate mounted flag tells editors when the sandbox filesystem holds
/// the project and targeted writes have to follow.
pub struct SandboxBootstrap {
    runtime: Arc<dyn SandboxRuntime>,
    config: BootstrapConfig,
    reporter: Reporter,
    mounted: AtomicBool,
    completed: AtomicBool,
    in_progress: AtomicBool,
    shut_down: AtomicBool,
    subscription: Mutex<Option<ReadySubscription>>,
}

impl SandboxBootstrap {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, config: BootstrapConfig) -> Self {
        let (status_tx, _) = watch::channel(BootstrapStatus::default());
        Self {
            runtime,
            config,
            reporter: Reporter {
                status_tx: Arc::new(status_tx),
                log_sink: None,
            },
            mounted: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            in_progress: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    /// Forward install and server output plus progress messages to `sink`
    pub fn with_log_sink(mut self, sink: mpsc::UnboundedSender<LogEntry>) -> Self {
        self.reporter.log_sink = Some(sink);
        self
    }

    pub fn runtime(&self) -> &Arc<dyn SandboxRuntime> {
        &self.runtime
    }

    pub fn subscribe(&self) -> watch::Receiver<BootstrapStatus> {
        self.reporter.status_tx.subscribe()
    }

    pub fn status(&self) -> BootstrapStatus {
        self.reporter.status_tx.borrow().clone()
    }

    /// Whether the sandbox filesystem holds the project, set as soon as the
    /// mount succeeds (or a warm sandbox is found) and long before completion
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Provision the sandbox from `snapshot` unless that already happened or is happening
    pub async fn run(&self, snapshot: &TemplateFolder) -> Result<BootstrapOutcome> {
        self.run_with(move || async move { (snapshot, ()) }).await
    }

    /// Like [`SandboxBootstrap::run`], but the snapshot is only fetched from
    /// `source` right before the transform step.
    ///
    /// The second value `source` yields is held until the mount has finished
    /// (or failed). A caller that yields a lock guard can keep edits out of
    /// the gap between reading the snapshot and the sandbox holding it.
    pub async fn run_with<F, Fut, S, H>(&self, source: F) -> Result<BootstrapOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = (S, H)>,
        S: std::borrow::Borrow<TemplateFolder>,
    {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SandboxError::ShutDown);
        }
        if self.completed.load(Ordering::SeqCst) {
            debug!("Sandbox already bootstrapped, skipping");
            return Ok(BootstrapOutcome::AlreadyComplete);
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sandbox bootstrap already in progress, skipping");
            return Ok(BootstrapOutcome::InProgress);
        }
        let _guard = InProgressGuard(&self.in_progress);

        // A run may have finished between the completion check and the claim
        if self.completed.load(Ordering::SeqCst) {
            return Ok(BootstrapOutcome::AlreadyComplete);
        }

        match self.provision(source).await {
            Ok(outcome) => {
                self.completed.store(true, Ordering::SeqCst);
                info!("Sandbox bootstrap finished: {:?}", outcome);
                Ok(outcome)
            }
            Err(e) => {
                error!("Sandbox bootstrap failed: {}", e);
                self.reporter.fail(e.to_string());
                self.reporter.log(LogSource::System, format!("Setup failed: {}", e));
                Err(e)
            }
        }
    }

    async fn provision<F, Fut, S, H>(&self, source: F) -> Result<BootstrapOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = (S, H)>,
        S: std::borrow::Borrow<TemplateFolder>,
    {
        match self.runtime.read_file(&self.config.manifest).await {
            Ok(Some(_)) => {
                info!("Found {} in sandbox, reusing existing setup", self.config.manifest);
                self.mounted.store(true, Ordering::SeqCst);
                self.reporter.log(LogSource::System, "Reconnecting to existing sandbox");
                self.reporter.enter(BootstrapState::Starting);
                let subscription = ReadySubscription {
                    tasks: vec![self.listen_for_ready()],
                };
                self.replace_subscription(subscription).await;
                return Ok(BootstrapOutcome::Resumed);
            }
            Ok(None) => {}
            Err(e) => warn!("Could not check {}: {}; provisioning from scratch", self.config.manifest, e),
        }

        self.reporter.enter(BootstrapState::Transforming);
        let (snapshot, hold) = source().await;
        let mount_map = to_mount_map(std::borrow::Borrow::borrow(&snapshot));
        self.reporter
            .log(LogSource::System, format!("Prepared {} files for the sandbox", mount_map.len()));

        self.reporter.enter(BootstrapState::Mounting);
        self.runtime.mount(&mount_map).await?;
        self.mounted.store(true, Ordering::SeqCst);
        drop(hold);

        self.reporter.enter(BootstrapState::Installing);
        self.reporter
            .log(LogSource::System, format!("Running {}", self.config.install));
        let SandboxProcess { mut output, exit } = self.runtime.spawn(&self.config.install).await?;
        while let Some(line) = output.next().await {
            self.reporter.log(LogSource::Install, line);
        }
        let exit_code = exit.await?;
        if exit_code != 0 {
            return Err(SandboxError::InstallFailed { exit_code });
        }

        self.reporter.enter(BootstrapState::Starting);
        self.reporter.log(LogSource::System, format!("Running {}", self.config.start));
        // Subscribe before spawning so an early ready event is not missed
        let mut subscription = ReadySubscription {
            tasks: vec![self.listen_for_ready()],
        };
        let process = self
            .runtime
            .spawn(&self.config.start)
            .await
            .map_err(|e| SandboxError::StartFailed(e.to_string()))?;
        subscription.tasks.push(self.forward_server_output(process));
        self.replace_subscription(subscription).await;

        Ok(BootstrapOutcome::Provisioned)
    }

    fn listen_for_ready(&self) -> JoinHandle<()> {
        let mut ready_rx = self.runtime.server_ready();
        let reporter = self.reporter.clone();

        tokio::spawn(async move {
            loop {
                match ready_rx.recv().await {
                    Ok(ready) => {
                        info!("Server ready at {}", ready.url);
                        reporter.log(LogSource::System, format!("Server ready at {}", ready.url));
                        reporter.status_tx.send_modify(|status| {
                            status.state = BootstrapState::Ready;
                            status.step = BootstrapState::Ready.step().unwrap_or(status.step);
                            status.error = None;
                            status.preview_url = Some(ready.url.clone());
                            status.port = Some(ready.port);
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} server-ready notifications", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Drain the start command's output; awaiting the exit keeps the process alive
    fn forward_server_output(&self, process: SandboxProcess) -> JoinHandle<()> {
        let reporter = self.reporter.clone();
        let SandboxProcess { mut output, exit } = process;

        tokio::spawn(async move {
            while let Some(line) = output.next().await {
                reporter.log(LogSource::Server, line);
            }
            match exit.await {
                Ok(0) => info!("Server process exited"),
                Ok(code) => {
                    warn!("Server process exited with code {}", code);
                    let not_ready = reporter.status_tx.borrow().state != BootstrapState::Ready;
                    if not_ready {
                        reporter.fail(format!("Server exited with code {}", code));
                    }
                }
                Err(e) => warn!("Lost track of server process: {}", e),
            }
        })
    }

    async fn replace_subscription(&self, subscription: ReadySubscription) {
        *self.subscription.lock().await = Some(subscription);
    }

    /// Wait for the server to report ready, failing on `Error` or after `timeout`
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<BootstrapStatus> {
        let mut status_rx = self.subscribe();

        let wait = async {
            loop {
                if self.shut_down.load(Ordering::SeqCst) {
                    return Err(SandboxError::ShutDown);
                }
                {
                    let status = status_rx.borrow_and_update();
                    match status.state {
                        BootstrapState::Ready => return Ok(status.clone()),
                        BootstrapState::Error => {
                            return Err(SandboxError::StartFailed(
                                status.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                            ))
                        }
                        _ => {}
                    }
                }
                if status_rx.changed().await.is_err() {
                    return Err(SandboxError::ShutDown);
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SandboxError::ReadyTimeout {
                seconds: timeout.as_secs(),
            })?
    }

    /// Forget a previous bootstrap so the next `run` starts over.
    ///
    /// Refused (returns `false`) while a run is in flight. If the manifest is
    /// still present in the sandbox the next run resumes instead of remounting.
    pub async fn reset(&self) -> bool {
        if self.in_progress.load(Ordering::SeqCst) {
            warn!("Cannot reset sandbox while bootstrap is in progress");
            return false;
        }
        self.subscription.lock().await.take();
        self.completed.store(false, Ordering::SeqCst);
        self.reporter.status_tx.send_replace(BootstrapStatus::default());
        info!("Sandbox bootstrap reset");
        true
    }

    /// Stop background tasks and release the ready subscription.
    ///
    /// The last status is kept for observers; waiters see the shut-down flag.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.mounted.store(false, Ordering::SeqCst);
        if self.subscription.lock().await.take().is_some() {
            debug!("Released sandbox ready subscription");
        }
        // Wake anyone blocked in wait_until_ready without touching the status
        self.reporter.status_tx.send_modify(|_| {});
        info!("Sandbox bootstrap shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRuntime;

    #[test]
    fn test_default_config_targets_npm() {
        let config = BootstrapConfig::default();
        assert_eq!(config.manifest, "package.json");
        assert_eq!(config.install.to_string(), "npm install");
        assert_eq!(config.start.to_string(), "npm run start");
    }

    #[tokio::test]
    async fn test_guard_released_when_run_is_cancelled() {
        let runtime = Arc::new(MemoryRuntime::new());
        let bootstrap = SandboxBootstrap::new(runtime.clone(), BootstrapConfig::default());
        let snapshot = TemplateFolder::new("root");

        // Dropping the future at the first suspension point cancels the run mid-mount
        {
            let run = bootstrap.run(&snapshot);
            let _ = tokio::time::timeout(Duration::ZERO, run).await;
        }

        assert!(!bootstrap.is_in_progress());
        assert!(!bootstrap.is_complete());
        assert_eq!(bootstrap.run(&snapshot).await.unwrap(), BootstrapOutcome::Provisioned);
    }
}
