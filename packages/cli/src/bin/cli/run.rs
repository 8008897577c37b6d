// ABOUTME: CLI command that provisions a local sandbox for a project and runs its dev server
// ABOUTME: Streams install/server output, prints the preview URL and tears down on Ctrl-C

use anyhow::{Context, Result};
use colored::*;
use playground_config::{CommandLine, Settings};
use playground_editor::EditorSession;
use playground_sandboxes::{
    BootstrapConfig, BootstrapOutcome, CommandSpec, LocalRuntime, LogEntry, LogSource, SandboxBootstrap, TOTAL_STEPS,
};
use playground_storage::validate_project_id;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::utils::open_store;

pub async fn run(settings: &Settings, project_id: &str, clean: bool) -> Result<()> {
    validate_project_id(project_id)?;
    let store = Arc::new(open_store(settings).await?);

    let sandbox_root = settings.sandbox_dir.join(project_id);
    if clean && sandbox_root.exists() {
        tokio::fs::remove_dir_all(&sandbox_root)
            .await
            .with_context(|| format!("Failed to clean {}", sandbox_root.display()))?;
        info!("Removed previous sandbox at {}", sandbox_root.display());
    }
    let runtime = Arc::new(LocalRuntime::create(&sandbox_root).await?);

    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let bootstrap = Arc::new(SandboxBootstrap::new(runtime, bootstrap_config(settings)).with_log_sink(log_tx));
    let session = EditorSession::load(project_id, store)
        .await
        .with_context(|| format!("Failed to open project {}", project_id))?
        .with_sandbox(bootstrap.clone());

    let printer = tokio::spawn(async move {
        while let Some(entry) = log_rx.recv().await {
            print_log(&entry);
        }
    });

    let mut status_rx = bootstrap.subscribe();
    let progress = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            eprintln!("{} {}", format!("[{}/{}]", status.step, TOTAL_STEPS).dimmed(), status.state);
        }
    });

    let result = serve(&session, &bootstrap, settings).await;

    session.shutdown().await;
    progress.abort();
    printer.abort();
    result
}

async fn serve(session: &EditorSession, bootstrap: &SandboxBootstrap, settings: &Settings) -> Result<()> {
    match session.bootstrap_sandbox().await? {
        BootstrapOutcome::Provisioned => println!("{} Sandbox provisioned", "✓".green()),
        BootstrapOutcome::Resumed => println!("{} Reusing existing sandbox", "✓".green()),
        BootstrapOutcome::AlreadyComplete | BootstrapOutcome::InProgress => {}
    }

    tokio::select! {
        ready = bootstrap.wait_until_ready(settings.ready_timeout) => {
            let status = ready?;
            if let Some(url) = status.preview_url {
                println!("{} Preview ready at {}", "✓".green(), url.cyan().bold());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Interrupted".yellow());
            return Ok(());
        }
    }

    println!("{}", "Press Ctrl-C to stop".dimmed());
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    println!("{}", "Stopping sandbox".yellow());
    Ok(())
}

fn bootstrap_config(settings: &Settings) -> BootstrapConfig {
    let command = |line: &CommandLine| CommandSpec::new(line.program.clone(), line.args.clone());
    BootstrapConfig {
        manifest: settings.manifest.clone(),
        install: command(&settings.install_command),
        start: command(&settings.start_command),
    }
}

fn print_log(entry: &LogEntry) {
    match entry.source {
        LogSource::System => println!("{} {}", "▸".cyan(), entry.message),
        LogSource::Install => println!("{}", entry.message.dimmed()),
        LogSource::Server => println!("{}", entry.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_bootstrap_config_from_settings() {
        let settings = Settings {
            data_dir: PathBuf::from("/tmp/pg"),
            db_path: PathBuf::from("/tmp/pg/playground.db"),
            sandbox_dir: PathBuf::from("/tmp/pg/sandboxes"),
            install_command: CommandLine {
                program: "pnpm".to_string(),
                args: vec!["install".to_string()],
            },
            start_command: CommandLine {
                program: "pnpm".to_string(),
                args: vec!["dev".to_string()],
            },
            manifest: "package.json".to_string(),
            ready_timeout: Duration::from_secs(30),
        };

        let config = bootstrap_config(&settings);

        assert_eq!(config.install.to_string(), "pnpm install");
        assert_eq!(config.start.to_string(), "pnpm dev");
        assert_eq!(config.manifest, "package.json");
    }
}
