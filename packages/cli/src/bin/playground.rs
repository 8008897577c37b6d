use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;

mod cli;

use playground_config::Settings;

#[derive(Parser)]
#[command(name = "playground")]
#[command(about = "Playground CLI - edit, persist and run multi-file projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a directory from disk as a project
    Import {
        /// Directory to import
        dir: PathBuf,
        /// Project ID to store it under (defaults to the directory name)
        #[arg(short, long)]
        project: Option<String>,
    },
    /// List stored projects
    List,
    /// Show a project's file tree
    Show {
        /// Project ID to show
        project: String,
    },
    /// Export a project's tree as JSON
    Export {
        /// Project ID to export
        project: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Provision a local sandbox for a project and run its dev server
    Run {
        /// Project ID to run
        project: String,
        /// Remove any previous sandbox directory first
        #[arg(long)]
        clean: bool,
    },
}

#[tokio::main]
async fn main() {
    let env_file = std::env::current_dir()
        .ok()
        .and_then(|dir| cli::utils::load_env_file(&dir));
    cli::utils::init_tracing();
    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    match command {
        Commands::Import { dir, project } => cli::projects::import(&settings, &dir, project).await,
        Commands::List => cli::projects::list(&settings).await,
        Commands::Show { project } => cli::projects::show(&settings, &project).await,
        Commands::Export { project, output } => cli::projects::export(&settings, &project, output).await,
        Commands::Run { project, clean } => cli::run::run(&settings, &project, clean).await,
    }
}
