// ABOUTME: Sandbox mirroring and provisioning for playground projects
// ABOUTME: Flattens tree snapshots into mount maps and bootstraps the dev server inside a runtime

pub mod bootstrap;
pub mod error;
pub mod local;
pub mod memory;
pub mod runtime;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use bootstrap::{BootstrapConfig, SandboxBootstrap};
pub use error::{Result, SandboxError};
pub use local::{detect_server_ready, LocalRuntime};
pub use memory::{Gate, MemoryRuntime, ScriptedProcess};
pub use runtime::{SandboxProcess, SandboxRuntime};
pub use transform::{resolve_file_path, to_mount_map, MountMap};
pub use types::{
    BootstrapOutcome, BootstrapState, BootstrapStatus, CommandSpec, FsChange, LogEntry, LogSource,
    ServerReady, TOTAL_STEPS,
};
