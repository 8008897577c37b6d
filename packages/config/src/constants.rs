// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Playground

// Storage Configuration
pub const PLAYGROUND_DATA_DIR: &str = "PLAYGROUND_DATA_DIR";
pub const PLAYGROUND_DB_PATH: &str = "PLAYGROUND_DB_PATH";

// Sandbox Configuration
pub const PLAYGROUND_SANDBOX_DIR: &str = "PLAYGROUND_SANDBOX_DIR";
pub const PLAYGROUND_INSTALL_COMMAND: &str = "PLAYGROUND_INSTALL_COMMAND";
pub const PLAYGROUND_START_COMMAND: &str = "PLAYGROUND_START_COMMAND";
pub const PLAYGROUND_MANIFEST: &str = "PLAYGROUND_MANIFEST";
pub const PLAYGROUND_READY_TIMEOUT_SECS: &str = "PLAYGROUND_READY_TIMEOUT_SECS";

// Logging
pub const PLAYGROUND_LOG: &str = "PLAYGROUND_LOG";

// System Environment Variables
pub const HOME: &str = "HOME";
