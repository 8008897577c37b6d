// ABOUTME: Configuration for Playground binaries
// ABOUTME: Environment variable names and the settings resolved from them

pub mod constants;
pub mod settings;

pub use settings::{CommandLine, ConfigError, Settings};
