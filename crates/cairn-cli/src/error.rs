//! Cairn CLI — error types.

use cairn_core::error::DomainError;
use cairn_event_store::ConfigError;
use thiserror::Error;

/// Startup and runtime errors for the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A store or domain operation failed.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

impl CliError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Domain(e) if e.is_concurrency_conflict() => 3,
            Self::Domain(_) => 1,
        }
    }
}
