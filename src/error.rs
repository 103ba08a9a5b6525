// ABOUTME: Application-wide error types for crio-hook-installer.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;
use crate::handler::SetupError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("resolve CRI-O configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("setup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
