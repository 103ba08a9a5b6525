// ABOUTME: Setup error types with SNAFU pattern.
// ABOUTME: One variant per setup step, each wrapping that step's own error.

use snafu::Snafu;

use crate::config::ConfigError;
use crate::hooks::HookError;
use crate::socket::SocketError;

/// Failure of one setup step. Setup stops at the first one.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SetupError {
    #[snafu(display("resolve CRI-O configuration: {source}"))]
    ResolveConfig { source: ConfigError },

    #[snafu(display("update hook script: {source}"))]
    PatchScript { source: HookError },

    #[snafu(display("install OCI hook: {source}"))]
    InstallFiles { source: HookError },

    #[snafu(display("set CRI-O socket symlink: {source}"))]
    LinkSocket { source: SocketError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupErrorKind {
    /// CRI-O configuration could not be read, walked or decoded.
    Config,
    /// Hook script could not be patched into the staging file.
    PatchScript,
    /// Hook script or declaration could not be installed.
    InstallFiles,
    /// Socket directory or symlink could not be created.
    LinkSocket,
}

impl SetupError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> SetupErrorKind {
        match self {
            SetupError::ResolveConfig { .. } => SetupErrorKind::Config,
            SetupError::PatchScript { .. } => SetupErrorKind::PatchScript,
            SetupError::InstallFiles { .. } => SetupErrorKind::InstallFiles,
            SetupError::LinkSocket { .. } => SetupErrorKind::LinkSocket,
        }
    }

    /// Returns the configuration error if resolution failed.
    pub fn config_error(&self) -> Option<&ConfigError> {
        match self {
            SetupError::ResolveConfig { source } => Some(source),
            _ => None,
        }
    }
}
