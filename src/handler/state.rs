// ABOUTME: Setup state marker types for the type state pattern.
// ABOUTME: Each state carries what the previous steps produced.

use std::path::{Path, PathBuf};

use crate::types::RuntimeName;

/// Implemented by every state that knows the resolved runtime.
pub trait HasRuntime {
    fn runtime(&self) -> &RuntimeName;
}

/// Nothing done yet.
/// Available actions: `resolve_config()`, `setup()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initial;

/// Default runtime resolved from CRI-O configuration.
/// Available actions: `patch_script()`
#[derive(Debug, Clone)]
pub struct ConfigResolved {
    pub(crate) runtime: RuntimeName,
}

/// Hook script patched into the staging file.
/// Available actions: `install_files()`
#[derive(Debug, Clone)]
pub struct ScriptPatched {
    pub(crate) runtime: RuntimeName,
    pub(crate) staged_script: PathBuf,
}

impl ScriptPatched {
    pub fn staged_script(&self) -> &Path {
        &self.staged_script
    }
}

/// Hook script and declaration installed on the host.
/// Available actions: `link_socket()`
#[derive(Debug, Clone)]
pub struct FilesInstalled {
    pub(crate) runtime: RuntimeName,
}

/// Socket symlink in place. Terminal state.
#[derive(Debug, Clone)]
pub struct SocketLinked {
    pub(crate) runtime: RuntimeName,
}

impl HasRuntime for ConfigResolved {
    fn runtime(&self) -> &RuntimeName {
        &self.runtime
    }
}

impl HasRuntime for ScriptPatched {
    fn runtime(&self) -> &RuntimeName {
        &self.runtime
    }
}

impl HasRuntime for FilesInstalled {
    fn runtime(&self) -> &RuntimeName {
        &self.runtime
    }
}

impl HasRuntime for SocketLinked {
    fn runtime(&self) -> &RuntimeName {
        &self.runtime
    }
}
