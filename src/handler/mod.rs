// ABOUTME: CRI-O runtime handler: resolves the default runtime and installs the OCI hook.
// ABOUTME: Type state pattern; each step consumes the handler and returns the next state.

mod error;
mod state;
mod transitions;

pub use error::{SetupError, SetupErrorKind};
pub use state::{ConfigResolved, FilesInstalled, HasRuntime, Initial, ScriptPatched, SocketLinked};

use crate::config::ConfigPaths;
use crate::diagnostics::Diagnostics;
use crate::fs::{FileAccess, HostFs};
use crate::hooks::HookConfiguration;
use crate::socket::SocketLink;
use crate::types::RuntimeName;

/// Sets up CRI-O integration on the host, parameterized by its current state.
///
/// `F` is the filesystem the handler works against, `S` the state marker.
/// A failed step consumes the handler, so there is no way to resume a
/// partially completed setup; start again from [`RuntimeHandler::new`].
#[derive(Debug)]
pub struct RuntimeHandler<F, S> {
    pub(crate) fs: F,
    pub(crate) hook_config: HookConfiguration,
    pub(crate) config_paths: ConfigPaths,
    pub(crate) socket: SocketLink,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) state: S,
}

impl RuntimeHandler<HostFs, Initial> {
    /// Handler for the real host filesystem with default CRI-O and socket paths.
    pub fn new(hook_config: HookConfiguration) -> Self {
        Self::with_fs(HostFs, hook_config)
    }
}

impl<F: FileAccess> RuntimeHandler<F, Initial> {
    /// Handler working against an arbitrary filesystem.
    pub fn with_fs(fs: F, hook_config: HookConfiguration) -> Self {
        RuntimeHandler {
            fs,
            hook_config,
            config_paths: ConfigPaths::default(),
            socket: SocketLink::default(),
            diagnostics: Diagnostics::default(),
            state: Initial,
        }
    }

    /// Override where CRI-O configuration is read from.
    pub fn with_config_paths(mut self, paths: ConfigPaths) -> Self {
        self.config_paths = paths;
        self
    }

    /// Override the socket symlink paths.
    pub fn with_socket_link(mut self, socket: SocketLink) -> Self {
        self.socket = socket;
        self
    }
}

impl<F, S> RuntimeHandler<F, S> {
    pub fn hook_config(&self) -> &HookConfiguration {
        &self.hook_config
    }

    pub fn config_paths(&self) -> &ConfigPaths {
        &self.config_paths
    }

    pub fn socket(&self) -> &SocketLink {
        &self.socket
    }

    /// Non-fatal warnings collected so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<F, S: HasRuntime> RuntimeHandler<F, S> {
    /// The default runtime resolved from CRI-O configuration.
    pub fn runtime(&self) -> &RuntimeName {
        self.state.runtime()
    }
}
