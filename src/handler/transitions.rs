// ABOUTME: State transition methods for runtime handler setup.
// ABOUTME: Each method consumes self and returns the next state on success.

use snafu::ResultExt;

use crate::config::ConfigResolver;
use crate::fs::FileAccess;
use crate::hooks::HookInstaller;

use super::RuntimeHandler;
use super::error::{
    InstallFilesSnafu, LinkSocketSnafu, PatchScriptSnafu, ResolveConfigSnafu, SetupError,
};
use super::state::{ConfigResolved, FilesInstalled, Initial, ScriptPatched, SocketLinked};

impl<F, S> RuntimeHandler<F, S> {
    fn transition<T>(self, state: T) -> RuntimeHandler<F, T> {
        RuntimeHandler {
            fs: self.fs,
            hook_config: self.hook_config,
            config_paths: self.config_paths,
            socket: self.socket,
            diagnostics: self.diagnostics,
            state,
        }
    }
}

// =============================================================================
// Initial -> ConfigResolved
// =============================================================================

impl<F: FileAccess> RuntimeHandler<F, Initial> {
    /// Run every step in order and stop at the first failure.
    ///
    /// Steps that already completed are not undone when a later one fails.
    #[must_use = "setup result must be checked"]
    pub fn setup(self) -> Result<RuntimeHandler<F, SocketLinked>, SetupError> {
        self.resolve_config()?
            .patch_script()?
            .install_files()?
            .link_socket()
    }

    /// Resolve the default runtime from CRI-O's layered configuration.
    #[must_use = "handler state must be used"]
    pub fn resolve_config(mut self) -> Result<RuntimeHandler<F, ConfigResolved>, SetupError> {
        let runtime = ConfigResolver::new(&self.fs, &self.config_paths)
            .resolve(&mut self.diagnostics)
            .context(ResolveConfigSnafu)?;

        tracing::info!("Detected default runtime: {}", runtime);
        Ok(self.transition(ConfigResolved { runtime }))
    }
}

// =============================================================================
// ConfigResolved -> ScriptPatched
// =============================================================================

impl<F: FileAccess> RuntimeHandler<F, ConfigResolved> {
    /// Write the runtime-specific hook script to the staging path.
    #[must_use = "handler state must be used"]
    pub fn patch_script(self) -> Result<RuntimeHandler<F, ScriptPatched>, SetupError> {
        let staged_script = HookInstaller::new(&self.fs, &self.hook_config)
            .patch_hook_script(&self.state.runtime)
            .context(PatchScriptSnafu)?;

        let runtime = self.state.runtime.clone();
        Ok(self.transition(ScriptPatched {
            runtime,
            staged_script,
        }))
    }
}

// =============================================================================
// ScriptPatched -> FilesInstalled
// =============================================================================

impl<F: FileAccess> RuntimeHandler<F, ScriptPatched> {
    /// Install the staged script and the hook declaration on the host.
    #[must_use = "handler state must be used"]
    pub fn install_files(self) -> Result<RuntimeHandler<F, FilesInstalled>, SetupError> {
        HookInstaller::new(&self.fs, &self.hook_config)
            .install_hook_files(&self.state.staged_script)
            .context(InstallFilesSnafu)?;

        let runtime = self.state.runtime.clone();
        Ok(self.transition(FilesInstalled { runtime }))
    }
}

// =============================================================================
// FilesInstalled -> SocketLinked
// =============================================================================

impl<F: FileAccess> RuntimeHandler<F, FilesInstalled> {
    /// Make the host CRI-O socket reachable at its usual in-container path.
    #[must_use = "handler state must be used"]
    pub fn link_socket(self) -> Result<RuntimeHandler<F, SocketLinked>, SetupError> {
        self.socket.establish(&self.fs).context(LinkSocketSnafu)?;

        let runtime = self.state.runtime.clone();
        Ok(self.transition(SocketLinked { runtime }))
    }
}
