// ABOUTME: OCI hook installation: runtime-aware script patching and file placement on the host.
// ABOUTME: Script and declaration are installed by two independent, non-transactional moves.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fs::FileAccess;
use crate::types::RuntimeName;

/// Runtime name the shipped hook script is written against.
pub const PLACEHOLDER_RUNTIME: &str = "runc";

/// Mode applied to every installed hook file.
pub const HOOK_FILE_MODE: u32 = 0o755;

pub const DEFAULT_SOURCE_SCRIPT: &str = "/app/OCI-hook/hook.sh";
pub const DEFAULT_DEST_SCRIPT: &str = "/host/opt/oci-hook-swap.sh";
pub const DEFAULT_SOURCE_DECL: &str = "/app/OCI-hook/swap-for-burstable.json";
pub const DEFAULT_DEST_DECL: &str = "/host/run/containers/oci/hooks.d/swap-for-burstable.json";
pub const DEFAULT_STAGING_SCRIPT: &str = "/tmp/hook.sh.tmp";

/// Where the hook files come from and where they go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfiguration {
    /// Hook script template shipped in the agent image.
    pub source_script_path: PathBuf,
    /// Final location of the patched script on the host.
    pub dest_script_path: PathBuf,
    /// OCI hook declaration (hooks.d JSON) shipped in the agent image.
    pub source_decl_path: PathBuf,
    /// Final location of the declaration on the host.
    pub dest_decl_path: PathBuf,
    /// Scratch file holding the patched script before installation.
    pub staging_script_path: PathBuf,
}

impl Default for HookConfiguration {
    fn default() -> Self {
        Self {
            source_script_path: PathBuf::from(DEFAULT_SOURCE_SCRIPT),
            dest_script_path: PathBuf::from(DEFAULT_DEST_SCRIPT),
            source_decl_path: PathBuf::from(DEFAULT_SOURCE_DECL),
            dest_decl_path: PathBuf::from(DEFAULT_DEST_DECL),
            staging_script_path: PathBuf::from(DEFAULT_STAGING_SCRIPT),
        }
    }
}

/// Errors from patching or installing hook files.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("couldn't open source file {}: {source}", path.display())]
    OpenSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't open dest file {}: {source}", path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error reading source file {}: {source}", path.display())]
    ReadScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing staged script {}: {source}", path.display())]
    WriteStaged {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't set file permissions on {}: {source}", path.display())]
    Chmod {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Replace every [`PLACEHOLDER_RUNTIME`] in `line`, returning the new line
/// and the number of replacements.
fn replace_placeholder(line: &[u8], runtime: &RuntimeName) -> (Vec<u8>, usize) {
    let needle = PLACEHOLDER_RUNTIME.as_bytes();
    let mut patched = Vec::with_capacity(line.len());
    let mut count = 0;
    let mut rest = line;
    while let Some(at) = rest.windows(needle.len()).position(|w| w == needle) {
        patched.extend_from_slice(&rest[..at]);
        patched.extend_from_slice(runtime.as_str().as_bytes());
        rest = &rest[at + needle.len()..];
        count += 1;
    }
    patched.extend_from_slice(rest);
    (patched, count)
}

/// Patches and installs the OCI hook.
pub struct HookInstaller<'a, F: FileAccess> {
    fs: &'a F,
    config: &'a HookConfiguration,
}

impl<'a, F: FileAccess> HookInstaller<'a, F> {
    pub fn new(fs: &'a F, config: &'a HookConfiguration) -> Self {
        Self { fs, config }
    }

    /// Write a copy of the hook script with every [`PLACEHOLDER_RUNTIME`]
    /// replaced by `runtime` to the staging path, and return that path.
    ///
    /// The script is handled as bytes, so it need not be valid UTF-8. Each
    /// line is written back terminated by `\n` (a `\r\n` ending becomes
    /// `\n`), so line order and line count are preserved.
    pub fn patch_hook_script(&self, runtime: &RuntimeName) -> Result<PathBuf, HookError> {
        let source_path = &self.config.source_script_path;
        let staging_path = &self.config.staging_script_path;

        let source = self
            .fs
            .open(source_path)
            .map_err(|source| HookError::OpenSource {
                path: source_path.clone(),
                source,
            })?;
        let staged = self
            .fs
            .create(staging_path)
            .map_err(|source| HookError::CreateDestination {
                path: staging_path.clone(),
                source,
            })?;

        let write_err = |source| HookError::WriteStaged {
            path: staging_path.clone(),
            source,
        };

        let mut reader = BufReader::new(source);
        let mut writer = BufWriter::new(staged);
        let mut line = Vec::new();
        let mut replaced = 0;
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|source| HookError::ReadScript {
                    path: source_path.clone(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            let (patched, count) = replace_placeholder(trim_line_ending(&line), runtime);
            replaced += count;
            writer.write_all(&patched).map_err(write_err)?;
            writer.write_all(b"\n").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;

        tracing::debug!(
            "Replaced {} occurrence(s) of {} with {} in {}",
            replaced,
            PLACEHOLDER_RUNTIME,
            runtime,
            staging_path.display()
        );

        Ok(staging_path.clone())
    }

    /// Move the staged script and the hook declaration into place.
    ///
    /// The two moves are independent: if the declaration fails, the script
    /// stays installed.
    pub fn install_hook_files(&self, staged_script: &Path) -> Result<(), HookError> {
        tracing::info!("Installing OCI hook script");
        self.move_file(staged_script, &self.config.dest_script_path)?;

        tracing::info!("Installing OCI hook configuration");
        self.move_file(&self.config.source_decl_path, &self.config.dest_decl_path)?;

        Ok(())
    }

    /// Copy `from` over `to` and make the result executable.
    fn move_file(&self, from: &Path, to: &Path) -> Result<(), HookError> {
        let mut input = self.fs.open(from).map_err(|source| HookError::OpenSource {
            path: from.to_path_buf(),
            source,
        })?;
        let mut output = self
            .fs
            .create(to)
            .map_err(|source| HookError::CreateDestination {
                path: to.to_path_buf(),
                source,
            })?;

        let copy_err = |source| HookError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };
        self.fs
            .copy(&mut *output, &mut *input)
            .map_err(copy_err)?;
        output.flush().map_err(copy_err)?;
        drop(input);
        drop(output);

        self.fs
            .chmod(to, HOOK_FILE_MODE)
            .map_err(|source| HookError::Chmod {
                path: to.to_path_buf(),
                source,
            })?;

        tracing::debug!("Installed {} -> {}", from.display(), to.display());
        Ok(())
    }
}
