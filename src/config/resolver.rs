// ABOUTME: Rebuilds CRI-O's effective default runtime from its layered configuration.
// ABOUTME: Order: built-in default, then crio.conf, then every drop-in file in path order.

use std::io;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostics, Warning};
use crate::fs::{EntryKind, FileAccess};
use crate::types::RuntimeName;

use super::{ConfigError, ConfigPaths, EffectiveConfig, decode_overlay, merge_if_present};

/// Resolves the default runtime the way CRI-O itself would.
///
/// Precedence, lowest first:
/// 1. [`DEFAULT_RUNTIME`](super::DEFAULT_RUNTIME)
/// 2. the main config file
/// 3. each regular file under the drop-in directory, in lexical path order
///
/// A later layer only wins on the fields it actually sets.
pub struct ConfigResolver<'a, F: FileAccess> {
    fs: &'a F,
    paths: &'a ConfigPaths,
}

impl<'a, F: FileAccess> ConfigResolver<'a, F> {
    pub fn new(fs: &'a F, paths: &'a ConfigPaths) -> Self {
        Self { fs, paths }
    }

    /// Resolve the effective default runtime name.
    ///
    /// Missing layers are skipped. A drop-in directory that exists but
    /// cannot be stat'ed is skipped with a warning in `diagnostics`.
    pub fn resolve(&self, diagnostics: &mut Diagnostics) -> Result<RuntimeName, ConfigError> {
        let mut effective = EffectiveConfig::default();

        match self.update_from_file(&mut effective, &self.paths.main_file) {
            Ok(()) => {}
            Err(ConfigError::Read { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                tracing::info!(
                    "Skipping not-existing config file {}",
                    self.paths.main_file.display()
                );
            }
            Err(e) => return Err(e),
        }

        self.update_from_path(&mut effective, &self.paths.drop_in_dir, diagnostics)?;

        Ok(effective.runtime.default_runtime)
    }

    fn update_from_path(
        &self,
        effective: &mut EffectiveConfig,
        path: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), ConfigError> {
        if let Err(e) = self.fs.stat(path) {
            if e.kind() == io::ErrorKind::NotFound {
                tracing::info!("Skipping not-existing drop-in directory {}", path.display());
            } else {
                diagnostics.warn(Warning::drop_in_unreadable(format!(
                    "Skipping drop-in directory {}: {}",
                    path.display(),
                    e
                )));
            }
            return Ok(());
        }

        tracing::info!("Updating config from path: {}", path.display());

        for file in self.drop_in_files(path)? {
            self.update_from_file(effective, &file)?;
        }
        Ok(())
    }

    /// Regular files beneath `root`, depth-first in lexical path order.
    ///
    /// Symlinks count when they resolve to a regular file. A dangling link is
    /// kept so that reading it reports the failure.
    fn drop_in_files(&self, root: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let mut files = Vec::new();
        self.fs
            .walk(root, &mut |path, kind| {
                let regular = match kind {
                    EntryKind::File => true,
                    EntryKind::Symlink => self
                        .fs
                        .stat(path)
                        .map_or(true, |info| info.kind == EntryKind::File),
                    EntryKind::Dir | EntryKind::Other => false,
                };
                if regular {
                    files.push(path.to_path_buf());
                } else if kind != EntryKind::Dir {
                    tracing::debug!("Skipping non-regular file {}", path.display());
                }
                Ok(())
            })
            .map_err(|source| ConfigError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
        Ok(files)
    }

    fn update_from_file(
        &self,
        effective: &mut EffectiveConfig,
        path: &Path,
    ) -> Result<(), ConfigError> {
        let data = self.fs.read_all(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Updating config from file: {}", path.display());

        let overlay = decode_overlay(path, &data)?;
        if merge_if_present(effective, &overlay) {
            tracing::debug!(
                "{} sets default_runtime = {}",
                path.display(),
                effective.default_runtime()
            );
        }
        Ok(())
    }
}
