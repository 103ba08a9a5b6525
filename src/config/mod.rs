// ABOUTME: CRI-O runtime configuration model and TOML overlay decoding.
// ABOUTME: Each layer decodes to an overlay whose present fields are merged into the accumulator.

mod resolver;

pub use resolver::ConfigResolver;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{RuntimeName, RuntimeNameError};

/// Runtime CRI-O falls back to when no configuration names one.
pub const DEFAULT_RUNTIME: &str = "crun";

/// CRI-O main config file as mounted into the agent container.
pub const CRIO_CONFIG_PATH: &str = "/host/etc/crio/crio.conf";

/// CRI-O drop-in directory as mounted into the agent container.
pub const CRIO_CONFIG_DROP_IN_PATH: &str = "/host/etc/crio/crio.conf.d";

/// Errors while loading CRI-O configuration layers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode configuration {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration {} is not valid UTF-8: {source}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("configuration {} is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("invalid default_runtime in {}: {source}", path.display())]
    InvalidRuntime {
        path: PathBuf,
        #[source]
        source: RuntimeNameError,
    },

    #[error("walk path {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Path of the layer that caused the error.
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Decode { path, .. }
            | ConfigError::Encoding { path, .. }
            | ConfigError::EmptyFile { path }
            | ConfigError::InvalidRuntime { path, .. }
            | ConfigError::Walk { path, .. } => path,
        }
    }
}

/// Locations of the CRI-O configuration layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub main_file: PathBuf,
    pub drop_in_dir: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            main_file: PathBuf::from(CRIO_CONFIG_PATH),
            drop_in_dir: PathBuf::from(CRIO_CONFIG_DROP_IN_PATH),
        }
    }
}

/// The `crio.runtime` table, reduced to the keys this agent uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Name of the OCI runtime CRI-O uses when a pod does not ask for one.
    pub default_runtime: RuntimeName,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_runtime: RuntimeName::new(DEFAULT_RUNTIME)
                .expect("DEFAULT_RUNTIME is a valid runtime name"),
        }
    }
}

/// Accumulator threaded through every layer during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub runtime: RuntimeConfig,
}

impl EffectiveConfig {
    pub fn default_runtime(&self) -> &RuntimeName {
        &self.runtime.default_runtime
    }
}

/// One decoded layer. `None` means the layer is silent on that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOverlay {
    pub default_runtime: Option<RuntimeName>,
}

impl RuntimeOverlay {
    /// Whether the layer sets any field this agent cares about.
    pub fn is_empty(&self) -> bool {
        self.default_runtime.is_none()
    }
}

/// Copy every field present in `overlay` onto `target`, leaving the rest.
///
/// Returns `true` when at least one field was overwritten.
pub fn merge_if_present(target: &mut EffectiveConfig, overlay: &RuntimeOverlay) -> bool {
    let mut changed = false;
    if let Some(ref name) = overlay.default_runtime {
        target.runtime.default_runtime = name.clone();
        changed = true;
    }
    changed
}

#[derive(Debug, Deserialize)]
struct CrioDocument {
    #[serde(default)]
    crio: Option<CrioTable>,
}

#[derive(Debug, Deserialize)]
struct CrioTable {
    #[serde(default)]
    runtime: Option<RuntimeTable>,
}

#[derive(Debug, Deserialize)]
struct RuntimeTable {
    #[serde(default)]
    default_runtime: Option<String>,
}

/// Decode one configuration layer read from `path`.
pub fn decode_overlay(path: &Path, data: &[u8]) -> Result<RuntimeOverlay, ConfigError> {
    let text = std::str::from_utf8(data).map_err(|source| ConfigError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;

    if text.trim().is_empty() {
        return Err(ConfigError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let document: CrioDocument = toml::from_str(text).map_err(|source| ConfigError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let default_runtime = document
        .crio
        .and_then(|crio| crio.runtime)
        .and_then(|runtime| runtime.default_runtime)
        .map(|name| {
            RuntimeName::new(&name).map_err(|source| ConfigError::InvalidRuntime {
                path: path.to_path_buf(),
                source,
            })
        })
        .transpose()?;

    Ok(RuntimeOverlay { default_runtime })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Result<RuntimeOverlay, ConfigError> {
        decode_overlay(Path::new("/etc/crio/crio.conf"), text.as_bytes())
    }

    #[test]
    fn decodes_default_runtime() {
        let overlay = decode(
            r#"
[crio.runtime]
default_runtime = "runc"
"#,
        )
        .unwrap();
        assert_eq!(overlay.default_runtime.unwrap().as_str(), "runc");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let overlay = decode(
            r#"
[crio]
log_dir = "/var/log/crio/pods"

[crio.runtime]
conmon = "/usr/bin/conmon"
default_runtime = "kata"

[crio.runtime.runtimes.kata]
runtime_path = "/usr/bin/containerd-shim-kata-v2"

[crio.network]
network_dir = "/etc/cni/net.d/"
"#,
        )
        .unwrap();
        assert_eq!(overlay.default_runtime.unwrap().as_str(), "kata");
    }

    #[test]
    fn silent_layer_is_empty_overlay() {
        let overlay = decode(
            r#"
[crio.image]
pause_image = "registry.k8s.io/pause:3.9"
"#,
        )
        .unwrap();
        assert!(overlay.is_empty());
    }

    #[test]
    fn comment_only_layer_is_empty_overlay() {
        let overlay = decode("# managed by machine-config-operator\n").unwrap();
        assert!(overlay.is_empty());
    }

    #[test]
    fn empty_file_is_an_error() {
        let err = decode("  \n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyFile { .. }));
        assert_eq!(err.path(), Path::new("/etc/crio/crio.conf"));
    }

    #[test]
    fn malformed_toml_is_an_error_naming_the_path() {
        let err = decode("[crio.runtime\ndefault_runtime = ").unwrap_err();
        assert!(matches!(err, ConfigError::Decode { .. }));
        assert!(err.to_string().contains("/etc/crio/crio.conf"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        let err = decode("[crio.runtime]\ndefault_runtime = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Decode { .. }));
    }

    #[test]
    fn invalid_runtime_name_is_an_error() {
        let err = decode("[crio.runtime]\ndefault_runtime = \"\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidRuntime {
                source: RuntimeNameError::Empty,
                ..
            }
        ));
    }

    #[test]
    fn non_utf8_is_an_error() {
        let err = decode_overlay(Path::new("/x.conf"), &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ConfigError::Encoding { .. }));
    }

    #[test]
    fn merge_overwrites_only_present_fields() {
        let mut effective = EffectiveConfig::default();
        assert_eq!(effective.default_runtime().as_str(), DEFAULT_RUNTIME);

        let silent = RuntimeOverlay::default();
        assert!(!merge_if_present(&mut effective, &silent));
        assert_eq!(effective.default_runtime().as_str(), DEFAULT_RUNTIME);

        let runc = RuntimeOverlay {
            default_runtime: Some(RuntimeName::new("runc").unwrap()),
        };
        assert!(merge_if_present(&mut effective, &runc));
        assert_eq!(effective.default_runtime().as_str(), "runc");

        assert!(!merge_if_present(&mut effective, &silent));
        assert_eq!(effective.default_runtime().as_str(), "runc");
    }
}
