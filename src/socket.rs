// ABOUTME: Exposes the host CRI-O socket inside the agent container via a symlink.
// ABOUTME: Re-running against an already correct link is a no-op.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::fs::FileAccess;

/// Where CRI-O clients inside the agent container expect the socket.
pub const CRIO_SOCKET_CONTAINER_PATH: &str = "/var/run/crio/crio.sock";

/// The host's CRI-O socket as mounted into the agent container.
pub const CRIO_SOCKET_HOST_PATH: &str = "/host/var/run/crio/crio.sock";

const SOCKET_DIR_MODE: u32 = 0o755;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to create socket directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to link {} -> {}: {source}", link.display(), target.display())]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} already exists and does not point to {}", link.display(), target.display())]
    Occupied { link: PathBuf, target: PathBuf },

    #[error("failed to inspect existing {}: {source}", link.display())]
    InspectExisting {
        link: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Symlink from the in-container socket path to the host-mounted socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketLink {
    pub container_path: PathBuf,
    pub host_path: PathBuf,
}

impl Default for SocketLink {
    fn default() -> Self {
        Self {
            container_path: PathBuf::from(CRIO_SOCKET_CONTAINER_PATH),
            host_path: PathBuf::from(CRIO_SOCKET_HOST_PATH),
        }
    }
}

impl SocketLink {
    /// Create the socket directory if needed and link the socket into it.
    pub fn establish<F: FileAccess>(&self, fs: &F) -> Result<(), SocketError> {
        let socket_dir = fs.dirname(&self.container_path);
        tracing::info!("Creating CRIO socket directory {}", socket_dir.display());
        fs.mkdir_all(&socket_dir, SOCKET_DIR_MODE)
            .map_err(|source| SocketError::CreateDir {
                path: socket_dir.clone(),
                source,
            })?;

        tracing::info!(
            "Creating symlink source: {} destination: {}",
            self.host_path.display(),
            self.container_path.display()
        );
        match fs.symlink(&self.host_path, &self.container_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => self.verify_existing(fs),
            Err(source) => Err(SocketError::Symlink {
                link: self.container_path.clone(),
                target: self.host_path.clone(),
                source,
            }),
        }
    }

    fn verify_existing<F: FileAccess>(&self, fs: &F) -> Result<(), SocketError> {
        let occupied = || SocketError::Occupied {
            link: self.container_path.clone(),
            target: self.host_path.clone(),
        };
        match fs.read_link(&self.container_path) {
            Ok(target) if target == self.host_path => {
                tracing::info!(
                    "Symlink {} already points to {}",
                    self.container_path.display(),
                    self.host_path.display()
                );
                Ok(())
            }
            Ok(_) => Err(occupied()),
            // Not a symlink at all.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Err(occupied()),
            Err(source) => Err(SocketError::InspectExisting {
                link: self.container_path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FsOp, MemoryFs};
    use std::path::Path;

    #[test]
    fn creates_directory_and_link() {
        let fs = MemoryFs::new();
        SocketLink::default().establish(&fs).unwrap();

        assert!(fs.is_dir("/var/run/crio"));
        assert_eq!(fs.mode("/var/run/crio"), Some(0o755));
        assert_eq!(
            fs.link_target(CRIO_SOCKET_CONTAINER_PATH),
            Some(PathBuf::from(CRIO_SOCKET_HOST_PATH))
        );
    }

    #[test]
    fn existing_correct_link_is_accepted() {
        let fs = MemoryFs::new().with_symlink(CRIO_SOCKET_HOST_PATH, CRIO_SOCKET_CONTAINER_PATH);
        SocketLink::default().establish(&fs).unwrap();
        SocketLink::default().establish(&fs).unwrap();
    }

    #[test]
    fn existing_foreign_link_is_rejected() {
        let fs = MemoryFs::new().with_symlink("/elsewhere.sock", CRIO_SOCKET_CONTAINER_PATH);
        let err = SocketLink::default().establish(&fs).unwrap_err();
        assert!(matches!(err, SocketError::Occupied { .. }));
    }

    #[test]
    fn existing_regular_file_is_rejected() {
        let fs = MemoryFs::new().with_file(CRIO_SOCKET_CONTAINER_PATH, "");
        let err = SocketLink::default().establish(&fs).unwrap_err();
        assert!(matches!(err, SocketError::Occupied { .. }));
    }

    #[test]
    fn unreadable_existing_entry_keeps_io_error() {
        let fs = MemoryFs::new()
            .with_symlink(CRIO_SOCKET_HOST_PATH, CRIO_SOCKET_CONTAINER_PATH)
            .fail(
                FsOp::ReadLink,
                CRIO_SOCKET_CONTAINER_PATH,
                io::ErrorKind::PermissionDenied,
            );
        let err = SocketLink::default().establish(&fs).unwrap_err();
        match err {
            SocketError::InspectExisting { link, source } => {
                assert_eq!(link, Path::new(CRIO_SOCKET_CONTAINER_PATH));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected InspectExisting, got {other:?}"),
        }
    }

    #[test]
    fn mkdir_failure_is_fatal() {
        let fs = MemoryFs::new().fail(FsOp::MkdirAll, "/var/run/crio", io::ErrorKind::ReadOnlyFilesystem);
        let err = SocketLink::default().establish(&fs).unwrap_err();
        match err {
            SocketError::CreateDir { path, .. } => assert_eq!(path, Path::new("/var/run/crio")),
            other => panic!("expected CreateDir, got {other:?}"),
        }
        assert!(!fs.exists(CRIO_SOCKET_CONTAINER_PATH));
    }

    #[test]
    fn symlink_failure_is_fatal() {
        let fs = MemoryFs::new().fail(
            FsOp::Symlink,
            CRIO_SOCKET_CONTAINER_PATH,
            io::ErrorKind::PermissionDenied,
        );
        let err = SocketLink::default().establish(&fs).unwrap_err();
        assert!(matches!(err, SocketError::Symlink { .. }));
    }
}
