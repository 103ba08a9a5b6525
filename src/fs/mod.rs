// ABOUTME: File access capability used by config resolution, hook install and socket linking.
// ABOUTME: HostFs talks to the real filesystem; MemoryFs is a deterministic in-memory double.

mod host;
mod memory;

pub use host::HostFs;
pub use memory::{FsOp, MemoryFs};

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Sockets, FIFOs and device nodes.
    Other,
}

/// Metadata returned by [`FileAccess::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub kind: EntryKind,
    /// Permission bits (lower 12 bits of `st_mode`).
    pub mode: u32,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Host filesystem operations.
///
/// Every operation returns the underlying `io::Error`; callers distinguish an
/// absent path through `io::ErrorKind::NotFound` and treat everything else as
/// a real failure.
pub trait FileAccess {
    /// Open a file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Create (or truncate) a file for writing.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>>;

    /// Stream all bytes from `src` into `dst`.
    fn copy(&self, dst: &mut dyn Write, src: &mut dyn Read) -> io::Result<u64> {
        io::copy(src, dst)
    }

    /// Set permission bits on `path`.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Read a whole file into memory.
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Visit `root` and everything beneath it, depth-first in lexical path order.
    ///
    /// The callback receives each path and its kind, without following
    /// symlinks. The walk stops at the first error, either from traversal or
    /// from `visit`.
    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path, EntryKind) -> io::Result<()>,
    ) -> io::Result<()>;

    /// Stat `path`, following symlinks. The kind is never `Symlink`.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Create `path` and any missing parents with permission bits `mode`.
    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Create a symlink at `link` pointing to `target`.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Read the target of the symlink at `path`.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Directory component of `path`, `"."` for a bare file name.
    fn dirname(&self, path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_path_buf(),
            None => path.to_path_buf(),
        }
    }
}

impl<F: FileAccess + ?Sized> FileAccess for &F {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        (**self).open(path)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        (**self).create(path)
    }

    fn copy(&self, dst: &mut dyn Write, src: &mut dyn Read) -> io::Result<u64> {
        (**self).copy(dst, src)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).chmod(path, mode)
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_all(path)
    }

    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path, EntryKind) -> io::Result<()>,
    ) -> io::Result<()> {
        (**self).walk(root, visit)
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        (**self).stat(path)
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).mkdir_all(path, mode)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        (**self).symlink(target, link)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).read_link(path)
    }

    fn dirname(&self, path: &Path) -> PathBuf {
        (**self).dirname(path)
    }
}
