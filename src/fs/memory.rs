// ABOUTME: In-memory FileAccess double for deterministic tests of layering and installation.
// ABOUTME: Supports injecting io errors per operation and path.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{EntryKind, FileAccess, FileInfo};

/// Symlink hops followed before giving up, as the kernel does with ELOOP.
const MAX_SYMLINK_HOPS: usize = 40;

/// Operations that can be made to fail with [`MemoryFs::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    Open,
    Create,
    /// Writes through a handle returned by `create`.
    Write,
    Chmod,
    Read,
    Walk,
    Stat,
    MkdirAll,
    Symlink,
    ReadLink,
}

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mode: u32 },
    Dir { mode: u32 },
    Symlink { target: PathBuf },
    /// FIFO, socket or device node.
    Special,
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File { .. } => EntryKind::File,
            Node::Dir { .. } => EntryKind::Dir,
            Node::Symlink { .. } => EntryKind::Symlink,
            Node::Special => EntryKind::Other,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    faults: HashMap<(FsOp, PathBuf), io::ErrorKind>,
}

impl State {
    fn check(&self, op: FsOp, path: &Path) -> io::Result<()> {
        match self.faults.get(&(op, path.to_path_buf())) {
            Some(kind) => Err(io::Error::new(
                *kind,
                format!("injected {op:?} failure on {}", path.display()),
            )),
            None => Ok(()),
        }
    }

    /// Follow symlinks until a non-link node (or nothing) is reached.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let mut current = path.to_path_buf();
        for _ in 0..MAX_SYMLINK_HOPS {
            match self.nodes.get(&current) {
                Some(Node::Symlink { target }) => {
                    current = join_link(&current, target);
                }
                _ => return Ok(current),
            }
        }
        Err(io::Error::other(format!(
            "too many levels of symbolic links: {}",
            path.display()
        )))
    }

    fn get_resolved(&self, path: &Path) -> io::Result<(PathBuf, &Node)> {
        let resolved = self.resolve(path)?;
        match self.nodes.get(&resolved) {
            Some(node) => Ok((resolved, node)),
            None => Err(not_found(path)),
        }
    }

    fn parent_is_dir(&self, path: &Path) -> io::Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match self.get_resolved(parent) {
            Ok((_, Node::Dir { .. })) => Ok(()),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", parent.display()),
            )),
            Err(_) => Err(not_found(parent)),
        }
    }
}

/// In-memory filesystem.
///
/// Paths are stored normalised in a `BTreeMap`, so iteration order is the
/// component-wise lexical order a sorted depth-first walk produces. Cloning
/// shares the underlying state.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Empty filesystem containing only `/`.
    pub fn new() -> Self {
        let mut state = State::default();
        state
            .nodes
            .insert(PathBuf::from("/"), Node::Dir { mode: 0o755 });
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add a directory and any missing parents.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.add_dirs(&normalize(path.as_ref()), 0o755);
        self
    }

    /// Add a regular file with mode 0644, creating parent directories.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Self {
        self.with_file_mode(path, contents, 0o644)
    }

    /// Add a regular file with an explicit mode, creating parent directories.
    pub fn with_file_mode(
        self,
        path: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
        mode: u32,
    ) -> Self {
        let path = normalize(path.as_ref());
        if let Some(parent) = path.parent() {
            self.add_dirs(parent, 0o755);
        }
        self.state.lock().nodes.insert(
            path,
            Node::File {
                data: contents.as_ref().to_vec(),
                mode,
            },
        );
        self
    }

    /// Add a symlink at `link` pointing to `target`, creating parent directories.
    pub fn with_symlink(self, target: impl AsRef<Path>, link: impl AsRef<Path>) -> Self {
        let link = normalize(link.as_ref());
        if let Some(parent) = link.parent() {
            self.add_dirs(parent, 0o755);
        }
        self.state.lock().nodes.insert(
            link,
            Node::Symlink {
                target: target.as_ref().to_path_buf(),
            },
        );
        self
    }

    /// Add a FIFO, creating parent directories. Reading it fails with
    /// `WouldBlock` where the real filesystem would block.
    pub fn with_fifo(self, path: impl AsRef<Path>) -> Self {
        let path = normalize(path.as_ref());
        if let Some(parent) = path.parent() {
            self.add_dirs(parent, 0o755);
        }
        self.state.lock().nodes.insert(path, Node::Special);
        self
    }

    /// Make `op` on `path` fail with `kind` from now on.
    pub fn fail(self, op: FsOp, path: impl AsRef<Path>, kind: io::ErrorKind) -> Self {
        self.state
            .lock()
            .faults
            .insert((op, normalize(path.as_ref())), kind);
        self
    }

    /// Contents of a regular file, following symlinks.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.state.lock();
        match state.get_resolved(&normalize(path.as_ref())) {
            Ok((_, Node::File { data, .. })) => Some(data.clone()),
            _ => None,
        }
    }

    /// Contents of a regular file as UTF-8 text.
    pub fn read_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.contents(path)
            .and_then(|data| String::from_utf8(data).ok())
    }

    /// Permission bits of a file or directory, following symlinks.
    pub fn mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        let state = self.state.lock();
        match state.get_resolved(&normalize(path.as_ref())) {
            Ok((_, Node::File { mode, .. })) | Ok((_, Node::Dir { mode })) => Some(*mode),
            _ => None,
        }
    }

    /// Whether anything (file, directory, or dangling symlink) exists at `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.state
            .lock()
            .nodes
            .contains_key(&normalize(path.as_ref()))
    }

    /// Whether `path` is a directory.
    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        let state = self.state.lock();
        matches!(
            state.get_resolved(&normalize(path.as_ref())),
            Ok((_, Node::Dir { .. }))
        )
    }

    /// Target of the symlink at `path`, without following it.
    pub fn link_target(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        match self.state.lock().nodes.get(&normalize(path.as_ref())) {
            Some(Node::Symlink { target }) => Some(target.clone()),
            _ => None,
        }
    }

    fn add_dirs(&self, path: &Path, mode: u32) {
        let mut state = self.state.lock();
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            state
                .nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir { mode });
        }
    }
}

impl FileAccess for MemoryFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let path = normalize(path);
        let state = self.state.lock();
        state.check(FsOp::Open, &path)?;
        match state.get_resolved(&path)? {
            (_, Node::File { data, .. }) => Ok(Box::new(Cursor::new(data.clone()))),
            (_, Node::Special) => Err(would_block(&path)),
            (_, _) => Err(is_a_directory(&path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let path = normalize(path);
        let mut state = self.state.lock();
        state.check(FsOp::Create, &path)?;
        state.parent_is_dir(&path)?;
        let resolved = state.resolve(&path)?;
        let mode = match state.nodes.get(&resolved) {
            Some(Node::Dir { .. }) => return Err(is_a_directory(&path)),
            Some(Node::File { mode, .. }) => *mode,
            _ => 0o644,
        };
        state.nodes.insert(
            resolved.clone(),
            Node::File {
                data: Vec::new(),
                mode,
            },
        );
        let fail = state
            .faults
            .get(&(FsOp::Write, path.clone()))
            .copied();
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            path: resolved,
            fail,
        }))
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        let path = normalize(path);
        let mut state = self.state.lock();
        state.check(FsOp::Chmod, &path)?;
        let resolved = state.get_resolved(&path)?.0;
        match state.nodes.get_mut(&resolved) {
            Some(Node::File { mode: m, .. }) | Some(Node::Dir { mode: m }) => {
                *m = mode & 0o7777;
                Ok(())
            }
            _ => Err(not_found(&path)),
        }
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = normalize(path);
        let state = self.state.lock();
        state.check(FsOp::Read, &path)?;
        match state.get_resolved(&path)? {
            (_, Node::File { data, .. }) => Ok(data.clone()),
            (_, Node::Special) => Err(would_block(&path)),
            (_, _) => Err(is_a_directory(&path)),
        }
    }

    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path, EntryKind) -> io::Result<()>,
    ) -> io::Result<()> {
        let root = normalize(root);
        // Snapshot so the callback may call back into the filesystem.
        let entries: Vec<(PathBuf, EntryKind)> = {
            let state = self.state.lock();
            state.check(FsOp::Walk, &root)?;
            if !state.nodes.contains_key(&root) {
                return Err(not_found(&root));
            }
            state
                .nodes
                .range(root.clone()..)
                .take_while(|(path, _)| path.starts_with(&root))
                .map(|(path, node)| (path.clone(), node.kind()))
                .collect()
        };

        for (path, kind) in entries {
            self.state.lock().check(FsOp::Walk, &path)?;
            visit(&path, kind)?;
        }
        Ok(())
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let path = normalize(path);
        let state = self.state.lock();
        state.check(FsOp::Stat, &path)?;
        let (_, node) = state.get_resolved(&path)?;
        let mode = match node {
            Node::File { mode, .. } | Node::Dir { mode } => *mode,
            Node::Special => 0o644,
            Node::Symlink { .. } => return Err(not_found(&path)),
        };
        Ok(FileInfo {
            kind: node.kind(),
            mode,
        })
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let path = normalize(path);
        {
            let state = self.state.lock();
            state.check(FsOp::MkdirAll, &path)?;
            for ancestor in path.ancestors() {
                match state.nodes.get(ancestor) {
                    Some(Node::File { .. } | Node::Special) => {
                        return Err(io::Error::new(
                            io::ErrorKind::NotADirectory,
                            format!("not a directory: {}", ancestor.display()),
                        ));
                    }
                    Some(_) | None => {}
                }
            }
        }
        self.add_dirs(&path, mode);
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        let link = normalize(link);
        let mut state = self.state.lock();
        state.check(FsOp::Symlink, &link)?;
        state.parent_is_dir(&link)?;
        if state.nodes.contains_key(&link) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", link.display()),
            ));
        }
        state.nodes.insert(
            link,
            Node::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let path = normalize(path);
        let state = self.state.lock();
        state.check(FsOp::ReadLink, &path)?;
        match state.nodes.get(&path) {
            Some(Node::Symlink { target }) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a symbolic link: {}", path.display()),
            )),
            None => Err(not_found(&path)),
        }
    }
}

struct MemoryWriter {
    state: Arc<Mutex<State>>,
    path: PathBuf,
    fail: Option<io::ErrorKind>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.fail {
            return Err(io::Error::new(
                kind,
                format!("injected Write failure on {}", self.path.display()),
            ));
        }
        let mut state = self.state.lock();
        match state.nodes.get_mut(&self.path) {
            Some(Node::File { data, .. }) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(not_found(&self.path)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Resolve `.`/`..` lexically and anchor relative paths at `/`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn join_link(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        normalize(target)
    } else {
        let base = link.parent().unwrap_or_else(|| Path::new("/"));
        normalize(&base.join(target))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn would_block(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::WouldBlock,
        format!("reading special file would block: {}", path.display()),
    )
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("is a directory: {}", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_write_is_visible() {
        let fs = MemoryFs::new().with_dir("/tmp");
        let mut writer = fs.create(Path::new("/tmp/out")).unwrap();
        writer.write_all(b"hello\n").unwrap();
        assert_eq!(fs.read_string("/tmp/out").as_deref(), Some("hello\n"));
    }

    #[test]
    fn create_without_parent_is_not_found() {
        let fs = MemoryFs::new();
        let err = fs.create(Path::new("/missing/out")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn create_truncates_and_keeps_mode() {
        let fs = MemoryFs::new().with_file_mode("/opt/hook.sh", "old contents", 0o700);
        fs.create(Path::new("/opt/hook.sh")).unwrap();
        assert_eq!(fs.contents("/opt/hook.sh"), Some(Vec::new()));
        assert_eq!(fs.mode("/opt/hook.sh"), Some(0o700));
    }

    #[test]
    fn walk_orders_children_before_later_siblings() {
        let fs = MemoryFs::new()
            .with_file("/etc/d/c.conf", "")
            .with_file("/etc/d/b/z.conf", "")
            .with_file("/etc/d/a.conf", "")
            .with_file("/etc/d/b-x.conf", "")
            .with_file("/etc/other.conf", "");

        let mut seen = Vec::new();
        fs.walk(Path::new("/etc/d"), &mut |path, kind| {
            seen.push((path.to_path_buf(), kind));
            Ok(())
        })
        .unwrap();

        let expected = vec![
            (PathBuf::from("/etc/d"), EntryKind::Dir),
            (PathBuf::from("/etc/d/a.conf"), EntryKind::File),
            (PathBuf::from("/etc/d/b"), EntryKind::Dir),
            (PathBuf::from("/etc/d/b/z.conf"), EntryKind::File),
            (PathBuf::from("/etc/d/b-x.conf"), EntryKind::File),
            (PathBuf::from("/etc/d/c.conf"), EntryKind::File),
        ];
        assert_eq!(seen, expected);
    }

    #[test]
    fn walk_stops_at_callback_error() {
        let fs = MemoryFs::new()
            .with_file("/d/a", "")
            .with_file("/d/b", "");
        let mut visited = 0;
        let err = fs
            .walk(Path::new("/d"), &mut |path, _| {
                visited += 1;
                if path.ends_with("a") {
                    Err(io::Error::other("stop"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "stop");
        assert_eq!(visited, 2);
    }

    #[test]
    fn injected_fault_is_returned() {
        let fs = MemoryFs::new()
            .with_file("/etc/crio/crio.conf", "")
            .fail(FsOp::Read, "/etc/crio/crio.conf", io::ErrorKind::PermissionDenied);
        let err = fs.read_all(Path::new("/etc/crio/crio.conf")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn symlink_refuses_existing_entry() {
        let fs = MemoryFs::new().with_file("/run/crio.sock", "");
        let err = fs
            .symlink(Path::new("/host/crio.sock"), Path::new("/run/crio.sock"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn stat_follows_symlinks() {
        let fs = MemoryFs::new()
            .with_dir("/host/etc/crio.conf.d")
            .with_symlink("/host/etc/crio.conf.d", "/etc/crio.conf.d");
        assert!(fs.stat(Path::new("/etc/crio.conf.d")).unwrap().is_dir());

        let dangling = MemoryFs::new().with_symlink("/nowhere", "/link");
        let err = dangling.stat(Path::new("/link")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn walk_reports_links_and_special_files_without_following() {
        let fs = MemoryFs::new()
            .with_file("/d/a.conf", "")
            .with_symlink("/d/a.conf", "/d/b.conf")
            .with_fifo("/d/c.pipe");

        let mut seen = Vec::new();
        fs.walk(Path::new("/d"), &mut |path, kind| {
            seen.push((path.to_path_buf(), kind));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen[1..],
            [
                (PathBuf::from("/d/a.conf"), EntryKind::File),
                (PathBuf::from("/d/b.conf"), EntryKind::Symlink),
                (PathBuf::from("/d/c.pipe"), EntryKind::Other),
            ]
        );
        assert_eq!(fs.stat(Path::new("/d/b.conf")).unwrap().kind, EntryKind::File);
        let err = fs.read_all(Path::new("/d/c.pipe")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
