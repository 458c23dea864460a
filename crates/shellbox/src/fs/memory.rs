//! In-memory inode-tree filesystem.
//!
//! [`MemFs`] stores a tree of inodes behind one `RwLock`: files hold byte
//! buffers, directories hold insertion-ordered child tables, symlinks hold a
//! target path string. Hard links are shared inode references; a file's bytes
//! are freed when the last link drops.
//!
//! Every call is all-or-nothing. The lock is never held across an await, so
//! the single-threaded cooperative scheduler observes each operation
//! atomically.

// RwLock read()/write().unwrap() only panics on poisoning (a prior panic
// while holding the lock); corrupted state must not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;

use super::traits::{DirEntry, FileSystem, FileType, Metadata};
use super::{DEFAULT_GID, DEFAULT_UID, DEFAULT_UMASK, SYMLINK_MAX_DEPTH};
use crate::error::{Result, VfsError};

const ROOT_INO: u64 = 1;

const PERM_READ: u32 = 4;
const PERM_WRITE: u32 = 2;
const PERM_EXEC: u32 = 1;

#[derive(Debug, Clone)]
enum InodeKind {
    File(Vec<u8>),
    /// Children in insertion order, for deterministic listings.
    Dir(Vec<(String, u64)>),
    Symlink(String),
}

#[derive(Debug, Clone)]
struct Inode {
    kind: InodeKind,
    mode: u32,
    uid: u32,
    gid: u32,
    nlink: u32,
    mtime: SystemTime,
    atime: SystemTime,
    ctime: SystemTime,
}

impl Inode {
    fn new(kind: InodeKind, mode: u32, uid: u32, gid: u32) -> Self {
        let now = SystemTime::now();
        Self {
            kind,
            mode,
            uid,
            gid,
            nlink: 1,
            mtime: now,
            atime: now,
            ctime: now,
        }
    }

    fn file_type(&self) -> FileType {
        match self.kind {
            InodeKind::File(_) => FileType::File,
            InodeKind::Dir(_) => FileType::Directory,
            InodeKind::Symlink(_) => FileType::Symlink,
        }
    }

    fn size(&self) -> u64 {
        match &self.kind {
            InodeKind::File(content) => content.len() as u64,
            InodeKind::Dir(entries) => entries.len() as u64,
            InodeKind::Symlink(target) => target.len() as u64,
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            file_type: self.file_type(),
            size: self.size(),
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            nlink: self.nlink,
            modified: self.mtime,
            accessed: self.atime,
            created: self.ctime,
        }
    }
}

struct FsState {
    inodes: HashMap<u64, Inode>,
    next_ino: u64,
    bytes_used: u64,
    uid: u32,
    gid: u32,
    umask: u32,
    max_bytes: u64,
}

/// Where a write-style operation will land: an existing inode, or a
/// yet-to-be-created name inside an existing directory.
enum WriteTarget {
    Existing(u64),
    Creatable { parent: u64, name: String },
}

impl FsState {
    fn node(&self, ino: u64) -> &Inode {
        self.inodes.get(&ino).unwrap()
    }

    fn node_mut(&mut self, ino: u64) -> &mut Inode {
        self.inodes.get_mut(&ino).unwrap()
    }

    fn alloc(&mut self, inode: Inode) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inodes.insert(ino, inode);
        ino
    }

    fn check_access(&self, inode: &Inode, want: u32) -> Result<()> {
        if self.uid == 0 {
            return Ok(());
        }
        let shift = if self.uid == inode.uid {
            6
        } else if self.gid == inode.gid {
            3
        } else {
            0
        };
        if (inode.mode >> shift) & want == want {
            Ok(())
        } else {
            Err(VfsError::Permission.into())
        }
    }

    fn dir_lookup(&self, dir_ino: u64, name: &str) -> Option<u64> {
        match &self.node(dir_ino).kind {
            InodeKind::Dir(entries) => entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, ino)| *ino),
            _ => None,
        }
    }

    fn dir_insert(&mut self, dir_ino: u64, name: &str, child: u64) {
        if let InodeKind::Dir(entries) = &mut self.node_mut(dir_ino).kind {
            entries.push((name.to_string(), child));
        }
        self.node_mut(dir_ino).mtime = SystemTime::now();
    }

    fn dir_remove(&mut self, dir_ino: u64, name: &str) -> Option<u64> {
        let removed = match &mut self.node_mut(dir_ino).kind {
            InodeKind::Dir(entries) => {
                let pos = entries.iter().position(|(n, _)| n == name)?;
                Some(entries.remove(pos).1)
            }
            _ => None,
        };
        if removed.is_some() {
            self.node_mut(dir_ino).mtime = SystemTime::now();
        }
        removed
    }

    /// Walk folded components from the root, following symlinks up to the
    /// depth limit. Returns the inode plus the canonical component list.
    fn resolve(&self, comps: &[String], follow_last: bool) -> Result<(u64, Vec<String>)> {
        let mut comps = comps.to_vec();
        let mut depth = 0u32;
        'restart: loop {
            let mut cur = ROOT_INO;
            for (i, name) in comps.iter().enumerate() {
                let node = self.node(cur);
                if !matches!(node.kind, InodeKind::Dir(_)) {
                    return Err(VfsError::NotDir.into());
                }
                self.check_access(node, PERM_EXEC)?;
                let child =
                    self.dir_lookup(cur, name).ok_or(VfsError::NotFound)?;
                if let InodeKind::Symlink(target) = &self.node(child).kind {
                    let is_last = i == comps.len() - 1;
                    if !is_last || follow_last {
                        depth += 1;
                        if depth > SYMLINK_MAX_DEPTH {
                            return Err(VfsError::Loop.into());
                        }
                        let mut joined: Vec<String> = if target.starts_with('/') {
                            Vec::new()
                        } else {
                            comps[..i].to_vec()
                        };
                        joined.extend(split_components(target));
                        joined.extend(comps[i + 1..].iter().cloned());
                        comps = fold_components(joined);
                        continue 'restart;
                    }
                }
                cur = child;
            }
            return Ok((cur, comps));
        }
    }

    fn resolve_path(&self, path: &Path, follow_last: bool) -> Result<u64> {
        let (comps, _) = normalize(path);
        self.resolve(&comps, follow_last).map(|(ino, _)| ino)
    }

    /// Resolve the directory containing the final component. Fails if the
    /// final component is the root.
    fn resolve_parent(&self, path: &Path) -> Result<(u64, String)> {
        let (comps, _) = normalize(path);
        let name = comps.last().cloned().ok_or(VfsError::Invalid)?;
        let (parent, _) = self.resolve(&comps[..comps.len() - 1], true)?;
        if !matches!(self.node(parent).kind, InodeKind::Dir(_)) {
            return Err(VfsError::NotDir.into());
        }
        Ok((parent, name))
    }

    /// Find where a create-or-truncate write lands, following symlinks all
    /// the way through dangling final links (`echo x > link` creates the
    /// link's target, as on a real system).
    fn resolve_for_write(&self, path: &Path) -> Result<WriteTarget> {
        let (mut comps, trailing_slash) = normalize(path);
        if trailing_slash {
            return Err(VfsError::IsDir.into());
        }
        let mut depth = 0u32;
        loop {
            let name = comps.last().cloned().ok_or(VfsError::IsDir)?;
            let (parent, parent_comps) = self.resolve(&comps[..comps.len() - 1], true)?;
            if !matches!(self.node(parent).kind, InodeKind::Dir(_)) {
                return Err(VfsError::NotDir.into());
            }
            match self.dir_lookup(parent, &name) {
                None => {
                    self.check_access(self.node(parent), PERM_WRITE | PERM_EXEC)?;
                    return Ok(WriteTarget::Creatable { parent, name });
                }
                Some(ino) => match &self.node(ino).kind {
                    InodeKind::File(_) => return Ok(WriteTarget::Existing(ino)),
                    InodeKind::Dir(_) => return Err(VfsError::IsDir.into()),
                    InodeKind::Symlink(target) => {
                        depth += 1;
                        if depth > SYMLINK_MAX_DEPTH {
                            return Err(VfsError::Loop.into());
                        }
                        let mut joined: Vec<String> = if target.starts_with('/') {
                            Vec::new()
                        } else {
                            parent_comps.clone()
                        };
                        joined.extend(split_components(target));
                        comps = fold_components(joined);
                    }
                },
            }
        }
    }

    fn charge(&mut self, old_len: usize, new_len: usize) -> Result<()> {
        let next = self.bytes_used - old_len as u64 + new_len as u64;
        if next > self.max_bytes {
            return Err(VfsError::NoSpace.into());
        }
        self.bytes_used = next;
        Ok(())
    }

    /// Drop one link to an inode, freeing content on the last one.
    fn unlink_inode(&mut self, ino: u64) {
        let (nlink, file_len) = {
            let node = self.node_mut(ino);
            node.nlink = node.nlink.saturating_sub(1);
            let len = match &node.kind {
                InodeKind::File(content) => Some(content.len() as u64),
                _ => None,
            };
            (node.nlink, len)
        };
        if nlink == 0 {
            if let Some(len) = file_len {
                self.bytes_used -= len;
            }
            self.inodes.remove(&ino);
        }
    }

    fn remove_subtree(&mut self, ino: u64) {
        if let InodeKind::Dir(entries) = self.node(ino).kind.clone() {
            for (_, child) in entries {
                self.remove_subtree(child);
            }
        }
        self.unlink_inode(ino);
    }
}

fn split_components(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}

/// Fold `.` and `..` lexically; `..` at the root stays at the root.
fn fold_components(comps: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(comps.len());
    for c in comps {
        match c.as_str() {
            "." => {}
            ".." => {
                out.pop();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Split and fold a path. The second value reports a trailing `/`, which
/// forces the final component to be a directory.
fn normalize(path: &Path) -> (Vec<String>, bool) {
    let text = path.to_string_lossy();
    let trailing = text.len() > 1 && text.ends_with('/');
    (fold_components(split_components(&text)), trailing)
}

fn is_dev_null(comps: &[String]) -> bool {
    comps.len() == 2 && comps[0] == "dev" && comps[1] == "null"
}

/// In-memory inode-tree filesystem.
///
/// The default filesystem for a session. Seeds `/`, `/tmp`, `/home`,
/// `/home/user` and `/dev/null`; `/dev/null` discards writes and reads
/// empty.
pub struct MemFs {
    state: RwLock<FsState>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    /// Create a filesystem with the default directory skeleton and quota.
    pub fn new() -> Self {
        Self::with_quota(64 * 1024 * 1024)
    }

    /// Create a filesystem with an explicit byte quota.
    pub fn with_quota(max_bytes: u64) -> Self {
        let mut inodes = HashMap::new();
        // The sandbox root is world-writable: scripts freely create
        // top-level paths like `/f` without privilege juggling.
        inodes.insert(
            ROOT_INO,
            Inode::new(InodeKind::Dir(Vec::new()), 0o777, 0, 0),
        );
        let mut state = FsState {
            inodes,
            next_ino: ROOT_INO + 1,
            bytes_used: 0,
            uid: DEFAULT_UID,
            gid: DEFAULT_GID,
            umask: DEFAULT_UMASK,
            max_bytes,
        };

        for (dir, mode, uid) in [
            ("/tmp", 0o777, 0u32),
            ("/home", 0o755, 0),
            ("/home/user", 0o755, DEFAULT_UID),
            ("/dev", 0o755, 0),
        ] {
            let (comps, _) = normalize(Path::new(dir));
            let (parent, name) = {
                let name = comps.last().unwrap().clone();
                let (parent, _) = state.resolve(&comps[..comps.len() - 1], true).unwrap();
                (parent, name)
            };
            let ino = state.alloc(Inode::new(InodeKind::Dir(Vec::new()), mode, uid, uid));
            state.dir_insert(parent, &name, ino);
        }

        let (dev, _) = state.resolve(&["dev".to_string()], true).unwrap();
        let null = state.alloc(Inode::new(InodeKind::File(Vec::new()), 0o666, 0, 0));
        state.dir_insert(dev, "null", null);

        Self {
            state: RwLock::new(state),
        }
    }

    /// Switch the synthetic identity; uid 0 bypasses permission checks.
    pub fn set_identity(&self, uid: u32, gid: u32) {
        let mut state = self.state.write().unwrap();
        state.uid = uid;
        state.gid = gid;
    }

    /// Total bytes currently held by file contents.
    pub fn bytes_used(&self) -> u64 {
        self.state.read().unwrap().bytes_used
    }

    /// Seed a file (synchronous, for session construction). Parents are
    /// created as needed; quota is enforced.
    pub fn add_file(
        &self,
        path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
        mode: u32,
    ) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.mkdir_sync(parent, true)?;
        }
        let content = content.as_ref();
        let mut state = self.state.write().unwrap();
        let (parent, name) = state.resolve_parent(path)?;
        if state.dir_lookup(parent, &name).is_some() {
            return Err(VfsError::Exists.into());
        }
        state.charge(0, content.len())?;
        let (uid, gid) = (state.uid, state.gid);
        let ino = state.alloc(Inode::new(InodeKind::File(content.to_vec()), mode, uid, gid));
        state.dir_insert(parent, &name, ino);
        Ok(())
    }

    /// Seed a directory (synchronous, for session construction).
    pub fn add_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        self.mkdir_sync(path.as_ref(), true)
    }

    fn mkdir_sync(&self, path: &Path, recursive: bool) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (comps, _) = normalize(path);
        if comps.is_empty() {
            return if recursive {
                Ok(())
            } else {
                Err(VfsError::Exists.into())
            };
        }
        if recursive {
            for end in 1..=comps.len() {
                let prefix = &comps[..end];
                match state.resolve(prefix, true) {
                    Ok((ino, _)) => {
                        if !matches!(state.node(ino).kind, InodeKind::Dir(_)) {
                            return Err(VfsError::NotDir.into());
                        }
                    }
                    Err(_) => {
                        let (parent, _) = state.resolve(&prefix[..end - 1], true)?;
                        state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
                        let mode = 0o777 & !state.umask;
                        let (uid, gid) = (state.uid, state.gid);
                        let ino =
                            state.alloc(Inode::new(InodeKind::Dir(Vec::new()), mode, uid, gid));
                        state.dir_insert(parent, &prefix[end - 1], ino);
                    }
                }
            }
            Ok(())
        } else {
            let (parent, name) = state.resolve_parent(path)?;
            if state.dir_lookup(parent, &name).is_some() {
                return Err(VfsError::Exists.into());
            }
            state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
            let mode = 0o777 & !state.umask;
            let (uid, gid) = (state.uid, state.gid);
            let ino = state.alloc(Inode::new(InodeKind::Dir(Vec::new()), mode, uid, gid));
            state.dir_insert(parent, &name, ino);
            Ok(())
        }
    }

    fn write_impl(&self, path: &Path, content: &[u8], append: bool) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (comps, _) = normalize(path);
        if is_dev_null(&comps) {
            return Ok(());
        }
        match state.resolve_for_write(path)? {
            WriteTarget::Existing(ino) => {
                state.check_access(state.node(ino), PERM_WRITE)?;
                let old_len = match &state.node(ino).kind {
                    InodeKind::File(c) => c.len(),
                    _ => return Err(VfsError::IsDir.into()),
                };
                let new_len = if append {
                    old_len + content.len()
                } else {
                    content.len()
                };
                state.charge(old_len, new_len)?;
                let node = state.node_mut(ino);
                if let InodeKind::File(buf) = &mut node.kind {
                    if append {
                        buf.extend_from_slice(content);
                    } else {
                        buf.clear();
                        buf.extend_from_slice(content);
                    }
                }
                node.mtime = SystemTime::now();
                Ok(())
            }
            WriteTarget::Creatable { parent, name } => {
                state.charge(0, content.len())?;
                let mode = 0o666 & !state.umask;
                let (uid, gid) = (state.uid, state.gid);
                let ino =
                    state.alloc(Inode::new(InodeKind::File(content.to_vec()), mode, uid, gid));
                state.dir_insert(parent, &name, ino);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl FileSystem for MemFs {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let mut state = self.state.write().unwrap();
        let (comps, trailing) = normalize(path);
        if is_dev_null(&comps) {
            return Ok(Vec::new());
        }
        let (ino, _) = state.resolve(&comps, true)?;
        state.check_access(state.node(ino), PERM_READ)?;
        match &state.node(ino).kind {
            InodeKind::File(content) if !trailing => {
                let content = content.clone();
                state.node_mut(ino).atime = SystemTime::now();
                Ok(content)
            }
            InodeKind::File(_) => Err(VfsError::NotDir.into()),
            _ => Err(VfsError::IsDir.into()),
        }
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.write_impl(path, content, false)
    }

    async fn append_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.write_impl(path, content, true)
    }

    async fn truncate(&self, path: &Path, size: u64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let ino = state.resolve_path(path, true)?;
        state.check_access(state.node(ino), PERM_WRITE)?;
        let old_len = match &state.node(ino).kind {
            InodeKind::File(c) => c.len(),
            _ => return Err(VfsError::IsDir.into()),
        };
        state.charge(old_len, size as usize)?;
        let node = state.node_mut(ino);
        if let InodeKind::File(buf) = &mut node.kind {
            buf.resize(size as usize, 0);
        }
        node.mtime = SystemTime::now();
        Ok(())
    }

    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<()> {
        self.mkdir_sync(path, recursive)
    }

    async fn rmdir(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (parent, name) = state.resolve_parent(path)?;
        let ino = state.dir_lookup(parent, &name).ok_or(VfsError::NotFound)?;
        match &state.node(ino).kind {
            InodeKind::Dir(entries) => {
                if !entries.is_empty() {
                    return Err(VfsError::NotEmpty.into());
                }
            }
            _ => return Err(VfsError::NotDir.into()),
        }
        state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
        state.dir_remove(parent, &name);
        state.unlink_inode(ino);
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (parent, name) = state.resolve_parent(path)?;
        let ino = state.dir_lookup(parent, &name).ok_or(VfsError::NotFound)?;
        if matches!(state.node(ino).kind, InodeKind::Dir(_)) {
            return Err(VfsError::IsDir.into());
        }
        state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
        state.dir_remove(parent, &name);
        state.unlink_inode(ino);
        Ok(())
    }

    async fn remove_tree(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (parent, name) = state.resolve_parent(path)?;
        let ino = state.dir_lookup(parent, &name).ok_or(VfsError::NotFound)?;
        state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
        state.dir_remove(parent, &name);
        state.remove_subtree(ino);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (from_parent, from_name) = state.resolve_parent(from)?;
        let ino = state
            .dir_lookup(from_parent, &from_name)
            .ok_or(VfsError::NotFound)?;
        let (to_parent, to_name) = state.resolve_parent(to)?;

        // A directory cannot be moved into its own subtree.
        let (from_comps, _) = normalize(from);
        let (to_comps, _) = normalize(to);
        if to_comps.len() > from_comps.len() && to_comps[..from_comps.len()] == from_comps[..] {
            return Err(VfsError::Invalid.into());
        }

        state.check_access(state.node(from_parent), PERM_WRITE | PERM_EXEC)?;
        state.check_access(state.node(to_parent), PERM_WRITE | PERM_EXEC)?;

        if let Some(existing) = state.dir_lookup(to_parent, &to_name) {
            if existing == ino {
                return Ok(());
            }
            let src_is_dir = matches!(state.node(ino).kind, InodeKind::Dir(_));
            match &state.node(existing).kind {
                InodeKind::Dir(entries) => {
                    if !src_is_dir {
                        return Err(VfsError::IsDir.into());
                    }
                    if !entries.is_empty() {
                        return Err(VfsError::NotEmpty.into());
                    }
                }
                _ => {
                    if src_is_dir {
                        return Err(VfsError::NotDir.into());
                    }
                }
            }
            state.dir_remove(to_parent, &to_name);
            state.unlink_inode(existing);
        }

        state.dir_remove(from_parent, &from_name);
        state.dir_insert(to_parent, &to_name, ino);
        state.node_mut(ino).ctime = SystemTime::now();
        Ok(())
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        let content = self.read_file(from).await?;
        self.write_file(to, &content).await
    }

    async fn hard_link(&self, src: &Path, dst: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let ino = state.resolve_path(src, true)?;
        if matches!(state.node(ino).kind, InodeKind::Dir(_)) {
            return Err(VfsError::IsDir.into());
        }
        let (parent, name) = state.resolve_parent(dst)?;
        if state.dir_lookup(parent, &name).is_some() {
            return Err(VfsError::Exists.into());
        }
        state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
        state.dir_insert(parent, &name, ino);
        let node = state.node_mut(ino);
        node.nlink += 1;
        node.ctime = SystemTime::now();
        Ok(())
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let (parent, name) = state.resolve_parent(link)?;
        if state.dir_lookup(parent, &name).is_some() {
            return Err(VfsError::Exists.into());
        }
        state.check_access(state.node(parent), PERM_WRITE | PERM_EXEC)?;
        let (uid, gid) = (state.uid, state.gid);
        let ino = state.alloc(Inode::new(
            InodeKind::Symlink(target.to_string_lossy().into_owned()),
            0o777,
            uid,
            gid,
        ));
        state.dir_insert(parent, &name, ino);
        Ok(())
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let state = self.state.read().unwrap();
        let ino = state.resolve_path(path, false)?;
        match &state.node(ino).kind {
            InodeKind::Symlink(target) => Ok(PathBuf::from(target)),
            _ => Err(VfsError::Invalid.into()),
        }
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let ino = state.resolve_path(path, true)?;
        let uid = state.uid;
        let node = state.node_mut(ino);
        if uid != 0 && uid != node.uid {
            return Err(VfsError::Permission.into());
        }
        node.mode = mode & 0o7777;
        node.ctime = SystemTime::now();
        Ok(())
    }

    async fn utimes(&self, path: &Path, mtime: SystemTime) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let ino = state.resolve_path(path, true)?;
        let node = state.node_mut(ino);
        node.mtime = mtime;
        node.atime = mtime;
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let state = self.state.read().unwrap();
        let ino = state.resolve_path(path, true)?;
        Ok(state.node(ino).metadata())
    }

    async fn lstat(&self, path: &Path) -> Result<Metadata> {
        let state = self.state.read().unwrap();
        let ino = state.resolve_path(path, false)?;
        Ok(state.node(ino).metadata())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let state = self.state.read().unwrap();
        let ino = state.resolve_path(path, true)?;
        let node = state.node(ino);
        state.check_access(node, PERM_READ)?;
        match &node.kind {
            InodeKind::Dir(entries) => Ok(entries
                .iter()
                .map(|(name, child)| DirEntry {
                    name: name.clone(),
                    metadata: state.node(*child).metadata(),
                })
                .collect()),
            _ => Err(VfsError::NotDir.into()),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let state = self.state.read().unwrap();
        match state.resolve_path(path, true) {
            Ok(_) => Ok(true),
            Err(crate::Error::Vfs(VfsError::NotFound)) => Ok(false),
            Err(crate::Error::Vfs(VfsError::NotDir)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let state = self.state.read().unwrap();
        let (comps, _) = normalize(path);
        let (_, canonical) = state.resolve(&comps, true)?;
        Ok(PathBuf::from(format!("/{}", canonical.join("/"))))
    }

    fn umask(&self) -> u32 {
        self.state.read().unwrap().umask
    }

    fn set_umask(&self, umask: u32) {
        self.state.write().unwrap().umask = umask & 0o777;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_and_read_round_trip() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/test.txt"), b"hello world")
            .await
            .unwrap();
        let content = fs.read_file(Path::new("/tmp/test.txt")).await.unwrap();
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn append_creates_then_extends() {
        let fs = MemFs::new();
        fs.append_file(Path::new("/tmp/log"), b"one\n").await.unwrap();
        fs.append_file(Path::new("/tmp/log"), b"two\n").await.unwrap();
        assert_eq!(
            fs.read_file(Path::new("/tmp/log")).await.unwrap(),
            b"one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn default_tree_exists() {
        let fs = MemFs::new();
        assert!(fs.exists(Path::new("/tmp")).await.unwrap());
        assert!(fs.exists(Path::new("/home/user")).await.unwrap());
        assert!(fs.exists(Path::new("/dev/null")).await.unwrap());
        assert!(!fs.exists(Path::new("/nope")).await.unwrap());
    }

    #[tokio::test]
    async fn dev_null_discards_and_reads_empty() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/dev/null"), b"gone").await.unwrap();
        assert_eq!(fs.read_file(Path::new("/dev/null")).await.unwrap(), b"");
        assert_eq!(fs.stat(Path::new("/dev/null")).await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn mkdir_non_recursive_requires_parent() {
        let fs = MemFs::new();
        let err = fs.mkdir(Path::new("/a/b"), false).await.unwrap_err();
        assert!(matches!(err, crate::Error::Vfs(VfsError::NotFound)));
        fs.mkdir(Path::new("/a/b"), true).await.unwrap();
        assert!(fs.exists(Path::new("/a/b")).await.unwrap());
    }

    #[tokio::test]
    async fn rmdir_refuses_non_empty() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/d"), false).await.unwrap();
        fs.write_file(Path::new("/d/f"), b"x").await.unwrap();
        assert!(matches!(
            fs.rmdir(Path::new("/d")).await.unwrap_err(),
            crate::Error::Vfs(VfsError::NotEmpty)
        ));
        fs.unlink(Path::new("/d/f")).await.unwrap();
        fs.rmdir(Path::new("/d")).await.unwrap();
    }

    #[tokio::test]
    async fn unlink_refuses_directories() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/d"), false).await.unwrap();
        assert!(matches!(
            fs.unlink(Path::new("/d")).await.unwrap_err(),
            crate::Error::Vfs(VfsError::IsDir)
        ));
    }

    #[tokio::test]
    async fn rename_is_atomic_replace() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/a"), b"A").await.unwrap();
        fs.write_file(Path::new("/tmp/b"), b"B").await.unwrap();
        fs.rename(Path::new("/tmp/a"), Path::new("/tmp/b"))
            .await
            .unwrap();
        assert!(!fs.exists(Path::new("/tmp/a")).await.unwrap());
        assert_eq!(fs.read_file(Path::new("/tmp/b")).await.unwrap(), b"A");
    }

    #[tokio::test]
    async fn rename_into_own_subtree_refused() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/d/sub"), true).await.unwrap();
        assert!(matches!(
            fs.rename(Path::new("/d"), Path::new("/d/sub/x"))
                .await
                .unwrap_err(),
            crate::Error::Vfs(VfsError::Invalid)
        ));
    }

    #[tokio::test]
    async fn symlink_resolution_and_loops() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/real"), b"data").await.unwrap();
        fs.symlink(Path::new("/tmp/real"), Path::new("/tmp/link"))
            .await
            .unwrap();
        assert_eq!(fs.read_file(Path::new("/tmp/link")).await.unwrap(), b"data");
        assert_eq!(
            fs.read_link(Path::new("/tmp/link")).await.unwrap(),
            PathBuf::from("/tmp/real")
        );

        fs.symlink(Path::new("/tmp/b"), Path::new("/tmp/a"))
            .await
            .unwrap();
        fs.symlink(Path::new("/tmp/a"), Path::new("/tmp/b"))
            .await
            .unwrap();
        assert!(matches!(
            fs.read_file(Path::new("/tmp/a")).await.unwrap_err(),
            crate::Error::Vfs(VfsError::Loop)
        ));
    }

    #[tokio::test]
    async fn relative_symlink_resolves_against_link_dir() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/opt/app"), true).await.unwrap();
        fs.write_file(Path::new("/opt/app/conf"), b"k=v").await.unwrap();
        fs.symlink(Path::new("app/conf"), Path::new("/opt/link"))
            .await
            .unwrap();
        assert_eq!(fs.read_file(Path::new("/opt/link")).await.unwrap(), b"k=v");
    }

    #[tokio::test]
    async fn write_through_dangling_symlink_creates_target() {
        let fs = MemFs::new();
        fs.symlink(Path::new("/tmp/target"), Path::new("/tmp/link"))
            .await
            .unwrap();
        fs.write_file(Path::new("/tmp/link"), b"via link").await.unwrap();
        assert_eq!(
            fs.read_file(Path::new("/tmp/target")).await.unwrap(),
            b"via link"
        );
    }

    #[tokio::test]
    async fn hard_links_share_content_until_last_drop() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/orig"), b"shared").await.unwrap();
        fs.hard_link(Path::new("/tmp/orig"), Path::new("/tmp/alias"))
            .await
            .unwrap();
        assert_eq!(fs.stat(Path::new("/tmp/orig")).await.unwrap().nlink, 2);

        fs.unlink(Path::new("/tmp/orig")).await.unwrap();
        assert_eq!(fs.read_file(Path::new("/tmp/alias")).await.unwrap(), b"shared");
        let used = fs.bytes_used();
        fs.unlink(Path::new("/tmp/alias")).await.unwrap();
        assert_eq!(fs.bytes_used(), used - 6);
    }

    #[tokio::test]
    async fn quota_enforced_on_write() {
        let fs = MemFs::with_quota(10);
        fs.write_file(Path::new("/tmp/f"), b"0123456789").await.unwrap();
        assert!(matches!(
            fs.write_file(Path::new("/tmp/g"), b"x").await.unwrap_err(),
            crate::Error::Vfs(VfsError::NoSpace)
        ));
        // Shrinking the existing file frees room.
        fs.write_file(Path::new("/tmp/f"), b"01234").await.unwrap();
        fs.write_file(Path::new("/tmp/g"), b"x").await.unwrap();
    }

    #[tokio::test]
    async fn permissions_enforced_for_non_owner() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/secret"), b"s").await.unwrap();
        fs.chmod(Path::new("/tmp/secret"), 0o600).await.unwrap();

        fs.set_identity(2000, 2000);
        assert!(matches!(
            fs.read_file(Path::new("/tmp/secret")).await.unwrap_err(),
            crate::Error::Vfs(VfsError::Permission)
        ));

        // root bypasses
        fs.set_identity(0, 0);
        assert_eq!(fs.read_file(Path::new("/tmp/secret")).await.unwrap(), b"s");
    }

    #[tokio::test]
    async fn listing_preserves_insertion_order() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/d"), false).await.unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs.write_file(&Path::new("/d").join(name), b"").await.unwrap();
        }
        let names: Vec<String> = fs
            .read_dir(Path::new("/d"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn resolve_folds_dots_and_follows_links() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/a/b"), true).await.unwrap();
        fs.symlink(Path::new("/a/b"), Path::new("/l")).await.unwrap();
        assert_eq!(
            fs.resolve(Path::new("/l/../b/./")).await.unwrap(),
            PathBuf::from("/a/b")
        );
    }

    #[tokio::test]
    async fn trailing_slash_forces_directory() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/f"), b"x").await.unwrap();
        assert!(fs.read_file(Path::new("/tmp/f/")).await.is_err());
    }

    #[tokio::test]
    async fn truncate_extends_with_zeros() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/tmp/f"), b"ab").await.unwrap();
        fs.truncate(Path::new("/tmp/f"), 4).await.unwrap();
        assert_eq!(fs.read_file(Path::new("/tmp/f")).await.unwrap(), b"ab\0\0");
        fs.truncate(Path::new("/tmp/f"), 1).await.unwrap();
        assert_eq!(fs.read_file(Path::new("/tmp/f")).await.unwrap(), b"a");
    }
}
