// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    io::{self, Cursor, Seek, SeekFrom, Write},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use super::{not_mounted, DirEntry, ReadSeek, StorageBackend, WriteSeek};

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// An in-memory storage device. Used for mock configurations and tests; the medium
/// can be "removed" to exercise unavailable storage.
pub struct MemoryBackend {
    name: String,
    tree: Arc<Mutex<Tree>>,
    available: AtomicBool,
    fail_unmount: AtomicBool,
    mounted: AtomicBool,
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(name: &str) -> MemoryBackend {
        let mut tree = Tree::default();
        tree.dirs.insert("/".to_string());
        MemoryBackend {
            name: name.to_string(),
            tree: Arc::new(Mutex::new(tree)),
            available: AtomicBool::new(true),
            fail_unmount: AtomicBool::new(false),
            mounted: AtomicBool::new(false),
            mounts: AtomicUsize::new(0),
            unmounts: AtomicUsize::new(0),
        }
    }

    /// Inserts or replaces a file directly, creating its parent directories.
    pub fn insert_file(&self, path: &str, contents: Vec<u8>) {
        let path = normalize(path);
        let mut tree = self.tree.lock();
        let mut parent = parent_of(&path);
        while parent != "/" {
            tree.dirs.insert(parent.clone());
            parent = parent_of(&parent);
        }
        tree.files.insert(path, contents);
    }

    /// Returns a copy of a file's contents.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().files.get(&normalize(path)).cloned()
    }

    /// Simulates inserting or removing the medium.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Makes every following unmount fail.
    pub fn set_fail_unmount(&self, fail: bool) {
        self.fail_unmount.store(fail, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.load(Ordering::Acquire)
    }

    pub fn unmount_count(&self) -> usize {
        self.unmounts.load(Ordering::Acquire)
    }

    fn check_mounted(&self) -> io::Result<()> {
        if self.mounted.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(not_mounted(&self.name))
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn mount(&self) -> io::Result<()> {
        if !self.available.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("no medium in {}", self.name),
            ));
        }
        self.mounts.fetch_add(1, Ordering::AcqRel);
        self.mounted.store(true, Ordering::Release);
        Ok(())
    }

    fn unmount(&self) -> io::Result<()> {
        self.unmounts.fetch_add(1, Ordering::AcqRel);
        self.mounted.store(false, Ordering::Release);
        if self.fail_unmount.load(Ordering::Acquire) {
            return Err(io::Error::other(format!("unable to unmount {}", self.name)));
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        self.check_mounted()?;
        let path = normalize(path);
        let tree = self.tree.lock();
        Ok(tree.files.contains_key(&path) || tree.dirs.contains(&path))
    }

    fn create_dir(&self, path: &str) -> io::Result<()> {
        self.check_mounted()?;
        let mut path = normalize(path);
        let mut tree = self.tree.lock();
        if tree.files.contains_key(&path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path),
            ));
        }
        while path != "/" {
            let parent = parent_of(&path);
            tree.dirs.insert(path);
            path = parent;
        }
        Ok(())
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        self.check_mounted()?;
        let path = normalize(path);
        let tree = self.tree.lock();
        if !tree.dirs.contains(&path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no directory {}", path),
            ));
        }

        let mut entries: Vec<DirEntry> = tree
            .dirs
            .iter()
            .filter(|dir| *dir != "/" && parent_of(dir) == path)
            .map(|dir| DirEntry {
                name: super::file_name(dir).to_string(),
                is_dir: true,
            })
            .chain(
                tree.files
                    .keys()
                    .filter(|file| parent_of(file) == path)
                    .map(|file| DirEntry {
                        name: super::file_name(file).to_string(),
                        is_dir: false,
                    }),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn ReadSeek>> {
        self.check_mounted()?;
        let path = normalize(path);
        match self.tree.lock().files.get(&path) {
            Some(contents) => Ok(Box::new(Cursor::new(contents.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no file {}", path),
            )),
        }
    }

    fn open_write(&self, path: &str) -> io::Result<Box<dyn WriteSeek>> {
        self.check_mounted()?;
        let path = normalize(path);
        {
            let mut tree = self.tree.lock();
            if !tree.dirs.contains(&parent_of(&path)) {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no directory for {}", path),
                ));
            }
            tree.files.insert(path.clone(), Vec::new());
        }
        Ok(Box::new(MemoryFile {
            tree: self.tree.clone(),
            path,
            contents: Cursor::new(Vec::new()),
        }))
    }
}

impl fmt::Display for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (memory)", self.name)
    }
}

/// A file open for writing. Contents are published on flush and on close.
struct MemoryFile {
    tree: Arc<Mutex<Tree>>,
    path: String,
    contents: Cursor<Vec<u8>>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.contents.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tree
            .lock()
            .files
            .insert(self.path.clone(), self.contents.get_ref().clone());
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.contents.seek(pos)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        let contents = std::mem::take(self.contents.get_mut());
        self.tree.lock().files.insert(self.path.clone(), contents);
    }
}

fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}
