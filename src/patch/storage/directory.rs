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
    fmt, fs,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use tracing::debug;

use super::{not_mounted, DirEntry, ReadSeek, StorageBackend, WriteSeek};

/// A storage device backed by a directory on the host. A missing root behaves like an
/// absent card: mounting fails.
pub struct DirectoryBackend {
    root: PathBuf,
    mounted: AtomicBool,
}

impl DirectoryBackend {
    pub fn new(root: &Path) -> DirectoryBackend {
        DirectoryBackend {
            root: root.to_path_buf(),
            mounted: AtomicBool::new(false),
        }
    }

    /// Resolves a device path under the root. Parent components are rejected so a
    /// device path can't escape the root.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        if !self.mounted.load(Ordering::Acquire) {
            return Err(not_mounted(&self.root.display().to_string()));
        }

        let mut resolved = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            if component == ".." {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid device path {}", path),
                ));
            }
            resolved.push(component);
        }
        Ok(resolved)
    }
}

impl StorageBackend for DirectoryBackend {
    fn mount(&self) -> io::Result<()> {
        let metadata = fs::metadata(&self.root)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", self.root.display()),
            ));
        }
        self.mounted.store(true, Ordering::Release);
        debug!(root = ?self.root, "Mounted directory storage");
        Ok(())
    }

    fn unmount(&self) -> io::Result<()> {
        self.mounted.store(false, Ordering::Release);
        Ok(())
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        self.resolve(path)?.try_exists()
    }

    fn create_dir(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path)?)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path)?)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }

        // Host directories have no stable order; sort so index selection is repeatable.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn ReadSeek>> {
        let file = fs::File::open(self.resolve(path)?)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> io::Result<Box<dyn WriteSeek>> {
        let file = fs::File::create(self.resolve(path)?)?;
        Ok(Box::new(file))
    }
}

impl fmt::Display for DirectoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (directory)", self.root.display())
    }
}
