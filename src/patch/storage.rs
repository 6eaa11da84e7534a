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
    fmt,
    io::{self, Read, Seek, Write},
    path::Path,
    sync::Arc,
};

use serde::Deserialize;

mod directory;
mod memory;

pub use directory::DirectoryBackend;
pub use memory::MemoryBackend;

/// The storage devices patches can live on.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// On-board flash.
    Internal,
    /// Removable card.
    SdCard,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Internal => write!(f, "internal"),
            StorageKind::SdCard => write!(f, "sd-card"),
        }
    }
}

/// A single directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// A readable, rewindable file handle.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// A writable, rewindable file handle. Dropping the handle closes the file.
pub trait WriteSeek: Write + Seek + Send {}
impl<T: Write + Seek + Send> WriteSeek for T {}

/// A block storage device holding a filesystem. Paths are absolute device paths such
/// as `/samples/kick.wav`.
///
/// The device must be mounted before use and is unmounted again once an operation
/// completes, so that removable media is only held while it's being accessed.
pub trait StorageBackend: fmt::Display + Send + Sync {
    /// Brings the device up. Fails when the medium is absent or unreadable.
    fn mount(&self) -> io::Result<()>;

    /// Releases the device.
    fn unmount(&self) -> io::Result<()>;

    /// Returns true if a file or directory exists at the path.
    fn exists(&self, path: &str) -> io::Result<bool>;

    /// Creates a directory. Succeeds if it already exists.
    fn create_dir(&self, path: &str) -> io::Result<()>;

    /// Lists the entries of a directory.
    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Opens an existing file for reading.
    fn open_read(&self, path: &str) -> io::Result<Box<dyn ReadSeek>>;

    /// Creates or truncates a file for writing.
    fn open_write(&self, path: &str) -> io::Result<Box<dyn WriteSeek>>;
}

/// Creates a backend from a configured root. Roots beginning with `mock` produce an
/// in-memory device, anything else is a host directory.
pub fn get_backend(root: &str) -> Arc<dyn StorageBackend> {
    if root.starts_with("mock") {
        return Arc::new(MemoryBackend::new(root));
    }
    Arc::new(DirectoryBackend::new(Path::new(root)))
}

/// Joins a directory and a file name using device path rules.
pub fn join(directory: &str, name: &str) -> String {
    format!("{}/{}", directory.trim_end_matches('/'), name)
}

/// Returns the last component of a device path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Replaces the extension of the final path component, or appends one.
pub fn with_extension(path: &str, extension: &str) -> String {
    let name = file_name(path);
    let stem_len = match name.rfind('.') {
        Some(dot) if dot > 0 => path.len() - name.len() + dot,
        _ => path.len(),
    };
    format!("{}.{}", &path[..stem_len], extension)
}

fn not_mounted(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("{} is not mounted", name),
    )
}
