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
use std::io;

/// Errors raised while loading, saving or installing patches.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed audio payload: {0}")]
    Format(String),

    #[error("Sample needs {requested} bytes but only {available} bytes of sample memory are free")]
    CapacityExceeded { requested: usize, available: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PatchError {
    /// Maps a backend I/O failure on `path` into the patch taxonomy. A missing file is
    /// `NotFound`, everything else means the storage could not serve the request.
    pub fn from_io(path: &str, err: io::Error) -> PatchError {
        match err.kind() {
            io::ErrorKind::NotFound => PatchError::NotFound(path.to_string()),
            _ => PatchError::StorageUnavailable(format!("{}: {}", path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_mapping() {
        let err = PatchError::from_io("/samples/a.wav", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, PatchError::NotFound(path) if path == "/samples/a.wav"));

        let err = PatchError::from_io("/samples/a.wav", io::Error::other("bus not ready"));
        match err {
            PatchError::StorageUnavailable(msg) => assert!(msg.contains("bus not ready")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
