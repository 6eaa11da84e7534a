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
use serde::Deserialize;

use crate::patch::{StorageKind, DEFAULT_PATCH_DIRECTORY};

/// The storage configuration. Each device is configured with a root: a host
/// directory, or a name starting with `mock` for an in-memory device.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Storage {
    /// The device patches are read from and written to (default: sd_card).
    selected: Option<StorageKind>,

    /// The patch directory on the device (default: /samples).
    directory: Option<String>,

    /// Root of the internal flash device.
    internal: Option<String>,

    /// Root of the removable card.
    sd_card: Option<String>,
}

impl Storage {
    pub fn new(selected: StorageKind, internal: Option<&str>, sd_card: Option<&str>) -> Storage {
        Storage {
            selected: Some(selected),
            directory: None,
            internal: internal.map(str::to_string),
            sd_card: sd_card.map(str::to_string),
        }
    }

    /// Returns the selected device.
    pub fn selected(&self) -> StorageKind {
        self.selected.unwrap_or(StorageKind::SdCard)
    }

    /// Returns the patch directory.
    pub fn directory(&self) -> &str {
        self.directory.as_deref().unwrap_or(DEFAULT_PATCH_DIRECTORY)
    }

    /// Returns the configured devices and their roots.
    pub fn backends(&self) -> Vec<(StorageKind, &str)> {
        [
            (StorageKind::Internal, self.internal.as_deref()),
            (StorageKind::SdCard, self.sd_card.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, root)| root.map(|root| (kind, root)))
        .collect()
    }
}
