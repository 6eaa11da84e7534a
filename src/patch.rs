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

//! Patches on storage.
//!
//! This module provides:
//! - The WAV payload codec
//! - The versioned parameter sidecar record
//! - Storage devices (host directories and in-memory mocks)
//! - The patch store, which lists, loads and saves patches on the selected device

mod error;
pub mod params;
pub mod storage;
mod store;
pub mod wav;

pub use error::PatchError;
pub use params::PatchParams;
pub use storage::{StorageBackend, StorageKind};
pub use store::{
    LoadedPatch, PatchListing, PatchStore, SavedPatch, AUDIO_EXTENSION, DEFAULT_PATCH_DIRECTORY,
    PARAMS_EXTENSION,
};
pub use wav::DecodedAudio;
