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

//! Reading and writing patches on the selected storage device.
//!
//! A patch is a pair of files sharing a base name: the audio payload (`.wav`) and the
//! parameter sidecar (`.bin`). Every operation mounts the selected device, does its
//! work and unmounts again, so removable media can be swapped between operations.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::PatchError;
use super::params::{PatchParams, RECORD_LEN};
use super::storage::{self, DirEntry, StorageBackend, StorageKind};
use super::wav::{self, DecodedAudio, WavHeader};

/// Extension of audio payload files.
pub const AUDIO_EXTENSION: &str = "wav";

/// Extension of parameter sidecar files.
pub const PARAMS_EXTENSION: &str = "bin";

/// Default directory holding patches.
pub const DEFAULT_PATCH_DIRECTORY: &str = "/samples";

/// Base name of generated patch files.
const NEW_PATCH_PREFIX: &str = "newSample";

/// Upper bound on generated patch numbers.
const MAX_NEW_PATCHES: u32 = 10_000;

/// A patch read from storage.
#[derive(Clone, Debug)]
pub struct LoadedPatch {
    pub filename: String,
    pub audio: DecodedAudio,
    pub params: PatchParams,
}

/// The files written by a save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedPatch {
    pub audio: String,
    pub params: String,
}

/// The patch files of a directory listing. The listing is cheap to clone, so a caller
/// can walk it again from the start.
#[derive(Clone, Debug)]
pub struct PatchListing {
    directory: String,
    entries: std::vec::IntoIter<DirEntry>,
    skip: usize,
}

impl Iterator for PatchListing {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for entry in self.entries.by_ref() {
            if entry.is_dir || !is_audio_file(&entry.name) {
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            return Some(storage::join(&self.directory, &entry.name));
        }
        None
    }
}

/// Loads and saves patches on one of the configured storage devices.
pub struct PatchStore {
    backends: BTreeMap<StorageKind, Arc<dyn StorageBackend>>,
    selected: RwLock<StorageKind>,
    directory: String,
    cursor: Mutex<usize>,
    /// Held from mount to unmount so one operation can't unmount the device under
    /// another.
    device_lock: Mutex<()>,
}

impl PatchStore {
    /// Creates a store with no devices attached.
    pub fn new(directory: &str, selected: StorageKind) -> PatchStore {
        PatchStore {
            backends: BTreeMap::new(),
            selected: RwLock::new(selected),
            directory: directory.to_string(),
            cursor: Mutex::new(0),
            device_lock: Mutex::new(()),
        }
    }

    /// Attaches a storage device.
    pub fn with_backend(mut self, kind: StorageKind, backend: Arc<dyn StorageBackend>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    /// The directory patches are listed from and saved to.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Switches the device used by subsequent operations.
    pub fn select_backend(&self, kind: StorageKind) -> Result<(), PatchError> {
        if !self.backends.contains_key(&kind) {
            return Err(PatchError::InvalidArgument(format!(
                "no {} storage configured",
                kind
            )));
        }
        *self.selected.write() = kind;
        info!(storage = %kind, "Patch storage selected");
        Ok(())
    }

    pub fn selected_backend(&self) -> StorageKind {
        *self.selected.read()
    }

    /// Lists the audio payloads in `directory`, skipping the first `offset` of them.
    /// The directory is read in full while the device is mounted; the listing then
    /// filters those entries as it is iterated.
    pub fn list_patches(&self, directory: &str, offset: usize) -> Result<PatchListing, PatchError> {
        let entries = self.access(|backend| {
            backend
                .read_dir(directory)
                .map_err(|e| PatchError::from_io(directory, e))
        })?;

        Ok(PatchListing {
            directory: directory.to_string(),
            entries: entries.into_iter(),
            skip: offset,
        })
    }

    /// Returns the `index`th patch of `directory` in listing order. An index past the
    /// end selects the last patch.
    pub fn select_by_index(&self, directory: &str, index: usize) -> Result<String, PatchError> {
        self.resolve_index(directory, index)
            .map(|(_, filename)| filename)
    }

    fn resolve_index(&self, directory: &str, index: usize) -> Result<(usize, String), PatchError> {
        let mut last = None;
        for (i, filename) in self.list_patches(directory, 0)?.enumerate() {
            if i == index {
                return Ok((i, filename));
            }
            last = Some((i, filename));
        }

        match last {
            Some((i, filename)) => {
                debug!(
                    requested = index,
                    selected = i,
                    "Patch index past the end, selecting the last patch"
                );
                Ok((i, filename))
            }
            None => Err(PatchError::NotFound(format!(
                "no patches in {}",
                directory
            ))),
        }
    }

    /// The patch under the browsing cursor.
    pub fn selected(&self) -> Result<String, PatchError> {
        self.move_cursor(|index| index)
    }

    /// Advances the browsing cursor, stopping at the last patch.
    pub fn select_next(&self) -> Result<String, PatchError> {
        self.move_cursor(|index| index.saturating_add(1))
    }

    /// Moves the browsing cursor back, stopping at the first patch.
    pub fn select_previous(&self) -> Result<String, PatchError> {
        self.move_cursor(|index| index.saturating_sub(1))
    }

    pub fn selected_index(&self) -> usize {
        *self.cursor.lock()
    }

    fn move_cursor(&self, step: impl FnOnce(usize) -> usize) -> Result<String, PatchError> {
        let mut cursor = self.cursor.lock();
        let (index, filename) = self.resolve_index(&self.directory, step(*cursor))?;
        *cursor = index;
        info!(index, filename, storage = %self.selected_backend(), "Active patch");
        Ok(filename)
    }

    /// Loads a patch. The payload must exist; a missing sidecar yields the default
    /// parameters. Payloads larger than `max_payload` bytes are rejected before their
    /// samples are read.
    pub fn load(&self, filename: &str, max_payload: usize) -> Result<LoadedPatch, PatchError> {
        let params_path = storage::with_extension(filename, PARAMS_EXTENSION);

        let loaded = self.access(|backend| {
            if !backend
                .exists(filename)
                .map_err(|e| PatchError::from_io(filename, e))?
            {
                return Err(PatchError::NotFound(filename.to_string()));
            }

            let audio = {
                let mut reader = backend
                    .open_read(filename)
                    .map_err(|e| PatchError::from_io(filename, e))?;
                reader
                    .seek(SeekFrom::Start(0))
                    .map_err(|e| PatchError::from_io(filename, e))?;
                wav::read_from(&mut reader, max_payload).map_err(|e| with_path(e, filename))?
            };

            let mut params = if backend
                .exists(&params_path)
                .map_err(|e| PatchError::from_io(&params_path, e))?
            {
                let mut bytes = Vec::with_capacity(RECORD_LEN);
                backend
                    .open_read(&params_path)
                    .and_then(|reader| reader.take(RECORD_LEN as u64).read_to_end(&mut bytes))
                    .map_err(|e| PatchError::from_io(&params_path, e))?;
                PatchParams::decode(&bytes)
            } else {
                debug!(path = params_path, "No patch parameters, using defaults");
                PatchParams::default()
            };
            params.set_source_filename(filename);

            Ok(LoadedPatch {
                filename: filename.to_string(),
                audio,
                params,
            })
        })?;

        info!(
            path = filename,
            channels = loaded.audio.channels(),
            frames = loaded.audio.frame_count(),
            version = loaded.params.version,
            storage = %self.selected_backend(),
            "Patch loaded"
        );
        Ok(loaded)
    }

    /// Saves a patch under the lowest unused generated name and returns the names used.
    /// The payload is written before the parameters.
    pub fn save(
        &self,
        samples: &[i16],
        channels: u16,
        sample_rate: u32,
        params: &PatchParams,
    ) -> Result<SavedPatch, PatchError> {
        // Reject bad shapes before anything is created on the device.
        WavHeader::new(channels, sample_rate, 0)?;

        let saved = self.access(|backend| {
            backend
                .create_dir(&self.directory)
                .map_err(|e| PatchError::from_io(&self.directory, e))?;

            let saved = self.new_filenames(backend)?;
            let mut params = params.clone();
            params.set_source_filename(&saved.audio);

            {
                let mut writer = backend
                    .open_write(&saved.audio)
                    .map_err(|e| PatchError::from_io(&saved.audio, e))?;
                writer
                    .seek(SeekFrom::Start(0))
                    .map_err(|e| PatchError::from_io(&saved.audio, e))?;
                wav::write_to(&mut writer, samples, channels, sample_rate)?;
                writer
                    .flush()
                    .map_err(|e| PatchError::from_io(&saved.audio, e))?;
            }

            {
                let mut writer = backend
                    .open_write(&saved.params)
                    .map_err(|e| PatchError::from_io(&saved.params, e))?;
                writer
                    .write_all(&params.encode())
                    .and_then(|_| writer.flush())
                    .map_err(|e| PatchError::from_io(&saved.params, e))?;
            }

            Ok(saved)
        })?;

        info!(
            path = saved.audio,
            samples = samples.len(),
            storage = %self.selected_backend(),
            "Patch saved"
        );
        Ok(saved)
    }

    /// Finds the lowest numbered name pair where neither file exists. Every candidate
    /// is checked against the device, as other writers may have created files since
    /// the last save.
    fn new_filenames(&self, backend: &dyn StorageBackend) -> Result<SavedPatch, PatchError> {
        for i in 0..MAX_NEW_PATCHES {
            let base = storage::join(&self.directory, &format!("{}{:03}", NEW_PATCH_PREFIX, i));
            let candidate = SavedPatch {
                audio: format!("{}.{}", base, AUDIO_EXTENSION),
                params: format!("{}.{}", base, PARAMS_EXTENSION),
            };

            let taken = backend
                .exists(&candidate.audio)
                .and_then(|audio| Ok(audio || backend.exists(&candidate.params)?))
                .map_err(|e| PatchError::from_io(&base, e))?;
            if !taken {
                return Ok(candidate);
            }
        }

        Err(PatchError::StorageUnavailable(format!(
            "no unused patch name left in {}",
            self.directory
        )))
    }

    /// Runs `f` against the selected device between a mount and an unmount. The
    /// unmount is attempted whatever the outcome; its failure is only logged.
    /// Operations are serialized for the whole mount.
    fn access<T>(
        &self,
        f: impl FnOnce(&dyn StorageBackend) -> Result<T, PatchError>,
    ) -> Result<T, PatchError> {
        let kind = self.selected_backend();
        let backend = match self.backends.get(&kind) {
            Some(backend) => backend.clone(),
            None => {
                return Err(PatchError::StorageUnavailable(format!(
                    "no {} storage configured",
                    kind
                )))
            }
        };

        let _device = self.device_lock.lock();
        if let Err(e) = backend.mount() {
            warn!(storage = %backend, err = %e, "Storage mount failed");
            return Err(PatchError::StorageUnavailable(format!(
                "unable to mount {}: {}",
                backend, e
            )));
        }

        let result = f(backend.as_ref());

        if let Err(e) = backend.unmount() {
            warn!(storage = %backend, err = %e, "Storage unmount failed");
        }

        result
    }
}

impl std::fmt::Debug for PatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchStore")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("selected", &self.selected_backend())
            .field("directory", &self.directory)
            .finish()
    }
}

fn is_audio_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, extension)) => {
            !stem.is_empty() && extension.eq_ignore_ascii_case(AUDIO_EXTENSION)
        }
        None => false,
    }
}

fn with_path(err: PatchError, path: &str) -> PatchError {
    match err {
        PatchError::Format(msg) => PatchError::Format(format!("{}: {}", path, msg)),
        PatchError::StorageUnavailable(msg) => {
            PatchError::StorageUnavailable(format!("{}: {}", path, msg))
        }
        other => other,
    }
}
