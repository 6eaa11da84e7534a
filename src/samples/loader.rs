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

//! Loading patches into voices.
//!
//! Loads do storage I/O and decoding, so they never run on the audio context. They
//! either run on the caller's thread or on the loader worker started by
//! [`PatchLoader::spawn`]. Loads are serialized so that two of them can't both claim
//! the same free sample memory.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::pool::VoicePool;
use crate::patch::{PatchError, PatchStore, SavedPatch};

/// Work for the loader worker. Replies are optional; without one the outcome is only
/// logged.
pub enum LoadRequest {
    /// Load a patch file into a voice.
    Load {
        voice: usize,
        filename: String,
        reply: Option<Sender<Result<(), PatchError>>>,
    },
    /// Save a voice as a new patch.
    Save {
        voice: usize,
        reply: Option<Sender<Result<SavedPatch, PatchError>>>,
    },
}

/// Moves patches between the store and the voice pool.
pub struct PatchLoader {
    pool: Arc<VoicePool>,
    store: Arc<PatchStore>,
    load_lock: Mutex<()>,
}

impl PatchLoader {
    pub fn new(pool: Arc<VoicePool>, store: Arc<PatchStore>) -> PatchLoader {
        PatchLoader {
            pool,
            store,
            load_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<PatchStore> {
        &self.store
    }

    /// Loads `filename` into a voice. The payload is rejected before its samples are
    /// read if it doesn't fit the free sample memory. On any error the voice keeps its
    /// previous sample and state.
    pub fn load_voice(&self, index: usize, filename: &str) -> Result<(), PatchError> {
        self.check_index(index)?;
        let span = span!(Level::INFO, "load voice", voice = index);
        let _enter = span.enter();

        let _guard = self.load_lock.lock();
        let available = self.pool.available_bytes();
        let patch = self.store.load(filename, available)?;
        self.pool
            .install(index, patch.audio, patch.params, &patch.filename)
    }

    /// Saves a voice's sample and parameters under a new patch name.
    pub fn save_voice(&self, index: usize) -> Result<SavedPatch, PatchError> {
        self.check_index(index)?;
        let contents = self
            .pool
            .contents(index)
            .ok_or_else(|| PatchError::InvalidArgument(format!("voice {} is empty", index)))?;

        let saved = self.store.save(
            &contents.samples,
            contents.channels,
            contents.sample_rate,
            &contents.params,
        )?;
        info!(voice = index, path = saved.audio, "Voice saved");
        Ok(saved)
    }

    /// Starts the loader worker. The worker runs until every sender is dropped.
    pub fn spawn(self: Arc<Self>) -> (Sender<LoadRequest>, JoinHandle<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || self.run(rx));
        (tx, handle)
    }

    fn run(&self, rx: Receiver<LoadRequest>) {
        debug!("Patch loader started");
        for request in rx {
            match request {
                LoadRequest::Load {
                    voice,
                    filename,
                    reply,
                } => {
                    let result = self.load_voice(voice, &filename);
                    if let Err(e) = &result {
                        warn!(voice, path = filename, err = %e, "Unable to load patch");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                LoadRequest::Save { voice, reply } => {
                    let result = self.save_voice(voice);
                    if let Err(e) = &result {
                        warn!(voice, err = %e, "Unable to save patch");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
            }
        }
        debug!("Patch loader stopped");
    }

    fn check_index(&self, index: usize) -> Result<(), PatchError> {
        if index >= self.pool.len() {
            return Err(PatchError::InvalidArgument(format!(
                "voice {} is out of range (0..{})",
                index,
                self.pool.len()
            )));
        }
        Ok(())
    }
}
