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
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crate::patch::{
    storage::MemoryBackend,
    wav::{self, DEFAULT_SAMPLE_RATE},
    PatchStore, StorageKind, DEFAULT_PATCH_DIRECTORY,
};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Encodes interleaved samples as a WAV payload at the default sample rate.
pub fn wav_bytes(samples: &[i16], channels: u16) -> Vec<u8> {
    let mut bytes = Vec::new();
    wav::encode(&mut bytes, samples, channels, DEFAULT_SAMPLE_RATE).unwrap();
    bytes
}

/// A patch store backed by an in-memory card with the default patch directory.
pub fn memory_store() -> (PatchStore, Arc<MemoryBackend>) {
    let card = Arc::new(MemoryBackend::new("mock-card"));
    card.insert_file(&format!("{}/.keep", DEFAULT_PATCH_DIRECTORY), Vec::new());
    let store = PatchStore::new(DEFAULT_PATCH_DIRECTORY, StorageKind::SdCard)
        .with_backend(StorageKind::SdCard, card.clone());
    (store, card)
}
