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

const DEFAULT_COUNT: usize = 8;
const DEFAULT_MEMORY_BUDGET: usize = 8 * 1024 * 1024;
const DEFAULT_NOTE_BEGIN: u8 = 48;

/// The voice configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Voices {
    /// Number of voices (default: 8).
    count: Option<usize>,

    /// Bytes of sample memory shared by all voices (default: 8 MiB).
    memory_budget: Option<usize>,

    /// The note voice 0 listens to. Voice i listens to `note_begin + i` (default: 48).
    note_begin: Option<u8>,

    /// Patch files loaded at startup, by voice. Voices without an entry load
    /// `<directory>/<voice>.wav`.
    patches: Option<Vec<String>>,
}

impl Voices {
    pub fn new(count: usize, memory_budget: usize) -> Voices {
        Voices {
            count: Some(count),
            memory_budget: Some(memory_budget),
            note_begin: None,
            patches: None,
        }
    }

    /// Returns the number of voices.
    pub fn count(&self) -> usize {
        self.count.unwrap_or(DEFAULT_COUNT)
    }

    /// Returns the sample memory budget in bytes.
    pub fn memory_budget(&self) -> usize {
        self.memory_budget.unwrap_or(DEFAULT_MEMORY_BUDGET)
    }

    /// Returns the note voice 0 listens to.
    pub fn note_begin(&self) -> u8 {
        self.note_begin.unwrap_or(DEFAULT_NOTE_BEGIN)
    }

    /// Returns the startup patch for a voice.
    pub fn patch_for(&self, voice: usize, directory: &str) -> String {
        match self.patches.as_ref().and_then(|patches| patches.get(voice)) {
            Some(patch) => patch.clone(),
            None => format!("{}/{}.wav", directory.trim_end_matches('/'), voice),
        }
    }
}
