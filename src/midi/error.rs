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

/// Errors from changing the note map.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NoteMapError {
    #[error("voice {voice} is invalid, the pool has {voices} voices")]
    VoiceOutOfRange { voice: usize, voices: usize },
    #[error("note {0} is invalid, select a note between 0 and 127")]
    NoteOutOfRange(u8),
    #[error("voice {voice} is already listening to note {note}")]
    AlreadyListening { voice: usize, note: u8 },
}
