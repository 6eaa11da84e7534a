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

//! Polyphonic sample playback.
//!
//! This module provides:
//! - A fixed pool of voices, each holding one fully resident sample
//! - The mixing engine that renders the pool into stereo buffers
//! - The loader that moves patches between storage and voices

mod engine;
mod loader;
pub mod pan;
mod pool;
mod voice;

pub use engine::SampleEngine;
pub use loader::{LoadRequest, PatchLoader};
pub use pool::{VoiceContents, VoicePool, VoiceSnapshot};
pub use voice::{VoiceState, AUDIBLE_LIMIT, DAMPING};
