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

//! The patch parameter sidecar record.
//!
//! The record is always [`RECORD_LEN`] bytes: a 512-byte parameter block followed by
//! a 64-byte NUL-padded filename. The parameter block starts with a little-endian
//! `u32` version and each version appends fields:
//!
//! | offset | version | field      |
//! |--------|---------|------------|
//! | 0      | -       | version    |
//! | 4      | 0       | pitch      |
//! | 8      | 0       | loop_start |
//! | 12     | 0       | loop_end   |
//! | 16     | 1       | attack     |
//! | 20     | 1       | decay      |
//! | 24     | 1       | sustain    |
//! | 28     | 1       | release    |

use std::fmt;

/// Size of the versioned parameter block.
pub const PARAM_BLOCK_LEN: usize = 512;

/// Size of the trailing filename field.
pub const FILENAME_LEN: usize = 64;

/// Total on-disk size of a record, independent of its version.
pub const RECORD_LEN: usize = PARAM_BLOCK_LEN + FILENAME_LEN;

/// The newest record layout this crate writes.
pub const CURRENT_VERSION: u32 = 1;

/// Loop end used when no loop end is known.
pub const LOOP_END_UNBOUNDED: f32 = 9_999_999.0;

const PITCH: usize = 4;
const LOOP_START: usize = 8;
const LOOP_END: usize = 12;
const ATTACK: usize = 16;
const DECAY: usize = 20;
const SUSTAIN: usize = 24;
const RELEASE: usize = 28;

/// Per-voice performance parameters stored next to a patch's audio.
///
/// Pitch, loop points and the envelope are persisted and restored only; playback does
/// not consume them.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchParams {
    pub version: u32,
    pub pitch: f32,
    pub loop_start: f32,
    pub loop_end: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    source_filename: String,
}

impl Default for PatchParams {
    /// The record used when no sidecar exists.
    fn default() -> Self {
        PatchParams {
            version: 0,
            pitch: 1.0,
            loop_start: 0.0,
            loop_end: LOOP_END_UNBOUNDED,
            attack: 1.0,
            decay: 1.0,
            sustain: 1.0,
            release: 0.0,
            source_filename: String::new(),
        }
    }
}

impl PatchParams {
    /// A default record at the current version, used for newly created patches.
    pub fn current() -> PatchParams {
        PatchParams {
            version: CURRENT_VERSION,
            ..PatchParams::default()
        }
    }

    /// The audio file this record belongs to.
    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    /// Sets the source filename, truncated to fit the fixed field with its NUL.
    pub fn set_source_filename(&mut self, filename: &str) {
        self.source_filename = truncate_to(filename, FILENAME_LEN - 1).to_string();
    }

    /// Decodes a record. Input shorter than [`RECORD_LEN`] yields the default record,
    /// and fields newer than the declared version keep their defaults.
    pub fn decode(bytes: &[u8]) -> PatchParams {
        let mut params = PatchParams::default();
        if bytes.len() < RECORD_LEN {
            return params;
        }

        params.version = read_u32(bytes, 0);
        params.pitch = read_f32(bytes, PITCH);
        params.loop_start = read_f32(bytes, LOOP_START);
        params.loop_end = read_f32(bytes, LOOP_END);

        if params.version >= 1 {
            params.attack = read_f32(bytes, ATTACK);
            params.decay = read_f32(bytes, DECAY);
            params.sustain = read_f32(bytes, SUSTAIN);
            params.release = read_f32(bytes, RELEASE);
        }

        let name = &bytes[PARAM_BLOCK_LEN..RECORD_LEN];
        let end = name.iter().position(|b| *b == 0).unwrap_or(FILENAME_LEN);
        params.source_filename = String::from_utf8_lossy(&name[..end]).into_owned();

        params
    }

    /// Encodes the record. Fields beyond the declared version are written as zeros.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        write_f32(&mut bytes, PITCH, self.pitch);
        write_f32(&mut bytes, LOOP_START, self.loop_start);
        write_f32(&mut bytes, LOOP_END, self.loop_end);

        if self.version >= 1 {
            write_f32(&mut bytes, ATTACK, self.attack);
            write_f32(&mut bytes, DECAY, self.decay);
            write_f32(&mut bytes, SUSTAIN, self.sustain);
            write_f32(&mut bytes, RELEASE, self.release);
        }

        let name = truncate_to(&self.source_filename, FILENAME_LEN - 1).as_bytes();
        bytes[PARAM_BLOCK_LEN..PARAM_BLOCK_LEN + name.len()].copy_from_slice(name);
        bytes
    }
}

impl fmt::Display for PatchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "    pitch: {:.6}", self.pitch)?;
        writeln!(f, "    loop_start: {:.6}", self.loop_start)?;
        write!(f, "    loop_end: {:.6}", self.loop_end)?;
        if self.version >= 1 {
            writeln!(f)?;
            writeln!(f, "    attack: {:.6}", self.attack)?;
            writeln!(f, "    decay: {:.6}", self.decay)?;
            writeln!(f, "    sustain: {:.6}", self.sustain)?;
            write!(f, "    release: {:.6}", self.release)?;
        }
        Ok(())
    }
}

fn truncate_to(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(bytes, offset))
}

fn write_f32(bytes: &mut [u8], offset: usize, value: f32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
