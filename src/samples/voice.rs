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

//! A single playback voice and its per-frame mixing.

use std::sync::Arc;

use super::pan::{self, PAN_CENTER, PAN_RIGHT};
use crate::patch::PatchParams;

/// Per-frame multiplier applied to the decay tail.
pub const DAMPING: f32 = 0.99;

/// Decay levels at or below this magnitude are inaudible and are cut to silence.
pub const AUDIBLE_LIMIT: f32 = 0.25 / 32768.0;

/// Divisor that maps an i16 sample to [-1, 1).
const FULL_SCALE: f32 = 32768.0;

/// The playback state of a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// Nothing loaded. Contributes silence.
    Empty,
    /// Loaded and silent.
    Idle,
    /// Reading through its sample.
    Playing,
    /// Stopped, with a decay tail still ringing out.
    Decaying,
}

/// A sample-playback slot. Voices are never destroyed; a load replaces the sample
/// in place.
pub struct Voice {
    enabled: bool,
    playing: bool,
    /// Read offset in samples, not frames.
    position: usize,
    frames: usize,
    stereo: bool,
    velocity: f32,
    pan: u8,
    decay_level: f32,
    samples: Arc<Vec<i16>>,
    sample_rate: u32,
    source_name: String,
    params: PatchParams,
}

impl Default for Voice {
    fn default() -> Self {
        Voice {
            enabled: false,
            playing: false,
            position: 0,
            frames: 0,
            stereo: false,
            velocity: 1.0,
            pan: PAN_CENTER,
            decay_level: 0.0,
            samples: Arc::new(Vec::new()),
            sample_rate: 0,
            source_name: String::new(),
            params: PatchParams::default(),
        }
    }
}

impl Voice {
    pub fn state(&self) -> VoiceState {
        if !self.enabled {
            VoiceState::Empty
        } else if self.playing {
            VoiceState::Playing
        } else if self.decay_level != 0.0 {
            VoiceState::Decaying
        } else {
            VoiceState::Idle
        }
    }

    pub fn channels(&self) -> u16 {
        if self.stereo {
            2
        } else {
            1
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn pan(&self) -> u8 {
        self.pan
    }

    pub fn decay_level(&self) -> f32 {
        self.decay_level
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn params(&self) -> &PatchParams {
        &self.params
    }

    pub fn samples(&self) -> &Arc<Vec<i16>> {
        &self.samples
    }

    /// Bytes of sample memory held by this voice.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    /// Replaces the sample and resets playback. Returns the previous buffer so the
    /// caller can release it after letting go of the voice.
    pub(super) fn install(
        &mut self,
        samples: Arc<Vec<i16>>,
        stereo: bool,
        sample_rate: u32,
        source_name: &str,
        params: PatchParams,
    ) -> Arc<Vec<i16>> {
        let channels = if stereo { 2 } else { 1 };
        self.frames = samples.len() / channels;
        self.stereo = stereo;
        self.sample_rate = sample_rate;
        self.source_name = source_name.to_string();
        self.params = params;
        self.velocity = 1.0;
        self.pan = PAN_CENTER;
        self.playing = false;
        self.position = 0;
        self.decay_level = 0.0;
        self.enabled = true;
        std::mem::replace(&mut self.samples, samples)
    }

    /// Empties the voice, returning its buffer.
    pub(super) fn disable(&mut self) -> Arc<Vec<i16>> {
        let old = std::mem::take(self);
        old.samples
    }

    /// Starts the voice from the top at the given velocity. A voice that is already
    /// playing keeps the amplitude it was interrupted at, scaled by the old velocity,
    /// as its decay tail.
    pub(super) fn trigger(&mut self, velocity: f32) -> bool {
        if !self.enabled || !(0.0..=1.0).contains(&velocity) {
            return false;
        }

        if self.playing {
            self.decay_level = self.current_amplitude();
        }
        self.playing = true;
        self.position = 0;
        self.velocity = velocity;
        true
    }

    pub(super) fn set_pan(&mut self, pan: u8) -> bool {
        if !self.enabled || pan > PAN_RIGHT {
            return false;
        }
        self.pan = pan;
        true
    }

    pub(super) fn set_gain(&mut self, gain: f32) -> bool {
        if !self.enabled || !(0.0..=1.0).contains(&gain) {
            return false;
        }
        self.velocity = gain;
        true
    }

    /// The amplitude of the frame under the cursor at the current velocity.
    fn current_amplitude(&self) -> f32 {
        let (left, right) = match self.frame_at(self.position) {
            Some(frame) => frame,
            None => return 0.0,
        };
        (left + right) / 2.0 * self.velocity
    }

    fn frame_at(&self, position: usize) -> Option<(f32, f32)> {
        if position >= self.frames * usize::from(self.channels()) {
            return None;
        }
        let left = f32::from(self.samples[position]) / FULL_SCALE;
        let right = if self.stereo {
            f32::from(self.samples[position + 1]) / FULL_SCALE
        } else {
            left
        };
        Some((left, right))
    }

    /// Adds this voice's next `left.len()` frames into the accumulators.
    pub(super) fn mix_into(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.enabled || (!self.playing && self.decay_level == 0.0) {
            return;
        }

        let (pan_left, pan_right) = pan::gains(self.pan);
        let step = usize::from(self.channels());
        let end = self.frames * step;

        for (out_left, out_right) in left.iter_mut().zip(right.iter_mut()) {
            let mut sample_left = 0.0;
            let mut sample_right = 0.0;

            if self.decay_level != 0.0 {
                self.decay_level *= DAMPING;
                if self.decay_level.abs() <= AUDIBLE_LIMIT {
                    self.decay_level = 0.0;
                } else {
                    sample_left += self.decay_level;
                    sample_right += self.decay_level;
                }
            }

            if self.playing {
                match self.frame_at(self.position) {
                    Some((l, r)) => {
                        let l = l * self.velocity;
                        let r = r * self.velocity;
                        sample_left += l;
                        sample_right += r;
                        self.position += step;
                        if self.position >= end {
                            self.playing = false;
                            self.decay_level = (l + r) / 2.0;
                            self.position = 0;
                        }
                    }
                    None => {
                        // Nothing left to read, e.g. an empty payload.
                        self.playing = false;
                        self.position = 0;
                    }
                }
            }

            *out_left += sample_left * pan_left;
            *out_right += sample_right * pan_right;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(samples: Vec<i16>, stereo: bool) -> Voice {
        let mut voice = Voice::default();
        voice.install(
            Arc::new(samples),
            stereo,
            44100,
            "/samples/0.wav",
            PatchParams::default(),
        );
        voice
    }

    fn mix(voice: &mut Voice, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        voice.mix_into(&mut left, &mut right);
        (left, right)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_states() {
        let mut voice = Voice::default();
        assert_eq!(voice.state(), VoiceState::Empty);
        assert!(!voice.trigger(1.0));
        assert!(!voice.set_pan(0));
        assert!(!voice.set_gain(0.5));

        let mut voice = loaded(vec![16384; 2], false);
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(voice.velocity(), 1.0);
        assert_eq!(voice.pan(), PAN_CENTER);
        assert!(voice.trigger(1.0));
        assert_eq!(voice.state(), VoiceState::Playing);
        mix(&mut voice, 2);
        assert_eq!(voice.state(), VoiceState::Decaying);
        mix(&mut voice, 2000);
        assert_eq!(voice.state(), VoiceState::Idle);

        let old = voice.disable();
        assert_eq!(old.len(), 2);
        assert_eq!(voice.state(), VoiceState::Empty);
        assert_eq!(voice.memory_size(), 0);
    }

    #[test]
    fn test_end_of_sample_mono() {
        let mut voice = loaded(vec![16384; 4], false);
        assert!(voice.trigger(1.0));

        let (left, right) = mix(&mut voice, 4);
        for n in 0..4 {
            assert_close(left[n], 0.5 * 0.707);
            assert_close(right[n], 0.5 * 0.707);
        }
        assert_eq!(voice.state(), VoiceState::Decaying);
        assert_eq!(voice.position(), 0);
        assert_close(voice.decay_level(), 0.5);

        // The tail keeps sounding after playback stops.
        let (left, right) = mix(&mut voice, 1);
        assert_close(left[0], 0.5 * DAMPING * 0.707);
        assert_close(right[0], 0.5 * DAMPING * 0.707);
    }

    #[test]
    fn test_decay_extinction() {
        let mut voice = loaded(vec![0; 4], false);
        voice.decay_level = 1.0;
        let expected = ((AUDIBLE_LIMIT as f64).ln() / (0.99f64).ln()).ceil() as usize;
        assert_eq!(expected, 1173);

        for frame in 1..expected {
            mix(&mut voice, 1);
            assert!(voice.decay_level() > 0.0, "extinct early at frame {}", frame);
        }
        let (left, right) = mix(&mut voice, 1);
        assert_eq!(voice.decay_level(), 0.0);
        assert_eq!(left[0], 0.0);
        assert_eq!(right[0], 0.0);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_negative_decay_uses_magnitude() {
        let mut voice = loaded(vec![-16384; 1], false);
        voice.trigger(1.0);
        mix(&mut voice, 1);
        assert_close(voice.decay_level(), -0.5);
        let (left, _) = mix(&mut voice, 1);
        assert_close(left[0], -0.5 * DAMPING * 0.707);
        assert_eq!(voice.state(), VoiceState::Decaying);
    }

    #[test]
    fn test_retrigger() {
        let mut voice = loaded(vec![16384, 8192, 0, 0], false);
        assert!(voice.trigger(1.0));
        mix(&mut voice, 1);
        assert_eq!(voice.position(), 1);

        assert!(voice.trigger(0.5));
        assert_eq!(voice.state(), VoiceState::Playing);
        assert_eq!(voice.position(), 0);
        assert_eq!(voice.velocity(), 0.5);
        // The tail keeps the old velocity: 0.25 rather than 0.125.
        assert_close(voice.decay_level(), 0.25);

        let (left, _) = mix(&mut voice, 1);
        assert_close(left[0], (0.25 * DAMPING + 0.25) * 0.707);
    }

    #[test]
    fn test_trigger_while_decaying() {
        let mut voice = loaded(vec![16384; 2], false);
        voice.trigger(1.0);
        mix(&mut voice, 2);
        assert_eq!(voice.state(), VoiceState::Decaying);

        assert!(voice.trigger(1.0));
        assert_close(voice.decay_level(), 0.5);
        let (left, _) = mix(&mut voice, 1);
        assert_close(left[0], (0.5 * DAMPING + 0.5) * 0.707);
    }

    #[test]
    fn test_stereo_interleave() {
        let mut voice = loaded(vec![16384, -16384, 8192, -8192, 4096, -4096], true);
        assert_eq!(voice.frames(), 3);
        assert_eq!(voice.channels(), 2);
        voice.trigger(1.0);

        // Positions 0 and 1 are the left and right of the first frame.
        let (left, right) = mix(&mut voice, 1);
        assert_close(left[0], 0.5 * 0.707);
        assert_close(right[0], -0.5 * 0.707);
        assert_eq!(voice.position(), 2);
        assert_eq!(voice.state(), VoiceState::Playing);

        let (left, right) = mix(&mut voice, 1);
        assert_close(left[0], 0.25 * 0.707);
        assert_close(right[0], -0.25 * 0.707);
        assert_eq!(voice.position(), 4);

        let (left, right) = mix(&mut voice, 1);
        assert_close(left[0], 0.125 * 0.707);
        assert_close(right[0], -0.125 * 0.707);
        assert_eq!(voice.position(), 0);
        // The two channels cancel, so there is no tail.
        assert_eq!(voice.decay_level(), 0.0);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_pan_and_gain() {
        let mut voice = loaded(vec![16384; 8], false);
        assert!(!voice.set_pan(19));
        assert!(voice.set_pan(0));
        assert!(!voice.trigger(-0.1));
        assert!(voice.trigger(1.0));

        assert!(!voice.set_gain(1.5));
        assert!(!voice.set_gain(f32::NAN));
        assert!(voice.set_gain(0.5));
        let (left, right) = mix(&mut voice, 1);
        assert_close(left[0], 0.25);
        assert_eq!(right[0], 0.0);
    }

    #[test]
    fn test_mix_adds_without_clamping() {
        let mut voice = loaded(vec![32767; 2], false);
        voice.set_pan(0);
        voice.trigger(1.0);
        let mut left = vec![0.9, 0.9];
        let mut right = vec![0.1, 0.1];
        voice.mix_into(&mut left, &mut right);
        assert!(left[0] > 1.8);
        assert_eq!(right, vec![0.1, 0.1]);
    }

    #[test]
    fn test_empty_payload() {
        let mut voice = loaded(Vec::new(), false);
        assert!(voice.trigger(1.0));
        let (left, _) = mix(&mut voice, 2);
        assert_eq!(left, vec![0.0, 0.0]);
        assert_eq!(voice.state(), VoiceState::Idle);
    }
}
