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

//! The mixing engine that renders all voices into the output buffers.

use std::sync::Arc;

use super::pool::VoicePool;

/// Renders the voice pool into stereo buffers, one period at a time. The engine is
/// driven by the audio context; triggers go to the pool directly.
#[derive(Clone)]
pub struct SampleEngine {
    pool: Arc<VoicePool>,
}

impl SampleEngine {
    pub fn new(pool: Arc<VoicePool>) -> SampleEngine {
        SampleEngine { pool }
    }

    pub fn pool(&self) -> &Arc<VoicePool> {
        &self.pool
    }

    /// Adds the next `frame_count` frames of every voice into `out_left` and
    /// `out_right`. The buffers are only added to, never cleared or clamped, so the
    /// caller zeroes them first. Frames beyond the shorter buffer are not produced.
    ///
    /// Each voice is locked once for the whole period, so a trigger lands between
    /// periods and never in the middle of one.
    pub fn produce_frames(&self, out_left: &mut [f32], out_right: &mut [f32], frame_count: usize) {
        let frames = frame_count.min(out_left.len()).min(out_right.len());
        let (left, right) = (&mut out_left[..frames], &mut out_right[..frames]);

        for voice in self.pool.voices() {
            voice.lock().mix_into(left, right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{DecodedAudio, PatchParams};
    use crate::samples::VoiceState;

    fn engine_with(voices: &[Vec<i16>]) -> SampleEngine {
        let pool = Arc::new(VoicePool::new(voices.len() + 1, 1 << 20));
        for (i, samples) in voices.iter().enumerate() {
            pool.install(
                i,
                DecodedAudio::new(samples.clone(), 1, 44100).unwrap(),
                PatchParams::default(),
                "test",
            )
            .unwrap();
        }
        SampleEngine::new(pool)
    }

    #[test]
    fn test_silence_when_idle() {
        let engine = engine_with(&[vec![16384; 8]]);
        let mut left = vec![0.0; 8];
        let mut right = vec![0.0; 8];
        engine.produce_frames(&mut left, &mut right, 8);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
    }

    #[test]
    fn test_voices_sum_without_clamping() {
        let engine = engine_with(&[vec![32767; 8], vec![32767; 8]]);
        for i in 0..2 {
            assert!(engine.pool().set_pan(i, 0));
            assert!(engine.pool().trigger(i, 1.0));
        }

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        engine.produce_frames(&mut left, &mut right, 4);
        for sample in left {
            assert!(sample > 1.99 && sample < 2.0);
        }
        assert!(right.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_frame_count_bounds() {
        let engine = engine_with(&[vec![16384; 8]]);
        engine.pool().trigger(0, 1.0);

        let mut left = vec![1.0; 8];
        let mut right = vec![1.0; 4];
        engine.produce_frames(&mut left, &mut right, 6);

        // Limited by the shorter buffer.
        assert!(left[..4].iter().all(|s| *s > 1.0));
        assert!(left[4..].iter().all(|s| *s == 1.0));
        assert_eq!(engine.pool().snapshot(0).unwrap().position, 4);

        engine.produce_frames(&mut left, &mut right, 2);
        assert_eq!(engine.pool().snapshot(0).unwrap().position, 6);
    }

    #[test]
    fn test_playback_across_periods() {
        let engine = engine_with(&[vec![16384; 6]]);
        engine.pool().trigger(0, 1.0);

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        engine.produce_frames(&mut left, &mut right, 4);
        assert_eq!(engine.pool().state(0), Some(VoiceState::Playing));

        left.fill(0.0);
        right.fill(0.0);
        engine.produce_frames(&mut left, &mut right, 4);
        assert_eq!(engine.pool().state(0), Some(VoiceState::Decaying));
        // Two frames of sample, then the tail.
        assert!(left[2] > 0.0 && left[2] < left[1]);
    }
}
