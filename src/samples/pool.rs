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

//! The fixed voice arena.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::voice::{Voice, VoiceState};
use crate::patch::{DecodedAudio, PatchError, PatchParams};

/// A point-in-time view of a voice.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceSnapshot {
    pub state: VoiceState,
    pub position: usize,
    pub frames: usize,
    pub channels: u16,
    pub velocity: f32,
    pub pan: u8,
    pub decay_level: f32,
    pub source_name: String,
}

/// What a voice holds, shared rather than copied so it can be saved without holding
/// the voice.
#[derive(Clone, Debug)]
pub struct VoiceContents {
    pub samples: Arc<Vec<i16>>,
    pub channels: u16,
    pub sample_rate: u32,
    pub params: PatchParams,
}

/// A fixed number of voices addressed by index, each behind its own lock. Sample
/// memory across all voices is limited by a byte budget.
pub struct VoicePool {
    voices: Box<[Mutex<Voice>]>,
    memory_budget: usize,
    memory_used: AtomicUsize,
}

impl VoicePool {
    pub fn new(count: usize, memory_budget: usize) -> VoicePool {
        VoicePool {
            voices: (0..count).map(|_| Mutex::new(Voice::default())).collect(),
            memory_budget,
            memory_used: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    /// Bytes of sample memory held by all voices.
    pub fn memory_used(&self) -> usize {
        self.memory_used.load(Ordering::Acquire)
    }

    /// Bytes of sample memory still free.
    pub fn available_bytes(&self) -> usize {
        self.memory_budget.saturating_sub(self.memory_used())
    }

    pub(super) fn voices(&self) -> &[Mutex<Voice>] {
        &self.voices
    }

    /// Starts or restarts a voice. Returns false for empty or unknown voices.
    pub fn trigger(&self, index: usize, velocity: f32) -> bool {
        match self.voices.get(index) {
            Some(voice) => voice.lock().trigger(velocity),
            None => false,
        }
    }

    /// Reserved for note-off handling. Playback is unaffected; returns whether the
    /// voice exists.
    pub fn release(&self, index: usize) -> bool {
        index < self.voices.len()
    }

    pub fn set_pan(&self, index: usize, pan: u8) -> bool {
        match self.voices.get(index) {
            Some(voice) => voice.lock().set_pan(pan),
            None => false,
        }
    }

    pub fn set_gain(&self, index: usize, gain: f32) -> bool {
        match self.voices.get(index) {
            Some(voice) => voice.lock().set_gain(gain),
            None => false,
        }
    }

    /// Silences and empties a voice, releasing its sample memory.
    pub fn disable(&self, index: usize) -> bool {
        let voice = match self.voices.get(index) {
            Some(voice) => voice,
            None => return false,
        };

        let old = voice.lock().disable();
        self.memory_used.fetch_sub(old.len() * SAMPLE_SIZE, Ordering::AcqRel);
        debug!(voice = index, "Voice disabled");
        true
    }

    /// Installs decoded audio into a voice, resetting its playback state. On error the
    /// voice is left untouched.
    pub fn install(
        &self,
        index: usize,
        audio: DecodedAudio,
        params: PatchParams,
        source_name: &str,
    ) -> Result<(), PatchError> {
        let voice = self.voices.get(index).ok_or_else(|| {
            PatchError::InvalidArgument(format!(
                "voice {} is out of range (0..{})",
                index,
                self.voices.len()
            ))
        })?;

        // Reserve the bytes in one step so concurrent installs can't both take the
        // same free memory.
        let bytes = audio.samples().len() * SAMPLE_SIZE;
        self.memory_used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes)
                    .filter(|total| *total <= self.memory_budget)
            })
            .map_err(|used| PatchError::CapacityExceeded {
                requested: bytes,
                available: self.memory_budget.saturating_sub(used),
            })?;

        let stereo = audio.channels() == 2;
        let sample_rate = audio.sample_rate();
        let samples = Arc::new(audio.into_samples());

        let old = voice
            .lock()
            .install(samples, stereo, sample_rate, source_name, params);
        self.memory_used
            .fetch_sub(old.len() * SAMPLE_SIZE, Ordering::AcqRel);

        info!(
            voice = index,
            source = source_name,
            bytes,
            free = self.available_bytes(),
            "Voice loaded"
        );

        // The previous buffer is released here, outside the voice lock.
        drop(old);
        Ok(())
    }

    pub fn state(&self, index: usize) -> Option<VoiceState> {
        self.voices.get(index).map(|voice| voice.lock().state())
    }

    pub fn snapshot(&self, index: usize) -> Option<VoiceSnapshot> {
        self.voices.get(index).map(|voice| {
            let voice = voice.lock();
            VoiceSnapshot {
                state: voice.state(),
                position: voice.position(),
                frames: voice.frames(),
                channels: voice.channels(),
                velocity: voice.velocity(),
                pan: voice.pan(),
                decay_level: voice.decay_level(),
                source_name: voice.source_name().to_string(),
            }
        })
    }

    /// The sample and parameters of a loaded voice. None for empty or unknown voices.
    pub fn contents(&self, index: usize) -> Option<VoiceContents> {
        let voice = self.voices.get(index)?.lock();
        if voice.state() == VoiceState::Empty {
            return None;
        }
        Some(VoiceContents {
            samples: voice.samples().clone(),
            channels: voice.channels(),
            sample_rate: voice.sample_rate(),
            params: voice.params().clone(),
        })
    }
}

const SAMPLE_SIZE: usize = std::mem::size_of::<i16>();

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(samples: Vec<i16>, channels: u16) -> DecodedAudio {
        DecodedAudio::new(samples, channels, 44100).unwrap()
    }

    #[test]
    fn test_out_of_range() {
        let pool = VoicePool::new(2, 1024);
        assert_eq!(pool.len(), 2);
        assert!(!pool.trigger(2, 1.0));
        assert!(!pool.set_pan(2, 0));
        assert!(!pool.set_gain(2, 0.5));
        assert!(!pool.disable(2));
        assert!(!pool.release(2));
        assert!(pool.release(1));
        assert!(pool.state(2).is_none());
        assert!(pool.snapshot(2).is_none());
        assert!(matches!(
            pool.install(2, audio(vec![1], 1), PatchParams::default(), "x"),
            Err(PatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_voices_refuse_triggers() {
        let pool = VoicePool::new(1, 1024);
        assert_eq!(pool.state(0), Some(VoiceState::Empty));
        assert!(!pool.trigger(0, 1.0));
        assert!(pool.contents(0).is_none());
    }

    #[test]
    fn test_install_and_snapshot() {
        let pool = VoicePool::new(2, 1024);
        pool.install(1, audio(vec![1, 2, 3, 4], 2), PatchParams::current(), "/samples/1.wav")
            .unwrap();
        assert_eq!(pool.memory_used(), 8);
        assert_eq!(pool.available_bytes(), 1016);

        assert!(pool.trigger(1, 0.5));
        let snapshot = pool.snapshot(1).unwrap();
        assert_eq!(snapshot.state, VoiceState::Playing);
        assert_eq!(snapshot.frames, 2);
        assert_eq!(snapshot.channels, 2);
        assert_eq!(snapshot.velocity, 0.5);
        assert_eq!(snapshot.source_name, "/samples/1.wav");

        let contents = pool.contents(1).unwrap();
        assert_eq!(*contents.samples, vec![1, 2, 3, 4]);
        assert_eq!(contents.params.version, 1);

        // Reloading resets playback and replaces the accounting.
        pool.install(1, audio(vec![5; 10], 1), PatchParams::default(), "/samples/2.wav")
            .unwrap();
        assert_eq!(pool.memory_used(), 20);
        assert_eq!(pool.state(1), Some(VoiceState::Idle));
        // The earlier snapshot of the contents is still intact.
        assert_eq!(*contents.samples, vec![1, 2, 3, 4]);

        assert!(pool.disable(1));
        assert_eq!(pool.memory_used(), 0);
        assert_eq!(pool.state(1), Some(VoiceState::Empty));
    }

    #[test]
    fn test_capacity_leaves_voice_unchanged() {
        let pool = VoicePool::new(2, 12);
        pool.install(0, audio(vec![7; 4], 1), PatchParams::default(), "/samples/0.wav")
            .unwrap();
        pool.trigger(0, 1.0);
        let before = pool.snapshot(0).unwrap();

        assert!(matches!(
            pool.install(0, audio(vec![0; 4], 1), PatchParams::default(), "/samples/1.wav"),
            Err(PatchError::CapacityExceeded {
                requested: 8,
                available: 4
            })
        ));
        assert_eq!(pool.snapshot(0).unwrap(), before);
        assert_eq!(pool.memory_used(), 8);
    }

    #[test]
    fn test_shared_across_threads() {
        let pool = Arc::new(VoicePool::new(4, 1 << 20));
        for i in 0..4 {
            pool.install(i, audio(vec![100; 64], 1), PatchParams::default(), "x")
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(pool.trigger(i, 1.0));
                        assert!(pool.set_pan(i, 3));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..4 {
            assert_eq!(pool.state(i), Some(VoiceState::Playing));
            assert_eq!(pool.snapshot(i).unwrap().pan, 3);
        }
    }

    #[test]
    fn test_concurrent_installs_respect_budget() {
        // Room for exactly one 8-sample payload.
        let pool = Arc::new(VoicePool::new(8, 16));
        let installs: Vec<_> = (0..8)
            .map(|voice| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    pool.install(voice, audio(vec![1; 8], 1), PatchParams::default(), "test")
                        .is_ok()
                })
            })
            .collect();

        let succeeded = installs
            .into_iter()
            .map(|install| install.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(succeeded, 1);
        assert_eq!(pool.memory_used(), 16);
        assert_eq!(pool.available_bytes(), 0);
    }
}
