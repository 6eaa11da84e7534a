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
use std::{error::Error, fmt, sync::Arc};

use crate::config;
use crate::samples::SampleEngine;

pub mod cpal;
pub mod mock;
mod thread_priority;

/// An audio output that pulls periods from the sample engine.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Starts pulling audio from the engine. Returns once the output is running.
    fn start(&self, engine: SampleEngine) -> Result<(), Box<dyn Error>>;

    /// Stops the output. Does nothing if it isn't running.
    fn stop(&self);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(
            device,
            config.sample_rate(),
            config.buffer_size(),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

/// Converts engine output into interleaved device buffers, one fixed-size period at
/// a time. Scratch buffers are allocated once, up front.
pub struct Renderer {
    engine: SampleEngine,
    channels: usize,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Renderer {
    pub fn new(engine: SampleEngine, channels: u16, period: usize) -> Renderer {
        let period = period.max(1);
        Renderer {
            engine,
            channels: usize::from(channels.max(1)),
            left: vec![0.0; period],
            right: vec![0.0; period],
        }
    }

    /// Fills `out` with interleaved frames. Output is clamped to [-1, 1] before
    /// conversion. Mono devices get the average of both sides and channels past the
    /// second are silent.
    pub fn render<T>(&mut self, out: &mut [T], convert: impl Fn(f32) -> T) {
        let period = self.left.len();
        let channels = self.channels;

        for chunk in out.chunks_mut(period * channels) {
            let frames = chunk.len() / channels;
            let left = &mut self.left[..frames];
            let right = &mut self.right[..frames];
            left.fill(0.0);
            right.fill(0.0);
            self.engine.produce_frames(left, right, frames);

            for (frame, (l, r)) in chunk[..frames * channels]
                .chunks_mut(channels)
                .zip(left.iter().zip(right.iter()))
            {
                match frame {
                    [mono] => *mono = convert(((l + r) / 2.0).clamp(-1.0, 1.0)),
                    [front_left, front_right, rest @ ..] => {
                        *front_left = convert(l.clamp(-1.0, 1.0));
                        *front_right = convert(r.clamp(-1.0, 1.0));
                        for sample in rest {
                            *sample = convert(0.0);
                        }
                    }
                    [] => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{DecodedAudio, PatchParams};
    use crate::samples::VoicePool;

    fn engine(samples: Vec<i16>) -> SampleEngine {
        let pool = Arc::new(VoicePool::new(1, 1 << 16));
        pool.install(
            0,
            DecodedAudio::new(samples, 1, 44100).unwrap(),
            PatchParams::default(),
            "test",
        )
        .unwrap();
        pool.set_pan(0, 0);
        SampleEngine::new(pool)
    }

    #[test]
    fn test_render_interleaves_stereo() {
        let engine = engine(vec![16384; 8]);
        engine.pool().set_pan(0, 0);
        engine.pool().trigger(0, 1.0);

        let mut renderer = Renderer::new(engine, 2, 3);
        let mut out = vec![9.0f32; 8];
        renderer.render(&mut out, |s| s);
        assert_eq!(out, vec![0.5, 0.0, 0.5, 0.0, 0.5, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_render_mono_and_extra_channels() {
        let engine = engine(vec![16384; 8]);
        engine.pool().trigger(0, 1.0);

        let mut renderer = Renderer::new(engine.clone(), 1, 4);
        let mut out = vec![0.0f32; 2];
        renderer.render(&mut out, |s| s);
        assert_eq!(out, vec![0.25, 0.25]);

        let mut renderer = Renderer::new(engine, 4, 4);
        let mut out = vec![9i16; 8];
        renderer.render(&mut out, |s| (s * 32767.0) as i16);
        assert_eq!(out, vec![16383, 0, 0, 0, 16383, 0, 0, 0]);
    }

    #[test]
    fn test_render_clamps() {
        let pool = Arc::new(VoicePool::new(3, 1 << 16));
        for voice in 0..3 {
            pool.install(
                voice,
                DecodedAudio::new(vec![32767; 4], 1, 44100).unwrap(),
                PatchParams::default(),
                "test",
            )
            .unwrap();
            pool.set_pan(voice, 0);
            pool.trigger(voice, 1.0);
        }

        let mut renderer = Renderer::new(SampleEngine::new(pool), 2, 4);
        let mut out = vec![0.0f32; 2];
        renderer.render(&mut out, |s| s);
        assert_eq!(out, vec![1.0, 0.0]);
    }
}
