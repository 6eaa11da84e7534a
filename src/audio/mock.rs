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
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::Renderer;
use crate::{playsync::CancelHandle, samples::SampleEngine};

/// Output channels of the mock device.
const CHANNELS: u16 = 2;

/// A mock device. Pulls periods from the engine in real time and throws them away,
/// keeping counters for tests.
pub struct Device {
    name: String,
    sample_rate: u32,
    period: usize,
    frames: Arc<AtomicU64>,
    peak: Arc<Mutex<f32>>,
    running: Mutex<Option<(CancelHandle, JoinHandle<()>)>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32, period: usize) -> Device {
        Device {
            name: name.to_string(),
            sample_rate: sample_rate.max(1),
            period: period.max(1),
            frames: Arc::new(AtomicU64::new(0)),
            peak: Arc::new(Mutex::new(0.0)),
            running: Mutex::new(None),
        }
    }

    /// Frames produced since the device was created.
    pub fn frames_produced(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// The largest absolute output level seen so far.
    pub fn peak(&self) -> f32 {
        *self.peak.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl super::Device for Device {
    fn start(&self, engine: SampleEngine) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start (mock)");
        let _enter = span.enter();

        let mut running = self.running.lock();
        if running.is_some() {
            return Err("Already running.".into());
        }

        let cancel_handle = CancelHandle::new();
        let period_duration =
            Duration::from_secs_f64(self.period as f64 / f64::from(self.sample_rate));
        let period = self.period;
        let frames = self.frames.clone();
        let peak = self.peak.clone();

        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                let mut renderer = Renderer::new(engine, CHANNELS, period);
                let mut buffer = vec![0.0f32; period * usize::from(CHANNELS)];
                while !cancel_handle.is_cancelled() {
                    renderer.render(&mut buffer, |sample| sample);
                    frames.fetch_add(period as u64, Ordering::Relaxed);

                    let level = buffer.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
                    {
                        let mut peak = peak.lock();
                        if level > *peak {
                            *peak = level;
                        }
                    }

                    cancel_handle.wait_for(period_duration);
                }
            })
        };

        info!(device = self.name, period, "Mock output started.");
        *running = Some((cancel_handle, join_handle));
        Ok(())
    }

    fn stop(&self) {
        let running = self.running.lock().take();
        if let Some((cancel_handle, join_handle)) = running {
            cancel_handle.cancel();
            let _ = join_handle.join();
            info!(device = self.name, "Mock output stopped.");
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Device as _;
    use crate::patch::{DecodedAudio, PatchParams};
    use crate::samples::VoicePool;
    use crate::testutil::eventually;

    #[test]
    fn test_start_and_stop() {
        let pool = Arc::new(VoicePool::new(1, 1 << 16));
        pool.install(
            0,
            DecodedAudio::new(vec![16384; 44100], 1, 44100).unwrap(),
            PatchParams::default(),
            "test",
        )
        .unwrap();
        let engine = SampleEngine::new(pool.clone());

        let device = Device::get("mock-device", 44100, 64);
        assert_eq!(device.to_string(), "mock-device (Mock)");
        device.start(engine.clone()).unwrap();
        assert!(device.start(engine).is_err());
        assert!(device.is_running());

        eventually(|| device.frames_produced() >= 128, "No frames produced");
        assert_eq!(device.peak(), 0.0);

        pool.trigger(0, 1.0);
        eventually(|| device.peak() > 0.3, "Triggered voice never heard");

        device.stop();
        assert!(!device.is_running());
        let frames = device.frames_produced();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(device.frames_produced(), frames);

        // Stopping twice is harmless.
        device.stop();
    }
}
