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
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::Renderer;
use crate::{config, playsync::CancelHandle, samples::SampleEngine};

/// Default period when listing devices.
const DEFAULT_PERIOD: usize = 64;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Frames rendered per engine call.
    period: usize,
    /// The sample rate the configuration asks for.
    requested_sample_rate: u32,
    /// The output thread and its stop signal, while running.
    output: Mutex<Option<(CancelHandle, JoinHandle<()>)>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds an output stream of sample type T. Stream errors stop the output thread.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: Renderer,
    failed: Arc<AtomicBool>,
    cancel_handle: CancelHandle,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
            renderer.render(data, |sample| T::from_sample(sample));
        },
        move |err| {
            error!("CPAL output stream error: {}", err);
            failed.store(true, Ordering::Relaxed);
            cancel_handle.notify();
        },
        None,
    )
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal output devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        period: DEFAULT_PERIOD,
                        requested_sample_rate: 44100,
                        output: Mutex::new(None),
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(mut device) => {
                device.period = config.buffer_size();
                device.requested_sample_rate = config.sample_rate();
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl super::Device for Device {
    fn start(&self, engine: SampleEngine) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start (cpal)");
        let _enter = span.enter();

        let mut output = self.output.lock();
        if output.is_some() {
            return Err("Already running.".into());
        }

        let supported = self.device.default_output_config()?;
        let sample_format = supported.sample_format();
        let stream_config = supported.config();
        info!(
            device = self.name,
            channels = stream_config.channels,
            format = ?sample_format,
            requested_sample_rate = self.requested_sample_rate,
            period = self.period,
            "Starting audio output. Samples play at the device rate."
        );

        let renderer = Renderer::new(engine, stream_config.channels, self.period);
        let cancel_handle = CancelHandle::new();
        let failed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        // Streams aren't Send on every platform, so the stream is created and kept on
        // its own thread.
        let device = self.device.clone();
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(
                        &device,
                        &stream_config,
                        renderer,
                        failed.clone(),
                        cancel_handle.clone(),
                    ),
                    cpal::SampleFormat::I16 => build_stream::<i16>(
                        &device,
                        &stream_config,
                        renderer,
                        failed.clone(),
                        cancel_handle.clone(),
                    ),
                    cpal::SampleFormat::I32 => build_stream::<i32>(
                        &device,
                        &stream_config,
                        renderer,
                        failed.clone(),
                        cancel_handle.clone(),
                    ),
                    other => {
                        let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                        return;
                    }
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to create stream: {}", e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(format!("failed to start stream: {}", e)));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                cancel_handle.wait(failed.clone());
                if failed.load(Ordering::Relaxed) {
                    error!("Audio output stopped after a stream error");
                }
                drop(stream);
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = self.name, "CPAL output stream started successfully");
                *output = Some((cancel_handle, join_handle));
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = join_handle.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = join_handle.join();
                Err("audio output thread exited before starting".into())
            }
        }
    }

    fn stop(&self) {
        let output = self.output.lock().take();
        if let Some((cancel_handle, join_handle)) = output {
            cancel_handle.cancel();
            if join_handle.join().is_err() {
                error!(device = self.name, "Error while joining audio output thread");
            }
            info!(device = self.name, "Audio output stopped.");
        }
    }
}
