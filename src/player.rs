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
use std::{error::Error, sync::Arc};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, span, warn, Level, Span};

use crate::{
    audio, config, midi,
    midi::NoteHandler,
    patch::{storage, PatchStore},
    samples::{LoadRequest, PatchLoader, SampleEngine, VoicePool},
};

/// Builds the patch store for a storage configuration.
pub fn patch_store(config: &config::Storage) -> PatchStore {
    config
        .backends()
        .into_iter()
        .fold(
            PatchStore::new(config.directory(), config.selected()),
            |store, (kind, root)| store.with_backend(kind, storage::get_backend(root)),
        )
}

/// Plays patches out of the voice pool in response to MIDI notes.
pub struct Player {
    /// The device audio is rendered to.
    device: Arc<dyn audio::Device>,
    /// The device notes come from.
    midi_device: Option<Arc<dyn midi::Device>>,
    pool: Arc<VoicePool>,
    engine: SampleEngine,
    loader: Arc<PatchLoader>,
    notes: Arc<NoteHandler>,
    /// Requests for the loader worker. The worker exits once this is dropped.
    requests: Sender<LoadRequest>,
    /// The task forwarding MIDI events to the note handler while running.
    monitor: Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

impl Player {
    /// Creates a player with the devices and storage named in the configuration.
    pub fn new(config: &config::Player) -> Result<Player, Box<dyn Error>> {
        let device = audio::get_device(&config.audio())?;
        let midi_device = config
            .midi()
            .map(|midi_config| midi::get_device(midi_config.device()))
            .transpose()?;
        let store = patch_store(&config.storage());
        Ok(Player::with_parts(config, store, device, midi_device))
    }

    /// Creates a player from already constructed parts. Each voice i loads its startup
    /// patch and listens to note `note_begin + i`. Voices whose patch fails to load stay
    /// empty.
    pub fn with_parts(
        config: &config::Player,
        store: PatchStore,
        device: Arc<dyn audio::Device>,
        midi_device: Option<Arc<dyn midi::Device>>,
    ) -> Player {
        let voices = config.voices();
        let pool = Arc::new(VoicePool::new(voices.count(), voices.memory_budget()));
        let engine = SampleEngine::new(pool.clone());
        let channel = config.midi().and_then(|midi| midi.wire_channel());
        let notes = Arc::new(NoteHandler::new(pool.clone(), channel));
        let directory = store.directory().to_string();
        let loader = Arc::new(PatchLoader::new(pool.clone(), Arc::new(store)));
        let (requests, _) = loader.clone().spawn();

        let span = span!(Level::INFO, "player");
        {
            let _enter = span.enter();
            for voice in 0..voices.count() {
                let note = voices.note_begin() as usize + voice;
                match u8::try_from(note) {
                    Ok(note) => {
                        if let Err(e) = notes.set_note_to_listen(note, voice) {
                            warn!(voice, note, err = %e, "Unable to map note");
                        }
                    }
                    Err(_) => warn!(voice, note, "Note out of range"),
                }

                let patch = voices.patch_for(voice, &directory);
                match loader.load_voice(voice, &patch) {
                    Ok(()) => info!(voice, path = patch, "Loaded startup patch"),
                    Err(e) => warn!(voice, path = patch, err = %e, "Unable to load startup patch"),
                }
            }
        }

        Player {
            device,
            midi_device,
            pool,
            engine,
            loader,
            notes,
            requests,
            monitor: Mutex::new(None),
            span,
        }
    }

    pub fn pool(&self) -> &Arc<VoicePool> {
        &self.pool
    }

    pub fn loader(&self) -> &Arc<PatchLoader> {
        &self.loader
    }

    pub fn notes(&self) -> &Arc<NoteHandler> {
        &self.notes
    }

    /// Queues work for the loader worker.
    pub fn request(&self, request: LoadRequest) -> Result<(), Box<dyn Error>> {
        self.requests
            .send(request)
            .map_err(|_| "patch loader has stopped".into())
    }

    /// Starts audio output and MIDI monitoring.
    pub fn start(&self) -> Result<(), Box<dyn Error>> {
        let _enter = self.span.enter();

        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return Err("Player is already running.".into());
        }

        self.device.start(self.engine.clone())?;
        info!(device = self.device.to_string(), "Audio output started");

        if let Some(midi_device) = &self.midi_device {
            *monitor = Some(self.notes.clone().monitor_events(midi_device.clone()));
        } else {
            warn!("No MIDI device configured, voices won't be triggered");
        }
        Ok(())
    }

    /// Stops MIDI monitoring and audio output.
    pub async fn stop(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(midi_device) = &self.midi_device {
            midi_device.stop_watch_events();
        }
        if let Some(monitor) = monitor {
            if let Err(e) = monitor.await {
                error!(err = %e, "MIDI monitor failed");
            }
        }
        self.device.stop();

        let _enter = self.span.enter();
        info!("Player stopped");
    }

    /// Runs until Ctrl-C.
    pub async fn run(&self) -> Result<(), Box<dyn Error>> {
        self.start()?;
        let result = tokio::signal::ctrl_c().await;
        self.stop().await;
        Ok(result?)
    }
}
