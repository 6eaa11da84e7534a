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

//! Maps incoming notes to voices.

use std::sync::Arc;

use midly::{live::LiveEvent, MidiMessage};
use parking_lot::RwLock;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, span, warn, Level};

use super::{error::NoteMapError, Device};
use crate::samples::VoicePool;

/// The highest valid MIDI note.
const MAX_NOTE: u8 = 127;

/// Triggers voices from note events. Each voice listens to at most one note.
pub struct NoteHandler {
    pool: Arc<VoicePool>,
    /// The note each voice listens to, indexed by voice.
    notes: RwLock<Vec<Option<u8>>>,
    /// Zero-based channel filter. None accepts every channel.
    channel: Option<u8>,
}

impl NoteHandler {
    /// Creates a handler for the pool. `channel` is zero based.
    pub fn new(pool: Arc<VoicePool>, channel: Option<u8>) -> NoteHandler {
        let voices = pool.len();
        NoteHandler {
            pool,
            notes: RwLock::new(vec![None; voices]),
            channel,
        }
    }

    /// Makes a voice listen to a note. Setting the same note again is a no-op, while
    /// replacing a different note must be done by removing it first.
    pub fn set_note_to_listen(&self, note: u8, voice: usize) -> Result<(), NoteMapError> {
        let mut notes = self.notes.write();
        let voices = notes.len();
        let slot = notes
            .get_mut(voice)
            .ok_or(NoteMapError::VoiceOutOfRange { voice, voices })?;
        if note > MAX_NOTE {
            return Err(NoteMapError::NoteOutOfRange(note));
        }
        if let Some(existing) = *slot {
            if existing != note {
                return Err(NoteMapError::AlreadyListening {
                    voice,
                    note: existing,
                });
            }
        }

        *slot = Some(note);
        info!(note, voice, "Listening for note");
        Ok(())
    }

    /// Stops the first voice listening to `note` from listening. Returns whether a
    /// voice was listening.
    pub fn remove_note_to_listen(&self, note: u8) -> bool {
        let mut notes = self.notes.write();
        match notes.iter_mut().find(|slot| **slot == Some(note)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// The voice listening to `note`, if any.
    pub fn voice_for(&self, note: u8) -> Option<usize> {
        self.notes
            .read()
            .iter()
            .position(|slot| *slot == Some(note))
    }

    /// Handles a raw MIDI event. Unparseable, filtered and unmapped events are
    /// ignored.
    pub fn handle_event(&self, raw_event: &[u8]) {
        let event = match LiveEvent::parse(raw_event) {
            Ok(event) => event,
            Err(e) => {
                debug!(err = ?e, "Ignoring unparseable MIDI event");
                return;
            }
        };

        let (channel, message) = match event {
            LiveEvent::Midi { channel, message } => (channel.as_int(), message),
            _ => return,
        };
        if self.channel.is_some_and(|filter| filter != channel) {
            return;
        }

        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                self.note_on(key.as_int(), vel.as_int());
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                self.note_off(key.as_int());
            }
            _ => {}
        }
    }

    /// Triggers the voice listening to `note`. Returns whether a voice started.
    pub fn note_on(&self, note: u8, velocity: u8) -> bool {
        let voice = match self.voice_for(note) {
            Some(voice) => voice,
            None => {
                debug!(note, "No voice listening for note");
                return false;
            }
        };

        let triggered = self
            .pool
            .trigger(voice, f32::from(velocity.min(MAX_NOTE)) / 127.0);
        if !triggered {
            warn!(note, voice, "Note couldn't be played");
        }
        triggered
    }

    /// Passes a note release to the listening voice. Releases don't affect playback.
    pub fn note_off(&self, note: u8) -> bool {
        match self.voice_for(note) {
            Some(voice) => self.pool.release(voice),
            None => false,
        }
    }

    /// Watches the device and handles its events until the device closes its sender.
    pub fn monitor_events(self: Arc<Self>, device: Arc<dyn Device>) -> JoinHandle<()> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(10);

        let watch_device = device.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "note handler");
            let _enter = span.enter();

            info!(device = watch_device.name(), "Note handler started.");
            if let Err(e) = watch_device.watch_events(midi_events_tx) {
                error!(err = e.to_string(), "Error watching MIDI events");
            }
        });

        tokio::spawn(async move {
            while let Some(raw_event) = midi_events_rx.recv().await {
                self.handle_event(&raw_event);
            }
            info!("MIDI watcher closed.");
            device.stop_watch_events();
        })
    }
}

#[cfg(test)]
mod tests {
    use midly::num::{u4, u7};

    use super::*;
    use crate::patch::{DecodedAudio, PatchParams};
    use crate::samples::VoiceState;

    fn handler(channel: Option<u8>) -> NoteHandler {
        let pool = Arc::new(VoicePool::new(3, 1 << 16));
        for voice in 0..2 {
            pool.install(
                voice,
                DecodedAudio::new(vec![100; 16], 1, 44100).unwrap(),
                PatchParams::default(),
                "test",
            )
            .unwrap();
        }
        NoteHandler::new(pool, channel)
    }

    fn raw(channel: u8, message: MidiMessage) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        LiveEvent::Midi {
            channel: u4::new(channel),
            message,
        }
        .write(&mut buf)
        .unwrap();
        buf
    }

    fn note_on(channel: u8, key: u8, vel: u8) -> Vec<u8> {
        raw(
            channel,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        )
    }

    #[test]
    fn test_note_map() {
        let handler = handler(None);
        assert_eq!(
            handler.set_note_to_listen(48, 3),
            Err(NoteMapError::VoiceOutOfRange {
                voice: 3,
                voices: 3
            })
        );
        assert_eq!(
            handler.set_note_to_listen(128, 0),
            Err(NoteMapError::NoteOutOfRange(128))
        );

        handler.set_note_to_listen(48, 0).unwrap();
        handler.set_note_to_listen(48, 0).unwrap();
        assert_eq!(
            handler.set_note_to_listen(50, 0),
            Err(NoteMapError::AlreadyListening { voice: 0, note: 48 })
        );
        assert_eq!(handler.voice_for(48), Some(0));

        assert!(handler.remove_note_to_listen(48));
        assert!(!handler.remove_note_to_listen(48));
        assert_eq!(handler.voice_for(48), None);
        handler.set_note_to_listen(50, 0).unwrap();
        assert_eq!(handler.voice_for(50), Some(0));
    }

    #[test]
    fn test_note_on_triggers_voice() {
        let handler = handler(None);
        handler.set_note_to_listen(48, 0).unwrap();
        handler.set_note_to_listen(49, 1).unwrap();
        handler.set_note_to_listen(50, 2).unwrap();

        handler.handle_event(&note_on(0, 49, 127));
        let snapshot = handler.pool.snapshot(1).unwrap();
        assert_eq!(snapshot.state, VoiceState::Playing);
        assert_eq!(snapshot.velocity, 1.0);
        assert_eq!(handler.pool.state(0), Some(VoiceState::Idle));

        handler.handle_event(&note_on(0, 48, 64));
        let snapshot = handler.pool.snapshot(0).unwrap();
        assert_eq!(snapshot.velocity, 64.0 / 127.0);

        // Voice 2 has nothing loaded.
        assert!(!handler.note_on(50, 100));
        // Unmapped.
        assert!(!handler.note_on(60, 100));
    }

    #[test]
    fn test_note_off_and_zero_velocity_do_not_stop_playback() {
        let handler = handler(None);
        handler.set_note_to_listen(48, 0).unwrap();
        handler.handle_event(&note_on(0, 48, 100));

        handler.handle_event(&note_on(0, 48, 0));
        handler.handle_event(&raw(
            0,
            MidiMessage::NoteOff {
                key: u7::new(48),
                vel: u7::new(0),
            },
        ));
        assert_eq!(handler.pool.state(0), Some(VoiceState::Playing));
        assert_eq!(handler.pool.snapshot(0).unwrap().velocity, 100.0 / 127.0);
        assert!(handler.note_off(48));
        assert!(!handler.note_off(60));
    }

    #[test]
    fn test_channel_filter_and_garbage() {
        let handler = handler(Some(9));
        handler.set_note_to_listen(48, 0).unwrap();

        handler.handle_event(&note_on(0, 48, 100));
        assert_eq!(handler.pool.state(0), Some(VoiceState::Idle));

        handler.handle_event(&[1, 2, 3, 4]);
        handler.handle_event(&[]);
        handler.handle_event(&raw(
            9,
            MidiMessage::ProgramChange {
                program: u7::new(3),
            },
        ));
        assert_eq!(handler.pool.state(0), Some(VoiceState::Idle));

        handler.handle_event(&note_on(9, 48, 100));
        assert_eq!(handler.pool.state(0), Some(VoiceState::Playing));
    }
}
