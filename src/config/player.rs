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
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;
use super::midi::Midi;
use super::storage::Storage;
use super::voices::Voices;

/// The configuration for the sample player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The audio configuration.
    audio: Option<Audio>,
    /// The MIDI configuration. Without it no notes are received.
    midi: Option<Midi>,
    /// The patch storage configuration.
    storage: Option<Storage>,
    /// The voice configuration.
    voices: Option<Voices>,
}

impl Player {
    pub fn new(audio: Audio, midi: Option<Midi>, storage: Storage, voices: Voices) -> Player {
        Player {
            audio: Some(audio),
            midi,
            storage: Some(storage),
            voices: Some(voices),
        }
    }

    /// Parses and validates a player config from a YAML file. Values can be overridden
    /// with environment variables such as `POLYSAMPLER__AUDIO__DEVICE`.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        let player = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("POLYSAMPLER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Player>()?;
        player.validate()?;
        Ok(player)
    }

    /// Checks values the types can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let voices = self.voices();
        if voices.count() == 0 {
            return Err(ConfigError::Invalid(
                "voices.count must be at least 1".to_string(),
            ));
        }
        if voices.note_begin() as usize + voices.count() - 1 > 127 {
            return Err(ConfigError::Invalid(format!(
                "{} voices starting at note {} run past note 127",
                voices.count(),
                voices.note_begin()
            )));
        }
        if self.audio().buffer_size() == 0 {
            return Err(ConfigError::Invalid(
                "audio.buffer_size must be at least 1".to_string(),
            ));
        }
        if let Some(channel) = self.midi.as_ref().and_then(|midi| midi.channel()) {
            if !(1..=16).contains(&channel) {
                return Err(ConfigError::Invalid(format!(
                    "midi.channel must be between 1 and 16, got {}",
                    channel
                )));
            }
        }
        Ok(())
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Returns the MIDI configuration.
    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    /// Returns the storage configuration.
    pub fn storage(&self) -> Storage {
        self.storage.clone().unwrap_or_default()
    }

    /// Returns the voice configuration.
    pub fn voices(&self) -> Voices {
        self.voices.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use config::{Config, File, FileFormat};

    use crate::patch::StorageKind;

    use super::*;

    fn parse(yaml: &str) -> Result<Player, ConfigError> {
        let player = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Player>()?;
        player.validate()?;
        Ok(player)
    }

    #[test]
    fn test_defaults() {
        let player = parse("{}").unwrap();
        let audio = player.audio();
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.buffer_size(), 64);
        assert!(player.midi().is_none());

        let storage = player.storage();
        assert_eq!(storage.selected(), StorageKind::SdCard);
        assert_eq!(storage.directory(), "/samples");
        assert!(storage.backends().is_empty());

        let voices = player.voices();
        assert_eq!(voices.count(), 8);
        assert_eq!(voices.memory_budget(), 8 * 1024 * 1024);
        assert_eq!(voices.note_begin(), 48);
        assert_eq!(voices.patch_for(3, "/samples"), "/samples/3.wav");
    }

    #[test]
    fn test_full_config() {
        let player = parse(
            r#"
            audio:
              device: mock-device
              sample_rate: 48000
              buffer_size: 128
            midi:
              device: mock-midi
              channel: 10
            storage:
              selected: internal
              directory: /patches/
              internal: mock-flash
              sd_card: /mnt/card
            voices:
              count: 4
              memory_budget: 1024
              note_begin: 36
              patches:
                - /patches/kick.wav
                - /patches/snare.wav
            "#,
        )
        .unwrap();

        let audio = player.audio();
        assert_eq!(audio.device(), "mock-device");
        assert_eq!(audio.sample_rate(), 48000);
        assert_eq!(audio.buffer_size(), 128);

        let midi = player.midi().unwrap();
        assert_eq!(midi.device(), "mock-midi");
        assert_eq!(midi.channel(), Some(10));
        assert_eq!(midi.wire_channel(), Some(9));

        let storage = player.storage();
        assert_eq!(storage.selected(), StorageKind::Internal);
        assert_eq!(
            storage.backends(),
            vec![
                (StorageKind::Internal, "mock-flash"),
                (StorageKind::SdCard, "/mnt/card")
            ]
        );

        let voices = player.voices();
        assert_eq!(voices.count(), 4);
        assert_eq!(voices.memory_budget(), 1024);
        assert_eq!(voices.note_begin(), 36);
        assert_eq!(voices.patch_for(1, storage.directory()), "/patches/snare.wav");
        assert_eq!(voices.patch_for(2, storage.directory()), "/patches/2.wav");
    }

    #[test]
    fn test_validation() {
        for yaml in [
            "voices:\n  count: 0",
            "voices:\n  count: 81\n  note_begin: 48",
            "audio:\n  device: mock\n  buffer_size: 0",
            "midi:\n  device: mock\n  channel: 0",
            "midi:\n  device: mock\n  channel: 17",
        ] {
            assert!(
                matches!(parse(yaml), Err(ConfigError::Invalid(_))),
                "{} should be invalid",
                yaml
            );
        }
        assert!(parse("voices:\n  count: 80\n  note_begin: 48").is_ok());
        assert!(matches!(
            parse("storage:\n  selected: floppy"),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_deserialize_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "voices:\n  count: 2\naudio:\n  device: mock").unwrap();
        let player = Player::deserialize(file.path()).unwrap();
        assert_eq!(player.voices().count(), 2);
        assert_eq!(player.audio().device(), "mock");

        let missing = file.path().with_extension("missing.yaml");
        assert!(matches!(
            Player::deserialize(&missing),
            Err(ConfigError::Load(_))
        ));
    }
}
