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
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use polysampler::config::Player as PlayerConfig;
use polysampler::patch::{wav, PatchParams, StorageKind};
use polysampler::player::{patch_store, Player};
use polysampler::{audio, midi};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=polyphonic sample player

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/polysampler
ExecStart=/usr/local/bin/polysampler start "$POLYSAMPLER_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=polysampler.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the sample player.
    Start {
        /// The path to the player config.
        player_path: String,
    },
    /// Lists the patches in the configured patch directory.
    Patches {
        /// The path to the player config.
        player_path: String,
        /// Number of patches to skip.
        #[arg[short, long, default_value_t = 0]]
        offset: usize,
        /// The storage device to list (internal or sd-card). Defaults to the configured one.
        #[arg[short, long, value_parser = parse_storage_kind]]
        storage: Option<StorageKind>,
    },
    /// Prints a patch's audio format and parameters.
    Inspect {
        /// The path to the player config.
        player_path: String,
        /// The patch file on the storage device, e.g. /samples/kick.wav.
        filename: String,
    },
    /// Imports a WAV file from the host as a new patch.
    Import {
        /// The path to the player config.
        player_path: String,
        /// The WAV file to import. Must be 16 bit PCM.
        wav_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

fn parse_storage_kind(value: &str) -> Result<StorageKind, String> {
    match value {
        "internal" => Ok(StorageKind::Internal),
        "sd-card" | "sd_card" => Ok(StorageKind::SdCard),
        _ => Err(format!(
            "unknown storage device {}, expected internal or sd-card",
            value
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { player_path } => {
            let config = PlayerConfig::deserialize(&PathBuf::from(player_path))?;
            Player::new(&config)?.run().await?;
        }
        Commands::Patches {
            player_path,
            offset,
            storage,
        } => {
            let config = PlayerConfig::deserialize(&PathBuf::from(player_path))?;
            let store = patch_store(&config.storage());
            if let Some(storage) = storage {
                store.select_backend(storage)?;
            }

            let patches: Vec<String> = store.list_patches(store.directory(), offset)?.collect();
            if patches.is_empty() {
                println!("No patches found in {}.", store.directory());
                return Ok(());
            }

            println!(
                "Patches on {} (count: {}):",
                store.selected_backend(),
                patches.len()
            );
            for patch in patches {
                println!("- {}", patch);
            }
        }
        Commands::Inspect {
            player_path,
            filename,
        } => {
            let config = PlayerConfig::deserialize(&PathBuf::from(player_path))?;
            let store = patch_store(&config.storage());
            let patch = store.load(&filename, usize::MAX)?;

            println!("{}:", patch.filename);
            println!("  channels: {}", patch.audio.channels());
            println!("  sample rate: {}", patch.audio.sample_rate());
            println!("  frames: {}", patch.audio.frame_count());
            println!("  params: {}", patch.params);
        }
        Commands::Import {
            player_path,
            wav_path,
        } => {
            let config = PlayerConfig::deserialize(&PathBuf::from(player_path))?;
            let store = patch_store(&config.storage());
            let audio = wav::import_from(BufReader::new(File::open(&wav_path)?))?;
            let saved = store.save(
                audio.samples(),
                audio.channels(),
                audio.sample_rate(),
                &PatchParams::current(),
            )?;

            println!("Imported {} as {}.", wav_path, saved.audio);
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
