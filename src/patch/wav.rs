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

//! Minimal 16-bit PCM WAV payload codec.
//!
//! Only the canonical 44-byte layout is understood: a RIFF/WAVE header, a 16-byte
//! `fmt ` chunk and a `data` chunk immediately after it. Every field is read and
//! written explicitly in little-endian order.
//!
//! Files coming from a host are read with [`import_from`], which accepts any layout
//! `hound` understands.

use std::io::{self, Read, Write};

use super::error::PatchError;

/// Length of the fixed descriptor preceding the sample data.
pub const HEADER_LEN: usize = 44;

/// The only supported sample width.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Sample rate written when nothing better is known.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;
const BYTES_PER_SAMPLE: usize = 2;

/// The decoded descriptor of a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    channels: u16,
    sample_rate: u32,
    data_len: u32,
}

impl WavHeader {
    /// Creates a canonical descriptor for the given shape.
    pub fn new(channels: u16, sample_rate: u32, data_len: u32) -> Result<WavHeader, PatchError> {
        check_channels(channels)?;
        Ok(WavHeader {
            channels,
            sample_rate,
            data_len,
        })
    }

    /// Parses the first [`HEADER_LEN`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<WavHeader, PatchError> {
        if bytes.len() < HEADER_LEN {
            return Err(PatchError::Format(format!(
                "{} bytes is shorter than the {} byte descriptor",
                bytes.len(),
                HEADER_LEN
            )));
        }

        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        let fmt_len = read_u32(bytes, 16);
        if fmt_len != FMT_CHUNK_LEN {
            return Err(PatchError::Format(format!(
                "unsupported format chunk length {}",
                fmt_len
            )));
        }

        let format_tag = read_u16(bytes, 20);
        if format_tag != FORMAT_PCM {
            return Err(PatchError::Format(format!(
                "unsupported format tag {:#06x}",
                format_tag
            )));
        }

        let channels = read_u16(bytes, 22);
        check_channels(channels).map_err(|_| {
            PatchError::Format(format!("unsupported channel count {}", channels))
        })?;

        let bits_per_sample = read_u16(bytes, 34);
        if bits_per_sample != BITS_PER_SAMPLE {
            return Err(PatchError::Format(format!(
                "unsupported bit depth {}",
                bits_per_sample
            )));
        }

        let header = WavHeader {
            channels,
            sample_rate: read_u32(bytes, 24),
            data_len: read_u32(bytes, 40),
        };

        let block_align = read_u16(bytes, 32);
        if block_align != header.block_align() {
            return Err(PatchError::Format(format!(
                "block align {} does not match {} channels",
                block_align, channels
            )));
        }
        let byte_rate = read_u32(bytes, 28);
        if byte_rate != header.byte_rate() {
            return Err(PatchError::Format(format!(
                "byte rate {} does not match sample rate {}",
                byte_rate, header.sample_rate
            )));
        }

        Ok(header)
    }

    /// Serializes the canonical descriptor.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&(36 + self.data_len).to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        header
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the sample data in bytes.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Bytes per frame.
    pub fn block_align(&self) -> u16 {
        self.channels * BITS_PER_SAMPLE / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(u32::from(self.block_align()))
    }
}

/// A fully decoded payload.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Wraps interleaved samples. Fails for channel counts other than 1 and 2.
    pub fn new(samples: Vec<i16>, channels: u16, sample_rate: u32) -> Result<Self, PatchError> {
        check_channels(channels)?;
        Ok(DecodedAudio {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The sample rate declared by the descriptor. It is not enforced on playback.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of whole frames.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Decodes a complete payload held in memory.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio, PatchError> {
    let header = WavHeader::parse(bytes)?;
    let remaining = bytes.len() - HEADER_LEN;
    let data_len = header.data_len as usize;
    if data_len > remaining {
        return Err(PatchError::Format(format!(
            "payload length {} exceeds the {} bytes present",
            data_len, remaining
        )));
    }

    Ok(DecodedAudio {
        samples: samples_from_le(&bytes[HEADER_LEN..HEADER_LEN + data_len]),
        channels: header.channels,
        sample_rate: header.sample_rate,
    })
}

/// Appends the canonical encoding of `samples` to `out`.
pub fn encode(
    out: &mut Vec<u8>,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<(), PatchError> {
    let header = WavHeader::new(channels, sample_rate, data_len_for(samples)?)?;
    out.reserve(HEADER_LEN + samples.len() * BYTES_PER_SAMPLE);
    out.extend_from_slice(&header.to_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(())
}

/// Reads a payload from a stream. The descriptor is read first so that a payload
/// larger than `max_payload` bytes is rejected before any sample memory is allocated.
pub fn read_from<R: Read + ?Sized>(
    reader: &mut R,
    max_payload: usize,
) -> Result<DecodedAudio, PatchError> {
    let mut header_bytes = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|e| truncated(e, "descriptor"))?;
    let header = WavHeader::parse(&header_bytes)?;

    let data_len = header.data_len as usize;
    if data_len > max_payload {
        return Err(PatchError::CapacityExceeded {
            requested: data_len,
            available: max_payload,
        });
    }

    let mut data = vec![0u8; data_len];
    reader
        .read_exact(&mut data)
        .map_err(|e| truncated(e, "sample data"))?;

    Ok(DecodedAudio {
        samples: samples_from_le(&data),
        channels: header.channels,
        sample_rate: header.sample_rate,
    })
}

/// Decodes a WAV file produced elsewhere. Extra chunks are skipped, but the audio must
/// still be 16-bit integer PCM with one or two channels.
pub fn import_from<R: Read>(reader: R) -> Result<DecodedAudio, PatchError> {
    let reader = hound::WavReader::new(reader).map_err(from_hound)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE
    {
        return Err(PatchError::Format(format!(
            "unsupported sample format {:?} with {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    check_channels(spec.channels).map_err(|_| {
        PatchError::Format(format!("unsupported channel count {}", spec.channels))
    })?;

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(from_hound)?;
    DecodedAudio::new(samples, spec.channels, spec.sample_rate)
}

/// Writes the canonical encoding of `samples` to a stream.
pub fn write_to<W: Write + ?Sized>(
    writer: &mut W,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<(), PatchError> {
    let mut bytes = Vec::new();
    encode(&mut bytes, samples, channels, sample_rate)?;
    writer
        .write_all(&bytes)
        .map_err(|e| PatchError::StorageUnavailable(e.to_string()))
}

fn check_channels(channels: u16) -> Result<(), PatchError> {
    match channels {
        1 | 2 => Ok(()),
        _ => Err(PatchError::InvalidArgument(format!(
            "channel count must be 1 or 2, got {}",
            channels
        ))),
    }
}

fn data_len_for(samples: &[i16]) -> Result<u32, PatchError> {
    samples
        .len()
        .checked_mul(BYTES_PER_SAMPLE)
        .and_then(|len| u32::try_from(len).ok())
        .filter(|len| *len <= u32::MAX - 36)
        .ok_or_else(|| {
            PatchError::InvalidArgument(format!("{} samples do not fit a payload", samples.len()))
        })
}

fn from_hound(err: hound::Error) -> PatchError {
    match err {
        hound::Error::IoError(e) => PatchError::StorageUnavailable(e.to_string()),
        other => PatchError::Format(other.to_string()),
    }
}

fn truncated(err: io::Error, what: &str) -> PatchError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => PatchError::Format(format!("truncated {}", what)),
        _ => PatchError::StorageUnavailable(err.to_string()),
    }
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), PatchError> {
    if &bytes[offset..offset + 4] != tag {
        return Err(PatchError::Format(format!(
            "expected tag {:?} at offset {}",
            String::from_utf8_lossy(tag),
            offset
        )));
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn samples_from_le(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
